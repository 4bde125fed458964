use std::sync::Arc;

use super::draggable::{DragController, MoveOutcome, RestoreOutcome};
use super::event_bus::HostEvents;
use super::hdr::{HdrController, ToggleOutcome};
use super::host::{DisplayGeometryProvider, WidgetHost};
use super::persistence::KeyValueStore;
use super::window_controls::WindowControls;
use crate::models::{ContextMenuEvent, LogicalPosition, PointerEvent, PointerInput, WidgetSettings};

/// The whole widget: drag, HDR and window controls over one host.
pub struct HdrWidget<H> {
    drag: DragController<H>,
    hdr: HdrController<H>,
    controls: WindowControls<H>,
}

impl<H> Clone for HdrWidget<H> {
    fn clone(&self) -> Self {
        Self {
            drag: self.drag.clone(),
            hdr: self.hdr.clone(),
            controls: self.controls.clone(),
        }
    }
}

impl<H: WidgetHost> HdrWidget<H> {
    pub fn new(
        host: Arc<H>,
        display: Arc<dyn DisplayGeometryProvider>,
        store: Arc<dyn KeyValueStore>,
        settings: WidgetSettings,
    ) -> Self {
        let settings = settings.normalized();
        let controls = WindowControls::new(Arc::clone(&host), Arc::clone(&store), settings.clone());
        let drag = DragController::new(
            Arc::clone(&host),
            display,
            store,
            controls.pinned_flag(),
            settings,
        );
        let hdr = HdrController::new(host);
        Self { drag, hdr, controls }
    }

    pub fn drag(&self) -> &DragController<H> {
        &self.drag
    }

    pub fn hdr(&self) -> &HdrController<H> {
        &self.hdr
    }

    pub fn controls(&self) -> &WindowControls<H> {
        &self.controls
    }

    /// Mounts all three controllers concurrently. Resolves once each has
    /// finished its startup work.
    pub async fn mount(&self, events: &dyn HostEvents) -> RestoreOutcome {
        let ((), (), restored) = tokio::join!(
            self.controls.mount(events),
            self.hdr.mount(events),
            self.drag.mount(),
        );
        restored
    }

    pub fn unmount(&self) {
        self.controls.unmount();
        self.hdr.unmount();
    }

    pub async fn on_pointer_down(&self, pointer: PointerEvent) -> bool {
        if !self.controls.is_drag_enabled() {
            return false;
        }
        self.drag.start_drag(pointer).await
    }

    pub async fn on_pointer_move(&self, pointer: PointerEvent) -> MoveOutcome {
        if !self.drag.is_listening() {
            return MoveOutcome::Ignored;
        }
        self.drag.on_drag_move(pointer).await
    }

    pub async fn on_pointer_up(&self) -> Option<LogicalPosition> {
        if !self.drag.is_listening() {
            return None;
        }
        self.drag.stop_drag().await
    }

    /// Raw pointer input from the UI. A press only reaches the drag
    /// controller while dragging is enabled.
    pub async fn handle_pointer(&self, input: PointerInput) {
        if matches!(input, PointerInput::Down(_)) && !self.controls.is_drag_enabled() {
            return;
        }
        self.drag.handle_pointer(input).await;
    }

    pub async fn on_context_menu(&self, event: &mut ContextMenuEvent) {
        self.controls.on_context_menu(event).await;
    }

    pub async fn toggle_hdr(&self) -> ToggleOutcome {
        self.hdr.toggle_hdr().await
    }

    pub fn set_hovered(&self, hovered: bool) {
        self.controls.set_hovered(hovered);
    }
}
