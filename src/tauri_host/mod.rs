//! Host traits bound to a Tauri 2 `WebviewWindow`.

pub mod context_menu;

use anyhow::{anyhow, Context};
use parking_lot::Mutex;
use std::sync::Arc;
use tauri::{AppHandle, Emitter, Listener, Manager, Monitor, WebviewWindow, WindowEvent};

use crate::core::event_bus::{EventHandler, HostEvents, Subscription};
use crate::core::host::{DisplayGeometryProvider, HostResult, WidgetHost};
use crate::core::persistence::KeyValueStore;
use crate::core::{app_log, HdrWidget};
use crate::models::events::MONITOR_CHANGED;
use crate::models::{
    HostEvent, HostEventKind, LogicalPosition, MonitorChangedPayload, PhysicalPoint, PhysicalSize,
    WidgetSettings, WorkArea,
};

const SCOPE: &str = "tauri";

/// OS-specific HDR switch supplied by the application.
pub trait HdrSwitch: Send + Sync + 'static {
    fn is_enabled(&self) -> anyhow::Result<bool>;
    fn set_enabled(&self, enable: bool) -> anyhow::Result<()>;
}

pub struct TauriHost<S> {
    window: WebviewWindow,
    hdr: S,
}

impl<S: HdrSwitch> TauriHost<S> {
    pub fn new(window: WebviewWindow, hdr: S) -> Self {
        Self { window, hdr }
    }

    pub fn window(&self) -> &WebviewWindow {
        &self.window
    }

    fn monitor(&self) -> HostResult<Monitor> {
        let current = self.window.current_monitor().context("current_monitor")?;
        match current {
            Some(m) => Ok(m),
            None => self
                .window
                .primary_monitor()
                .context("primary_monitor")?
                .ok_or_else(|| anyhow!("no monitor available")),
        }
    }
}

/// Keeps a physical position inside `monitor`'s work area for a window of `size`.
fn clamp_to_work_area(
    monitor: &Monitor,
    x: i32,
    y: i32,
    size: tauri::PhysicalSize<u32>,
) -> (i32, i32) {
    let area = monitor.work_area();
    let min_x = area.position.x;
    let min_y = area.position.y;
    let max_x = min_x + area.size.width as i32 - size.width as i32;
    let max_y = min_y + area.size.height as i32 - size.height as i32;
    (min_x.max(x.min(max_x)), min_y.max(y.min(max_y)))
}

impl<S: HdrSwitch> WidgetHost for TauriHost<S> {
    /// Top-right corner of the current monitor's work area, without a shadow.
    async fn init_position(&self) -> HostResult<()> {
        if let Err(e) = self.window.set_shadow(false) {
            app_log::warn(
                SCOPE,
                "set_shadow_failed",
                Some(serde_json::json!({ "error": e.to_string() })),
            );
        }
        let monitor = self.monitor()?;
        let size = self.window.outer_size().context("outer_size")?;
        let area = monitor.work_area();
        let x = area.position.x + area.size.width as i32 - size.width as i32;
        let y = area.position.y;
        self.window
            .set_position(tauri::PhysicalPosition::new(x, y))
            .context("set_position")?;
        Ok(())
    }

    async fn move_widget(&self, x: i32, y: i32, is_pinned: bool) -> HostResult<()> {
        self.window
            .set_position(tauri::PhysicalPosition::new(x, y))
            .context("set_position")?;
        // Windows drops topmost on some repositions.
        if is_pinned {
            self.window.set_always_on_top(true).context("set_always_on_top")?;
        }
        Ok(())
    }

    async fn set_pin_state(&self, pinned: bool) -> HostResult<()> {
        self.window.set_always_on_top(pinned).context("set_always_on_top")?;
        Ok(())
    }

    async fn show_context_menu(
        &self,
        is_pinned: bool,
        is_draggable: Option<bool>,
    ) -> HostResult<()> {
        context_menu::popup(&self.window, is_pinned, is_draggable).context("popup_menu")?;
        Ok(())
    }

    async fn setup_widget_window(&self) -> HostResult<()> {
        self.window.set_shadow(false).context("set_shadow")?;
        self.window.set_skip_taskbar(true).context("set_skip_taskbar")?;
        Ok(())
    }

    /// Places the window back on the named monitor. Does nothing when that
    /// monitor is gone.
    async fn restore_window(
        &self,
        saved_monitor_name: &str,
        saved_x: f64,
        saved_y: f64,
    ) -> HostResult<()> {
        let monitors = self.window.available_monitors().context("available_monitors")?;
        let Some(monitor) = monitors
            .iter()
            .find(|m| m.name().map(String::as_str) == Some(saved_monitor_name))
        else {
            app_log::info(SCOPE, "saved_monitor_missing");
            return Ok(());
        };

        let physical = LogicalPosition::new(saved_x, saved_y)
            .to_physical(monitor.scale_factor())
            .rounded();
        let size = self.window.outer_size().context("outer_size")?;
        let (x, y) = clamp_to_work_area(monitor, physical.x, physical.y, size);
        self.window
            .set_position(tauri::PhysicalPosition::new(x, y))
            .context("set_position")?;
        Ok(())
    }

    async fn check_hdr_status(&self) -> HostResult<bool> {
        self.hdr.is_enabled()
    }

    async fn toggle_hdr(&self, enable: bool) -> HostResult<()> {
        self.hdr.set_enabled(enable)
    }

    async fn show_window(&self) -> HostResult<()> {
        self.window.show().context("show")?;
        Ok(())
    }

    async fn outer_position(&self) -> HostResult<PhysicalPoint> {
        let p = self.window.outer_position().context("outer_position")?;
        Ok(PhysicalPoint::new(p.x, p.y))
    }

    async fn outer_size(&self) -> HostResult<PhysicalSize> {
        let s = self.window.outer_size().context("outer_size")?;
        Ok(PhysicalSize::new(s.width, s.height))
    }

    async fn scale_factor(&self) -> HostResult<f64> {
        Ok(self.window.scale_factor().context("scale_factor")?)
    }

    async fn set_logical_position(&self, position: LogicalPosition) -> HostResult<()> {
        self.window
            .set_position(tauri::LogicalPosition::new(position.x, position.y))
            .context("set_position")?;
        Ok(())
    }
}

/// Reads the monitor under the window on every call.
pub struct TauriDisplay {
    window: WebviewWindow,
}

impl TauriDisplay {
    pub fn new(window: WebviewWindow) -> Self {
        Self { window }
    }
}

impl DisplayGeometryProvider for TauriDisplay {
    fn device_pixel_ratio(&self) -> f64 {
        self.window.scale_factor().unwrap_or(1.0)
    }

    fn work_area(&self) -> WorkArea {
        let monitor = match self.window.current_monitor() {
            Ok(Some(m)) => m,
            _ => {
                app_log::warn(SCOPE, "work_area_unavailable", None);
                return WorkArea::default();
            }
        };
        let area = monitor.work_area();
        let scale = monitor.scale_factor();
        WorkArea::new(
            area.position.x as f64 / scale,
            area.position.y as f64 / scale,
            area.size.width as f64 / scale,
            area.size.height as f64 / scale,
        )
    }
}

/// Host events delivered through Tauri's global event channel.
#[derive(Clone)]
pub struct TauriEvents {
    app: AppHandle,
}

impl TauriEvents {
    pub fn new(app: AppHandle) -> Self {
        Self { app }
    }
}

impl HostEvents for TauriEvents {
    fn listen(&self, kind: HostEventKind, handler: EventHandler) -> Subscription {
        let name = kind.name();
        let id = self.app.listen_any(name, move |event| {
            match HostEvent::from_wire(name, event.payload()) {
                Ok(ev) => handler(&ev),
                Err(e) => app_log::failure(SCOPE, "event_decode_failed", &e),
            }
        });
        let app = self.app.clone();
        Subscription::new(kind, move || app.unlisten(id))
    }
}

/// Forwards context-menu clicks and emits `monitor-changed` whenever a move
/// lands the window on a different monitor.
pub fn install_window_hooks(window: &WebviewWindow) {
    window.on_menu_event(|w, event| {
        context_menu::handle_menu_event(w.app_handle(), &event);
    });

    let last_monitor: Arc<Mutex<Option<String>>> = Arc::new(Mutex::new(None));
    let tracked = window.clone();
    window.on_window_event(move |event| {
        if !matches!(event, WindowEvent::Moved(_)) {
            return;
        }
        let monitor = tracked.current_monitor().ok().flatten();
        let Some(name) = monitor.and_then(|m| m.name().cloned()) else {
            return;
        };
        {
            let mut last = last_monitor.lock();
            if last.as_deref() == Some(name.as_str()) {
                return;
            }
            *last = Some(name.clone());
        }
        let payload = MonitorChangedPayload { monitor_name: name };
        if let Err(e) = tracked.app_handle().emit(MONITOR_CHANGED, payload) {
            app_log::warn(
                SCOPE,
                "emit_failed",
                Some(serde_json::json!({ "event": MONITOR_CHANGED, "error": e.to_string() })),
            );
        }
    });
}

/// Builds a widget bound to `window` together with its event source.
pub fn widget_for_window<S: HdrSwitch>(
    window: WebviewWindow,
    hdr: S,
    store: Arc<dyn KeyValueStore>,
    settings: WidgetSettings,
) -> (HdrWidget<TauriHost<S>>, TauriEvents) {
    install_window_hooks(&window);
    let events = TauriEvents::new(window.app_handle().clone());
    let display = Arc::new(TauriDisplay::new(window.clone()));
    let host = Arc::new(TauriHost::new(window, hdr));
    (HdrWidget::new(host, display, store, settings), events)
}
