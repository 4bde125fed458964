use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::watch;

use super::app_log;
use super::host::{DisplayGeometryProvider, HostResult, WidgetHost};
use super::persistence::{self, KeyValueStore};
use super::window_controls::PinnedFlag;
use crate::models::geometry::sanitize_scale;
use crate::models::{
    Bounds, LogicalPosition, PhysicalPoint, PhysicalPosition, PointerEvent, PointerInput,
    WidgetSettings,
};

const SCOPE: &str = "drag";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DragSnapshot {
    pub is_dragging: bool,
    pub has_dragged: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    /// No drag in progress.
    Ignored,
    /// A previous move is still waiting on the host; this sample is dropped.
    Busy,
    /// Still inside the click radius.
    BelowThreshold,
    Moved(PhysicalPoint),
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RestoreOutcome {
    Restored(LogicalPosition),
    Initialized,
    Failed,
}

#[derive(Debug, Default)]
struct DragSession {
    dragging: bool,
    has_dragged: bool,
    /// Move/up input is routed to the controller.
    listening: bool,
    moving: bool,
    start_x: f64,
    start_y: f64,
    offset: PhysicalPosition,
    bounds: Bounds,
}

struct DragInner<H> {
    host: Arc<H>,
    display: Arc<dyn DisplayGeometryProvider>,
    store: Arc<dyn KeyValueStore>,
    pinned: PinnedFlag,
    settings: WidgetSettings,
    session: Mutex<DragSession>,
    snapshot: watch::Sender<DragSnapshot>,
}

/// Turns pointer drags into clamped `move_widget` commands.
pub struct DragController<H> {
    inner: Arc<DragInner<H>>,
}

impl<H> Clone for DragController<H> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Clears the in-flight flag even if the move future is dropped mid-call.
struct MoveGuard<'a>(&'a Mutex<DragSession>);

impl Drop for MoveGuard<'_> {
    fn drop(&mut self) {
        self.0.lock().moving = false;
    }
}

impl<H: WidgetHost> DragController<H> {
    pub fn new(
        host: Arc<H>,
        display: Arc<dyn DisplayGeometryProvider>,
        store: Arc<dyn KeyValueStore>,
        pinned: PinnedFlag,
        settings: WidgetSettings,
    ) -> Self {
        let (snapshot, _) = watch::channel(DragSnapshot::default());
        Self {
            inner: Arc::new(DragInner {
                host,
                display,
                store,
                pinned,
                settings,
                session: Mutex::new(DragSession::default()),
                snapshot,
            }),
        }
    }

    pub fn snapshot(&self) -> DragSnapshot {
        let s = self.inner.session.lock();
        DragSnapshot {
            is_dragging: s.dragging,
            has_dragged: s.has_dragged,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<DragSnapshot> {
        self.inner.snapshot.subscribe()
    }

    pub fn is_dragging(&self) -> bool {
        self.inner.session.lock().dragging
    }

    /// Lets the UI tell a click from the end of a drag.
    pub fn has_dragged(&self) -> bool {
        self.inner.session.lock().has_dragged
    }

    pub fn is_listening(&self) -> bool {
        self.inner.session.lock().listening
    }

    fn publish(&self) {
        self.inner.snapshot.send_replace(self.snapshot());
    }

    /// Bounds of the current (or last) drag session.
    pub fn bounds(&self) -> Bounds {
        self.inner.session.lock().bounds
    }

    fn scale(&self) -> f64 {
        sanitize_scale(self.inner.display.device_pixel_ratio())
    }

    /// Begins a drag on primary-button press. Returns whether a drag started.
    pub async fn start_drag(&self, pointer: PointerEvent) -> bool {
        if !pointer.is_primary() {
            return false;
        }

        let scale = self.scale();
        let window_size = match self.inner.host.outer_size().await {
            Ok(size) => size,
            Err(e) => {
                app_log::failure(SCOPE, "outer_size_failed", &e);
                return false;
            }
        };

        // Monitors can change between drags, so bounds are never reused.
        let bounds = Bounds::for_window(self.inner.display.work_area(), scale, window_size);

        let window_pos = match self.inner.host.outer_position().await {
            Ok(pos) => pos,
            Err(e) => {
                app_log::failure(SCOPE, "outer_position_failed", &e);
                return false;
            }
        };

        let pointer_physical =
            LogicalPosition::new(pointer.screen_x, pointer.screen_y).to_physical(scale);

        {
            let mut s = self.inner.session.lock();
            s.bounds = bounds;
            s.offset = PhysicalPosition::new(
                pointer_physical.x - window_pos.x as f64,
                pointer_physical.y - window_pos.y as f64,
            );
            s.start_x = pointer.screen_x;
            s.start_y = pointer.screen_y;
            s.has_dragged = false;
            s.dragging = true;
            s.listening = true;
        }
        self.publish();
        true
    }

    pub async fn on_drag_move(&self, pointer: PointerEvent) -> MoveOutcome {
        let scale = self.scale();
        let target = {
            let mut s = self.inner.session.lock();
            if !s.dragging {
                return MoveOutcome::Ignored;
            }
            if s.moving {
                return MoveOutcome::Busy;
            }

            let dist = pointer.distance_to(s.start_x, s.start_y);
            if dist < self.inner.settings.drag_threshold_px && !s.has_dragged {
                return MoveOutcome::BelowThreshold;
            }

            s.has_dragged = true;
            s.moving = true;

            let raw = PhysicalPosition::new(
                pointer.screen_x * scale - s.offset.x,
                pointer.screen_y * scale - s.offset.y,
            );
            s.bounds.clamp(raw)
        };
        let _guard = MoveGuard(&self.inner.session);
        self.publish();

        let point = target.rounded();
        let is_pinned = self.inner.pinned.get();
        match self.inner.host.move_widget(point.x, point.y, is_pinned).await {
            Ok(()) => {
                let keys = &self.inner.settings.keys;
                let logical = target.to_logical(scale);
                persistence::save_position(self.inner.store.as_ref(), keys, logical);
                MoveOutcome::Moved(point)
            }
            Err(e) => {
                app_log::failure(SCOPE, "move_failed", &e);
                MoveOutcome::Failed
            }
        }
    }

    /// Ends the drag and stores the host's authoritative final position.
    pub async fn stop_drag(&self) -> Option<LogicalPosition> {
        {
            let mut s = self.inner.session.lock();
            s.listening = false;
            s.dragging = false;
        }
        self.publish();

        match self.final_position().await {
            Ok(position) => {
                let keys = &self.inner.settings.keys;
                persistence::save_position(self.inner.store.as_ref(), keys, position);
                Some(position)
            }
            Err(e) => {
                app_log::failure(SCOPE, "save_final_position_failed", &e);
                None
            }
        }
    }

    async fn final_position(&self) -> HostResult<LogicalPosition> {
        let factor = self.inner.host.scale_factor().await?;
        let physical = self.inner.host.outer_position().await?;
        Ok(physical.to_logical(factor))
    }

    /// Routes raw pointer input; move and up only count while a drag listens.
    pub async fn handle_pointer(&self, input: PointerInput) {
        match input {
            PointerInput::Down(pointer) => {
                self.start_drag(pointer).await;
            }
            PointerInput::Move(pointer) => {
                if self.is_listening() {
                    self.on_drag_move(pointer).await;
                }
            }
            PointerInput::Up(_) => {
                if self.is_listening() {
                    self.stop_drag().await;
                }
            }
        }
    }

    pub async fn restore_position(&self) -> RestoreOutcome {
        let keys = &self.inner.settings.keys;
        match persistence::load_position(self.inner.store.as_ref(), keys) {
            Some(position) => match self.inner.host.set_logical_position(position).await {
                Ok(()) => RestoreOutcome::Restored(position),
                Err(e) => {
                    app_log::failure(SCOPE, "restore_position_failed", &e);
                    RestoreOutcome::Failed
                }
            },
            None => match self.inner.host.init_position().await {
                Ok(()) => RestoreOutcome::Initialized,
                Err(e) => {
                    app_log::failure(SCOPE, "init_position_failed", &e);
                    RestoreOutcome::Failed
                }
            },
        }
    }

    /// Waits for the host window to settle, then restores the saved position.
    pub async fn mount(&self) -> RestoreOutcome {
        tokio::time::sleep(self.inner.settings.restore_delay()).await;
        self.restore_position().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::host::StaticDisplay;
    use crate::core::persistence::MemoryStore;
    use crate::core::testing::{HostCall, RecordingHost};
    use crate::models::{PhysicalSize, WorkArea};

    struct Fixture {
        host: Arc<RecordingHost>,
        store: Arc<MemoryStore>,
        pinned: PinnedFlag,
        drag: DragController<RecordingHost>,
    }

    fn fixture(scale: f64, window_pos: PhysicalPoint) -> Fixture {
        let host = Arc::new(RecordingHost::with_window(
            window_pos,
            PhysicalSize::new(200, 100),
            scale,
        ));
        let display = Arc::new(StaticDisplay::new(scale, WorkArea::new(0.0, 0.0, 1000.0, 700.0)));
        let store = Arc::new(MemoryStore::new());
        let pinned = PinnedFlag::new(false);
        let drag = DragController::new(
            Arc::clone(&host),
            display,
            store.clone(),
            pinned.clone(),
            WidgetSettings::immediate(),
        );
        Fixture {
            host,
            store,
            pinned,
            drag,
        }
    }

    #[tokio::test]
    async fn only_primary_button_starts_a_drag() {
        let f = fixture(1.0, PhysicalPoint::new(100, 100));
        assert!(!f.drag.start_drag(PointerEvent::new(2, 150.0, 120.0)).await);
        assert!(!f.drag.is_dragging());
        assert_eq!(
            f.drag.on_drag_move(PointerEvent::primary(400.0, 400.0)).await,
            MoveOutcome::Ignored
        );
        assert!(f.host.moves().is_empty());
    }

    #[tokio::test]
    async fn small_movements_do_not_move_the_window() {
        let f = fixture(1.0, PhysicalPoint::new(100, 100));
        assert!(f.drag.start_drag(PointerEvent::primary(150.0, 120.0)).await);

        let outcome = f.drag.on_drag_move(PointerEvent::primary(152.0, 121.0)).await;
        assert_eq!(outcome, MoveOutcome::BelowThreshold);
        assert!(!f.drag.has_dragged());
        assert!(f.host.moves().is_empty());
    }

    #[tokio::test]
    async fn once_dragging_small_movements_count() {
        let f = fixture(1.0, PhysicalPoint::new(100, 100));
        f.drag.start_drag(PointerEvent::primary(150.0, 120.0)).await;

        assert_eq!(
            f.drag.on_drag_move(PointerEvent::primary(160.0, 120.0)).await,
            MoveOutcome::Moved(PhysicalPoint::new(110, 100))
        );
        assert_eq!(
            f.drag.on_drag_move(PointerEvent::primary(151.0, 120.0)).await,
            MoveOutcome::Moved(PhysicalPoint::new(101, 100))
        );
        assert!(f.drag.has_dragged());
    }

    #[tokio::test]
    async fn move_applies_offset_scale_and_pin_state() {
        let f = fixture(2.0, PhysicalPoint::new(200, 200));
        f.pinned.set(true);
        // pointer at (110, 105) logical = (220, 210) physical, offset (20, 10)
        f.drag.start_drag(PointerEvent::primary(110.0, 105.0)).await;
        let outcome = f.drag.on_drag_move(PointerEvent::primary(160.25, 130.0)).await;

        assert_eq!(outcome, MoveOutcome::Moved(PhysicalPoint::new(301, 250)));
        assert_eq!(
            f.host.moves(),
            vec![HostCall::MoveWidget {
                x: 301,
                y: 250,
                is_pinned: true
            }]
        );
        // persisted unrounded, in logical space
        let keys = WidgetSettings::default().keys;
        assert_eq!(f.store.get(&keys.widget_x).as_deref(), Some("150.25"));
        assert_eq!(f.store.get(&keys.widget_y).as_deref(), Some("125"));
    }

    #[tokio::test]
    async fn moves_are_clamped_to_work_area() {
        let f = fixture(1.5, PhysicalPoint::new(0, 0));
        f.drag.start_drag(PointerEvent::primary(10.0, 10.0)).await;
        let bounds = f.drag.bounds();
        assert_eq!(bounds.max_x, 1500.0 - 200.0);
        assert_eq!(bounds.max_y, 1050.0 - 100.0);

        let samples = [
            (-500.0, -500.0),
            (5000.0, 20.0),
            (400.0, 9000.0),
            (999.0, 699.0),
            (500.0, 300.0),
        ];
        for (x, y) in samples {
            match f.drag.on_drag_move(PointerEvent::primary(x, y)).await {
                MoveOutcome::Moved(p) => {
                    let p = PhysicalPosition::new(p.x as f64, p.y as f64);
                    assert!(bounds.contains(p), "{:?} outside {:?}", p, bounds);
                }
                other => panic!("unexpected outcome {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn concurrent_move_is_dropped_while_one_is_in_flight() {
        let f = fixture(1.0, PhysicalPoint::new(100, 100));
        f.drag.start_drag(PointerEvent::primary(150.0, 120.0)).await;
        let gate = f.host.gate_moves();

        let (first, second) = tokio::join!(
            f.drag.on_drag_move(PointerEvent::primary(200.0, 120.0)),
            async {
                let second = f.drag.on_drag_move(PointerEvent::primary(300.0, 120.0)).await;
                gate.notify_one();
                second
            }
        );

        assert_eq!(first, MoveOutcome::Moved(PhysicalPoint::new(150, 100)));
        assert_eq!(second, MoveOutcome::Busy);
        assert_eq!(f.host.moves().len(), 1);

        // the guard is released once the host answers
        let gate = f.host.gate_moves();
        gate.notify_one();
        assert!(matches!(
            f.drag.on_drag_move(PointerEvent::primary(310.0, 120.0)).await,
            MoveOutcome::Moved(_)
        ));
    }

    #[tokio::test]
    async fn failed_move_is_logged_and_not_persisted() {
        let f = fixture(1.0, PhysicalPoint::new(100, 100));
        f.drag.start_drag(PointerEvent::primary(150.0, 120.0)).await;
        f.host.fail("move_widget");

        assert_eq!(
            f.drag.on_drag_move(PointerEvent::primary(200.0, 120.0)).await,
            MoveOutcome::Failed
        );
        assert!(f.store.snapshot().is_empty());

        f.host.recover("move_widget");
        assert!(matches!(
            f.drag.on_drag_move(PointerEvent::primary(210.0, 120.0)).await,
            MoveOutcome::Moved(_)
        ));
    }

    #[tokio::test]
    async fn stop_drag_persists_host_reported_position() {
        let f = fixture(2.0, PhysicalPoint::new(100, 100));
        f.drag.start_drag(PointerEvent::primary(60.0, 60.0)).await;
        f.drag.on_drag_move(PointerEvent::primary(80.0, 90.0)).await;
        // the host nudged the window after the last move
        f.host.set_position(PhysicalPoint::new(201, 401));

        let saved = f.drag.stop_drag().await;
        assert_eq!(saved, Some(LogicalPosition::new(100.5, 200.5)));
        assert!(!f.drag.is_dragging());
        assert!(!f.drag.is_listening());
        assert_eq!(
            f.drag.on_drag_move(PointerEvent::primary(300.0, 300.0)).await,
            MoveOutcome::Ignored
        );
    }

    #[tokio::test]
    async fn stop_drag_survives_host_failure() {
        let f = fixture(1.0, PhysicalPoint::new(100, 100));
        f.drag.start_drag(PointerEvent::primary(150.0, 120.0)).await;
        f.host.fail("scale_factor");
        assert_eq!(f.drag.stop_drag().await, None);
        assert!(!f.drag.is_dragging());
    }

    #[tokio::test]
    async fn start_drag_aborts_when_geometry_is_unavailable() {
        let f = fixture(1.0, PhysicalPoint::new(100, 100));
        f.host.fail("outer_size");
        assert!(!f.drag.start_drag(PointerEvent::primary(150.0, 120.0)).await);
        assert!(!f.drag.is_dragging());
    }

    #[tokio::test]
    async fn pointer_routing_ignores_moves_without_a_press() {
        let f = fixture(1.0, PhysicalPoint::new(100, 100));
        f.drag.handle_pointer(PointerInput::Move(PointerEvent::primary(400.0, 400.0))).await;
        f.drag.handle_pointer(PointerInput::Up(PointerEvent::primary(400.0, 400.0))).await;
        assert!(f.host.calls().is_empty());

        f.drag.handle_pointer(PointerInput::Down(PointerEvent::primary(150.0, 120.0))).await;
        f.drag.handle_pointer(PointerInput::Move(PointerEvent::primary(250.0, 220.0))).await;
        f.drag.handle_pointer(PointerInput::Up(PointerEvent::primary(250.0, 220.0))).await;
        assert_eq!(f.host.moves().len(), 1);
        assert!(!f.drag.is_listening());
    }

    #[tokio::test]
    async fn snapshot_is_published() {
        let f = fixture(1.0, PhysicalPoint::new(100, 100));
        let rx = f.drag.subscribe();
        f.drag.start_drag(PointerEvent::primary(150.0, 120.0)).await;
        assert!(rx.borrow().is_dragging);
        f.drag.on_drag_move(PointerEvent::primary(250.0, 120.0)).await;
        assert!(rx.borrow().has_dragged);
        f.drag.stop_drag().await;
        assert_eq!(
            *rx.borrow(),
            DragSnapshot {
                is_dragging: false,
                has_dragged: true
            }
        );
    }

    #[tokio::test]
    async fn restore_uses_saved_position_or_asks_host() {
        let f = fixture(2.0, PhysicalPoint::new(0, 0));
        assert_eq!(f.drag.restore_position().await, RestoreOutcome::Initialized);
        assert_eq!(f.host.calls(), vec![HostCall::InitPosition]);

        let keys = WidgetSettings::default().keys;
        f.store.set(&keys.widget_x, "100.5");
        f.store.set(&keys.widget_y, "200.25");
        let restored = LogicalPosition::new(100.5, 200.25);
        assert_eq!(f.drag.restore_position().await, RestoreOutcome::Restored(restored));
        assert_eq!(f.host.calls()[1], HostCall::SetLogicalPosition(restored));
    }

    #[tokio::test]
    async fn malformed_saved_position_falls_back_to_host_placement() {
        let f = fixture(1.0, PhysicalPoint::new(0, 0));
        let keys = WidgetSettings::default().keys;
        f.store.set(&keys.widget_x, "left");
        f.store.set(&keys.widget_y, "200");
        assert_eq!(f.drag.restore_position().await, RestoreOutcome::Initialized);
    }

    #[tokio::test]
    async fn logical_position_round_trips_through_a_session() {
        let f = fixture(2.0, PhysicalPoint::new(0, 0));
        let keys = WidgetSettings::default().keys;
        f.store.set(&keys.widget_x, "100.5");
        f.store.set(&keys.widget_y, "200.25");

        f.drag.restore_position().await;
        let saved = f.drag.stop_drag().await.expect("final position");
        // the host snaps to whole device pixels; one physical pixel is half a logical one
        assert!((saved.x - 100.5).abs() <= 0.5);
        assert!((saved.y - 200.25).abs() <= 0.5);

        let reloaded = persistence::load_position(f.store.as_ref(), &keys).expect("reload");
        assert_eq!(reloaded, saved);
    }

    #[tokio::test(start_paused = true)]
    async fn mount_waits_before_restoring() {
        let host = Arc::new(RecordingHost::new());
        let display = Arc::new(StaticDisplay::new(1.0, WorkArea::new(0.0, 0.0, 800.0, 600.0)));
        let drag = DragController::new(
            Arc::clone(&host),
            display,
            Arc::new(MemoryStore::new()),
            PinnedFlag::new(false),
            WidgetSettings::default(),
        );

        let started = tokio::time::Instant::now();
        assert_eq!(drag.mount().await, RestoreOutcome::Initialized);
        assert!(started.elapsed() >= std::time::Duration::from_millis(50));
    }
}
