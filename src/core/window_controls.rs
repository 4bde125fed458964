use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tokio::runtime::Handle;
use tokio::sync::watch;

use super::app_log;
use super::event_bus::{HostEvents, Subscription};
use super::host::WidgetHost;
use super::persistence::{self, KeyValueStore};
use crate::models::{ContextMenuEvent, HostEvent, HostEventKind, WidgetSettings};

const SCOPE: &str = "window";

/// Pinned state shared with the drag controller, which reports it on every move.
#[derive(Debug, Clone, Default)]
pub struct PinnedFlag(Arc<AtomicBool>);

impl PinnedFlag {
    pub fn new(pinned: bool) -> Self {
        Self(Arc::new(AtomicBool::new(pinned)))
    }

    pub fn get(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn set(&self, pinned: bool) {
        self.0.store(pinned, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ControlsSnapshot {
    pub is_pinned: bool,
    pub is_drag_enabled: bool,
    pub is_hovered: bool,
}

#[derive(Debug, Default)]
struct ControlsState {
    drag_enabled: bool,
    hovered: bool,
}

struct ControlsInner<H> {
    host: Arc<H>,
    store: Arc<dyn KeyValueStore>,
    settings: WidgetSettings,
    pinned: PinnedFlag,
    state: Mutex<ControlsState>,
    snapshot: watch::Sender<ControlsSnapshot>,
    subscriptions: Mutex<Vec<Subscription>>,
    runtime: Mutex<Option<Handle>>,
}

/// Pinned / drag-enabled / hover flags, the context menu and window setup.
pub struct WindowControls<H> {
    inner: Arc<ControlsInner<H>>,
}

impl<H> Clone for WindowControls<H> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<H: WidgetHost> WindowControls<H> {
    pub fn new(host: Arc<H>, store: Arc<dyn KeyValueStore>, settings: WidgetSettings) -> Self {
        let keys = &settings.keys;
        let pinned = persistence::get_bool(store.as_ref(), &keys.pinned, settings.default_pinned);
        let drag_enabled = persistence::get_bool(
            store.as_ref(),
            &keys.drag_enabled,
            settings.default_drag_enabled,
        );

        let (snapshot, _) = watch::channel(ControlsSnapshot {
            is_pinned: pinned,
            is_drag_enabled: drag_enabled,
            is_hovered: false,
        });

        Self {
            inner: Arc::new(ControlsInner {
                host,
                store,
                settings,
                pinned: PinnedFlag::new(pinned),
                state: Mutex::new(ControlsState {
                    drag_enabled,
                    hovered: false,
                }),
                snapshot,
                subscriptions: Mutex::new(Vec::new()),
                runtime: Mutex::new(None),
            }),
        }
    }

    fn from_inner(inner: Arc<ControlsInner<H>>) -> Self {
        Self { inner }
    }

    pub fn pinned_flag(&self) -> PinnedFlag {
        self.inner.pinned.clone()
    }

    pub fn is_pinned(&self) -> bool {
        self.inner.pinned.get()
    }

    pub fn is_drag_enabled(&self) -> bool {
        self.inner.state.lock().drag_enabled
    }

    pub fn is_hovered(&self) -> bool {
        self.inner.state.lock().hovered
    }

    pub fn snapshot(&self) -> ControlsSnapshot {
        let state = self.inner.state.lock();
        ControlsSnapshot {
            is_pinned: self.inner.pinned.get(),
            is_drag_enabled: state.drag_enabled,
            is_hovered: state.hovered,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<ControlsSnapshot> {
        self.inner.snapshot.subscribe()
    }

    fn publish(&self) {
        self.inner.snapshot.send_replace(self.snapshot());
    }

    /// Flips and persists the pinned flag without telling the host.
    fn flip_pinned(&self) -> bool {
        let pinned = !self.inner.pinned.get();
        self.inner.pinned.set(pinned);
        persistence::set_bool(self.inner.store.as_ref(), &self.inner.settings.keys.pinned, pinned);
        self.publish();
        pinned
    }

    async fn push_pin_state(&self, pinned: bool) {
        if let Err(e) = self.inner.host.set_pin_state(pinned).await {
            app_log::failure(SCOPE, "set_pin_state_failed", &e);
        }
    }

    pub async fn toggle_pin(&self) -> bool {
        let pinned = self.flip_pinned();
        self.push_pin_state(pinned).await;
        pinned
    }

    pub fn toggle_drag_enabled(&self) -> bool {
        let enabled = {
            let mut state = self.inner.state.lock();
            state.drag_enabled = !state.drag_enabled;
            state.drag_enabled
        };
        let keys = &self.inner.settings.keys;
        persistence::set_bool(self.inner.store.as_ref(), &keys.drag_enabled, enabled);
        self.publish();
        enabled
    }

    pub fn set_hovered(&self, hovered: bool) {
        let changed = {
            let mut state = self.inner.state.lock();
            let changed = state.hovered != hovered;
            state.hovered = hovered;
            changed
        };
        if changed {
            self.publish();
        }
    }

    /// Replaces the webview's menu with the host's native one.
    pub async fn on_context_menu(&self, event: &mut ContextMenuEvent) {
        event.prevent_default();
        let is_pinned = self.is_pinned();
        let is_draggable = self.is_drag_enabled();
        if let Err(e) = self.inner.host.show_context_menu(is_pinned, Some(is_draggable)).await {
            app_log::failure(SCOPE, "show_context_menu_failed", &e);
        }
    }

    /// A saved position only means something on the monitor it was saved on.
    /// Returns whether the saved coordinates were discarded.
    pub fn on_monitor_changed(&self, monitor_name: &str) -> bool {
        let keys = &self.inner.settings.keys;
        let store = self.inner.store.as_ref();
        let saved = store.get(&keys.monitor_name);
        if saved.as_deref() == Some(monitor_name) {
            return false;
        }

        let invalidated = saved.is_some();
        if invalidated {
            persistence::clear_position(store, keys);
            app_log::append(app_log::AppLogRecord::new(
                app_log::Level::Info,
                SCOPE,
                "saved_position_invalidated",
                Some(serde_json::json!({ "from": saved, "to": monitor_name })),
            ));
        }
        store.set(&keys.monitor_name, monitor_name);
        invalidated
    }

    /// One-time host window setup; every step is attempted even if an earlier one fails.
    pub async fn init_window(&self) {
        let keys = &self.inner.settings.keys;
        let store = self.inner.store.as_ref();
        let host = &self.inner.host;

        let saved_monitor = store.get(&keys.monitor_name);
        let saved_position = persistence::load_position(store, keys);
        if let (Some(monitor), Some(position)) = (saved_monitor, saved_position) {
            if let Err(e) = host.restore_window(&monitor, position.x, position.y).await {
                app_log::failure(SCOPE, "restore_window_failed", &e);
            }
        }

        if let Err(e) = host.show_window().await {
            app_log::failure(SCOPE, "show_window_failed", &e);
        }
        if let Err(e) = host.setup_widget_window().await {
            app_log::failure(SCOPE, "setup_widget_window_failed", &e);
        }
        self.push_pin_state(self.is_pinned()).await;
    }

    /// Applies one host notification. Pin toggles reach the host on the
    /// runtime captured at mount.
    pub fn handle_event(&self, event: &HostEvent) {
        match event {
            HostEvent::MenuTogglePin => {
                let pinned = self.flip_pinned();
                let runtime = self.inner.runtime.lock().clone();
                match runtime {
                    Some(runtime) => {
                        let this = self.clone();
                        runtime.spawn(async move { this.push_pin_state(pinned).await });
                    }
                    None => app_log::warn(
                        SCOPE,
                        "pin_state_not_sent",
                        Some(serde_json::json!({ "reason": "not mounted" })),
                    ),
                }
            }
            HostEvent::MenuToggleDrag => {
                self.toggle_drag_enabled();
            }
            HostEvent::MonitorChanged { monitor_name } => {
                self.on_monitor_changed(monitor_name);
            }
            HostEvent::MouseLeftWindow => self.set_hovered(false),
            HostEvent::HdrStateChanged { .. } => {}
        }
    }

    fn subscribe_to(&self, events: &dyn HostEvents, kind: HostEventKind) -> Subscription {
        let weak: Weak<ControlsInner<H>> = Arc::downgrade(&self.inner);
        events.listen(
            kind,
            Arc::new(move |event: &HostEvent| {
                if let Some(inner) = weak.upgrade() {
                    WindowControls::from_inner(inner).handle_event(event);
                }
            }),
        )
    }

    /// Subscribes to the host's menu, monitor and mouse events, then runs
    /// `init_window` after the configured delay.
    pub async fn mount(&self, events: &dyn HostEvents) {
        *self.inner.runtime.lock() = Handle::try_current().ok();

        let subscriptions: Vec<Subscription> = [
            HostEventKind::MenuTogglePin,
            HostEventKind::MenuToggleDrag,
            HostEventKind::MonitorChanged,
            HostEventKind::MouseLeftWindow,
        ]
        .into_iter()
        .map(|kind| self.subscribe_to(events, kind))
        .collect();
        // A remount replaces the previous handlers instead of stacking on them.
        let previous = std::mem::replace(&mut *self.inner.subscriptions.lock(), subscriptions);
        drop(previous);

        tokio::time::sleep(self.inner.settings.init_delay()).await;
        self.init_window().await;
    }

    pub fn unmount(&self) {
        let released: Vec<Subscription> = self.inner.subscriptions.lock().drain(..).collect();
        drop(released);
        self.inner.runtime.lock().take();
    }
}
