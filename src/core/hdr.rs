use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::watch;

use super::app_log;
use super::event_bus::{HostEvents, Subscription};
use super::host::WidgetHost;
use crate::models::{HostEvent, HostEventKind};

const SCOPE: &str = "hdr";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TogglePhase {
    #[default]
    Idle,
    /// A toggle request is waiting on the host.
    Pending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HdrSnapshot {
    pub enabled: bool,
    pub busy: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
    /// Another toggle was still pending; nothing was sent.
    Busy,
    Toggled(bool),
    Failed,
}

#[derive(Debug, Default)]
struct HdrState {
    enabled: bool,
    phase: TogglePhase,
}

struct HdrInner<H> {
    host: Arc<H>,
    state: Mutex<HdrState>,
    snapshot: watch::Sender<HdrSnapshot>,
    subscription: Mutex<Option<Subscription>>,
}

impl<H> HdrInner<H> {
    fn snapshot(&self) -> HdrSnapshot {
        let state = self.state.lock();
        HdrSnapshot {
            enabled: state.enabled,
            busy: state.phase == TogglePhase::Pending,
        }
    }

    fn publish(&self) {
        self.snapshot.send_replace(self.snapshot());
    }

    /// External updates lose to a local toggle that is still in flight.
    fn apply_external(&self, enabled: bool) -> bool {
        let applied = {
            let mut state = self.state.lock();
            if state.phase == TogglePhase::Pending {
                false
            } else {
                state.enabled = enabled;
                true
            }
        };
        if applied {
            self.publish();
        }
        applied
    }
}

/// Returns the controller to `Idle` however the toggle future ends.
struct PendingGuard<'a, H>(&'a HdrInner<H>);

impl<H> Drop for PendingGuard<'_, H> {
    fn drop(&mut self) {
        self.0.state.lock().phase = TogglePhase::Idle;
        self.0.publish();
    }
}

/// Keeps the local HDR flag in sync with the host.
pub struct HdrController<H> {
    inner: Arc<HdrInner<H>>,
}

impl<H> Clone for HdrController<H> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<H: WidgetHost> HdrController<H> {
    pub fn new(host: Arc<H>) -> Self {
        let (snapshot, _) = watch::channel(HdrSnapshot::default());
        Self {
            inner: Arc::new(HdrInner {
                host,
                state: Mutex::new(HdrState::default()),
                snapshot,
                subscription: Mutex::new(None),
            }),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.state.lock().enabled
    }

    pub fn is_busy(&self) -> bool {
        self.phase() == TogglePhase::Pending
    }

    pub fn phase(&self) -> TogglePhase {
        self.inner.state.lock().phase
    }

    pub fn snapshot(&self) -> HdrSnapshot {
        self.inner.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<HdrSnapshot> {
        self.inner.snapshot.subscribe()
    }

    /// Asks the host for the current state and returns it once applied.
    /// `None` when the query failed or a pending toggle won; the local
    /// state then stays as it was.
    pub async fn check_status(&self) -> Option<bool> {
        match self.inner.host.check_hdr_status().await {
            Ok(enabled) => {
                if self.inner.apply_external(enabled) {
                    Some(enabled)
                } else {
                    app_log::info(SCOPE, "status_ignored_while_pending");
                    None
                }
            }
            Err(e) => {
                app_log::failure(SCOPE, "check_status_failed", &e);
                None
            }
        }
    }

    pub async fn toggle_hdr(&self) -> ToggleOutcome {
        let target = {
            let mut state = self.inner.state.lock();
            if state.phase == TogglePhase::Pending {
                return ToggleOutcome::Busy;
            }
            state.phase = TogglePhase::Pending;
            !state.enabled
        };
        let _guard = PendingGuard(self.inner.as_ref());
        self.inner.publish();

        match self.inner.host.toggle_hdr(target).await {
            Ok(()) => {
                self.inner.state.lock().enabled = target;
                ToggleOutcome::Toggled(target)
            }
            Err(e) => {
                app_log::failure(SCOPE, "toggle_failed", &e);
                ToggleOutcome::Failed
            }
        }
    }

    /// Applies a host notification; returns false when a local toggle was pending.
    pub fn apply_external(&self, enabled: bool) -> bool {
        self.inner.apply_external(enabled)
    }

    /// Reads the current state, then follows `hdr-state-changed`.
    pub async fn mount(&self, events: &dyn HostEvents) {
        self.check_status().await;

        let weak = Arc::downgrade(&self.inner);
        let subscription = events.listen(
            HostEventKind::HdrStateChanged,
            Arc::new(move |event: &HostEvent| {
                let HostEvent::HdrStateChanged { enabled } = event else {
                    return;
                };
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                if !inner.apply_external(*enabled) {
                    app_log::info(SCOPE, "external_state_ignored_while_pending");
                }
            }),
        );
        *self.inner.subscription.lock() = Some(subscription);
    }

    pub fn unmount(&self) {
        let released = self.inner.subscription.lock().take();
        drop(released);
    }
}
