pub mod app_log;
pub mod draggable;
pub mod event_bus;
pub mod hdr;
pub mod host;
pub mod persistence;
pub mod widget;
pub mod window_controls;

#[cfg(test)]
pub(crate) mod testing;

pub use draggable::{DragController, DragSnapshot, MoveOutcome, RestoreOutcome};
pub use event_bus::{EventHandler, HostEvents, LocalEventBus, Subscription};
pub use hdr::{HdrController, HdrSnapshot, ToggleOutcome, TogglePhase};
pub use host::{DisplayGeometryProvider, HostResult, StaticDisplay, WidgetHost};
pub use persistence::{JsonFileStore, KeyValueStore, MemoryStore};
pub use widget::HdrWidget;
pub use window_controls::{ControlsSnapshot, PinnedFlag, WindowControls};
