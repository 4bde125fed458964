pub mod events;
pub mod geometry;
pub mod pointer;
pub mod settings;

pub use events::{HdrStatePayload, HostEvent, HostEventKind, MonitorChangedPayload};
pub use geometry::{
    Bounds, LogicalPosition, PhysicalPoint, PhysicalPosition, PhysicalSize, WorkArea,
};
pub use pointer::{ContextMenuEvent, PointerEvent, PointerInput};
pub use settings::{StorageKeys, WidgetSettings};
