//! Controller layer of a floating HDR toggle widget.
//!
//! [`HdrWidget`] composes three controllers over a [`WidgetHost`]: dragging
//! with work-area clamping, HDR state sync, and pin / drag-enabled window
//! controls. Hosts push notifications through [`HostEvents`]; widget state is
//! kept in a [`KeyValueStore`].

pub mod core;
pub mod models;

#[cfg(feature = "tauri-host")]
pub mod tauri_host;

pub use crate::core::{
    HdrWidget, HostEvents, JsonFileStore, KeyValueStore, LocalEventBus, MemoryStore, StaticDisplay,
    WidgetHost,
};
pub use crate::models::{HostEvent, WidgetSettings};
