use std::future::Future;

use crate::models::{LogicalPosition, PhysicalPoint, PhysicalSize, WorkArea};

pub type HostResult<T> = anyhow::Result<T>;

/// Command surface of the native host that owns the widget window.
///
/// Every call is a round-trip to another layer and may fail; controllers log
/// failures and keep going with the last known state.
pub trait WidgetHost: Send + Sync + 'static {
    /// Let the host pick the initial placement.
    fn init_position(&self) -> impl Future<Output = HostResult<()>> + Send;

    /// Move the window's top-left corner to a physical pixel position.
    fn move_widget(
        &self,
        x: i32,
        y: i32,
        is_pinned: bool,
    ) -> impl Future<Output = HostResult<()>> + Send;

    fn set_pin_state(&self, pinned: bool) -> impl Future<Output = HostResult<()>> + Send;

    fn show_context_menu(
        &self,
        is_pinned: bool,
        is_draggable: Option<bool>,
    ) -> impl Future<Output = HostResult<()>> + Send;

    fn setup_widget_window(&self) -> impl Future<Output = HostResult<()>> + Send;

    /// Put the window back on the named monitor at a logical position.
    fn restore_window(
        &self,
        saved_monitor_name: &str,
        saved_x: f64,
        saved_y: f64,
    ) -> impl Future<Output = HostResult<()>> + Send;

    fn check_hdr_status(&self) -> impl Future<Output = HostResult<bool>> + Send;

    fn toggle_hdr(&self, enable: bool) -> impl Future<Output = HostResult<()>> + Send;

    fn show_window(&self) -> impl Future<Output = HostResult<()>> + Send;

    fn outer_position(&self) -> impl Future<Output = HostResult<PhysicalPoint>> + Send;

    fn outer_size(&self) -> impl Future<Output = HostResult<PhysicalSize>> + Send;

    /// The host's own scale factor for the window's current monitor.
    fn scale_factor(&self) -> impl Future<Output = HostResult<f64>> + Send;

    fn set_logical_position(
        &self,
        position: LogicalPosition,
    ) -> impl Future<Output = HostResult<()>> + Send;
}

/// Screen geometry as the UI sees it.
pub trait DisplayGeometryProvider: Send + Sync {
    fn device_pixel_ratio(&self) -> f64;

    /// Work area of the screen holding the window, in logical pixels.
    fn work_area(&self) -> WorkArea;
}

/// Geometry that only changes when told to.
#[derive(Debug)]
pub struct StaticDisplay {
    state: parking_lot::RwLock<(f64, WorkArea)>,
}

impl StaticDisplay {
    pub fn new(device_pixel_ratio: f64, work_area: WorkArea) -> Self {
        Self {
            state: parking_lot::RwLock::new((device_pixel_ratio, work_area)),
        }
    }

    pub fn update(&self, device_pixel_ratio: f64, work_area: WorkArea) {
        *self.state.write() = (device_pixel_ratio, work_area);
    }
}

impl DisplayGeometryProvider for StaticDisplay {
    fn device_pixel_ratio(&self) -> f64 {
        self.state.read().0
    }

    fn work_area(&self) -> WorkArea {
        self.state.read().1
    }
}
