use serde::{Deserialize, Serialize};

/// Treat a missing or nonsensical scale factor as 1:1.
pub fn sanitize_scale(scale: f64) -> f64 {
    if scale.is_finite() && scale > 0.0 {
        scale
    } else {
        1.0
    }
}

/// DPI-independent position, used for persistence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct LogicalPosition {
    pub x: f64,
    pub y: f64,
}

impl LogicalPosition {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn to_physical(self, scale: f64) -> PhysicalPosition {
        let sf = sanitize_scale(scale);
        PhysicalPosition {
            x: self.x * sf,
            y: self.y * sf,
        }
    }
}

/// Device-pixel position. Kept fractional until it is sent to the host.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct PhysicalPosition {
    pub x: f64,
    pub y: f64,
}

impl PhysicalPosition {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn to_logical(self, scale: f64) -> LogicalPosition {
        let sf = sanitize_scale(scale);
        LogicalPosition {
            x: self.x / sf,
            y: self.y / sf,
        }
    }

    pub fn rounded(self) -> PhysicalPoint {
        PhysicalPoint {
            x: self.x.round() as i32,
            y: self.y.round() as i32,
        }
    }
}

/// Integer device-pixel position, as reported by and sent to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct PhysicalPoint {
    pub x: i32,
    pub y: i32,
}

impl PhysicalPoint {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn to_logical(self, scale: f64) -> LogicalPosition {
        PhysicalPosition::new(self.x as f64, self.y as f64).to_logical(scale)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct PhysicalSize {
    pub width: u32,
    pub height: u32,
}

impl PhysicalSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Usable screen region (excluding taskbars and docks) in logical pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct WorkArea {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl WorkArea {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }
}

/// Allowed range for the window's top-left corner, in physical pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Bounds {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Bounds {
    /// Keeps a window of `window` size fully inside `work_area` at the given scale.
    pub fn for_window(work_area: WorkArea, scale: f64, window: PhysicalSize) -> Self {
        let sf = sanitize_scale(scale);
        let left = work_area.left * sf;
        let top = work_area.top * sf;
        let width = work_area.width * sf;
        let height = work_area.height * sf;

        Self {
            min_x: left.round(),
            min_y: top.round(),
            max_x: (left + width - window.width as f64).round(),
            max_y: (top + height - window.height as f64).round(),
        }
    }

    /// When the window is larger than the work area the minimum wins.
    pub fn clamp(&self, pos: PhysicalPosition) -> PhysicalPosition {
        PhysicalPosition {
            x: clamp_axis(pos.x, self.min_x, self.max_x),
            y: clamp_axis(pos.y, self.min_y, self.max_y),
        }
    }

    pub fn contains(&self, pos: PhysicalPosition) -> bool {
        pos.x >= self.min_x && pos.y >= self.min_y && pos.x <= self.max_x && pos.y <= self.max_y
    }
}

fn clamp_axis(value: f64, min: f64, max: f64) -> f64 {
    // `f64::clamp` panics when min > max.
    min.max(value.min(max))
}
