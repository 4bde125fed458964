use serde::{Deserialize, Serialize};

pub const PRIMARY_BUTTON: u16 = 0;

/// Mouse event in screen coordinates (logical pixels), as the webview reports it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PointerEvent {
    pub button: u16,
    pub screen_x: f64,
    pub screen_y: f64,
}

impl PointerEvent {
    pub fn new(button: u16, screen_x: f64, screen_y: f64) -> Self {
        Self {
            button,
            screen_x,
            screen_y,
        }
    }

    pub fn primary(screen_x: f64, screen_y: f64) -> Self {
        Self::new(PRIMARY_BUTTON, screen_x, screen_y)
    }

    pub fn is_primary(&self) -> bool {
        self.button == PRIMARY_BUTTON
    }

    pub fn distance_to(&self, x: f64, y: f64) -> f64 {
        ((self.screen_x - x).powi(2) + (self.screen_y - y).powi(2)).sqrt()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerInput {
    Down(PointerEvent),
    Move(PointerEvent),
    Up(PointerEvent),
}

/// Right-click request. The native menu replaces the webview's default one.
#[derive(Debug, Clone, Default)]
pub struct ContextMenuEvent {
    default_prevented: bool,
}

impl ContextMenuEvent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn prevent_default(&mut self) {
        self.default_prevented = true;
    }

    pub fn default_prevented(&self) -> bool {
        self.default_prevented
    }
}
