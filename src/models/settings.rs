use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

const MAX_STARTUP_DELAY_MS: u64 = 5_000;
const MAX_DRAG_THRESHOLD_PX: f64 = 50.0;

/// Names of the locally persisted keys.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StorageKeys {
    pub widget_x: String,
    pub widget_y: String,
    pub pinned: String,
    pub drag_enabled: String,
    pub monitor_name: String,
}

impl Default for StorageKeys {
    fn default() -> Self {
        Self {
            widget_x: "hdr_widget_x".to_string(),
            widget_y: "hdr_widget_y".to_string(),
            pinned: "is-pinned".to_string(),
            drag_enabled: "is-drag-enabled".to_string(),
            monitor_name: "hdr_widget_monitor".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WidgetSettings {
    /// Wait before restoring the saved position, so the host window exists.
    pub restore_delay_ms: u64,
    /// Wait before the one-time window initialization.
    pub init_delay_ms: u64,
    /// Pointer travel (screen pixels) that turns a click into a drag.
    pub drag_threshold_px: f64,
    pub default_pinned: bool,
    pub default_drag_enabled: bool,
    pub keys: StorageKeys,
}

impl Default for WidgetSettings {
    fn default() -> Self {
        Self {
            restore_delay_ms: 50,
            init_delay_ms: 100,
            drag_threshold_px: 3.0,
            default_pinned: false,
            default_drag_enabled: true,
            keys: StorageKeys::default(),
        }
    }
}

fn normalize_delay_ms(ms: u64) -> u64 {
    ms.min(MAX_STARTUP_DELAY_MS)
}

fn normalize_threshold(px: f64) -> f64 {
    if px.is_finite() {
        px.clamp(0.0, MAX_DRAG_THRESHOLD_PX)
    } else {
        WidgetSettings::default().drag_threshold_px
    }
}

fn normalize_key(key: String, fallback: &str) -> String {
    let trimmed = key.trim();
    if trimmed.is_empty() {
        fallback.to_string()
    } else {
        trimmed.to_string()
    }
}

impl WidgetSettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Missing file yields defaults; a malformed one is an error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let bytes = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
        let settings: Self = serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(settings.normalized())
    }

    pub fn normalized(mut self) -> Self {
        let defaults = StorageKeys::default();
        self.restore_delay_ms = normalize_delay_ms(self.restore_delay_ms);
        self.init_delay_ms = normalize_delay_ms(self.init_delay_ms);
        self.drag_threshold_px = normalize_threshold(self.drag_threshold_px);
        self.keys = StorageKeys {
            widget_x: normalize_key(self.keys.widget_x, &defaults.widget_x),
            widget_y: normalize_key(self.keys.widget_y, &defaults.widget_y),
            pinned: normalize_key(self.keys.pinned, &defaults.pinned),
            drag_enabled: normalize_key(self.keys.drag_enabled, &defaults.drag_enabled),
            monitor_name: normalize_key(self.keys.monitor_name, &defaults.monitor_name),
        };
        self
    }

    pub fn restore_delay(&self) -> Duration {
        Duration::from_millis(self.restore_delay_ms)
    }

    pub fn init_delay(&self) -> Duration {
        Duration::from_millis(self.init_delay_ms)
    }

    /// Settings without startup delays, for driving controllers directly.
    pub fn immediate() -> Self {
        Self {
            restore_delay_ms: 0,
            init_delay_ms: 0,
            ..Self::default()
        }
    }
}
