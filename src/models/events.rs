use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

pub const MENU_TOGGLE_PIN: &str = "menu-toggle-pin";
pub const MENU_TOGGLE_DRAG: &str = "menu-toggle-drag";
pub const MONITOR_CHANGED: &str = "monitor-changed";
pub const MOUSE_LEFT_WINDOW: &str = "mouse-left-window";
pub const HDR_STATE_CHANGED: &str = "hdr-state-changed";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostEventKind {
    MenuTogglePin,
    MenuToggleDrag,
    MonitorChanged,
    MouseLeftWindow,
    HdrStateChanged,
}

impl HostEventKind {
    pub const ALL: [HostEventKind; 5] = [
        HostEventKind::MenuTogglePin,
        HostEventKind::MenuToggleDrag,
        HostEventKind::MonitorChanged,
        HostEventKind::MouseLeftWindow,
        HostEventKind::HdrStateChanged,
    ];

    pub fn name(self) -> &'static str {
        match self {
            HostEventKind::MenuTogglePin => MENU_TOGGLE_PIN,
            HostEventKind::MenuToggleDrag => MENU_TOGGLE_DRAG,
            HostEventKind::MonitorChanged => MONITOR_CHANGED,
            HostEventKind::MouseLeftWindow => MOUSE_LEFT_WINDOW,
            HostEventKind::HdrStateChanged => HDR_STATE_CHANGED,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HdrStatePayload {
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MonitorChangedPayload {
    pub monitor_name: String,
}

/// Hosts have emitted the monitor name both bare and wrapped in an object.
#[derive(Deserialize)]
#[serde(untagged)]
enum MonitorNameWire {
    Bare(String),
    Wrapped(MonitorChangedPayload),
}

/// Push notification from the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    MenuTogglePin,
    MenuToggleDrag,
    MonitorChanged { monitor_name: String },
    MouseLeftWindow,
    HdrStateChanged { enabled: bool },
}

impl HostEvent {
    pub fn kind(&self) -> HostEventKind {
        match self {
            HostEvent::MenuTogglePin => HostEventKind::MenuTogglePin,
            HostEvent::MenuToggleDrag => HostEventKind::MenuToggleDrag,
            HostEvent::MonitorChanged { .. } => HostEventKind::MonitorChanged,
            HostEvent::MouseLeftWindow => HostEventKind::MouseLeftWindow,
            HostEvent::HdrStateChanged { .. } => HostEventKind::HdrStateChanged,
        }
    }

    pub fn name(&self) -> &'static str {
        self.kind().name()
    }

    /// Decodes an event from its wire name and JSON payload.
    pub fn from_wire(name: &str, payload: &str) -> Result<Self> {
        let kind = HostEventKind::from_name(name)
            .ok_or_else(|| anyhow!("unknown host event: {}", name))?;
        let event = match kind {
            HostEventKind::MenuTogglePin => HostEvent::MenuTogglePin,
            HostEventKind::MenuToggleDrag => HostEvent::MenuToggleDrag,
            HostEventKind::MouseLeftWindow => HostEvent::MouseLeftWindow,
            HostEventKind::MonitorChanged => {
                let wire: MonitorNameWire = serde_json::from_str(payload)
                    .with_context(|| format!("invalid {} payload", name))?;
                let monitor_name = match wire {
                    MonitorNameWire::Bare(s) => s,
                    MonitorNameWire::Wrapped(p) => p.monitor_name,
                };
                HostEvent::MonitorChanged { monitor_name }
            }
            HostEventKind::HdrStateChanged => {
                let p: HdrStatePayload = serde_json::from_str(payload)
                    .with_context(|| format!("invalid {} payload", name))?;
                HostEvent::HdrStateChanged { enabled: p.enabled }
            }
        };
        Ok(event)
    }

    /// JSON payload as the host emits it.
    pub fn payload_json(&self) -> String {
        match self {
            HostEvent::MonitorChanged { monitor_name } => {
                serde_json::json!({ "monitorName": monitor_name }).to_string()
            }
            HostEvent::HdrStateChanged { enabled } => {
                serde_json::json!({ "enabled": enabled }).to_string()
            }
            _ => "null".to_string(),
        }
    }
}
