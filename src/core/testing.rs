use anyhow::anyhow;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Notify;

use super::host::{HostResult, WidgetHost};
use crate::models::{LogicalPosition, PhysicalPoint, PhysicalSize};

#[derive(Debug, Clone, PartialEq)]
pub enum HostCall {
    InitPosition,
    MoveWidget { x: i32, y: i32, is_pinned: bool },
    SetPinState(bool),
    ShowContextMenu { is_pinned: bool, is_draggable: Option<bool> },
    SetupWidgetWindow,
    RestoreWindow { monitor: String, x: f64, y: f64 },
    CheckHdrStatus,
    ToggleHdr(bool),
    ShowWindow,
    SetLogicalPosition(LogicalPosition),
}

struct Window {
    position: PhysicalPoint,
    size: PhysicalSize,
    scale: f64,
    hdr: bool,
}

/// Host double: records commands, fails on request, and can hold a command
/// open until released.
pub struct RecordingHost {
    calls: Mutex<Vec<HostCall>>,
    window: Mutex<Window>,
    failing: Mutex<HashSet<&'static str>>,
    move_gate: Mutex<Option<Arc<Notify>>>,
    toggle_gate: Mutex<Option<Arc<Notify>>>,
}

impl RecordingHost {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            window: Mutex::new(Window {
                position: PhysicalPoint::new(0, 0),
                size: PhysicalSize::new(200, 100),
                scale: 1.0,
                hdr: false,
            }),
            failing: Mutex::new(HashSet::new()),
            move_gate: Mutex::new(None),
            toggle_gate: Mutex::new(None),
        }
    }

    pub fn with_window(position: PhysicalPoint, size: PhysicalSize, scale: f64) -> Self {
        let host = Self::new();
        {
            let mut w = host.window.lock();
            w.position = position;
            w.size = size;
            w.scale = scale;
        }
        host
    }

    pub fn set_hdr(&self, on: bool) {
        self.window.lock().hdr = on;
    }

    pub fn set_position(&self, position: PhysicalPoint) {
        self.window.lock().position = position;
    }

    pub fn fail(&self, command: &'static str) {
        self.failing.lock().insert(command);
    }

    pub fn recover(&self, command: &'static str) {
        self.failing.lock().remove(command);
    }

    /// Holds every `move_widget` until the returned gate is notified.
    pub fn gate_moves(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.move_gate.lock() = Some(Arc::clone(&gate));
        gate
    }

    pub fn gate_toggles(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.toggle_gate.lock() = Some(Arc::clone(&gate));
        gate
    }

    pub fn calls(&self) -> Vec<HostCall> {
        self.calls.lock().clone()
    }

    pub fn moves(&self) -> Vec<HostCall> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, HostCall::MoveWidget { .. }))
            .collect()
    }

    pub fn count(&self, pred: impl Fn(&HostCall) -> bool) -> usize {
        self.calls.lock().iter().filter(|c| pred(c)).count()
    }

    fn record(&self, command: &'static str, call: HostCall) -> HostResult<()> {
        self.calls.lock().push(call);
        if self.failing.lock().contains(command) {
            return Err(anyhow!("{} failed: host unavailable", command));
        }
        Ok(())
    }

    fn check(&self, command: &'static str) -> HostResult<()> {
        if self.failing.lock().contains(command) {
            return Err(anyhow!("{} failed: host unavailable", command));
        }
        Ok(())
    }
}

impl WidgetHost for RecordingHost {
    async fn init_position(&self) -> HostResult<()> {
        self.record("init_position", HostCall::InitPosition)
    }

    async fn move_widget(&self, x: i32, y: i32, is_pinned: bool) -> HostResult<()> {
        let gate = self.move_gate.lock().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.record("move_widget", HostCall::MoveWidget { x, y, is_pinned })?;
        self.window.lock().position = PhysicalPoint::new(x, y);
        Ok(())
    }

    async fn set_pin_state(&self, pinned: bool) -> HostResult<()> {
        self.record("set_pin_state", HostCall::SetPinState(pinned))
    }

    async fn show_context_menu(
        &self,
        is_pinned: bool,
        is_draggable: Option<bool>,
    ) -> HostResult<()> {
        self.record(
            "show_context_menu",
            HostCall::ShowContextMenu {
                is_pinned,
                is_draggable,
            },
        )
    }

    async fn setup_widget_window(&self) -> HostResult<()> {
        self.record("setup_widget_window", HostCall::SetupWidgetWindow)
    }

    async fn restore_window(
        &self,
        saved_monitor_name: &str,
        saved_x: f64,
        saved_y: f64,
    ) -> HostResult<()> {
        self.record(
            "restore_window",
            HostCall::RestoreWindow {
                monitor: saved_monitor_name.to_string(),
                x: saved_x,
                y: saved_y,
            },
        )
    }

    async fn check_hdr_status(&self) -> HostResult<bool> {
        self.record("check_hdr_status", HostCall::CheckHdrStatus)?;
        Ok(self.window.lock().hdr)
    }

    async fn toggle_hdr(&self, enable: bool) -> HostResult<()> {
        let gate = self.toggle_gate.lock().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.record("toggle_hdr", HostCall::ToggleHdr(enable))?;
        self.window.lock().hdr = enable;
        Ok(())
    }

    async fn show_window(&self) -> HostResult<()> {
        self.record("show_window", HostCall::ShowWindow)
    }

    async fn outer_position(&self) -> HostResult<PhysicalPoint> {
        self.check("outer_position")?;
        Ok(self.window.lock().position)
    }

    async fn outer_size(&self) -> HostResult<PhysicalSize> {
        self.check("outer_size")?;
        Ok(self.window.lock().size)
    }

    async fn scale_factor(&self) -> HostResult<f64> {
        self.check("scale_factor")?;
        Ok(self.window.lock().scale)
    }

    async fn set_logical_position(&self, position: LogicalPosition) -> HostResult<()> {
        self.record("set_logical_position", HostCall::SetLogicalPosition(position))?;
        let scale = self.window.lock().scale;
        self.window.lock().position = position.to_physical(scale).rounded();
        Ok(())
    }
}
