//! Read-only runtime status reported by the backend
//!
//! The displayed status lives on a [`StatusBoard`]. Every writer (the poller
//! and the reconciler's post-apply refresh) replaces a value wholesale, so a
//! reader never observes a half-updated snapshot.

use crate::config::GateMode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;

/// Direction of an audio endpoint
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DeviceDirection {
    Input,
    Output,
}

/// One backend-reported audio endpoint
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeviceInfo {
    pub id: String,
    pub name: String,
    pub direction: DeviceDirection,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default)]
    pub is_virtual_candidate: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeviceList {
    pub inputs: Vec<DeviceInfo>,
    pub outputs: Vec<DeviceInfo>,
}

impl DeviceList {
    /// Split a flat endpoint list by direction
    pub fn from_devices(devices: impl IntoIterator<Item = DeviceInfo>) -> Self {
        let (inputs, outputs) = devices
            .into_iter()
            .partition(|d| d.direction == DeviceDirection::Input);
        Self { inputs, outputs }
    }

    pub fn has_input(&self, id: &str) -> bool {
        self.inputs.iter().any(|d| d.id == id)
    }

    pub fn has_output(&self, id: &str) -> bool {
        self.outputs.iter().any(|d| d.id == id)
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EngineState {
    #[default]
    Idle,
    Running,
    Error,
}

impl std::fmt::Display for EngineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineState::Idle => write!(f, "idle"),
            EngineState::Running => write!(f, "running"),
            EngineState::Error => write!(f, "error"),
        }
    }
}

/// Open/closed state of the routed microphone signal
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GateState {
    pub is_open: bool,
    pub mode: GateMode,
    pub last_source: String,
    pub changed_at: DateTime<Utc>,
}

impl Default for GateState {
    fn default() -> Self {
        Self {
            is_open: false,
            mode: GateMode::default(),
            last_source: "system".to_string(),
            changed_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RuntimeSnapshot {
    pub engine_state: EngineState,
    pub buffer_level_ms: u32,
    pub xruns: u64,
    pub last_error: Option<String>,
    pub gate: GateState,
}

/// Readiness of the virtual bridge device
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct VirtualDeviceStatus {
    pub backend: String,
    pub ready: bool,
    pub detail: String,
}

/// Shared, wholesale-replaced status shown to the user
#[derive(Debug, Clone)]
pub struct StatusBoard {
    runtime: Arc<watch::Sender<Option<RuntimeSnapshot>>>,
    virtual_device: Arc<watch::Sender<Option<VirtualDeviceStatus>>>,
    devices: Arc<watch::Sender<Option<DeviceList>>>,
}

impl StatusBoard {
    pub fn new() -> Self {
        let (runtime, _) = watch::channel(None);
        let (virtual_device, _) = watch::channel(None);
        let (devices, _) = watch::channel(None);
        Self {
            runtime: Arc::new(runtime),
            virtual_device: Arc::new(virtual_device),
            devices: Arc::new(devices),
        }
    }

    pub fn publish_runtime(&self, snapshot: RuntimeSnapshot) {
        self.runtime.send_replace(Some(snapshot));
    }

    pub fn publish_virtual_device(&self, status: VirtualDeviceStatus) {
        self.virtual_device.send_replace(Some(status));
    }

    pub fn publish_devices(&self, devices: DeviceList) {
        self.devices.send_replace(Some(devices));
    }

    /// Latest runtime snapshot, if any poll or refresh has succeeded yet
    pub fn runtime(&self) -> Option<RuntimeSnapshot> {
        self.runtime.borrow().clone()
    }

    pub fn virtual_device(&self) -> Option<VirtualDeviceStatus> {
        self.virtual_device.borrow().clone()
    }

    /// Endpoints the backend listed at the last successful load
    pub fn devices(&self) -> Option<DeviceList> {
        self.devices.borrow().clone()
    }

    /// Receiver notified on every runtime replacement
    pub fn watch_runtime(&self) -> watch::Receiver<Option<RuntimeSnapshot>> {
        self.runtime.subscribe()
    }
}

impl Default for StatusBoard {
    fn default() -> Self {
        Self::new()
    }
}
