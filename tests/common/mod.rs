//! Scripted backend shared by the integration tests
//!
//! Records every call in order and lets a test fail, delay or hang any
//! individual operation.

#![allow(dead_code)]

use micgate::backend::Backend;
use micgate::config::{AppConfig, AudioRoute, HotkeyConfig};
use micgate::error::BackendError;
use micgate::status::{
    DeviceDirection, DeviceInfo, DeviceList, EngineState, GateState, RuntimeSnapshot,
    VirtualDeviceStatus,
};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

/// Operations applied by a pass, in the order they must run
pub const APPLY_ORDER: [&str; 4] = [
    "save_audio_route",
    "set_hotkey",
    "set_launch_on_startup",
    "set_minimize_to_tray",
];

#[derive(Default)]
pub struct ScriptedBackend {
    calls: Mutex<Vec<&'static str>>,
    config: Mutex<AppConfig>,
    failing: Mutex<HashSet<&'static str>>,
    hanging: Mutex<HashSet<&'static str>>,
    delays: Mutex<HashMap<&'static str, Duration>>,
    polls: Mutex<u64>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: AppConfig) -> Self {
        let backend = Self::default();
        *backend.config.lock().unwrap() = config;
        backend
    }

    pub fn fail(&self, op: &'static str) {
        self.failing.lock().unwrap().insert(op);
    }

    pub fn recover(&self, op: &'static str) {
        self.failing.lock().unwrap().remove(op);
    }

    pub fn hang(&self, op: &'static str) {
        self.hanging.lock().unwrap().insert(op);
    }

    pub fn delay(&self, op: &'static str, by: Duration) {
        self.delays.lock().unwrap().insert(op, by);
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    /// Calls that write settings or touch the engine
    pub fn writes(&self) -> Vec<&'static str> {
        self.calls()
            .into_iter()
            .filter(|op| !op.starts_with("get_") && *op != "list_audio_devices")
            .collect()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn count(&self, op: &str) -> usize {
        self.calls().iter().filter(|c| **c == op).count()
    }

    pub fn stored(&self) -> AppConfig {
        self.config.lock().unwrap().clone()
    }

    async fn enter(&self, op: &'static str) -> Result<(), BackendError> {
        self.calls.lock().unwrap().push(op);

        let delay = self.delays.lock().unwrap().get(op).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let hang = self.hanging.lock().unwrap().contains(op);
        if hang {
            std::future::pending::<()>().await;
        }

        if self.failing.lock().unwrap().contains(op) {
            return Err(BackendError::Engine(format!("{} failed", op)));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl Backend for ScriptedBackend {
    async fn list_audio_devices(&self) -> Result<DeviceList, BackendError> {
        self.enter("list_audio_devices").await?;
        Ok(DeviceList::from_devices([
            DeviceInfo {
                id: "mic".to_string(),
                name: "Scripted Mic".to_string(),
                direction: DeviceDirection::Input,
                is_default: true,
                is_virtual_candidate: false,
            },
            DeviceInfo {
                id: "bridge".to_string(),
                name: "Scripted Bridge".to_string(),
                direction: DeviceDirection::Output,
                is_default: false,
                is_virtual_candidate: true,
            },
        ]))
    }

    async fn get_app_config(&self) -> Result<AppConfig, BackendError> {
        self.enter("get_app_config").await?;
        Ok(self.stored())
    }

    async fn get_runtime_status(&self) -> Result<RuntimeSnapshot, BackendError> {
        self.enter("get_runtime_status").await?;
        let mut polls = self.polls.lock().unwrap();
        *polls += 1;
        Ok(RuntimeSnapshot {
            engine_state: EngineState::Running,
            buffer_level_ms: 20,
            xruns: *polls,
            last_error: None,
            gate: GateState::default(),
        })
    }

    async fn get_virtual_device_status(&self) -> Result<VirtualDeviceStatus, BackendError> {
        self.enter("get_virtual_device_status").await?;
        Ok(VirtualDeviceStatus {
            backend: "scripted".to_string(),
            ready: true,
            detail: "ok".to_string(),
        })
    }

    async fn save_audio_route(&self, route: &AudioRoute) -> Result<(), BackendError> {
        self.enter("save_audio_route").await?;
        self.config.lock().unwrap().route = route.clone();
        Ok(())
    }

    async fn set_hotkey(&self, hotkey: &HotkeyConfig) -> Result<(), BackendError> {
        self.enter("set_hotkey").await?;
        self.config.lock().unwrap().hotkey = hotkey.clone();
        Ok(())
    }

    async fn set_launch_on_startup(&self, enabled: bool) -> Result<(), BackendError> {
        self.enter("set_launch_on_startup").await?;
        self.config.lock().unwrap().launch_on_startup = enabled;
        Ok(())
    }

    async fn set_minimize_to_tray(&self, enabled: bool) -> Result<(), BackendError> {
        self.enter("set_minimize_to_tray").await?;
        self.config.lock().unwrap().minimize_to_tray = enabled;
        Ok(())
    }

    async fn set_mic_gate(&self, _open: bool, _source: &str) -> Result<(), BackendError> {
        self.enter("set_mic_gate").await
    }

    async fn stop_engine(&self) -> Result<(), BackendError> {
        self.enter("stop_engine").await
    }

    async fn start_engine(&self) -> Result<(), BackendError> {
        self.enter("start_engine").await
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}
