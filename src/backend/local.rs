//! In-process backend
//!
//! Keeps the routing/hotkey settings in a TOML store, drives the microphone
//! gate and tracks engine state. No audio flows through it; it validates
//! and records exactly what a real engine would be asked to do.

use super::Backend;
use crate::config::{self, AppConfig, AudioRoute, HotkeyConfig};
use crate::error::BackendError;
use crate::gate::GateController;
use crate::status::{DeviceList, EngineState, RuntimeSnapshot, VirtualDeviceStatus};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

const BACKEND_NAME: &str = "loopback-bridge";

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, BackendError> {
    mutex
        .lock()
        .map_err(|e| BackendError::Unavailable(format!("backend state poisoned: {}", e)))
}

pub struct LocalBackend {
    /// None keeps settings in memory only
    store_path: Option<PathBuf>,
    devices: DeviceList,
    config: Mutex<AppConfig>,
    gate: Arc<GateController>,
    running: Mutex<bool>,
    last_error: Mutex<Option<String>>,
}

impl LocalBackend {
    /// Open the backend with settings persisted at `store_path`
    pub fn open(store_path: PathBuf, devices: DeviceList) -> Result<Self, BackendError> {
        let config = config::load_app_config(&store_path)
            .map_err(|e| BackendError::Persist(e.to_string()))?;
        tracing::debug!("Settings store: {:?}", store_path);
        Ok(Self::build(Some(store_path), config, devices))
    }

    /// Backend whose settings live only in memory
    pub fn in_memory(config: AppConfig, devices: DeviceList) -> Self {
        Self::build(None, config, devices)
    }

    fn build(store_path: Option<PathBuf>, config: AppConfig, devices: DeviceList) -> Self {
        let gate = Arc::new(GateController::new(config.hotkey.mode));
        Self {
            store_path,
            devices,
            config: Mutex::new(config),
            gate,
            running: Mutex::new(false),
            last_error: Mutex::new(None),
        }
    }

    pub fn gate(&self) -> Arc<GateController> {
        self.gate.clone()
    }

    pub fn is_running(&self) -> bool {
        self.running.lock().map(|r| *r).unwrap_or(false)
    }

    /// Check that the stored route still names endpoints that exist
    pub fn validate_route(&self) -> Result<(), BackendError> {
        let route = lock(&self.config)?.route.clone();
        self.check_route(&route)
    }

    fn check_route(&self, route: &AudioRoute) -> Result<(), BackendError> {
        if !route.is_complete() {
            return Err(BackendError::InvalidArgument(
                "select both an input device and a bridge output device first".to_string(),
            ));
        }
        if !self.devices.has_input(&route.input_device_id) {
            return Err(BackendError::DeviceNotFound(route.input_device_id.clone()));
        }
        if !self.devices.has_output(&route.bridge_output_device_id) {
            return Err(BackendError::DeviceNotFound(route.bridge_output_device_id.clone()));
        }
        Ok(())
    }

    /// Mutate the stored settings and persist them
    fn update(&self, f: impl FnOnce(&mut AppConfig)) -> Result<(), BackendError> {
        let mut config = lock(&self.config)?;
        let mut next = config.clone();
        f(&mut next);
        if let Some(ref path) = self.store_path {
            config::save_app_config(&next, path).map_err(|e| BackendError::Persist(e.to_string()))?;
        }
        *config = next;
        Ok(())
    }
}

#[async_trait::async_trait]
impl Backend for LocalBackend {
    async fn list_audio_devices(&self) -> Result<DeviceList, BackendError> {
        Ok(self.devices.clone())
    }

    async fn get_app_config(&self) -> Result<AppConfig, BackendError> {
        Ok(lock(&self.config)?.clone())
    }

    async fn get_runtime_status(&self) -> Result<RuntimeSnapshot, BackendError> {
        let running = *lock(&self.running)?;
        let last_error = lock(&self.last_error)?.clone();
        let engine_state = if running {
            EngineState::Running
        } else if last_error.is_some() {
            EngineState::Error
        } else {
            EngineState::Idle
        };

        Ok(RuntimeSnapshot {
            engine_state,
            buffer_level_ms: 0,
            xruns: 0,
            last_error,
            gate: self.gate.snapshot(),
        })
    }

    async fn get_virtual_device_status(&self) -> Result<VirtualDeviceStatus, BackendError> {
        let route = lock(&self.config)?.route.clone();
        let running = *lock(&self.running)?;

        let (ready, detail) = if route.bridge_output_device_id.is_empty() {
            (false, "No bridge output selected".to_string())
        } else if !self.devices.has_output(&route.bridge_output_device_id) {
            (
                false,
                format!("Bridge output '{}' is not available", route.bridge_output_device_id),
            )
        } else if running {
            (true, format!("Routing into '{}'", route.bridge_output_device_id))
        } else {
            (false, "Engine stopped".to_string())
        };

        Ok(VirtualDeviceStatus {
            backend: BACKEND_NAME.to_string(),
            ready,
            detail,
        })
    }

    async fn save_audio_route(&self, route: &AudioRoute) -> Result<(), BackendError> {
        self.update(|c| c.route = route.clone())
    }

    async fn set_hotkey(&self, hotkey: &HotkeyConfig) -> Result<(), BackendError> {
        self.update(|c| c.hotkey = hotkey.clone())?;
        self.gate.set_mode(hotkey.mode);
        tracing::debug!(
            "Hotkey registered: {} ({})",
            hotkey.accelerator,
            if hotkey.accelerator.is_mouse() { "pointer hook" } else { "keyboard shortcut" }
        );
        Ok(())
    }

    async fn set_launch_on_startup(&self, enabled: bool) -> Result<(), BackendError> {
        self.update(|c| c.launch_on_startup = enabled)
    }

    async fn set_minimize_to_tray(&self, enabled: bool) -> Result<(), BackendError> {
        self.update(|c| c.minimize_to_tray = enabled)
    }

    async fn set_mic_gate(&self, open: bool, source: &str) -> Result<(), BackendError> {
        self.gate.set_open(open, source);
        Ok(())
    }

    async fn stop_engine(&self) -> Result<(), BackendError> {
        let mut running = lock(&self.running)?;
        if *running {
            tracing::info!("Audio engine stopped");
        }
        *running = false;
        Ok(())
    }

    async fn start_engine(&self) -> Result<(), BackendError> {
        let mut running = lock(&self.running)?;
        if *running {
            return Ok(());
        }

        let route = lock(&self.config)?.route.clone();
        if let Err(e) = self.check_route(&route) {
            *lock(&self.last_error)? = Some(e.to_string());
            return Err(e);
        }

        *running = true;
        *lock(&self.last_error)? = None;
        tracing::info!(
            "Audio engine started: {} -> {}",
            route.input_device_id,
            route.bridge_output_device_id
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        BACKEND_NAME
    }
}
