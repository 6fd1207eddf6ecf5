//! Backend service interface
//!
//! The audio engine and virtual-device driver sit behind this trait. Every
//! operation is fire-and-await, atomic on its own, and independently
//! failable; no two operations are transactional with each other.
//!
//! [`LocalBackend`] is the in-process implementation the daemon ships with.

pub mod local;

pub use local::LocalBackend;

use crate::config::{AppConfig, AudioRoute, HotkeyConfig};
use crate::error::BackendError;
use crate::status::{DeviceList, RuntimeSnapshot, VirtualDeviceStatus};

/// Operations the reconciliation core consumes
#[async_trait::async_trait]
pub trait Backend: Send + Sync {
    async fn list_audio_devices(&self) -> Result<DeviceList, BackendError>;

    async fn get_app_config(&self) -> Result<AppConfig, BackendError>;

    async fn get_runtime_status(&self) -> Result<RuntimeSnapshot, BackendError>;

    async fn get_virtual_device_status(&self) -> Result<VirtualDeviceStatus, BackendError>;

    async fn save_audio_route(&self, route: &AudioRoute) -> Result<(), BackendError>;

    async fn set_hotkey(&self, hotkey: &HotkeyConfig) -> Result<(), BackendError>;

    async fn set_launch_on_startup(&self, enabled: bool) -> Result<(), BackendError>;

    async fn set_minimize_to_tray(&self, enabled: bool) -> Result<(), BackendError>;

    async fn set_mic_gate(&self, open: bool, source: &str) -> Result<(), BackendError>;

    async fn stop_engine(&self) -> Result<(), BackendError>;

    async fn start_engine(&self) -> Result<(), BackendError>;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}
