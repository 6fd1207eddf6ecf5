//! Configuration loading and types for micgate
//!
//! Two kinds of configuration live here:
//! - [`Config`]: daemon settings (timings, backend store, state file), loaded in layers:
//!   1. Built-in defaults
//!   2. Config file (~/.config/micgate/config.toml)
//!   3. Environment variables (MICGATE_*)
//!   4. CLI arguments (highest priority)
//! - [`AppConfig`]: the user-facing routing/hotkey settings that are edited locally
//!   and reconciled against the backend.

use crate::accelerator::AcceleratorToken;
use crate::error::MicgateError;
use crate::status::DeviceInfo;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default configuration file content
pub const DEFAULT_CONFIG: &str = r#"# Micgate Configuration
#
# Location: ~/.config/micgate/config.toml
# All settings can be overridden via CLI flags

# State file for external integrations (status bars, scripts).
# Use "auto" for the default location ($XDG_RUNTIME_DIR/micgate/state.json),
# a custom path, or "disabled" to turn off.
# Required for `micgate status`.
state_file = "auto"

[engine]
# Quiet period after the last edit before settings are pushed to the backend
debounce_ms = 450

# How often the runtime status is refreshed
poll_interval_ms = 1000

# Pointer presses this soon after hotkey capture starts are ignored, so the
# click that opened the capture is not recorded as the hotkey
click_guard_ms = 180

# Upper bound for one reconciliation pass or reinitialize (milliseconds).
# Unset means no timeout: a hung backend call keeps the engine busy.
# call_timeout_ms = 10000

[backend]
# Where the built-in backend persists routing/hotkey settings.
# "auto" uses ~/.config/micgate/settings.toml
store = "auto"

# Audio endpoints the built-in backend offers
# [[backend.devices]]
# id = "mic-usb"
# name = "USB Microphone"
# direction = "input"
# is_default = true
#
# [[backend.devices]]
# id = "bridge-out"
# name = "Virtual Bridge"
# direction = "output"
# is_virtual_candidate = true

[notification]
# Desktop notification when settings fail to apply
on_save_failure = true
"#;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Optional path to state file for external integrations
    /// "auto" resolves to $XDG_RUNTIME_DIR/micgate/state.json
    #[serde(default)]
    pub state_file: Option<String>,

    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub backend: BackendConfig,

    #[serde(default)]
    pub notification: NotificationConfig,
}

/// Timing settings for capture, reconciliation and polling
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineConfig {
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_click_guard_ms")]
    pub click_guard_ms: u64,

    /// Bound on a whole pass or reinitialize; None = wait forever
    #[serde(default)]
    pub call_timeout_ms: Option<u64>,
}

impl EngineConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn click_guard(&self) -> Duration {
        Duration::from_millis(self.click_guard_ms)
    }

    pub fn call_timeout(&self) -> Option<Duration> {
        self.call_timeout_ms.map(Duration::from_millis)
    }
}

fn default_debounce_ms() -> u64 {
    450
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_click_guard_ms() -> u64 {
    180
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            click_guard_ms: default_click_guard_ms(),
            call_timeout_ms: None,
        }
    }
}

/// Built-in backend settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackendConfig {
    /// Settings store path, or "auto"
    #[serde(default = "default_store")]
    pub store: String,

    /// Endpoints offered by the built-in backend
    #[serde(default)]
    pub devices: Vec<DeviceInfo>,
}

fn default_store() -> String {
    "auto".to_string()
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            store: default_store(),
            devices: vec![],
        }
    }
}

impl BackendConfig {
    /// Resolve the settings store path
    pub fn resolve_store(&self) -> PathBuf {
        match self.store.to_lowercase().as_str() {
            "auto" => Config::config_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("settings.toml"),
            _ => PathBuf::from(&self.store),
        }
    }
}

/// Notification configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NotificationConfig {
    #[serde(default = "default_true")]
    pub on_save_failure: bool,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            on_save_failure: true,
        }
    }
}

fn default_true() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            backend: BackendConfig::default(),
            notification: NotificationConfig::default(),
            state_file: Some("auto".to_string()),
        }
    }
}

impl Config {
    /// Get the default config file path
    pub fn default_path() -> Option<PathBuf> {
        Self::config_dir().map(|dir| dir.join("config.toml"))
    }

    /// Get the config directory path
    pub fn config_dir() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "micgate")
            .map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Get the runtime directory for ephemeral files (state)
    pub fn runtime_dir() -> PathBuf {
        std::env::var("XDG_RUNTIME_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| std::env::temp_dir())
            .join("micgate")
    }

    /// Resolve the state file path from config
    /// Returns None if state_file is not configured or explicitly disabled
    pub fn resolve_state_file(&self) -> Option<PathBuf> {
        self.state_file
            .as_ref()
            .and_then(|path| match path.to_lowercase().as_str() {
                "disabled" | "none" | "off" | "false" => None,
                "auto" => Some(Self::runtime_dir().join("state.json")),
                _ => Some(PathBuf::from(path)),
            })
    }
}

/// Load configuration from file, with defaults for missing values
pub fn load_config(path: Option<&Path>) -> Result<Config, MicgateError> {
    let mut config = Config::default();

    let config_path = path.map(PathBuf::from).or_else(Config::default_path);

    if let Some(ref path) = config_path {
        if path.exists() {
            tracing::debug!("Loading config from {:?}", path);
            let contents = std::fs::read_to_string(path)
                .map_err(|e| MicgateError::Config(format!("Failed to read config: {}", e)))?;

            config = toml::from_str(&contents)
                .map_err(|e| MicgateError::Config(format!("Invalid config: {}", e)))?;
        } else {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
        }
    }

    apply_env_overrides(&mut config, |name| std::env::var(name).ok())?;

    Ok(config)
}

fn apply_env_overrides(
    config: &mut Config,
    var: impl Fn(&str) -> Option<String>,
) -> Result<(), MicgateError> {
    if let Some(store) = var("MICGATE_STORE") {
        config.backend.store = store;
    }
    if let Some(ms) = var("MICGATE_DEBOUNCE_MS") {
        config.engine.debounce_ms = ms
            .parse()
            .map_err(|e| MicgateError::Config(format!("MICGATE_DEBOUNCE_MS: {}", e)))?;
    }
    if let Some(ms) = var("MICGATE_POLL_MS") {
        config.engine.poll_interval_ms = ms
            .parse()
            .map_err(|e| MicgateError::Config(format!("MICGATE_POLL_MS: {}", e)))?;
    }
    Ok(())
}

/// Gate activation mode
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum GateMode {
    /// Hold the hotkey to open the gate, release to close (default)
    #[default]
    PushToTalk,
    /// Press once to open, press again to close
    Toggle,
    /// Toggle on press; the backend may also honor long holds
    Hybrid,
}

impl std::str::FromStr for GateMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ptt" | "push_to_talk" | "push-to-talk" => Ok(GateMode::PushToTalk),
            "toggle" => Ok(GateMode::Toggle),
            "hybrid" => Ok(GateMode::Hybrid),
            other => Err(format!("unknown gate mode '{}' (ptt, toggle, hybrid)", other)),
        }
    }
}

/// Physical input paired with the virtual bridge output. Empty string = unset.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq, Hash)]
pub struct AudioRoute {
    #[serde(default)]
    pub input_device_id: String,
    #[serde(default)]
    pub bridge_output_device_id: String,
}

impl AudioRoute {
    pub fn is_complete(&self) -> bool {
        !self.input_device_id.is_empty() && !self.bridge_output_device_id.is_empty()
    }

    /// True when either endpoint differs
    pub fn differs_from(&self, other: &AudioRoute) -> bool {
        self.input_device_id != other.input_device_id
            || self.bridge_output_device_id != other.bridge_output_device_id
    }
}

/// Global hotkey settings
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq, Hash)]
pub struct HotkeyConfig {
    #[serde(default)]
    pub accelerator: AcceleratorToken,
    #[serde(default)]
    pub mode: GateMode,
}

/// The unit of persistence and of dirty-checking
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq, Hash)]
pub struct AppConfig {
    // Plain values stay ahead of the tables so the TOML form serializes cleanly
    #[serde(default)]
    pub launch_on_startup: bool,
    #[serde(default = "default_true")]
    pub minimize_to_tray: bool,
    #[serde(default)]
    pub route: AudioRoute,
    #[serde(default)]
    pub hotkey: HotkeyConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            route: AudioRoute::default(),
            hotkey: HotkeyConfig::default(),
            launch_on_startup: false,
            minimize_to_tray: true,
        }
    }
}

/// Read persisted app settings, falling back to defaults when the file is missing
pub fn load_app_config(path: &Path) -> Result<AppConfig, MicgateError> {
    if !path.exists() {
        tracing::debug!("No settings at {:?}, using defaults", path);
        return Ok(AppConfig::default());
    }
    let contents = std::fs::read_to_string(path)
        .map_err(|e| MicgateError::Config(format!("Failed to read settings: {}", e)))?;
    toml::from_str(&contents).map_err(|e| MicgateError::Config(format!("Invalid settings: {}", e)))
}

/// Save app settings to file
pub fn save_app_config(config: &AppConfig, path: &Path) -> Result<(), MicgateError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| MicgateError::Config(format!("Failed to create settings dir: {}", e)))?;
    }

    let contents = toml::to_string_pretty(config)
        .map_err(|e| MicgateError::Config(format!("Failed to serialize settings: {}", e)))?;

    std::fs::write(path, contents)
        .map_err(|e| MicgateError::Config(format!("Failed to write settings: {}", e)))?;

    Ok(())
}
