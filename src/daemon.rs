//! Daemon module - main event loop orchestration
//!
//! Coordinates the control surface, hotkey capture, the reconciliation
//! engine and the status poller. Everything that touches the edit buffer
//! runs on this one task; the poller only writes to the status board.

use crate::accelerator::AcceleratorToken;
use crate::backend::{Backend, LocalBackend};
use crate::capture::{CaptureOutcome, HotkeyCapture, InputHooks, NoopHooks};
use crate::config::{AppConfig, Config};
use crate::control::{self, ControlCommand, GateAction};
use crate::error::{MicgateError, ReconcileError, Result};
use crate::gate::GateController;
use crate::notification;
use crate::poller::StatusPoller;
use crate::reconcile::{Activity, Reconciler, ReconcilerOptions};
use crate::status::{DeviceInfo, DeviceList, RuntimeSnapshot, StatusBoard, VirtualDeviceStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal::unix::{signal, SignalKind};
use tokio::time::{Instant, MissedTickBehavior};

/// How often a failed initial settings read is retried
const LOAD_RETRY: Duration = Duration::from_secs(5);

/// Snapshot written to the state file for `micgate status` and status bars
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonState {
    pub pid: u32,
    #[serde(default)]
    pub backend: String,
    /// Settings were read from the backend; reconciliation is active
    #[serde(default)]
    pub loaded: bool,
    /// A pass or reinitialize is waiting on the backend
    pub busy: bool,
    /// Local edits not yet confirmed by the backend
    pub unsaved: bool,
    pub capturing: bool,
    pub message: Option<String>,
    pub settings: AppConfig,
    pub runtime: Option<RuntimeSnapshot>,
    pub virtual_device: Option<VirtualDeviceStatus>,
    #[serde(default)]
    pub devices: Option<DeviceList>,
    pub updated_at: DateTime<Utc>,
}

impl DaemonState {
    /// Human-readable multi-line summary
    pub fn summary(&self) -> String {
        let mut lines = Vec::new();

        if !self.backend.is_empty() {
            lines.push(format!("backend: {}", self.backend));
        }
        if !self.loaded {
            lines.push("settings: not loaded (retrying, or run `reload`)".to_string());
        }

        match &self.runtime {
            Some(rt) => {
                lines.push(format!(
                    "engine: {} (buffer {}ms, xruns {})",
                    rt.engine_state, rt.buffer_level_ms, rt.xruns
                ));
                lines.push(format!(
                    "gate: {} ({:?}, last change by {})",
                    if rt.gate.is_open { "open" } else { "closed" },
                    rt.gate.mode,
                    rt.gate.last_source
                ));
                if let Some(ref e) = rt.last_error {
                    lines.push(format!("last error: {}", e));
                }
            }
            None => lines.push("engine: unknown".to_string()),
        }

        if let Some(ref vd) = self.virtual_device {
            lines.push(format!(
                "bridge: {} [{}] {}",
                if vd.ready { "ready" } else { "not ready" },
                vd.backend,
                vd.detail
            ));
        }

        if let Some(ref devices) = self.devices {
            lines.push(format!("inputs: {}", endpoint_list(&devices.inputs)));
            lines.push(format!("outputs: {}", endpoint_list(&devices.outputs)));
        }

        let route = &self.settings.route;
        lines.push(format!(
            "route: {} -> {}",
            display_id(&route.input_device_id),
            display_id(&route.bridge_output_device_id)
        ));
        lines.push(format!(
            "hotkey: {} ({:?}){}",
            self.settings.hotkey.accelerator,
            self.settings.hotkey.mode,
            if self.capturing { ", recording new hotkey" } else { "" }
        ));
        lines.push(format!(
            "launch on startup: {}, minimize to tray: {}",
            self.settings.launch_on_startup, self.settings.minimize_to_tray
        ));

        if self.busy {
            lines.push("saving...".to_string());
        } else if self.unsaved {
            lines.push("unsaved changes".to_string());
        }
        if let Some(ref msg) = self.message {
            lines.push(format!("> {}", msg));
        }

        lines.join("\n")
    }
}

fn endpoint_list(devices: &[DeviceInfo]) -> String {
    if devices.is_empty() {
        return "(none)".to_string();
    }
    devices
        .iter()
        .map(|d| {
            if d.is_default {
                format!("{} (default)", d.id)
            } else {
                d.id.clone()
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn display_id(id: &str) -> &str {
    if id.is_empty() {
        "(none)"
    } else {
        id
    }
}

/// Write state to file for external integrations
fn write_state_file(path: &Path, state: &DaemonState) {
    if let Some(parent) = path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            tracing::warn!("Failed to create state file directory: {}", e);
            return;
        }
    }

    let json = match serde_json::to_string_pretty(state) {
        Ok(json) => json,
        Err(e) => {
            tracing::warn!("Failed to serialize state: {}", e);
            return;
        }
    };

    if let Err(e) = std::fs::write(path, json) {
        tracing::warn!("Failed to write state file: {}", e);
    } else {
        tracing::trace!("State file updated");
    }
}

/// Remove state file on shutdown
fn cleanup_state_file(path: &Path) {
    if path.exists() {
        if let Err(e) = std::fs::remove_file(path) {
            tracing::warn!("Failed to remove state file: {}", e);
        }
    }
}

/// Read the state file written by a running daemon
pub fn read_state_file(path: &Path) -> Option<DaemonState> {
    let contents = std::fs::read_to_string(path).ok()?;
    match serde_json::from_str(&contents) {
        Ok(state) => Some(state),
        Err(e) => {
            tracing::debug!("Unreadable state file {:?}: {}", path, e);
            None
        }
    }
}

/// Whether the loop keeps running after a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Everything one running daemon drives: edit buffer, capture, gate
pub struct Session<H: InputHooks> {
    backend: Arc<dyn Backend>,
    gate: Arc<GateController>,
    reconciler: Reconciler,
    capture: HotkeyCapture<H>,
    message: Option<String>,
}

impl<H: InputHooks> Session<H> {
    pub fn new(
        backend: Arc<dyn Backend>,
        gate: Arc<GateController>,
        reconciler: Reconciler,
        capture: HotkeyCapture<H>,
    ) -> Self {
        Self {
            backend,
            gate,
            reconciler,
            capture,
            message: None,
        }
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    pub fn capture(&self) -> &HotkeyCapture<H> {
        &self.capture
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    fn say(&mut self, message: impl Into<String>) {
        let message = message.into();
        println!("{}", message);
        self.message = Some(message);
    }

    /// Apply one control command
    pub async fn handle(&mut self, command: ControlCommand) -> Flow {
        match command {
            ControlCommand::SetInput(id) => self.reconciler.edit(|c| c.route.input_device_id = id),
            ControlCommand::SetBridge(id) => {
                self.reconciler.edit(|c| c.route.bridge_output_device_id = id)
            }
            ControlCommand::SetMode(mode) => self.reconciler.edit(|c| c.hotkey.mode = mode),
            ControlCommand::SetHotkey(token) => self.set_accelerator(token),
            ControlCommand::SetLaunchOnStartup(on) => {
                self.reconciler.edit(|c| c.launch_on_startup = on)
            }
            ControlCommand::SetMinimizeToTray(on) => self.reconciler.edit(|c| c.minimize_to_tray = on),
            ControlCommand::Capture => {
                self.capture.begin();
                self.say("Press the new hotkey (Escape to cancel)");
            }
            ControlCommand::Key(event) => {
                let outcome = self.capture.handle_key(&event);
                self.on_capture(outcome);
            }
            ControlCommand::Pointer(event) => {
                let outcome = self.capture.handle_pointer(&event);
                self.on_capture(outcome);
            }
            ControlCommand::ContextMenu => {
                let outcome = self.capture.handle_context_menu();
                self.on_capture(outcome);
            }
            ControlCommand::Gate(action) => {
                let open = match action {
                    GateAction::Open => true,
                    GateAction::Close => false,
                    GateAction::Toggle => !self.gate.is_open(),
                };
                if let Err(e) = self.backend.set_mic_gate(open, "control").await {
                    self.say(format!("Gate change failed: {}", e));
                }
            }
            ControlCommand::Trigger(pressed) => self.gate.on_hotkey(pressed, "hotkey"),
            ControlCommand::Reinitialize => match self.reconciler.request_reinitialize() {
                Ok(()) => self.say("Reinitializing audio route..."),
                Err(e) => self.say(e.to_string()),
            },
            ControlCommand::Reload => {
                if let Err(e) = self.reload().await {
                    self.say(format!("Failed to load settings: {}", e));
                }
            }
            ControlCommand::Status => println!("{}", self.state().summary()),
            ControlCommand::Quit => return Flow::Quit,
        }
        Flow::Continue
    }

    /// Read the confirmed settings from the backend again
    ///
    /// Until this succeeds once, edits are buffered but never reconciled.
    pub async fn reload(&mut self) -> std::result::Result<(), ReconcileError> {
        match self.reconciler.load().await {
            Ok(()) => {
                self.say("Settings loaded");
                Ok(())
            }
            Err(e) => {
                tracing::warn!("Failed to load settings: {}", e);
                Err(e)
            }
        }
    }

    fn set_accelerator(&mut self, token: AcceleratorToken) {
        self.reconciler.edit(|c| c.hotkey.accelerator = token);
    }

    fn on_capture(&mut self, outcome: CaptureOutcome) {
        if outcome == CaptureOutcome::Passthrough {
            self.say("Not recording a hotkey (run `capture` first)");
            return;
        }
        if let CaptureOutcome::Captured(ref token) = outcome {
            self.set_accelerator(token.clone());
        }
        if let Some(message) = outcome.message() {
            self.say(message);
        }
    }

    /// Wait for the reconciler's next activity and report it
    pub async fn next_activity(&mut self) -> Activity {
        let activity = self.reconciler.next_activity().await;
        self.say(activity.message());
        activity
    }

    pub fn state(&self) -> DaemonState {
        let board = self.reconciler.board();
        DaemonState {
            pid: std::process::id(),
            backend: self.backend.name().to_string(),
            loaded: self.reconciler.store().is_loaded(),
            busy: self.reconciler.is_busy(),
            unsaved: self.reconciler.store().is_dirty(),
            capturing: self.capture.is_recording(),
            message: self.message.clone(),
            settings: self.reconciler.store().local().clone(),
            runtime: board.runtime(),
            virtual_device: board.virtual_device(),
            devices: board.devices(),
            updated_at: Utc::now(),
        }
    }

    /// End any capture session and detach its hooks
    pub fn shutdown(&mut self) {
        self.capture.abort();
        if self.reconciler.is_busy() {
            tracing::warn!("Shutting down while settings were still being applied");
        }
    }
}

/// Main daemon that orchestrates all components
pub struct Daemon {
    config: Config,
    state_file_path: Option<PathBuf>,
}

impl Daemon {
    /// Create a new daemon with the given configuration
    pub fn new(config: Config) -> Self {
        let state_file_path = config.resolve_state_file();
        Self {
            config,
            state_file_path,
        }
    }

    fn update_state<H: InputHooks>(&self, session: &Session<H>) {
        if let Some(ref path) = self.state_file_path {
            write_state_file(path, &session.state());
        }
    }

    /// Run the daemon main loop
    pub async fn run(&mut self) -> Result<()> {
        tracing::info!("Starting micgate daemon");

        let mut sigterm = signal(SignalKind::terminate())
            .map_err(|e| MicgateError::Config(format!("Failed to set up SIGTERM handler: {}", e)))?;

        let store_path = self.config.backend.resolve_store();
        let devices = DeviceList::from_devices(self.config.backend.devices.clone());
        let input_count = devices.inputs.len();
        let output_count = devices.outputs.len();
        let backend = Arc::new(LocalBackend::open(store_path, devices)?);
        tracing::info!(
            "Backend: {} ({} input(s), {} output(s))",
            backend.name(),
            input_count,
            output_count
        );
        let gate = backend.gate();

        match backend.validate_route() {
            Ok(()) => {
                if let Err(e) = backend.start_engine().await {
                    tracing::warn!("Audio engine failed to start: {}", e);
                }
            }
            Err(e) => tracing::warn!("Audio route not ready: {}", e),
        }

        if let Some(ref path) = self.state_file_path {
            tracing::info!("State file: {:?}", path);
        }

        let board = StatusBoard::new();
        let backend: Arc<dyn Backend> = backend;
        let reconciler = Reconciler::new(
            backend.clone(),
            board.clone(),
            ReconcilerOptions::from(&self.config.engine),
        );

        let poller =
            StatusPoller::new(backend.clone(), board, self.config.engine.poll_interval()).spawn();

        let capture = HotkeyCapture::new(NoopHooks, self.config.engine.click_guard());
        let mut session = Session::new(backend, gate, reconciler, capture);

        if let Err(e) = session.reload().await {
            let message = format!("Failed to load settings: {}", e);
            session.say(message.clone());
            if self.config.notification.on_save_failure {
                notification::failure(&message).await;
            }
        }
        let mut load_retry = tokio::time::interval_at(Instant::now() + LOAD_RETRY, LOAD_RETRY);
        load_retry.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let settings = session.reconciler().store().local();
        tracing::info!(
            "Hotkey: {} ({:?}), reading commands from stdin",
            settings.hotkey.accelerator,
            settings.hotkey.mode
        );
        self.update_state(&session);

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut stdin_open = true;

        // Main event loop
        loop {
            tokio::select! {
                line = lines.next_line(), if stdin_open => {
                    match line {
                        Ok(Some(line)) => match control::parse_line(&line) {
                            Ok(Some(command)) => {
                                if session.handle(command).await == Flow::Quit {
                                    tracing::info!("Quit requested, shutting down...");
                                    break;
                                }
                            }
                            Ok(None) => {}
                            Err(e) => println!("{}", e),
                        },
                        Ok(None) => {
                            tracing::debug!("stdin closed, control commands disabled");
                            stdin_open = false;
                        }
                        Err(e) => {
                            tracing::warn!("Failed to read control input: {}", e);
                            stdin_open = false;
                        }
                    }
                }

                _ = load_retry.tick(), if !session.reconciler().store().is_loaded() => {
                    if let Err(e) = session.reload().await {
                        tracing::debug!("Settings still unavailable: {}", e);
                    }
                }

                activity = session.next_activity() => {
                    if activity.is_failure() && self.config.notification.on_save_failure {
                        notification::failure(&activity.message()).await;
                    }
                }

                // Handle graceful shutdown (SIGINT from Ctrl+C)
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Received SIGINT, shutting down...");
                    break;
                }

                // Handle graceful shutdown (SIGTERM from systemctl stop)
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM, shutting down...");
                    break;
                }
            }

            self.update_state(&session);
        }

        session.shutdown();
        poller.stop().await;

        if let Some(ref path) = self.state_file_path {
            cleanup_state_file(path);
        }

        tracing::info!("Daemon stopped");

        Ok(())
    }
}
