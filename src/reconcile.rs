//! Reconciliation engine
//!
//! Pushes the local edit buffer to the backend once it has settled:
//!
//! ```text
//!   edit ──▶ dirty? ──▶ (re)arm debounce ──▶ quiet period ──▶ pass
//!                                                            │
//!    route ─▶ hotkey ─▶ launch-on-startup ─▶ minimize-to-tray ┘
//!                                                            │
//!              route changed? ─▶ stop + start engine ─▶ refresh status
//! ```
//!
//! A pass works on a snapshot of `local` taken when the timer fires, so edits
//! made while it runs only arm the next cycle. A failed pass leaves the remote
//! baseline untouched; the next cycle re-applies every sub-resource.
//!
//! At most one backend job (pass or reinitialize) is in flight. The job is
//! polled from [`Reconciler::next_activity`], which is cancel-safe and meant
//! to sit in the daemon's `select!` loop next to input and control events.

use crate::backend::Backend;
use crate::config::{AppConfig, AudioRoute, EngineConfig};
use crate::error::{BackendError, ReconcileError};
use crate::status::StatusBoard;
use crate::store::ConfigurationStore;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

type BackendJob = Pin<Box<dyn Future<Output = Result<(), BackendError>> + Send>>;

/// Timing knobs for the reconciler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcilerOptions {
    /// Quiet period after the last edit before a pass starts
    pub debounce: Duration,
    /// Bound on one pass or reinitialize; None waits forever
    pub call_timeout: Option<Duration>,
}

impl Default for ReconcilerOptions {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(450),
            call_timeout: None,
        }
    }
}

impl From<&EngineConfig> for ReconcilerOptions {
    fn from(config: &EngineConfig) -> Self {
        Self {
            debounce: config.debounce(),
            call_timeout: config.call_timeout(),
        }
    }
}

/// Something the reconciler did, for the user-visible message line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Activity {
    /// A pass started; the engine is busy until it settles
    PassStarted,
    Saved,
    SaveFailed(String),
    Reinitialized,
    ReinitializeFailed(String),
}

impl Activity {
    pub fn message(&self) -> String {
        match self {
            Activity::PassStarted => "Saving settings...".to_string(),
            Activity::Saved => "Settings saved".to_string(),
            Activity::SaveFailed(e) => format!("Failed to save settings: {}", e),
            Activity::Reinitialized => "Audio route reinitialized".to_string(),
            Activity::ReinitializeFailed(e) => format!("Reinitialize failed: {}", e),
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Activity::SaveFailed(_) | Activity::ReinitializeFailed(_))
    }
}

enum Work {
    Pass { candidate: AppConfig },
    Reinitialize,
}

struct InFlight {
    work: Work,
    job: BackendJob,
}

pub struct Reconciler {
    backend: Arc<dyn Backend>,
    board: StatusBoard,
    store: ConfigurationStore,
    options: ReconcilerOptions,
    deadline: Option<Instant>,
    in_flight: Option<InFlight>,
}

impl Reconciler {
    pub fn new(backend: Arc<dyn Backend>, board: StatusBoard, options: ReconcilerOptions) -> Self {
        Self {
            backend,
            board,
            store: ConfigurationStore::new(),
            options,
            deadline: None,
            in_flight: None,
        }
    }

    /// Full read of the backend config; establishes the dirty-check baseline
    ///
    /// Also publishes the backend's device list. Unsaved local edits are
    /// replaced. Rejected while a pass or reinitialize is in flight.
    pub async fn load(&mut self) -> Result<(), ReconcileError> {
        if self.in_flight.is_some() {
            return Err(ReconcileError::Busy);
        }
        self.store.load_remote(self.backend.as_ref()).await?;
        self.deadline = None;
        tracing::debug!("Listing audio devices from {}", self.backend.name());

        match self.backend.list_audio_devices().await {
            Ok(devices) => self.board.publish_devices(devices),
            Err(e) => tracing::warn!("Device listing failed: {}", e),
        }
        if let Err(e) = refresh_status(self.backend.as_ref(), &self.board).await {
            tracing::warn!("Initial status refresh failed: {}", e);
        }
        Ok(())
    }

    pub fn store(&self) -> &ConfigurationStore {
        &self.store
    }

    pub fn board(&self) -> &StatusBoard {
        &self.board
    }

    /// A pass or reinitialize is waiting on the backend
    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    /// A debounce timer is armed
    pub fn has_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// Apply a local edit and (re)arm the debounce timer if it changed anything
    pub fn edit(&mut self, mutator: impl FnOnce(&mut AppConfig)) {
        self.store.edit(mutator);
        self.local_changed();
    }

    fn local_changed(&mut self) {
        if !self.store.is_loaded() {
            return;
        }
        if !self.store.is_dirty() {
            if self.deadline.take().is_some() {
                tracing::trace!("Edits reverted to saved settings, debounce cancelled");
            }
            return;
        }
        self.deadline = Some(Instant::now() + self.options.debounce);
        tracing::trace!("Debounce armed ({}ms)", self.options.debounce.as_millis());
    }

    /// Stop and start the engine, then refresh status. Rejected while busy.
    pub fn request_reinitialize(&mut self) -> Result<(), ReconcileError> {
        if !self.store.is_loaded() {
            return Err(ReconcileError::NotLoaded);
        }
        if self.in_flight.is_some() {
            tracing::debug!("Reinitialize rejected: backend job in flight");
            return Err(ReconcileError::Busy);
        }

        tracing::info!("Reinitializing audio route");
        let job = reinitialize(self.backend.clone(), self.board.clone());
        self.in_flight = Some(InFlight {
            work: Work::Reinitialize,
            job: self.bounded(job),
        });
        Ok(())
    }

    /// Wait for the next thing to report: a pass starting, or a job settling
    ///
    /// Cancel-safe: dropping the returned future loses no state.
    pub async fn next_activity(&mut self) -> Activity {
        loop {
            let idle = self.in_flight.is_none();
            let deadline = self.deadline;

            tokio::select! {
                result = wait_in_flight(&mut self.in_flight) => {
                    if let Some(flight) = self.in_flight.take() {
                        return self.settle(flight.work, result);
                    }
                }
                _ = sleep_until(deadline), if idle => {
                    self.deadline = None;
                    if let Some(activity) = self.start_pass() {
                        return activity;
                    }
                }
            }
        }
    }

    fn start_pass(&mut self) -> Option<Activity> {
        if !self.store.is_dirty() {
            tracing::trace!("Debounce fired with nothing to apply");
            return None;
        }

        let candidate = self.store.local().clone();
        let prior_route = self.store.remote().route.clone();
        tracing::debug!("Reconciliation pass started");

        let job = apply(
            self.backend.clone(),
            self.board.clone(),
            candidate.clone(),
            prior_route,
        );
        self.in_flight = Some(InFlight {
            work: Work::Pass { candidate },
            job: self.bounded(job),
        });
        Some(Activity::PassStarted)
    }

    fn settle(&mut self, work: Work, result: Result<(), BackendError>) -> Activity {
        match (work, result) {
            (Work::Pass { candidate }, Ok(())) => {
                self.store.commit(candidate);
                tracing::info!("Settings saved");
                // Edits made during the pass that were reverted to the old
                // baseline left no timer behind
                if self.store.is_dirty() && self.deadline.is_none() {
                    self.local_changed();
                }
                Activity::Saved
            }
            (Work::Pass { .. }, Err(e)) => {
                tracing::warn!("Settings not applied: {}", e);
                Activity::SaveFailed(e.to_string())
            }
            (Work::Reinitialize, Ok(())) => {
                tracing::info!("Audio route reinitialized");
                Activity::Reinitialized
            }
            (Work::Reinitialize, Err(e)) => {
                tracing::warn!("Reinitialize failed: {}", e);
                Activity::ReinitializeFailed(e.to_string())
            }
        }
    }

    fn bounded(&self, job: impl Future<Output = Result<(), BackendError>> + Send + 'static) -> BackendJob {
        match self.options.call_timeout {
            Some(limit) => Box::pin(async move {
                tokio::time::timeout(limit, job)
                    .await
                    .unwrap_or_else(|_| Err(BackendError::Timeout(limit.as_millis() as u64)))
            }),
            None => Box::pin(job),
        }
    }
}

async fn wait_in_flight(in_flight: &mut Option<InFlight>) -> Result<(), BackendError> {
    match in_flight {
        Some(flight) => flight.job.as_mut().await,
        None => std::future::pending().await,
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

/// Fetch runtime and virtual-device status together and publish both
pub async fn refresh_status(backend: &dyn Backend, board: &StatusBoard) -> Result<(), BackendError> {
    let (runtime, virtual_device) =
        tokio::join!(backend.get_runtime_status(), backend.get_virtual_device_status());
    let runtime = runtime?;
    let virtual_device = virtual_device?;
    board.publish_runtime(runtime);
    board.publish_virtual_device(virtual_device);
    Ok(())
}

/// One reconciliation pass, sub-resources in fixed order
async fn apply(
    backend: Arc<dyn Backend>,
    board: StatusBoard,
    candidate: AppConfig,
    prior_route: AudioRoute,
) -> Result<(), BackendError> {
    tracing::debug!(
        "Applying route: {:?} -> {:?}",
        candidate.route.input_device_id,
        candidate.route.bridge_output_device_id
    );
    backend.save_audio_route(&candidate.route).await?;

    tracing::debug!("Applying hotkey: {} ({:?})", candidate.hotkey.accelerator, candidate.hotkey.mode);
    backend.set_hotkey(&candidate.hotkey).await?;

    tracing::debug!("Applying launch on startup: {}", candidate.launch_on_startup);
    backend.set_launch_on_startup(candidate.launch_on_startup).await?;

    tracing::debug!("Applying minimize to tray: {}", candidate.minimize_to_tray);
    backend.set_minimize_to_tray(candidate.minimize_to_tray).await?;

    // The engine only picks up a new route through a full stop/start
    if candidate.route.differs_from(&prior_route) {
        tracing::info!("Audio route changed, restarting engine");
        backend.stop_engine().await?;
        backend.start_engine().await?;
    }

    refresh_status(backend.as_ref(), &board).await
}

async fn reinitialize(backend: Arc<dyn Backend>, board: StatusBoard) -> Result<(), BackendError> {
    let restarted: Result<(), BackendError> = async {
        backend.stop_engine().await?;
        backend.start_engine().await
    }
    .await;

    match restarted {
        Ok(()) => refresh_status(backend.as_ref(), &board).await,
        Err(e) => {
            // Still show whatever state the engine was left in
            if let Err(refresh) = refresh_status(backend.as_ref(), &board).await {
                tracing::debug!("Status refresh after failed reinitialize: {}", refresh);
            }
            Err(e)
        }
    }
}
