//! Runtime status poller
//!
//! Refreshes the runtime snapshot on a fixed interval so the displayed engine
//! state, buffer level and gate stay current between reconciliation passes.
//! A failed poll is dropped; the last good snapshot stays on the board.

use crate::backend::Backend;
use crate::status::StatusBoard;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

pub struct StatusPoller {
    backend: Arc<dyn Backend>,
    board: StatusBoard,
    interval: Duration,
}

impl StatusPoller {
    pub fn new(backend: Arc<dyn Backend>, board: StatusBoard, interval: Duration) -> Self {
        Self {
            backend,
            board,
            interval,
        }
    }

    /// Fetch and publish one snapshot. Returns whether the poll succeeded.
    pub async fn poll_once(&self) -> bool {
        match self.backend.get_runtime_status().await {
            Ok(snapshot) => {
                self.board.publish_runtime(snapshot);
                true
            }
            Err(e) => {
                tracing::trace!("Status poll failed: {}", e);
                false
            }
        }
    }

    /// Poll until `stop` fires or its sender is dropped
    pub async fn run(self, mut stop: oneshot::Receiver<()>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; status was just refreshed on load
        ticker.tick().await;

        tracing::debug!("Status poller running every {}ms", self.interval.as_millis());
        loop {
            tokio::select! {
                _ = &mut stop => break,
                _ = ticker.tick() => {
                    self.poll_once().await;
                }
            }
        }
        tracing::debug!("Status poller stopped");
    }

    /// Run on a background task
    pub fn spawn(self) -> PollerHandle {
        let (stop_tx, stop_rx) = oneshot::channel();
        let task = tokio::spawn(self.run(stop_rx));
        PollerHandle {
            stop: Some(stop_tx),
            task,
        }
    }
}

/// Owns a spawned poller; dropping it also stops the poller
pub struct PollerHandle {
    stop: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl PollerHandle {
    /// Signal the poller and wait for it to exit
    pub async fn stop(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Err(e) = (&mut self.task).await {
            tracing::warn!("Status poller task failed: {}", e);
        }
    }
}
