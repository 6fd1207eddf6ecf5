//! State machine for hotkey capture
//!
//! Defines the states of a capture session:
//! Idle → Recording → Idle

use std::time::{Duration, Instant};

/// Capture state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    /// No capture session; raw input passes through untouched
    Idle,

    /// Waiting for the user to press the new hotkey
    Recording {
        /// When the session started (or was last restarted)
        started_at: Instant,
    },
}

impl CaptureState {
    /// Create a new idle state
    pub fn new() -> Self {
        CaptureState::Idle
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, CaptureState::Idle)
    }

    pub fn is_recording(&self) -> bool {
        matches!(self, CaptureState::Recording { .. })
    }

    /// Time since the session started, measured at `now`
    pub fn elapsed_at(&self, now: Instant) -> Option<Duration> {
        match self {
            CaptureState::Recording { started_at } => Some(now.saturating_duration_since(*started_at)),
            CaptureState::Idle => None,
        }
    }
}

impl Default for CaptureState {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CaptureState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CaptureState::Idle => write!(f, "Idle"),
            CaptureState::Recording { started_at } => {
                write!(f, "Recording ({:.1}s)", started_at.elapsed().as_secs_f32())
            }
        }
    }
}
