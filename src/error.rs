//! Error types for micgate
//!
//! Uses thiserror for ergonomic error definitions with clear messages
//! that can be shown to the user as-is.

use thiserror::Error;

/// Top-level error type for the micgate application
#[derive(Error, Debug)]
pub enum MicgateError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),
}

/// Failure of a single backend operation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Audio device not found: '{0}'. Pick another endpoint with `micgate devices`.")]
    DeviceNotFound(String),

    #[error("Audio engine error: {0}")]
    Engine(String),

    #[error("Failed to persist settings: {0}")]
    Persist(String),

    #[error("Backend call timed out after {0} ms")]
    Timeout(u64),

    #[error("Backend unavailable: {0}")]
    Unavailable(String),
}

/// Errors surfaced by the reconciliation engine
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReconcileError {
    #[error("Settings are still being applied, try again when the current pass completes")]
    Busy,

    #[error("Settings have not been loaded from the backend yet")]
    NotLoaded,

    #[error("{0}")]
    Backend(#[from] BackendError),
}

/// Errors from parsing a stored accelerator string
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AcceleratorError {
    #[error("Accelerator is empty")]
    Empty,

    #[error("Unknown modifier '{0}'. Use Ctrl, Alt, Shift or Super.")]
    UnknownModifier(String),

    #[error("Accelerator '{0}' has no main key (modifiers alone never form a hotkey)")]
    MissingMainKey(String),
}

/// Result type alias using MicgateError
pub type Result<T> = std::result::Result<T, MicgateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_error_conversions() {
        let err = ReconcileError::from(BackendError::Engine("boom".into()));
        assert_eq!(err.to_string(), "Audio engine error: boom");

        let err: MicgateError = BackendError::Persist("disk full".into()).into();
        assert_eq!(err.to_string(), "Backend error: Failed to persist settings: disk full");
    }

    #[test]
    fn test_busy_message_is_user_facing() {
        assert!(ReconcileError::Busy.to_string().contains("being applied"));
    }
}
