//! Micgate: hotkey-gated microphone routing
//!
//! This library provides the core functionality for:
//! - Normalizing raw key and pointer presses into canonical accelerator strings
//! - Capturing a new global hotkey with a cancellable recording session
//! - Holding the settings edit buffer against the last backend-confirmed copy
//! - Reconciling settings to the audio backend after a quiet period
//! - Polling and displaying the backend's runtime status
//!
//! # Architecture
//!
//! ```text
//!                            ┌─────────────────────────────────────┐
//!                            │              Daemon                 │
//!                            └─────────────────────────────────────┘
//!                                            │
//!                   ┌────────────────────────┼────────────────────────┐
//!                   │                        │                        │
//!                   ▼                        ▼                        ▼
//!          ┌──────────────┐         ┌──────────────┐         ┌──────────────┐
//!          │   Control    │         │    Hotkey    │         │    Status    │
//!          │   (stdin)    │         │   Capture    │         │    Poller    │
//!          └──────────────┘         └──────────────┘         └──────────────┘
//!                   │                        │ accelerator            │
//!                   │  edits                 │                        │ every 1s
//!                   ▼                        ▼                        │
//!          ┌─────────────────────────────────────────────┐            │
//!          │        Configuration Store (local/remote)   │            │
//!          └─────────────────────────────────────────────┘            │
//!                                │ dirty                              │
//!                                ▼                                    │
//!                       ┌─────────────────┐                           │
//!                       │   Reconciler    │ debounce, fixed-order     │
//!                       │                 │ apply, engine restart     │
//!                       └─────────────────┘                           │
//!                                │                                    │
//!                                ▼                                    ▼
//!                       ┌─────────────────┐                  ┌──────────────┐
//!                       │     Backend     │ ───── status ──▶ │ Status Board │
//!                       └─────────────────┘                  └──────────────┘
//! ```

pub mod accelerator;
pub mod backend;
pub mod capture;
pub mod cli;
pub mod config;
pub mod control;
pub mod daemon;
pub mod error;
pub mod gate;
pub mod notification;
pub mod poller;
pub mod reconcile;
pub mod state;
pub mod status;
pub mod store;

pub use accelerator::{AcceleratorToken, KeyPress, Modifiers, PointerPress};
pub use backend::{Backend, LocalBackend};
pub use capture::{CaptureOutcome, HotkeyCapture, InputHooks};
pub use cli::{Cli, Commands};
pub use config::{AppConfig, Config};
pub use daemon::Daemon;
pub use error::{BackendError, MicgateError, ReconcileError, Result};
pub use reconcile::{Activity, Reconciler, ReconcilerOptions};
pub use status::StatusBoard;
pub use store::ConfigurationStore;
