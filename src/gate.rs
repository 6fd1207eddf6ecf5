//! Microphone gate
//!
//! Tracks whether the routed signal is open, which mode drives it and what
//! last changed it.

use crate::config::GateMode;
use crate::status::GateState;
use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

#[derive(Debug)]
pub struct GateController {
    is_open: AtomicBool,
    state: RwLock<GateState>,
}

impl GateController {
    pub fn new(mode: GateMode) -> Self {
        let state = GateState {
            mode,
            ..GateState::default()
        };
        Self {
            is_open: AtomicBool::new(state.is_open),
            state: RwLock::new(state),
        }
    }

    pub fn set_mode(&self, mode: GateMode) {
        self.update(|state| {
            state.mode = mode;
            state.last_source = "mode".to_string();
        });
    }

    pub fn set_open(&self, open: bool, source: &str) {
        self.is_open.store(open, Ordering::SeqCst);
        self.update(|state| {
            state.is_open = open;
            state.last_source = source.to_string();
        });
    }

    pub fn toggle(&self, source: &str) {
        self.set_open(!self.is_open(), source);
    }

    /// React to the global hotkey going down (`pressed`) or up
    pub fn on_hotkey(&self, pressed: bool, source: &str) {
        match self.snapshot().mode {
            GateMode::PushToTalk => self.set_open(pressed, source),
            GateMode::Toggle | GateMode::Hybrid => {
                if pressed {
                    self.toggle(source);
                }
            }
        }
    }

    pub fn is_open(&self) -> bool {
        self.is_open.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> GateState {
        match self.state.read() {
            Ok(state) => state.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn update(&self, f: impl FnOnce(&mut GateState)) {
        let mut state = match self.state.write() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut state);
        state.changed_at = Utc::now();
    }
}
