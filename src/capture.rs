//! Hotkey capture
//!
//! Records the next key or pointer press as the new global hotkey. While a
//! session is recording, global capture-phase hooks shadow default handling
//! of key presses, pointer presses and context menus. Hooks are attached when
//! a session starts and detached on every exit path (capture, cancel, drop).

use crate::accelerator::{keyboard_accelerator, pointer_accelerator, AcceleratorToken, KeyPress, PointerPress};
use crate::state::CaptureState;
use std::time::{Duration, Instant};

/// Default window after session start during which pointer presses are ignored
pub const DEFAULT_CLICK_GUARD: Duration = Duration::from_millis(180);

/// Raw input hooks a capture session installs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookKind {
    KeyPress,
    PointerPress,
    ContextMenu,
}

const SESSION_HOOKS: [HookKind; 3] = [HookKind::KeyPress, HookKind::PointerPress, HookKind::ContextMenu];

/// Platform seam for exclusive, capture-phase input hooks
pub trait InputHooks: Send {
    /// Install hooks for the given event kinds, shadowing default handling
    fn attach(&mut self, kinds: &[HookKind]);

    /// Remove every installed hook
    fn detach(&mut self);
}

/// Hooks for surfaces that deliver events explicitly (CLI, tests)
#[derive(Debug, Default)]
pub struct NoopHooks;

impl InputHooks for NoopHooks {
    fn attach(&mut self, kinds: &[HookKind]) {
        tracing::trace!("Capture hooks attached: {:?}", kinds);
    }

    fn detach(&mut self) {
        tracing::trace!("Capture hooks detached");
    }
}

/// Result of feeding one raw event to the capture state machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// No session is recording; the event keeps its default handling
    Passthrough,
    /// Session finished with a new accelerator
    Captured(AcceleratorToken),
    /// Escape pressed; accelerator unchanged
    Cancelled,
    /// The key press can't form a hotkey; still recording
    NeedsValidCombination,
    /// Pointer press inside the click guard window; still recording
    Ignored,
    /// Event swallowed without effect (context menu)
    Suppressed,
}

impl CaptureOutcome {
    /// Whether the event's default handling must be suppressed
    pub fn consumed(&self) -> bool {
        !matches!(self, CaptureOutcome::Passthrough)
    }

    /// Short user-facing message for this outcome
    pub fn message(&self) -> Option<String> {
        match self {
            CaptureOutcome::Captured(token) => Some(format!("Hotkey recorded: {}", token)),
            CaptureOutcome::Cancelled => Some("Hotkey capture cancelled".to_string()),
            CaptureOutcome::NeedsValidCombination => {
                Some("Press a valid key combination (Escape to cancel)".to_string())
            }
            _ => None,
        }
    }
}

/// Idle/Recording state machine yielding exactly one accelerator or a cancellation
pub struct HotkeyCapture<H: InputHooks> {
    state: CaptureState,
    hooks: H,
    click_guard: Duration,
}

impl<H: InputHooks> HotkeyCapture<H> {
    pub fn new(hooks: H, click_guard: Duration) -> Self {
        Self {
            state: CaptureState::Idle,
            hooks,
            click_guard,
        }
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn is_recording(&self) -> bool {
        self.state.is_recording()
    }

    pub fn hooks(&self) -> &H {
        &self.hooks
    }

    /// Start (or restart) a capture session now
    pub fn begin(&mut self) {
        self.begin_at(Instant::now());
    }

    /// Start a session at `now`. Restarting keeps the installed hooks.
    pub fn begin_at(&mut self, now: Instant) {
        if self.state.is_idle() {
            self.hooks.attach(&SESSION_HOOKS);
            tracing::debug!("Hotkey capture started");
        } else {
            tracing::debug!("Hotkey capture restarted");
        }
        self.state = CaptureState::Recording { started_at: now };
    }

    /// Feed a key press
    pub fn handle_key(&mut self, event: &KeyPress) -> CaptureOutcome {
        if self.state.is_idle() {
            return CaptureOutcome::Passthrough;
        }

        if event.is_escape() {
            self.finish();
            tracing::info!("Hotkey capture cancelled");
            return CaptureOutcome::Cancelled;
        }

        match keyboard_accelerator(event) {
            Some(token) => {
                self.finish();
                tracing::info!("Hotkey captured: {}", token);
                CaptureOutcome::Captured(token)
            }
            None => {
                tracing::debug!("Key {:?} ({:?}) is not a usable hotkey", event.key, event.code);
                CaptureOutcome::NeedsValidCombination
            }
        }
    }

    /// Feed a pointer press observed now
    pub fn handle_pointer(&mut self, event: &PointerPress) -> CaptureOutcome {
        self.handle_pointer_at(event, Instant::now())
    }

    /// Feed a pointer press observed at `now`
    pub fn handle_pointer_at(&mut self, event: &PointerPress, now: Instant) -> CaptureOutcome {
        let Some(elapsed) = self.state.elapsed_at(now) else {
            return CaptureOutcome::Passthrough;
        };

        // The click that opened the capture must not become the hotkey
        if elapsed < self.click_guard {
            tracing::trace!("Pointer press {}ms after capture start, ignoring", elapsed.as_millis());
            return CaptureOutcome::Ignored;
        }

        let token = pointer_accelerator(event);
        self.finish();
        tracing::info!("Hotkey captured: {}", token);
        CaptureOutcome::Captured(token)
    }

    /// Context menu requests are swallowed while recording
    pub fn handle_context_menu(&mut self) -> CaptureOutcome {
        if self.state.is_recording() {
            CaptureOutcome::Suppressed
        } else {
            CaptureOutcome::Passthrough
        }
    }

    /// Abort a session without delivering anything (e.g. shutdown)
    pub fn abort(&mut self) {
        if self.state.is_recording() {
            self.finish();
        }
    }

    fn finish(&mut self) {
        self.hooks.detach();
        self.state = CaptureState::Idle;
    }
}

impl<H: InputHooks> Drop for HotkeyCapture<H> {
    fn drop(&mut self) {
        if self.state.is_recording() {
            self.hooks.detach();
        }
    }
}
