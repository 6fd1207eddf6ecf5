//! Line-oriented control surface
//!
//! The daemon reads one command per line on stdin. Settings commands only
//! edit the local buffer; the reconciler pushes them after the debounce.
//!
//! ```text
//! input <device-id|->         bridge <device-id|->
//! mode ptt|toggle|hybrid      hotkey <accelerator>
//! startup on|off              tray on|off
//! capture                     press <code> <key> [mods]
//! click <button> [mods]       menu
//! gate open|close|toggle      trigger down|up
//! reinit    reload    status    quit
//! ```

use crate::accelerator::{AcceleratorToken, KeyPress, Modifiers, PointerPress};
use crate::config::GateMode;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlCommand {
    /// Select the physical input ("" clears)
    SetInput(String),
    /// Select the bridge output ("" clears)
    SetBridge(String),
    SetMode(GateMode),
    SetHotkey(AcceleratorToken),
    SetLaunchOnStartup(bool),
    SetMinimizeToTray(bool),
    /// Start (or restart) hotkey capture
    Capture,
    Key(KeyPress),
    Pointer(PointerPress),
    ContextMenu,
    Gate(GateAction),
    /// Global hotkey went down (`true`) or up
    Trigger(bool),
    Reinitialize,
    /// Re-read the confirmed settings from the backend
    Reload,
    Status,
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateAction {
    Open,
    Close,
    Toggle,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ControlError {
    #[error("Unknown command '{0}' (try: input, bridge, mode, hotkey, capture, reinit, reload, status, quit)")]
    Unknown(String),

    #[error("Usage: {0}")]
    Usage(&'static str),

    #[error("{0}")]
    Invalid(String),
}

/// Parse one control line. Blank lines and `#` comments yield None.
pub fn parse_line(line: &str) -> Result<Option<ControlCommand>, ControlError> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let mut words = line.split_whitespace();
    let verb = words.next().unwrap_or_default().to_ascii_lowercase();
    let args: Vec<&str> = words.collect();

    let command = match verb.as_str() {
        "input" => ControlCommand::SetInput(device_arg(&args, "input <device-id|->")?),
        "bridge" => ControlCommand::SetBridge(device_arg(&args, "bridge <device-id|->")?),
        "mode" => {
            let [mode] = args[..] else {
                return Err(ControlError::Usage("mode ptt|toggle|hybrid"));
            };
            ControlCommand::SetMode(mode.parse().map_err(ControlError::Invalid)?)
        }
        "hotkey" => {
            let [accel] = args[..] else {
                return Err(ControlError::Usage("hotkey <accelerator>"));
            };
            let token = accel
                .parse::<AcceleratorToken>()
                .map_err(|e| ControlError::Invalid(e.to_string()))?;
            ControlCommand::SetHotkey(token)
        }
        "startup" => ControlCommand::SetLaunchOnStartup(switch_arg(&args, "startup on|off")?),
        "tray" => ControlCommand::SetMinimizeToTray(switch_arg(&args, "tray on|off")?),
        "capture" => ControlCommand::Capture,
        "press" => {
            let (code, key, mods) = match args[..] {
                [code, key] => (code, key, None),
                [code, key, mods] => (code, key, Some(mods)),
                _ => return Err(ControlError::Usage("press <code> <key> [ctrl+alt+shift+super]")),
            };
            // Space can't be typed as a bare word
            let key = if key.eq_ignore_ascii_case("space") { " " } else { key };
            ControlCommand::Key(KeyPress::new(modifiers_arg(mods)?, code, key))
        }
        "click" => {
            let (button, mods) = match args[..] {
                [button] => (button, None),
                [button, mods] => (button, Some(mods)),
                _ => return Err(ControlError::Usage("click <button> [ctrl+alt+shift+super]")),
            };
            let button = button
                .parse::<u16>()
                .map_err(|_| ControlError::Invalid(format!("'{}' is not a button index", button)))?;
            ControlCommand::Pointer(PointerPress::new(modifiers_arg(mods)?, button))
        }
        "menu" => ControlCommand::ContextMenu,
        "gate" => {
            let action = match args[..] {
                ["open"] => GateAction::Open,
                ["close"] => GateAction::Close,
                ["toggle"] => GateAction::Toggle,
                _ => return Err(ControlError::Usage("gate open|close|toggle")),
            };
            ControlCommand::Gate(action)
        }
        "trigger" => match args[..] {
            ["down"] => ControlCommand::Trigger(true),
            ["up"] => ControlCommand::Trigger(false),
            _ => return Err(ControlError::Usage("trigger down|up")),
        },
        "reinit" | "reinitialize" => ControlCommand::Reinitialize,
        "reload" => ControlCommand::Reload,
        "status" => ControlCommand::Status,
        "quit" | "exit" => ControlCommand::Quit,
        other => return Err(ControlError::Unknown(other.to_string())),
    };

    Ok(Some(command))
}

fn device_arg(args: &[&str], usage: &'static str) -> Result<String, ControlError> {
    match args {
        ["-"] => Ok(String::new()),
        [id] => Ok(id.to_string()),
        _ => Err(ControlError::Usage(usage)),
    }
}

fn switch_arg(args: &[&str], usage: &'static str) -> Result<bool, ControlError> {
    match args {
        [value] => match value.to_ascii_lowercase().as_str() {
            "on" | "true" | "yes" | "1" => Ok(true),
            "off" | "false" | "no" | "0" => Ok(false),
            _ => Err(ControlError::Usage(usage)),
        },
        _ => Err(ControlError::Usage(usage)),
    }
}

fn modifiers_arg(mods: Option<&str>) -> Result<Modifiers, ControlError> {
    match mods {
        Some(list) => Modifiers::parse_list(list).map_err(|e| ControlError::Invalid(e.to_string())),
        None => Ok(Modifiers::default()),
    }
}
