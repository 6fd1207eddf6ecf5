//! Accelerator normalization
//!
//! Turns one raw key-press or pointer-press into the canonical accelerator
//! string the backend registers, e.g. `Ctrl+Shift+V` or `Ctrl+MouseRight`.
//!
//! Modifiers always come first, in the fixed order Ctrl, Alt, Shift, Super,
//! followed by exactly one main key or button. A token made of modifiers
//! alone is never produced.

use crate::error::AcceleratorError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

/// Canonical modifier names, in emission order
pub const MODIFIER_NAMES: [&str; 4] = ["Ctrl", "Alt", "Shift", "Super"];

/// Logical key labels reported for a bare modifier press
const MODIFIER_KEY_LABELS: [&str; 6] = ["Control", "Shift", "Alt", "Meta", "AltGraph", "OS"];

/// Modifier flags carried by every raw input event
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub ctrl: bool,
    pub alt: bool,
    pub shift: bool,
    pub super_key: bool,
}

impl Modifiers {
    /// Parse a comma or plus separated modifier list ("ctrl,shift", "Ctrl+Alt")
    pub fn parse_list(list: &str) -> Result<Self, AcceleratorError> {
        let mut mods = Modifiers::default();
        for part in list.split([',', '+']).map(str::trim).filter(|p| !p.is_empty()) {
            mods.set(part)?;
        }
        Ok(mods)
    }

    fn set(&mut self, name: &str) -> Result<(), AcceleratorError> {
        match canonical_modifier(name) {
            Some("Ctrl") => self.ctrl = true,
            Some("Alt") => self.alt = true,
            Some("Shift") => self.shift = true,
            Some("Super") => self.super_key = true,
            _ => return Err(AcceleratorError::UnknownModifier(name.to_string())),
        }
        Ok(())
    }

    /// Active modifier names in canonical order
    pub fn names(&self) -> impl Iterator<Item = &'static str> {
        [self.ctrl, self.alt, self.shift, self.super_key]
            .into_iter()
            .zip(MODIFIER_NAMES)
            .filter_map(|(on, name)| on.then_some(name))
    }

    pub fn is_empty(&self) -> bool {
        !(self.ctrl || self.alt || self.shift || self.super_key)
    }
}

fn canonical_modifier(name: &str) -> Option<&'static str> {
    match name.to_ascii_lowercase().as_str() {
        "ctrl" | "control" => Some("Ctrl"),
        "alt" | "option" => Some("Alt"),
        "shift" => Some("Shift"),
        "super" | "meta" | "cmd" | "command" | "win" => Some("Super"),
        _ => None,
    }
}

/// A raw key-press event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPress {
    pub modifiers: Modifiers,
    /// Physical position code, e.g. `KeyV`, `Digit3`, `Space`
    pub code: String,
    /// Logical key label, e.g. `v`, `V`, `F5`, `ArrowUp`, `Control`
    pub key: String,
}

impl KeyPress {
    pub fn new(modifiers: Modifiers, code: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            modifiers,
            code: code.into(),
            key: key.into(),
        }
    }

    /// True when the logical key is itself a modifier (Control, Shift, ...)
    pub fn is_bare_modifier(&self) -> bool {
        MODIFIER_KEY_LABELS.contains(&self.key.as_str())
    }

    pub fn is_escape(&self) -> bool {
        self.key == "Escape" || self.key == "Esc"
    }
}

/// A raw pointer-press event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointerPress {
    pub modifiers: Modifiers,
    /// Button index: 0 left, 1 middle, 2 right, 3 back, 4 forward
    pub button: u16,
}

impl PointerPress {
    pub fn new(modifiers: Modifiers, button: u16) -> Self {
        Self { modifiers, button }
    }
}

fn function_key_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[Ff]\d{1,2}$").expect("static regex is valid"))
}

fn named_key(key: &str) -> Option<&'static str> {
    let name = match key {
        " " | "Spacebar" => "Space",
        "Escape" => "Esc",
        "Enter" => "Enter",
        "Tab" => "Tab",
        "Backspace" => "Backspace",
        "Delete" => "Delete",
        "Insert" => "Insert",
        "Home" => "Home",
        "End" => "End",
        "PageUp" => "PageUp",
        "PageDown" => "PageDown",
        "ArrowUp" => "Up",
        "ArrowDown" => "Down",
        "ArrowLeft" => "Left",
        "ArrowRight" => "Right",
        _ => return None,
    };
    Some(name)
}

/// Map a key-press to its main token, or `None` when it carries no usable main key
pub fn normalize_key(event: &KeyPress) -> Option<String> {
    let code = event.code.as_str();
    let key = event.key.as_str();

    if let Some(letter) = code.strip_prefix("Key") {
        if letter.len() == 1 && letter.chars().all(|c| c.is_ascii_alphabetic()) {
            return Some(letter.to_ascii_uppercase());
        }
    }

    if let Some(digit) = code.strip_prefix("Digit") {
        if digit.len() == 1 && digit.chars().all(|c| c.is_ascii_digit()) {
            return Some(digit.to_string());
        }
    }

    if function_key_pattern().is_match(key) {
        return Some(key.to_ascii_uppercase());
    }

    if let Some(name) = named_key(key) {
        return Some(name.to_string());
    }

    let mut chars = key.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if !c.is_control() => Some(c.to_uppercase().collect()),
        _ => None,
    }
}

/// Map a pointer button index to its main token. Never rejects.
pub fn normalize_pointer(event: &PointerPress) -> String {
    match event.button {
        0 => "MouseLeft".to_string(),
        1 => "MouseMiddle".to_string(),
        2 => "MouseRight".to_string(),
        3 => "MouseBack".to_string(),
        4 => "MouseForward".to_string(),
        n => format!("Mouse{}", n),
    }
}

/// Join active modifiers and the main token into a canonical accelerator
///
/// Returns `None` when the main token is itself a modifier name.
pub fn build_accelerator(modifiers: &Modifiers, main: &str) -> Option<AcceleratorToken> {
    if main.is_empty() || MODIFIER_NAMES.contains(&main) {
        return None;
    }
    let mut parts: Vec<&str> = modifiers.names().collect();
    parts.push(main);
    Some(AcceleratorToken(parts.join("+")))
}

/// Full keyboard path: bare-modifier check, normalizer, builder
pub fn keyboard_accelerator(event: &KeyPress) -> Option<AcceleratorToken> {
    if event.is_bare_modifier() {
        return None;
    }
    let main = normalize_key(event)?;
    build_accelerator(&event.modifiers, &main)
}

/// Full pointer path. Pointer buttons always produce a token.
pub fn pointer_accelerator(event: &PointerPress) -> AcceleratorToken {
    let main = normalize_pointer(event);
    let mut parts: Vec<&str> = event.modifiers.names().collect();
    parts.push(&main);
    AcceleratorToken(parts.join("+"))
}

/// Canonical accelerator string
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AcceleratorToken(String);

impl AcceleratorToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The main key or button (last component)
    pub fn main_key(&self) -> &str {
        split_main(&self.0).1
    }

    pub fn modifiers(&self) -> Modifiers {
        let mut mods = Modifiers::default();
        let (leading, _) = split_main(&self.0);
        for part in leading.split('+').filter(|p| !p.is_empty()) {
            // Components were validated on construction
            let _ = mods.set(part);
        }
        mods
    }

    /// Whether the main component is a pointer button
    pub fn is_mouse(&self) -> bool {
        match self.main_key().strip_prefix("Mouse") {
            Some("Left" | "Middle" | "Right" | "Back" | "Forward") => true,
            Some(index) => !index.is_empty() && index.chars().all(|c| c.is_ascii_digit()),
            None => false,
        }
    }
}

impl Default for AcceleratorToken {
    fn default() -> Self {
        AcceleratorToken("Ctrl+Shift+V".to_string())
    }
}

impl fmt::Display for AcceleratorToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Split an accelerator into its modifier prefix and main component.
///
/// A trailing `++` (or a lone `+`) means the main key is `+` itself.
fn split_main(s: &str) -> (&str, &str) {
    if let Some(rest) = s.strip_suffix('+') {
        if rest.is_empty() {
            return ("", "+");
        }
        if let Some(leading) = rest.strip_suffix('+') {
            return (leading, "+");
        }
    }
    s.rsplit_once('+').unwrap_or(("", s))
}

const CANONICAL_NAMED_KEYS: [&str; 15] = [
    "Space", "Esc", "Enter", "Tab", "Backspace", "Delete", "Insert", "Home", "End", "PageUp",
    "PageDown", "Up", "Down", "Left", "Right",
];

/// Spell a user-typed main component the way the builder would
fn canonical_main(main: &str) -> String {
    let mut chars = main.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        return c.to_uppercase().collect();
    }
    if function_key_pattern().is_match(main) {
        return main.to_ascii_uppercase();
    }
    if let Some(name) = named_key(main) {
        return name.to_string();
    }

    let lower = main.to_ascii_lowercase();
    if let Some(button) = lower.strip_prefix("mouse") {
        let index = match button {
            "left" => Some(0),
            "middle" => Some(1),
            "right" => Some(2),
            "back" => Some(3),
            "forward" => Some(4),
            digits => digits.parse::<u16>().ok(),
        };
        if let Some(index) = index {
            return normalize_pointer(&PointerPress::new(Modifiers::default(), index));
        }
    }

    CANONICAL_NAMED_KEYS
        .iter()
        .find(|name| name.eq_ignore_ascii_case(main))
        .map(|name| name.to_string())
        .unwrap_or_else(|| main.to_string())
}

impl FromStr for AcceleratorToken {
    type Err = AcceleratorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(AcceleratorError::Empty);
        }
        let (leading, main) = split_main(s);
        let main = main.trim();
        if main.is_empty() || canonical_modifier(main).is_some() {
            return Err(AcceleratorError::MissingMainKey(s.to_string()));
        }

        let mut mods = Modifiers::default();
        if !leading.is_empty() {
            for part in leading.split('+') {
                mods.set(part.trim())?;
            }
        }
        build_accelerator(&mods, &canonical_main(main))
            .ok_or_else(|| AcceleratorError::MissingMainKey(s.to_string()))
    }
}

impl TryFrom<String> for AcceleratorToken {
    type Error = AcceleratorError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<AcceleratorToken> for String {
    fn from(token: AcceleratorToken) -> Self {
        token.0
    }
}
