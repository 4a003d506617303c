//! Global hotkey detection via evdev
//!
//! This module reads keyboard events directly from /dev/input/event* devices,
//! bypassing the display server's input isolation.
//!
//! # Requirements
//! - User must be in the `input` group: `sudo usermod -aG input $USER`
//! - Log out and back in after adding to group

mod detector;
pub mod dispatcher;
pub mod keys;
pub mod manager;

pub use dispatcher::{HotkeyBackend, HotkeyDispatcher};
pub use manager::{EvdevBinding, HotkeyManager, HotkeyStatus};

use evdev::Key;

use crate::recorder::{Modifier, COMBO_DELIMITER};

/// Combination used when nothing usable is saved
pub const DEFAULT_SHORTCUT: &str = "CommandOrControl+G";

/// A hotkey combination (modifiers + key)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Hotkey {
    pub ctrl: bool,
    pub alt: bool,
    pub shift: bool,
    pub meta: bool,
    pub key: Key,
}

/// Why a combination string could not be turned into a hotkey
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComboError {
    /// Nothing but delimiters
    Empty,
    /// A part that is neither a modifier nor a known key
    UnknownKey(String),
    /// Only modifiers
    MissingKey,
    /// More than one non-modifier key
    MultipleKeys(String, String),
}

impl std::fmt::Display for ComboError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ComboError::Empty => write!(f, "Combination is empty"),
            ComboError::UnknownKey(k) => write!(f, "Unknown key '{}'", k),
            ComboError::MissingKey => write!(f, "Combination has no non-modifier key"),
            ComboError::MultipleKeys(a, b) => {
                write!(f, "Combination has more than one key ('{}' and '{}')", a, b)
            }
        }
    }
}

impl std::error::Error for ComboError {}

impl Hotkey {
    /// Parse a combination string such as `"Control+Shift+G"`.
    ///
    /// Accepts the aliases `CommandOrControl`/`CmdOrCtrl`/`Ctrl` for Control
    /// and `Cmd`/`Meta`/`Super` for Command. Exactly one non-modifier key is
    /// required.
    pub fn parse(combo: &str) -> Result<Self, ComboError> {
        let parts: Vec<&str> = combo
            .split(COMBO_DELIMITER)
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect();
        if parts.is_empty() {
            return Err(ComboError::Empty);
        }

        let mut hotkey_mods = (false, false, false, false);
        let mut key: Option<(&str, Key)> = None;

        for part in parts {
            match modifier_alias(part) {
                Some(Modifier::Control) => hotkey_mods.0 = true,
                Some(Modifier::Alt) => hotkey_mods.1 = true,
                Some(Modifier::Shift) => hotkey_mods.2 = true,
                Some(Modifier::Command) => hotkey_mods.3 = true,
                None => {
                    let code = keys::key_from_name(part)
                        .ok_or_else(|| ComboError::UnknownKey(part.to_string()))?;
                    if let Some((first, _)) = key {
                        return Err(ComboError::MultipleKeys(first.to_string(), part.to_string()));
                    }
                    key = Some((part, code));
                }
            }
        }

        let (_, key) = key.ok_or(ComboError::MissingKey)?;
        let (ctrl, alt, shift, meta) = hotkey_mods;
        Ok(Self {
            ctrl,
            alt,
            shift,
            meta,
            key,
        })
    }
}

fn modifier_alias(part: &str) -> Option<Modifier> {
    match part {
        "CommandOrControl" | "CmdOrCtrl" | "Ctrl" => Some(Modifier::Control),
        "Cmd" | "Super" => Some(Modifier::Command),
        "Option" => Some(Modifier::Alt),
        other => Modifier::from_name(other),
    }
}

impl std::fmt::Display for Hotkey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut parts = Vec::new();
        if self.ctrl {
            parts.push(Modifier::Control.as_str());
        }
        if self.meta {
            parts.push(Modifier::Command.as_str());
        }
        if self.alt {
            parts.push(Modifier::Alt.as_str());
        }
        if self.shift {
            parts.push(Modifier::Shift.as_str());
        }
        parts.push(keys::canonical_name(self.key).unwrap_or("?"));
        write!(f, "{}", parts.join(COMBO_DELIMITER))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hotkey_display() {
        let hotkey = Hotkey::parse("Shift+Control+g").unwrap();
        assert_eq!(hotkey.to_string(), "Control+Shift+G");
    }

    #[test]
    fn default_shortcut_parses_to_control_g() {
        let hotkey = Hotkey::parse(DEFAULT_SHORTCUT).unwrap();
        assert!(hotkey.ctrl);
        assert!(!hotkey.meta);
        assert_eq!(hotkey.key, Key::KEY_G);
    }

    #[test]
    fn recorded_strings_round_trip() {
        for combo in ["Control+Command+Alt+Shift+F5", "Alt+Space", "Plus", "Command+Up"] {
            assert_eq!(Hotkey::parse(combo).unwrap().to_string(), combo);
        }
    }

    #[test]
    fn malformed_combinations_are_rejected() {
        assert_eq!(Hotkey::parse(""), Err(ComboError::Empty));
        assert_eq!(Hotkey::parse("+"), Err(ComboError::Empty));
        assert_eq!(Hotkey::parse("Control+Shift"), Err(ComboError::MissingKey));
        assert_eq!(
            Hotkey::parse("Control+Hyper"),
            Err(ComboError::UnknownKey("Hyper".to_string()))
        );
        assert_eq!(
            Hotkey::parse("Control+A+B"),
            Err(ComboError::MultipleKeys("A".to_string(), "B".to_string()))
        );
    }
}
