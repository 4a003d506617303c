//! Key-combination recorder
//!
//! While recording, raw key-down events are normalized and toggled into a
//! modifier set and a key list. The canonical combination string is the
//! modifiers in fixed order followed by the keys in press order, joined
//! with `+`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Delimiter between parts of a combination string
pub const COMBO_DELIMITER: &str = "+";

/// Raw key transition from the key source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyEventKind {
    Down,
    Up,
}

/// A raw key event, named the way the key source reports it
/// (e.g. `"Control"`, `"ArrowUp"`, `" "`, `"g"`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawKeyEvent {
    pub kind: KeyEventKind,
    pub key: String,
}

impl RawKeyEvent {
    pub fn down(key: impl Into<String>) -> Self {
        Self {
            kind: KeyEventKind::Down,
            key: key.into(),
        }
    }

    pub fn up(key: impl Into<String>) -> Self {
        Self {
            kind: KeyEventKind::Up,
            key: key.into(),
        }
    }
}

/// The four modifier identities, in display order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Modifier {
    Control,
    Command,
    Alt,
    Shift,
}

impl Modifier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Modifier::Control => "Control",
            Modifier::Command => "Command",
            Modifier::Alt => "Alt",
            Modifier::Shift => "Shift",
        }
    }

    /// Match a normalized or raw key name against the modifier identities
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "Control" => Some(Modifier::Control),
            "Command" | "Meta" => Some(Modifier::Command),
            "Alt" => Some(Modifier::Alt),
            "Shift" => Some(Modifier::Shift),
            _ => None,
        }
    }
}

/// Map a raw key name to its combination label
pub fn normalize_key(raw: &str) -> String {
    let converted = match raw {
        " " => "Space",
        "+" => "Plus",
        "ArrowUp" => "Up",
        "ArrowDown" => "Down",
        "ArrowLeft" => "Left",
        "ArrowRight" => "Right",
        "AudioVolumeMute" => "Mute",
        "AudioVolumeUp" => "VolumeUp",
        "AudioVolumeDown" => "VolumeDown",
        "MediaPlayPause" => "MediaPlayPause",
        _ => {
            let mut chars = raw.chars();
            return match (chars.next(), chars.next()) {
                (Some(c), None) => c.to_uppercase().collect(),
                _ => raw.to_string(),
            };
        }
    };
    converted.to_string()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RecorderState {
    #[default]
    Idle,
    Recording,
}

#[derive(Debug, Default)]
pub struct ComboRecorder {
    state: RecorderState,
    modifiers: BTreeSet<Modifier>,
    /// Non-modifier keys in press order, each at most once
    keys: Vec<String>,
}

impl ComboRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> RecorderState {
        self.state
    }

    pub fn is_recording(&self) -> bool {
        self.state == RecorderState::Recording
    }

    /// Enter recording mode. Restarting while already recording just
    /// clears what was accumulated so far.
    pub fn start(&mut self) {
        if self.is_recording() {
            log::debug!("Recorder restarted, discarding '{}'", self.current());
        }
        self.clear();
        self.state = RecorderState::Recording;
    }

    /// Feed one raw key event.
    ///
    /// Returns the live combination string when the event was consumed
    /// (recording and key-down), `None` otherwise.
    pub fn handle_key(&mut self, event: &RawKeyEvent) -> Option<String> {
        if !self.is_recording() || event.kind != KeyEventKind::Down {
            return None;
        }

        let key = normalize_key(&event.key);
        let modifier = Modifier::from_name(&key).or_else(|| Modifier::from_name(&event.key));

        match modifier {
            Some(modifier) => {
                if !self.modifiers.remove(&modifier) {
                    self.modifiers.insert(modifier);
                }
            }
            None => {
                if let Some(pos) = self.keys.iter().position(|k| *k == key) {
                    self.keys.remove(pos);
                } else {
                    self.keys.push(key);
                }
            }
        }

        Some(self.current())
    }

    /// Leave recording mode and return the committed combination.
    /// Returns `None` when no recording was active.
    pub fn stop(&mut self) -> Option<String> {
        if !self.is_recording() {
            return None;
        }
        let combo = self.current();
        self.clear();
        self.state = RecorderState::Idle;
        Some(combo)
    }

    /// Leave recording mode without committing anything
    pub fn abort(&mut self) -> bool {
        let was_recording = self.is_recording();
        self.clear();
        self.state = RecorderState::Idle;
        was_recording
    }

    /// The combination accumulated so far
    pub fn current(&self) -> String {
        self.modifiers
            .iter()
            .map(|m| m.as_str())
            .chain(self.keys.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(COMBO_DELIMITER)
    }

    fn clear(&mut self) {
        self.modifiers.clear();
        self.keys.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(recorder: &mut ComboRecorder, key: &str) -> Option<String> {
        recorder.handle_key(&RawKeyEvent::down(key))
    }

    #[test]
    fn records_control_shift_g() {
        let mut recorder = ComboRecorder::new();
        recorder.start();

        assert_eq!(press(&mut recorder, "Control").as_deref(), Some("Control"));
        assert_eq!(press(&mut recorder, "Shift").as_deref(), Some("Control+Shift"));
        assert_eq!(press(&mut recorder, "g").as_deref(), Some("Control+Shift+G"));

        for key in ["g", "Shift", "Control"] {
            assert!(recorder.handle_key(&RawKeyEvent::up(key)).is_none());
        }

        assert_eq!(recorder.stop().as_deref(), Some("Control+Shift+G"));
        assert_eq!(recorder.state(), RecorderState::Idle);
        assert_eq!(recorder.current(), "");
    }

    #[test]
    fn pressing_modifier_twice_removes_it() {
        let mut recorder = ComboRecorder::new();
        recorder.start();

        press(&mut recorder, "Control");
        press(&mut recorder, "Alt");
        press(&mut recorder, "Control");
        press(&mut recorder, "k");

        assert_eq!(recorder.stop().as_deref(), Some("Alt+K"));
    }

    #[test]
    fn pressing_key_twice_removes_it() {
        let mut recorder = ComboRecorder::new();
        recorder.start();

        press(&mut recorder, "a");
        press(&mut recorder, "b");
        press(&mut recorder, "A");

        assert_eq!(recorder.current(), "B");
    }

    #[test]
    fn modifiers_use_fixed_order_and_keys_keep_press_order() {
        let mut recorder = ComboRecorder::new();
        recorder.start();

        for key in ["Shift", "x", "Meta", "ArrowUp", "Alt", "Control"] {
            press(&mut recorder, key);
        }

        assert_eq!(recorder.current(), "Control+Command+Alt+Shift+X+Up");
    }

    #[test]
    fn normalizes_special_keys() {
        assert_eq!(normalize_key(" "), "Space");
        assert_eq!(normalize_key("+"), "Plus");
        assert_eq!(normalize_key("ArrowLeft"), "Left");
        assert_eq!(normalize_key("AudioVolumeMute"), "Mute");
        assert_eq!(normalize_key("AudioVolumeUp"), "VolumeUp");
        assert_eq!(normalize_key("MediaPlayPause"), "MediaPlayPause");
        assert_eq!(normalize_key("q"), "Q");
        assert_eq!(normalize_key("7"), "7");
        assert_eq!(normalize_key("F5"), "F5");
        assert_eq!(normalize_key("Enter"), "Enter");
    }

    #[test]
    fn command_is_matched_by_raw_meta_and_command() {
        let mut recorder = ComboRecorder::new();
        recorder.start();
        press(&mut recorder, "Meta");
        assert_eq!(recorder.current(), "Command");
        press(&mut recorder, "Command");
        assert_eq!(recorder.current(), "");
    }

    #[test]
    fn idle_recorder_ignores_events() {
        let mut recorder = ComboRecorder::new();
        assert!(press(&mut recorder, "Control").is_none());
        assert!(recorder.stop().is_none());
        assert_eq!(recorder.current(), "");
    }

    #[test]
    fn restart_while_recording_resets_accumulated_keys() {
        let mut recorder = ComboRecorder::new();
        recorder.start();
        press(&mut recorder, "Control");
        press(&mut recorder, "z");

        recorder.start();
        assert!(recorder.is_recording());
        assert_eq!(recorder.current(), "");

        press(&mut recorder, "Alt");
        assert_eq!(recorder.stop().as_deref(), Some("Alt"));
    }

    #[test]
    fn abort_discards_without_commit() {
        let mut recorder = ComboRecorder::new();
        recorder.start();
        press(&mut recorder, "Shift");

        assert!(recorder.abort());
        assert!(!recorder.is_recording());
        assert!(recorder.stop().is_none());
        assert!(!recorder.abort());
    }
}
