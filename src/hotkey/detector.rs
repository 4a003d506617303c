//! Matches the bound combination against the raw evdev key stream

use std::collections::HashSet;

use evdev::Key;

use super::{keys, Hotkey};
use crate::recorder::Modifier;

/// Physical modifier keys currently held down
#[derive(Debug, Default)]
pub struct ModifierState {
    held: HashSet<Key>,
}

impl ModifierState {
    /// Track a press or release. Non-modifier keys are ignored.
    pub fn update(&mut self, key: Key, pressed: bool) {
        if keys::modifier(key).is_none() {
            return;
        }
        if pressed {
            self.held.insert(key);
        } else {
            self.held.remove(&key);
        }
    }

    /// True while either side of `modifier` is down
    pub fn is_held(&self, modifier: Modifier) -> bool {
        self.held
            .iter()
            .any(|key| keys::modifier(*key) == Some(modifier))
    }

    /// The combination that pressing `key` right now would produce
    fn chord(&self, key: Key) -> Hotkey {
        Hotkey {
            ctrl: self.is_held(Modifier::Control),
            alt: self.is_held(Modifier::Alt),
            shift: self.is_held(Modifier::Shift),
            meta: self.is_held(Modifier::Command),
            key,
        }
    }
}

pub struct HotkeyDetector {
    modifiers: ModifierState,
    bound: Option<Hotkey>,
}

impl HotkeyDetector {
    pub fn new(bound: Option<Hotkey>) -> Self {
        Self {
            modifiers: ModifierState::default(),
            bound,
        }
    }

    /// Replace the combination being watched (`None` = nothing bound)
    pub fn rebind(&mut self, bound: Option<Hotkey>) {
        self.bound = bound;
    }

    /// Feed one evdev key event (`value`: 0 release, 1 press, 2 repeat).
    /// Returns the bound hotkey when this press completes it exactly.
    pub fn process_key(&mut self, key: Key, value: i32) -> Option<Hotkey> {
        // A held key auto-repeats; a repeat leaves its state unchanged
        if value == 2 {
            return None;
        }
        let pressed = value == 1;
        self.modifiers.update(key, pressed);

        if !pressed || keys::modifier(key).is_some() {
            return None;
        }

        let chord = self.modifiers.chord(key);
        self.bound.as_ref().filter(|bound| **bound == chord).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn control_g() -> Hotkey {
        Hotkey::parse("Control+G").unwrap()
    }

    #[test]
    fn press_completes_bound_combination() {
        let mut detector = HotkeyDetector::new(Some(control_g()));

        assert!(detector.process_key(Key::KEY_LEFTCTRL, 1).is_none());
        assert_eq!(detector.process_key(Key::KEY_G, 1), Some(control_g()));
        assert!(detector.process_key(Key::KEY_G, 0).is_none());
        assert!(detector.process_key(Key::KEY_G, 2).is_none());
    }

    #[test]
    fn extra_or_missing_modifiers_do_not_match() {
        let mut detector = HotkeyDetector::new(Some(control_g()));
        assert!(detector.process_key(Key::KEY_G, 1).is_none());

        detector.process_key(Key::KEY_LEFTCTRL, 1);
        detector.process_key(Key::KEY_RIGHTSHIFT, 1);
        assert!(detector.process_key(Key::KEY_G, 1).is_none());
    }

    #[test]
    fn either_side_counts_until_both_are_released() {
        let mut detector = HotkeyDetector::new(Some(control_g()));

        detector.process_key(Key::KEY_LEFTCTRL, 1);
        detector.process_key(Key::KEY_RIGHTCTRL, 1);
        detector.process_key(Key::KEY_LEFTCTRL, 0);
        assert!(detector.process_key(Key::KEY_G, 1).is_some());

        detector.process_key(Key::KEY_RIGHTCTRL, 0);
        assert!(detector.process_key(Key::KEY_G, 1).is_none());
    }

    #[test]
    fn modifier_stays_held_through_its_auto_repeat() {
        let mut detector = HotkeyDetector::new(Some(control_g()));

        detector.process_key(Key::KEY_LEFTCTRL, 1);
        detector.process_key(Key::KEY_LEFTCTRL, 2);
        detector.process_key(Key::KEY_LEFTCTRL, 2);
        assert_eq!(detector.process_key(Key::KEY_G, 1), Some(control_g()));

        detector.process_key(Key::KEY_LEFTCTRL, 0);
        assert!(detector.process_key(Key::KEY_G, 1).is_none());
    }

    #[test]
    fn meta_maps_to_command() {
        let command_up = Hotkey::parse("Command+Up").unwrap();
        let mut detector = HotkeyDetector::new(Some(command_up.clone()));

        detector.process_key(Key::KEY_RIGHTMETA, 1);
        assert_eq!(detector.process_key(Key::KEY_UP, 1), Some(command_up));
    }

    #[test]
    fn rebinding_switches_the_watched_combination() {
        let mut detector = HotkeyDetector::new(Some(control_g()));
        detector.rebind(None);

        detector.process_key(Key::KEY_LEFTCTRL, 1);
        assert!(detector.process_key(Key::KEY_G, 1).is_none());

        detector.rebind(Some(Hotkey::parse("Control+H").unwrap()));
        assert!(detector.process_key(Key::KEY_H, 1).is_some());
    }
}
