//! Key naming between evdev codes and combination strings
//!
//! Raw names follow the conventions the recorder normalizes (`"Control"`,
//! `"ArrowUp"`, `" "`, `"g"`); canonical names are what appears inside a
//! combination string (`"Up"`, `"Space"`, `"G"`).

use evdev::Key;

use crate::recorder::Modifier;

/// Modifier keys and the raw name they report
const MODIFIER_KEYS: &[(Key, &str)] = &[
    (Key::KEY_LEFTCTRL, "Control"),
    (Key::KEY_RIGHTCTRL, "Control"),
    (Key::KEY_LEFTMETA, "Meta"),
    (Key::KEY_RIGHTMETA, "Meta"),
    (Key::KEY_LEFTALT, "Alt"),
    (Key::KEY_RIGHTALT, "Alt"),
    (Key::KEY_LEFTSHIFT, "Shift"),
    (Key::KEY_RIGHTSHIFT, "Shift"),
];

/// Non-modifier keys: (code, raw name, canonical name)
const KEY_NAMES: &[(Key, &str, &str)] = &[
    (Key::KEY_A, "a", "A"),
    (Key::KEY_B, "b", "B"),
    (Key::KEY_C, "c", "C"),
    (Key::KEY_D, "d", "D"),
    (Key::KEY_E, "e", "E"),
    (Key::KEY_F, "f", "F"),
    (Key::KEY_G, "g", "G"),
    (Key::KEY_H, "h", "H"),
    (Key::KEY_I, "i", "I"),
    (Key::KEY_J, "j", "J"),
    (Key::KEY_K, "k", "K"),
    (Key::KEY_L, "l", "L"),
    (Key::KEY_M, "m", "M"),
    (Key::KEY_N, "n", "N"),
    (Key::KEY_O, "o", "O"),
    (Key::KEY_P, "p", "P"),
    (Key::KEY_Q, "q", "Q"),
    (Key::KEY_R, "r", "R"),
    (Key::KEY_S, "s", "S"),
    (Key::KEY_T, "t", "T"),
    (Key::KEY_U, "u", "U"),
    (Key::KEY_V, "v", "V"),
    (Key::KEY_W, "w", "W"),
    (Key::KEY_X, "x", "X"),
    (Key::KEY_Y, "y", "Y"),
    (Key::KEY_Z, "z", "Z"),
    (Key::KEY_1, "1", "1"),
    (Key::KEY_2, "2", "2"),
    (Key::KEY_3, "3", "3"),
    (Key::KEY_4, "4", "4"),
    (Key::KEY_5, "5", "5"),
    (Key::KEY_6, "6", "6"),
    (Key::KEY_7, "7", "7"),
    (Key::KEY_8, "8", "8"),
    (Key::KEY_9, "9", "9"),
    (Key::KEY_0, "0", "0"),
    (Key::KEY_F1, "F1", "F1"),
    (Key::KEY_F2, "F2", "F2"),
    (Key::KEY_F3, "F3", "F3"),
    (Key::KEY_F4, "F4", "F4"),
    (Key::KEY_F5, "F5", "F5"),
    (Key::KEY_F6, "F6", "F6"),
    (Key::KEY_F7, "F7", "F7"),
    (Key::KEY_F8, "F8", "F8"),
    (Key::KEY_F9, "F9", "F9"),
    (Key::KEY_F10, "F10", "F10"),
    (Key::KEY_F11, "F11", "F11"),
    (Key::KEY_F12, "F12", "F12"),
    (Key::KEY_SPACE, " ", "Space"),
    (Key::KEY_KPPLUS, "+", "Plus"),
    (Key::KEY_ENTER, "Enter", "Enter"),
    (Key::KEY_TAB, "Tab", "Tab"),
    (Key::KEY_ESC, "Escape", "Escape"),
    (Key::KEY_BACKSPACE, "Backspace", "Backspace"),
    (Key::KEY_DELETE, "Delete", "Delete"),
    (Key::KEY_INSERT, "Insert", "Insert"),
    (Key::KEY_HOME, "Home", "Home"),
    (Key::KEY_END, "End", "End"),
    (Key::KEY_PAGEUP, "PageUp", "PageUp"),
    (Key::KEY_PAGEDOWN, "PageDown", "PageDown"),
    (Key::KEY_UP, "ArrowUp", "Up"),
    (Key::KEY_DOWN, "ArrowDown", "Down"),
    (Key::KEY_LEFT, "ArrowLeft", "Left"),
    (Key::KEY_RIGHT, "ArrowRight", "Right"),
    (Key::KEY_MUTE, "AudioVolumeMute", "Mute"),
    (Key::KEY_VOLUMEUP, "AudioVolumeUp", "VolumeUp"),
    (Key::KEY_VOLUMEDOWN, "AudioVolumeDown", "VolumeDown"),
    (Key::KEY_PLAYPAUSE, "MediaPlayPause", "MediaPlayPause"),
    (Key::KEY_MINUS, "-", "-"),
    (Key::KEY_EQUAL, "=", "="),
    (Key::KEY_COMMA, ",", ","),
    (Key::KEY_DOT, ".", "."),
    (Key::KEY_SLASH, "/", "/"),
    (Key::KEY_SEMICOLON, ";", ";"),
    (Key::KEY_APOSTROPHE, "'", "'"),
    (Key::KEY_LEFTBRACE, "[", "["),
    (Key::KEY_RIGHTBRACE, "]", "]"),
    (Key::KEY_BACKSLASH, "\\", "\\"),
    (Key::KEY_GRAVE, "`", "`"),
];

/// Raw name for an evdev key, if it is one we name
pub fn raw_name(key: Key) -> Option<&'static str> {
    MODIFIER_KEYS
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, name)| *name)
        .or_else(|| {
            KEY_NAMES
                .iter()
                .find(|(k, _, _)| *k == key)
                .map(|(_, raw, _)| *raw)
        })
}

/// Which modifier a physical key belongs to (either side counts)
pub fn modifier(key: Key) -> Option<Modifier> {
    MODIFIER_KEYS
        .iter()
        .find(|(k, _)| *k == key)
        .and_then(|(_, name)| Modifier::from_name(name))
}

/// Canonical combination name for a non-modifier key
pub fn canonical_name(key: Key) -> Option<&'static str> {
    KEY_NAMES
        .iter()
        .find(|(k, _, _)| *k == key)
        .map(|(_, _, name)| *name)
}

/// evdev key for a canonical name. Letters are matched case-insensitively
/// and a few common aliases are accepted.
pub fn key_from_name(name: &str) -> Option<Key> {
    let name = match name {
        "Return" => "Enter",
        "Esc" => "Escape",
        "Del" => "Delete",
        "ArrowUp" => "Up",
        "ArrowDown" => "Down",
        "ArrowLeft" => "Left",
        "ArrowRight" => "Right",
        other => other,
    };
    KEY_NAMES
        .iter()
        .find(|(_, _, canonical)| canonical.eq_ignore_ascii_case(name))
        .map(|(key, _, _)| *key)
}
