//! Message contracts between the core and the preferences UI
//!
//! Commands arrive as JSON objects such as
//! `{"command": "set-shortcut", "value": "Control+Shift+G"}`; messages go out as
//! `{"channel": "shortcut-recorded", "payload": "Control+Shift+G"}`. The binary
//! carries both as JSON lines over stdin/stdout.

use serde::{Deserialize, Serialize};

use crate::settings::{AppSettings, OverlaySize};

/// Requests from the preferences UI
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", content = "value", rename_all = "kebab-case")]
pub enum Command {
    StartRecording,
    StopRecording,
    SetShortcut(String),
    SetRateLimit(bool),
    SetPingDelay(bool),
    SetSize(OverlaySize),
    SetVolume(f32),
    GetSettings,
    /// The preferences surface went away; any recording in progress is abandoned
    ClosePreferences,
}

/// Messages sent outward to visual surfaces
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "channel", content = "payload", rename_all = "kebab-case")]
pub enum UiMessage {
    /// Live combination while recording
    ShortcutRecording(String),
    /// Combination committed when recording stopped
    ShortcutRecorded(String),
    ShowWarning,
    /// Result of a registration attempt; `shortcut` is the one now active
    ShortcutChanged { shortcut: String, registered: bool },
    Settings(AppSettings),
    FirstLaunch,
}

/// Parse one line of input. Blank lines yield `Ok(None)`.
pub fn parse_command(line: &str) -> Result<Option<Command>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    serde_json::from_str(line)
        .map(Some)
        .map_err(|e| format!("Invalid command {:?}: {}", line, e))
}

pub fn encode_message(message: &UiMessage) -> Result<String, String> {
    serde_json::to_string(message).map_err(|e| format!("Serialize UI message: {}", e))
}
