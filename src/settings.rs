use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::hotkey::DEFAULT_SHORTCUT;

const SETTINGS_DIR_NAME: &str = "cursor-ping";
const SETTINGS_FILE_NAME: &str = "settings.json";

/// Overlay size preference, forwarded to the overlay renderer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverlaySize {
    #[default]
    Small,
    Medium,
    Large,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AppSettings {
    /// Global trigger combination
    pub shortcut: String,

    /// Ping sound volume, 0.0 to 1.0
    pub volume: f32,

    pub size: OverlaySize,

    /// Suppress pings that follow the previous one within 300 ms
    pub ping_delay: bool,

    /// Lock out pinging after 6 pings in 5 seconds
    pub rate_limit: bool,

    /// Set once the first-launch welcome has been shown
    pub has_launched: bool,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            shortcut: DEFAULT_SHORTCUT.to_string(),
            volume: 0.5,
            size: OverlaySize::Small,
            ping_delay: false,
            rate_limit: false,
            has_launched: false,
        }
    }
}

/// One settings key with its new value
#[derive(Debug, Clone, PartialEq)]
pub enum Setting {
    Shortcut(String),
    Volume(f32),
    Size(OverlaySize),
    PingDelay(bool),
    RateLimit(bool),
    HasLaunched(bool),
}

impl AppSettings {
    pub fn apply(&mut self, setting: Setting) {
        match setting {
            Setting::Shortcut(shortcut) => self.shortcut = shortcut,
            Setting::Volume(volume) => self.volume = volume.clamp(0.0, 1.0),
            Setting::Size(size) => self.size = size,
            Setting::PingDelay(enabled) => self.ping_delay = enabled,
            Setting::RateLimit(enabled) => self.rate_limit = enabled,
            Setting::HasLaunched(launched) => self.has_launched = launched,
        }
    }
}

/// Typed key/value persistence with defaults
pub trait SettingsStore {
    fn get(&self) -> &AppSettings;

    /// Update one key and persist it
    fn set(&mut self, setting: Setting) -> Result<(), String>;
}

/// Settings kept in memory only
#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    settings: AppSettings,
}

impl MemorySettingsStore {
    pub fn new(settings: AppSettings) -> Self {
        Self { settings }
    }
}

impl SettingsStore for MemorySettingsStore {
    fn get(&self) -> &AppSettings {
        &self.settings
    }

    fn set(&mut self, setting: Setting) -> Result<(), String> {
        self.settings.apply(setting);
        Ok(())
    }
}

/// Settings persisted as JSON, written through on every `set`
#[derive(Debug)]
pub struct JsonSettingsStore {
    path: PathBuf,
    settings: AppSettings,
}

impl JsonSettingsStore {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let settings = load_settings(&path);
        Self { path, settings }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SettingsStore for JsonSettingsStore {
    fn get(&self) -> &AppSettings {
        &self.settings
    }

    fn set(&mut self, setting: Setting) -> Result<(), String> {
        self.settings.apply(setting);
        save_settings(&self.path, &self.settings)
    }
}

pub fn default_settings_path() -> Result<PathBuf, String> {
    let dir = dirs::config_dir().ok_or("Could not determine config directory")?;
    Ok(dir.join(SETTINGS_DIR_NAME).join(SETTINGS_FILE_NAME))
}

pub fn load_settings(path: &Path) -> AppSettings {
    match std::fs::read_to_string(path) {
        Ok(contents) => match serde_json::from_str::<AppSettings>(&contents) {
            Ok(settings) => settings,
            Err(e) => {
                log::warn!("Settings: failed to parse {:?}: {}", path, e);
                AppSettings::default()
            }
        },
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => AppSettings::default(),
        Err(e) => {
            log::warn!("Settings: failed to read {:?}: {}", path, e);
            AppSettings::default()
        }
    }
}

pub fn save_settings(path: &Path, settings: &AppSettings) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory {:?}: {}", parent, e))?;
    }

    let contents =
        serde_json::to_string_pretty(settings).map_err(|e| format!("Serialize settings: {}", e))?;

    // Write atomically: write to a temp file in the same directory, then rename.
    // This prevents partial/corrupt settings.json if the app crashes mid-write.
    let tmp_path = path.with_extension("json.tmp");
    std::fs::write(&tmp_path, &contents)
        .map_err(|e| format!("Write temp settings {:?}: {}", tmp_path, e))?;

    // On Unix, rename will atomically replace the destination. On Windows, rename
    // fails if the destination exists, so we remove it first (ignoring NotFound).
    if cfg!(windows) && path.exists() {
        if let Err(e) = std::fs::remove_file(path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                return Err(format!("Remove existing settings file {:?}: {}", path, e));
            }
        }
    }

    std::fs::rename(&tmp_path, path)
        .map_err(|e| format!("Rename temp settings {:?} to {:?}: {}", tmp_path, path, e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonSettingsStore::open(dir.path().join("settings.json"));

        let settings = store.get();
        assert_eq!(settings.shortcut, "CommandOrControl+G");
        assert_eq!(settings.volume, 0.5);
        assert_eq!(settings.size, OverlaySize::Small);
        assert!(!settings.ping_delay);
        assert!(!settings.rate_limit);
        assert!(!settings.has_launched);
    }

    #[test]
    fn set_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");

        let mut store = JsonSettingsStore::open(&path);
        store.set(Setting::Shortcut("Alt+P".to_string())).unwrap();
        store.set(Setting::RateLimit(true)).unwrap();
        store.set(Setting::Size(OverlaySize::Large)).unwrap();

        let reopened = JsonSettingsStore::open(&path);
        assert_eq!(reopened.get().shortcut, "Alt+P");
        assert!(reopened.get().rate_limit);
        assert_eq!(reopened.get().size, OverlaySize::Large);
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn json_uses_camel_case_keys_and_fills_missing_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{ "pingDelay": true, "size": "medium" }"#).unwrap();

        let settings = load_settings(&path);
        assert!(settings.ping_delay);
        assert_eq!(settings.size, OverlaySize::Medium);
        assert_eq!(settings.shortcut, DEFAULT_SHORTCUT);

        let json = serde_json::to_value(&settings).unwrap();
        assert!(json.get("rateLimit").is_some());
        assert!(json.get("hasLaunched").is_some());
    }

    #[test]
    fn corrupt_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{ not json").unwrap();

        assert_eq!(load_settings(&path), AppSettings::default());
    }

    #[test]
    fn volume_is_clamped() {
        let mut store = MemorySettingsStore::default();
        store.set(Setting::Volume(1.7)).unwrap();
        assert_eq!(store.get().volume, 1.0);
        store.set(Setting::Volume(-0.2)).unwrap();
        assert_eq!(store.get().volume, 0.0);
    }
}
