//! Hotkey manager - coordinates device monitoring and event aggregation

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use evdev::{Device, InputEventKind, Key};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use super::{detector::HotkeyDetector, keys, HotkeyBackend, Hotkey};
use crate::recorder::{KeyEventKind, RawKeyEvent};
use crate::state_machine::Event;

/// evdev key event values
const KEY_RELEASE: i32 = 0;
const KEY_PRESS: i32 = 1;
#[cfg(test)]
const KEY_REPEAT: i32 = 2;

/// Find all keyboard devices on the system
pub fn find_keyboards() -> Vec<(PathBuf, Device)> {
    evdev::enumerate()
        .filter_map(|(path, device)| {
            // A keyboard should support common keys
            let is_keyboard = device.supported_keys().map_or(false, |keys| {
                keys.contains(Key::KEY_ENTER)
                    && keys.contains(Key::KEY_SPACE)
                    && keys.contains(Key::KEY_A)
                    && keys.contains(Key::KEY_Z)
            });

            if is_keyboard {
                let name = device.name().unwrap_or("Unknown");
                log::info!("Found keyboard device: {:?} ({})", path, name);
                Some((path, device))
            } else {
                None
            }
        })
        .collect()
}

/// Check if we have permission to access input devices
/// Takes pre-discovered keyboards to avoid redundant enumeration
pub fn check_permissions(keyboards: &[(PathBuf, Device)]) -> Result<(), String> {
    if keyboards.is_empty() {
        // Try to determine why
        let all_devices: Vec<_> = evdev::enumerate().collect();

        if all_devices.is_empty() {
            return Err(
                "No input devices found. Ensure you are in the 'input' group:\n\
                 sudo usermod -aG input $USER\n\
                 Then log out and back in."
                    .to_string(),
            );
        } else {
            return Err(format!(
                "Found {} input devices but none appear to be keyboards. \
                 This might be a permissions issue or no keyboard is connected.",
                all_devices.len()
            ));
        }
    }

    Ok(())
}

/// Status information about the hotkey manager
#[derive(Debug, Clone)]
pub struct HotkeyStatus {
    pub active: bool,
    pub device_count: usize,
    pub error: Option<String>,
}

/// Create a "failed" status for when initialization fails
pub fn failed_status(error: String) -> HotkeyStatus {
    HotkeyStatus {
        active: false,
        device_count: 0,
        error: Some(error),
    }
}

/// `HotkeyBackend` that hands the active combination to every device monitor
pub struct EvdevBinding {
    tx: watch::Sender<Option<Hotkey>>,
    /// Keys reported by at least one keyboard
    supported: HashSet<Key>,
}

impl EvdevBinding {
    /// Binding with no device monitors behind it; every `bind` fails.
    pub fn detached() -> Self {
        let (tx, _) = watch::channel(None);
        Self {
            tx,
            supported: HashSet::new(),
        }
    }
}

impl HotkeyBackend for EvdevBinding {
    fn bind(&mut self, hotkey: &Hotkey) -> Result<(), String> {
        if !self.supported.contains(&hotkey.key) {
            return Err(format!("No keyboard provides the key for {}", hotkey));
        }
        self.tx
            .send(Some(hotkey.clone()))
            .map_err(|_| "Hotkey listener is not running".to_string())
    }

    fn unbind_all(&mut self) {
        self.tx.send_replace(None);
    }
}

/// Manages hotkey detection across all keyboard devices
pub struct HotkeyManager {
    cancel_token: CancellationToken,
    status: HotkeyStatus,
}

impl HotkeyManager {
    /// Start the hotkey manager
    ///
    /// Spawns async tasks to monitor all keyboard devices. Sends
    /// `Event::HotkeyPressed` when the bound combination is pressed, and
    /// `Event::Key` for every press/release while `capture` is set.
    pub fn start(
        event_tx: mpsc::Sender<Event>,
        capture: Arc<AtomicBool>,
    ) -> Result<(Self, EvdevBinding), String> {
        // Find keyboards once and check permissions
        let keyboards = find_keyboards();
        check_permissions(&keyboards)?;

        let cancel_token = CancellationToken::new();
        let (binding_tx, binding_rx) = watch::channel::<Option<Hotkey>>(None);

        let device_count = keyboards.len();
        let mut supported = HashSet::new();

        log::info!("Starting hotkey monitoring on {} device(s)", device_count);

        // Spawn a task for each keyboard
        for (path, device) in keyboards {
            if let Some(keys) = device.supported_keys() {
                supported.extend(keys.iter());
            }

            let tx = event_tx.clone();
            let binding_rx = binding_rx.clone();
            let capture = capture.clone();
            let cancel = cancel_token.clone();
            let path_str = path.to_string_lossy().to_string();

            tokio::spawn(async move {
                Self::monitor_device(path_str, device, binding_rx, capture, tx, cancel).await;
            });
        }

        let manager = Self {
            cancel_token,
            status: HotkeyStatus {
                active: true,
                device_count,
                error: None,
            },
        };
        let binding = EvdevBinding {
            tx: binding_tx,
            supported,
        };
        Ok((manager, binding))
    }

    /// Get the current status of the hotkey manager
    pub fn status(&self) -> &HotkeyStatus {
        &self.status
    }

    /// Monitor a single keyboard device for hotkey events
    async fn monitor_device(
        path: String,
        device: Device,
        mut binding_rx: watch::Receiver<Option<Hotkey>>,
        capture: Arc<AtomicBool>,
        tx: mpsc::Sender<Event>,
        cancel: CancellationToken,
    ) {
        let name = device.name().unwrap_or("Unknown").to_string();
        log::info!("Monitoring keyboard device: {} ({})", path, name);

        let mut detector = HotkeyDetector::new(binding_rx.borrow_and_update().clone());

        // Convert to async event stream
        let mut stream = match device.into_event_stream() {
            Ok(s) => s,
            Err(e) => {
                log::error!("Failed to create event stream for {}: {}", path, e);
                return;
            }
        };

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    log::info!("Hotkey monitoring cancelled for {}", path);
                    break;
                }

                changed = binding_rx.changed() => {
                    if changed.is_err() {
                        log::info!("Hotkey binding dropped, stopping {}", path);
                        break;
                    }
                    let bound = binding_rx.borrow_and_update().clone();
                    log::debug!("{}: now watching {:?}", path, bound.as_ref().map(|h| h.to_string()));
                    detector.rebind(bound);
                }

                result = stream.next_event() => {
                    match result {
                        Ok(ev) => {
                            // Only process key events
                            if let InputEventKind::Key(key) = ev.kind() {
                                let event = translate_key(&mut detector, &capture, key, ev.value());
                                if let Some(event) = event {
                                    if let Err(e) = tx.send(event).await {
                                        log::error!("Failed to send key event: {}", e);
                                        break;
                                    }
                                }
                            }
                        }
                        Err(e) => {
                            log::warn!("Device read error for {} (disconnected?): {}", path, e);
                            break;
                        }
                    }
                }
            }
        }

        log::info!("Stopped monitoring device: {}", path);
    }

    /// Stop all hotkey monitoring
    pub fn stop(&self) {
        log::info!("Stopping hotkey manager");
        self.cancel_token.cancel();
    }
}

impl Drop for HotkeyManager {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Turn one evdev key event into a state machine event.
///
/// The detector sees every event so modifier state stays accurate across
/// recording sessions.
fn translate_key(
    detector: &mut HotkeyDetector,
    capture: &AtomicBool,
    key: Key,
    value: i32,
) -> Option<Event> {
    let triggered = detector.process_key(key, value);

    if capture.load(Ordering::SeqCst) {
        let kind = match value {
            KEY_PRESS => KeyEventKind::Down,
            KEY_RELEASE => KeyEventKind::Up,
            // Auto-repeat would toggle the held key on and off
            _ => return None,
        };
        let Some(name) = keys::raw_name(key) else {
            log::debug!("Ignoring unnamed key {:?} while recording", key);
            return None;
        };
        return Some(Event::Key(RawKeyEvent {
            kind,
            key: name.to_string(),
        }));
    }

    triggered.map(|hotkey| {
        log::info!("Hotkey triggered: {}", hotkey);
        Event::HotkeyPressed
    })
}
