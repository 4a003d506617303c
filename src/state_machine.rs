//! Controller for cursor-ping
//!
//! This module implements the core using a single-writer pattern. Every
//! input (hotkey trigger, raw key, UI command, timer expiry) goes through
//! `Controller::handle()`, which mutates the owned components and returns a
//! list of effects to execute. The controller never touches windows, timers
//! or the UI channel itself.

use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::display::{self, MonitorGeometry, Point, Rect, TargetPolicy};
use crate::hotkey::{HotkeyBackend, HotkeyDispatcher, DEFAULT_SHORTCUT};
use crate::ipc::{Command, UiMessage};
use crate::overlay::{OverlayManager, Throttle};
use crate::rate_limiter::{Attempt, RateLimiter};
use crate::recorder::{ComboRecorder, RawKeyEvent};
use crate::settings::{Setting, SettingsStore};

/// Warning surface geometry, relative to the primary monitor's bottom-left
pub const WARNING_WIDTH: i32 = 300;
pub const WARNING_HEIGHT: i32 = 400;
pub const WARNING_MARGIN_LEFT: i32 = 20;
pub const WARNING_MARGIN_BOTTOM: i32 = 420;

/// Identifies a visual surface owned by the core
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SurfaceId {
    Overlay(Uuid),
    Warning,
}

/// One-shot timers. The id ties a firing back to the thing it expires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Timer {
    Lockout(Uuid),
    OverlayExpiry(Uuid),
}

/// Inputs to the controller
#[derive(Debug, Clone)]
pub enum Event {
    /// The bound global combination was pressed. Resolved into `Trigger`
    /// at the loop edge.
    HotkeyPressed,
    Trigger {
        cursor: Point,
        monitors: Vec<MonitorGeometry>,
    },
    /// Raw key transition, only forwarded while key capture is on
    Key(RawKeyEvent),
    Command(Command),
    TimerFired(Timer),
    /// The runner could not open a requested surface
    SurfaceFailed(SurfaceId),
    /// Application teardown
    Shutdown,
}

/// Side effects to be executed after an event is handled
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    OpenSurface { id: SurfaceId, rect: Rect },
    CloseSurface { id: SurfaceId },
    SendMessage { id: SurfaceId, message: UiMessage },
    /// Message for the preferences UI
    Notify(UiMessage),
    StartTimer { timer: Timer, duration: Duration },
    CancelTimer { timer: Timer },
    /// Start/stop forwarding raw key events
    CaptureKeys(bool),
}

pub struct Controller<S, B> {
    settings: S,
    dispatcher: HotkeyDispatcher<B>,
    limiter: RateLimiter,
    throttle: Throttle,
    recorder: ComboRecorder,
    overlays: OverlayManager,
    targeting: TargetPolicy,
    warning_open: bool,
}

impl<S: SettingsStore, B: HotkeyBackend> Controller<S, B> {
    pub fn new(settings: S, backend: B) -> Self {
        Self {
            settings,
            dispatcher: HotkeyDispatcher::new(backend),
            limiter: RateLimiter::new(),
            throttle: Throttle::default(),
            recorder: ComboRecorder::new(),
            overlays: OverlayManager::new(),
            targeting: TargetPolicy::default(),
            warning_open: false,
        }
    }

    pub fn with_targeting(mut self, targeting: TargetPolicy) -> Self {
        self.targeting = targeting;
        self
    }

    /// Bind the saved shortcut and run first-launch bookkeeping
    pub fn startup(&mut self) -> Vec<Effect> {
        let mut effects = Vec::new();

        let saved = self.settings.get().shortcut.clone();
        if !self.register_shortcut(&saved) && self.dispatcher.current().is_none() {
            log::warn!(
                "Saved shortcut '{}' unusable, falling back to '{}'",
                saved,
                DEFAULT_SHORTCUT
            );
            if !self.register_shortcut(DEFAULT_SHORTCUT) {
                log::error!("No usable shortcut, pings are disabled until one is set");
            }
        }

        if !self.settings.get().has_launched {
            log::info!("First launch");
            effects.push(Effect::Notify(UiMessage::FirstLaunch));
            self.persist(Setting::HasLaunched(true));
        }

        effects
    }

    pub fn handle(&mut self, event: Event, now: Instant) -> Vec<Effect> {
        match event {
            Event::HotkeyPressed => {
                log::debug!("HotkeyPressed reached the controller without geometry, ignoring");
                vec![]
            }
            Event::Trigger { cursor, monitors } => self.on_trigger(cursor, &monitors, now),
            Event::Key(key) => match self.recorder.handle_key(&key) {
                Some(live) => vec![Effect::Notify(UiMessage::ShortcutRecording(live))],
                None => vec![],
            },
            Event::Command(command) => self.on_command(command),
            Event::TimerFired(Timer::Lockout(id)) => {
                self.limiter.release(id);
                vec![]
            }
            Event::TimerFired(Timer::OverlayExpiry(id)) => self.overlays.expire(id),
            Event::SurfaceFailed(SurfaceId::Overlay(id)) => self.overlays.discard(id),
            Event::SurfaceFailed(SurfaceId::Warning) => {
                // Reopened by the next rejected ping
                log::warn!("Rate-limit warning failed to open");
                self.warning_open = false;
                vec![]
            }
            Event::Shutdown => self.shutdown(),
        }
    }

    /// Release every surface, timer and binding. Safe to call repeatedly.
    pub fn shutdown(&mut self) -> Vec<Effect> {
        let mut effects = self.overlays.shutdown_all();
        if let Some(id) = self.limiter.lockout_id() {
            self.limiter.release(id);
            effects.push(Effect::CancelTimer {
                timer: Timer::Lockout(id),
            });
        }
        if self.warning_open {
            effects.push(Effect::CloseSurface {
                id: SurfaceId::Warning,
            });
            self.warning_open = false;
        }
        if self.recorder.abort() {
            effects.push(Effect::CaptureKeys(false));
        }
        self.dispatcher.shutdown();
        effects
    }

    fn on_trigger(&mut self, cursor: Point, monitors: &[MonitorGeometry], now: Instant) -> Vec<Effect> {
        let mut effects = Vec::new();
        let (ping_delay, rate_limit) = {
            let s = self.settings.get();
            (s.ping_delay, s.rate_limit)
        };

        if ping_delay && !self.throttle.permits(now) {
            log::debug!("Ping throttled");
            return effects;
        }

        if rate_limit {
            match self.limiter.attempt(now) {
                Attempt::Rejected => return self.show_warning(monitors),
                Attempt::AllowedAndLockedOut { id, duration } => {
                    effects.push(Effect::StartTimer {
                        timer: Timer::Lockout(id),
                        duration,
                    });
                }
                Attempt::Allowed => {}
            }
        }

        self.throttle.record(now);

        match display::resolve(cursor, monitors, self.targeting) {
            Some(rect) => {
                let (_, spawned) = self.overlays.spawn(rect, now);
                effects.extend(spawned);
            }
            None => {
                log::debug!("Cursor {:?} is on no known monitor, dropping ping", cursor);
            }
        }

        effects
    }

    /// Open the warning surface on first use, then ask it to show
    fn show_warning(&mut self, monitors: &[MonitorGeometry]) -> Vec<Effect> {
        let mut effects = Vec::new();
        if !self.warning_open {
            let Some(primary) = display::primary_monitor(monitors) else {
                log::warn!("No monitor to place the rate-limit warning on");
                return effects;
            };
            let bounds = primary.bounds;
            let rect = Rect::new(
                bounds.x + WARNING_MARGIN_LEFT,
                bounds.bottom() - WARNING_MARGIN_BOTTOM,
                WARNING_WIDTH,
                WARNING_HEIGHT,
            );
            effects.push(Effect::OpenSurface {
                id: SurfaceId::Warning,
                rect,
            });
            self.warning_open = true;
        }
        effects.push(Effect::SendMessage {
            id: SurfaceId::Warning,
            message: UiMessage::ShowWarning,
        });
        effects
    }

    fn on_command(&mut self, command: Command) -> Vec<Effect> {
        log::debug!("Command: {:?}", command);
        match command {
            Command::StartRecording => {
                self.dispatcher.suspend();
                self.recorder.start();
                vec![
                    Effect::CaptureKeys(true),
                    Effect::Notify(UiMessage::ShortcutRecording(self.recorder.current())),
                ]
            }
            Command::StopRecording => {
                let Some(committed) = self.recorder.stop() else {
                    log::debug!("StopRecording while not recording");
                    return vec![];
                };
                log::info!("Recorded shortcut '{}'", committed);
                let mut effects = vec![
                    Effect::CaptureKeys(false),
                    Effect::Notify(UiMessage::ShortcutRecorded(committed.clone())),
                ];
                if committed.is_empty() {
                    self.dispatcher.restore();
                } else {
                    effects.push(self.shortcut_changed(&committed));
                }
                effects
            }
            Command::ClosePreferences => {
                if self.recorder.abort() {
                    log::info!("Preferences closed while recording, keeping current shortcut");
                    self.dispatcher.restore();
                    vec![Effect::CaptureKeys(false)]
                } else {
                    vec![]
                }
            }
            Command::SetShortcut(combo) => vec![self.shortcut_changed(&combo)],
            Command::SetRateLimit(enabled) => {
                self.persist(Setting::RateLimit(enabled));
                vec![]
            }
            Command::SetPingDelay(enabled) => {
                self.persist(Setting::PingDelay(enabled));
                vec![]
            }
            Command::SetSize(size) => {
                self.persist(Setting::Size(size));
                vec![]
            }
            Command::SetVolume(volume) => {
                self.persist(Setting::Volume(volume));
                vec![]
            }
            Command::GetSettings => vec![Effect::Notify(UiMessage::Settings(self.settings.get().clone()))],
        }
    }

    fn shortcut_changed(&mut self, combo: &str) -> Effect {
        let registered = self.register_shortcut(combo);
        Effect::Notify(UiMessage::ShortcutChanged {
            shortcut: self.dispatcher.current().unwrap_or_default().to_string(),
            registered,
        })
    }

    /// Bind `combo`, persisting it on success
    fn register_shortcut(&mut self, combo: &str) -> bool {
        let registered = self.dispatcher.register(combo);
        if registered {
            self.persist(Setting::Shortcut(combo.to_string()));
        }
        registered
    }

    fn persist(&mut self, setting: Setting) {
        if let Err(e) = self.settings.set(setting) {
            log::error!("Failed to save settings: {}", e);
        }
    }

    // -----------------
    // Introspection
    // -----------------

    pub fn settings(&self) -> &S {
        &self.settings
    }

    pub fn dispatcher(&self) -> &HotkeyDispatcher<B> {
        &self.dispatcher
    }

    pub fn overlays(&self) -> &OverlayManager {
        &self.overlays
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    pub fn recorder(&self) -> &ComboRecorder {
        &self.recorder
    }
}
