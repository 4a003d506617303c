//! Effect runner for cursor-ping
//!
//! Executes effects produced by the controller: native surfaces through the
//! `Desktop`, one-shot timers as tokio tasks, UI messages onto a channel.
//! Completion events (timer expiry, a surface that failed to open) are sent
//! back to the state loop.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::desktop::{Desktop, Surface};
use crate::display::Rect;
use crate::ipc::UiMessage;
use crate::state_machine::{Effect, Event, SurfaceId, Timer};

/// Trait for running effects asynchronously.
/// Completion events are sent back via the provided channel.
pub trait EffectRunner: Send + Sync + 'static {
    fn spawn(&self, effect: Effect, tx: mpsc::Sender<Event>);
}

type TimerMap = Arc<Mutex<HashMap<Timer, CancellationToken>>>;

/// Effect runner backed by a real desktop
pub struct DesktopEffectRunner {
    desktop: Arc<dyn Desktop>,
    surfaces: Mutex<HashMap<SurfaceId, Box<dyn Surface>>>,
    timers: TimerMap,
    /// Parent of every timer token; cancelled on shutdown
    shutdown: CancellationToken,
    /// Shared with the key listeners, which forward raw keys while set
    capture: Arc<AtomicBool>,
    ui_tx: mpsc::UnboundedSender<UiMessage>,
}

impl DesktopEffectRunner {
    pub fn new(
        desktop: Arc<dyn Desktop>,
        capture: Arc<AtomicBool>,
        ui_tx: mpsc::UnboundedSender<UiMessage>,
    ) -> Self {
        Self {
            desktop,
            surfaces: Mutex::new(HashMap::new()),
            timers: Arc::new(Mutex::new(HashMap::new())),
            shutdown: CancellationToken::new(),
            capture,
            ui_tx,
        }
    }

    /// Number of surfaces currently open
    pub fn open_surfaces(&self) -> usize {
        lock(&self.surfaces).len()
    }

    /// Number of timers that have neither fired nor been cancelled
    pub fn pending_timers(&self) -> usize {
        lock(&self.timers).len()
    }

    /// Cancel every pending timer and close every surface still open
    pub fn shutdown(&self) {
        self.shutdown.cancel();
        lock(&self.timers).clear();

        let mut surfaces = lock(&self.surfaces);
        if !surfaces.is_empty() {
            log::info!("Closing {} leftover surface(s)", surfaces.len());
        }
        for (_, mut surface) in surfaces.drain() {
            surface.close();
        }
        self.capture.store(false, Ordering::SeqCst);
    }

    fn open_surface(&self, id: SurfaceId, rect: Rect, tx: mpsc::Sender<Event>) {
        let mut surface = match self.desktop.create_surface(id, rect) {
            Ok(s) => s,
            Err(e) => {
                log::error!("Failed to open {:?}: {}", id, e);
                tokio::spawn(async move {
                    let _ = tx.send(Event::SurfaceFailed(id)).await;
                });
                return;
            }
        };
        if let Err(e) = surface.show() {
            log::warn!("Failed to show {:?}: {}", id, e);
        }
        if let Some(mut old) = lock(&self.surfaces).insert(id, surface) {
            log::warn!("{:?} was already open, replacing it", id);
            old.close();
        }
    }

    fn start_timer(&self, timer: Timer, duration: Duration, tx: mpsc::Sender<Event>) {
        let token = self.shutdown.child_token();
        if let Some(old) = lock(&self.timers).insert(timer, token.clone()) {
            old.cancel();
        }

        let timers = self.timers.clone();
        tokio::spawn(async move {
            tokio::select! {
                biased;

                _ = token.cancelled() => {
                    log::trace!("{:?} cancelled", timer);
                }

                _ = tokio::time::sleep(duration) => {
                    lock(&timers).remove(&timer);
                    log::debug!("{:?} elapsed after {:?}", timer, duration);
                    let _ = tx.send(Event::TimerFired(timer)).await;
                }
            }
        });
    }
}

impl EffectRunner for DesktopEffectRunner {
    fn spawn(&self, effect: Effect, tx: mpsc::Sender<Event>) {
        match effect {
            Effect::OpenSurface { id, rect } => self.open_surface(id, rect, tx),

            Effect::CloseSurface { id } => match lock(&self.surfaces).remove(&id) {
                Some(mut surface) => surface.close(),
                None => log::debug!("{:?} already closed", id),
            },

            Effect::SendMessage { id, message } => match lock(&self.surfaces).get_mut(&id) {
                Some(surface) => {
                    if let Err(e) = surface.send_message(&message) {
                        log::warn!("Failed to deliver {:?} to {:?}: {}", message, id, e);
                    }
                }
                None => log::debug!("Dropping {:?} for closed {:?}", message, id),
            },

            Effect::Notify(message) => {
                if self.ui_tx.send(message).is_err() {
                    log::debug!("No UI listening, notification dropped");
                }
            }

            Effect::StartTimer { timer, duration } => self.start_timer(timer, duration, tx),

            Effect::CancelTimer { timer } => {
                if let Some(token) = lock(&self.timers).remove(&timer) {
                    token.cancel();
                }
            }

            Effect::CaptureKeys(enabled) => {
                log::debug!("Key capture {}", if enabled { "on" } else { "off" });
                self.capture.store(enabled, Ordering::SeqCst);
            }
        }
    }
}

/// Lock a std mutex, recovering the data if a holder panicked
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::{MonitorGeometry, Point};
    use uuid::Uuid;

    /// What happened to a fake surface
    #[derive(Debug, Clone, PartialEq)]
    enum SurfaceOp {
        Open(SurfaceId, Rect),
        Show(SurfaceId),
        Close(SurfaceId),
        Message(SurfaceId, UiMessage),
    }

    /// Desktop that records surface operations instead of drawing
    struct FakeDesktop {
        ops: Arc<Mutex<Vec<SurfaceOp>>>,
        /// Every `create_surface` fails while set
        broken: AtomicBool,
    }

    impl FakeDesktop {
        fn ops(&self) -> Vec<SurfaceOp> {
            lock(&self.ops).clone()
        }
    }

    struct FakeSurface {
        id: SurfaceId,
        ops: Arc<Mutex<Vec<SurfaceOp>>>,
        closed: bool,
    }

    impl Surface for FakeSurface {
        fn show(&mut self) -> Result<(), String> {
            lock(&self.ops).push(SurfaceOp::Show(self.id));
            Ok(())
        }

        fn close(&mut self) {
            if !self.closed {
                self.closed = true;
                lock(&self.ops).push(SurfaceOp::Close(self.id));
            }
        }

        fn send_message(&mut self, message: &UiMessage) -> Result<(), String> {
            lock(&self.ops).push(SurfaceOp::Message(self.id, message.clone()));
            Ok(())
        }
    }

    impl Desktop for FakeDesktop {
        fn cursor_position(&self) -> Result<Point, String> {
            Ok(Point::new(0, 0))
        }

        fn monitors(&self) -> Result<Vec<MonitorGeometry>, String> {
            Ok(vec![MonitorGeometry::new(0, 0, 1920, 1080)])
        }

        fn create_surface(&self, id: SurfaceId, rect: Rect) -> Result<Box<dyn Surface>, String> {
            if self.broken.load(Ordering::SeqCst) {
                return Err("BadAlloc".to_string());
            }
            lock(&self.ops).push(SurfaceOp::Open(id, rect));
            Ok(Box::new(FakeSurface {
                id,
                ops: self.ops.clone(),
                closed: false,
            }))
        }
    }

    fn runner() -> (
        Arc<FakeDesktop>,
        DesktopEffectRunner,
        mpsc::UnboundedReceiver<UiMessage>,
    ) {
        let desktop = Arc::new(FakeDesktop {
            ops: Arc::new(Mutex::new(Vec::new())),
            broken: AtomicBool::new(false),
        });
        let (ui_tx, ui_rx) = mpsc::unbounded_channel();
        let runner = DesktopEffectRunner::new(desktop.clone(), Arc::new(AtomicBool::new(false)), ui_tx);
        (desktop, runner, ui_rx)
    }

    #[tokio::test]
    async fn open_shows_and_close_is_idempotent() {
        let (desktop, runner, _ui) = runner();
        let (tx, _rx) = mpsc::channel(8);
        let id = SurfaceId::Overlay(Uuid::new_v4());
        let rect = Rect::new(0, 0, 128, 226);

        runner.spawn(Effect::OpenSurface { id, rect }, tx.clone());
        assert_eq!(runner.open_surfaces(), 1);
        runner.spawn(Effect::CloseSurface { id }, tx.clone());
        runner.spawn(Effect::CloseSurface { id }, tx);

        assert_eq!(
            desktop.ops(),
            vec![SurfaceOp::Open(id, rect), SurfaceOp::Show(id), SurfaceOp::Close(id)]
        );
        assert_eq!(runner.open_surfaces(), 0);
    }

    #[tokio::test]
    async fn messages_reach_open_surfaces_and_the_ui_channel() {
        let (desktop, runner, mut ui) = runner();
        let (tx, _rx) = mpsc::channel(8);
        let rect = Rect::new(20, 660, 300, 400);

        // Nothing open yet: dropped
        runner.spawn(
            Effect::SendMessage {
                id: SurfaceId::Warning,
                message: UiMessage::ShowWarning,
            },
            tx.clone(),
        );
        runner.spawn(
            Effect::OpenSurface {
                id: SurfaceId::Warning,
                rect,
            },
            tx.clone(),
        );
        runner.spawn(
            Effect::SendMessage {
                id: SurfaceId::Warning,
                message: UiMessage::ShowWarning,
            },
            tx.clone(),
        );
        runner.spawn(Effect::Notify(UiMessage::FirstLaunch), tx);

        assert_eq!(
            desktop.ops(),
            vec![
                SurfaceOp::Open(SurfaceId::Warning, rect),
                SurfaceOp::Show(SurfaceId::Warning),
                SurfaceOp::Message(SurfaceId::Warning, UiMessage::ShowWarning),
            ]
        );
        assert_eq!(ui.try_recv(), Ok(UiMessage::FirstLaunch));
    }

    #[tokio::test]
    async fn failed_open_is_reported_back() {
        let (desktop, runner, _ui) = runner();
        let (tx, mut rx) = mpsc::channel(8);
        desktop.broken.store(true, Ordering::SeqCst);

        runner.spawn(
            Effect::OpenSurface {
                id: SurfaceId::Warning,
                rect: Rect::new(20, 660, 300, 400),
            },
            tx,
        );
        assert_eq!(runner.open_surfaces(), 0);
        assert!(desktop.ops().is_empty());

        match rx.recv().await {
            Some(Event::SurfaceFailed(id)) => assert_eq!(id, SurfaceId::Warning),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn timer_fires_once_after_duration() {
        let (_desktop, runner, _ui) = runner();
        let (tx, mut rx) = mpsc::channel(8);
        let timer = Timer::OverlayExpiry(Uuid::new_v4());

        runner.spawn(
            Effect::StartTimer {
                timer,
                duration: Duration::from_millis(1800),
            },
            tx,
        );
        assert_eq!(runner.pending_timers(), 1);

        tokio::time::sleep(Duration::from_millis(1799)).await;
        assert!(rx.try_recv().is_err());

        match rx.recv().await {
            Some(Event::TimerFired(fired)) => assert_eq!(fired, timer),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(runner.pending_timers(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_and_shutdown_timers_never_fire() {
        let (_desktop, runner, _ui) = runner();
        let (tx, mut rx) = mpsc::channel(8);
        let cancelled = Timer::Lockout(Uuid::new_v4());
        let swept = Timer::OverlayExpiry(Uuid::new_v4());

        for timer in [cancelled, swept] {
            runner.spawn(
                Effect::StartTimer {
                    timer,
                    duration: Duration::from_secs(6),
                },
                tx.clone(),
            );
        }
        runner.spawn(Effect::CancelTimer { timer: cancelled }, tx.clone());
        runner.shutdown();
        assert_eq!(runner.pending_timers(), 0);
        drop(tx);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn capture_flag_follows_effects_and_shutdown() {
        let (_desktop, runner, _ui) = runner();
        let (tx, _rx) = mpsc::channel(8);

        runner.spawn(Effect::CaptureKeys(true), tx);
        assert!(runner.capture.load(Ordering::SeqCst));
        runner.shutdown();
        assert!(!runner.capture.load(Ordering::SeqCst));
    }
}
