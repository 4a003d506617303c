//! Transient overlay lifecycle
//!
//! Owns the set of live overlay surfaces. Each spawn opens a surface and
//! arms an expiry timer; the surface leaves the live set when that timer
//! fires or when the shutdown sweep runs, whichever comes first. Removal is
//! idempotent, so a late timer after the sweep does nothing.

use std::collections::HashMap;
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::display::Rect;
use crate::state_machine::{Effect, SurfaceId, Timer};

/// How long an overlay stays on screen
pub const OVERLAY_LIFETIME: Duration = Duration::from_millis(1800);

/// Minimum spacing between accepted spawns when the ping delay is enabled
pub const THROTTLE_INTERVAL: Duration = Duration::from_millis(300);

/// A live overlay. Membership in the manager is the ownership record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlaySurface {
    pub id: Uuid,
    pub rect: Rect,
    pub created_at: Instant,
}

#[derive(Debug, Default)]
pub struct OverlayManager {
    live: HashMap<Uuid, OverlaySurface>,
}

impl OverlayManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new overlay at `rect` and arm its expiry timer
    pub fn spawn(&mut self, rect: Rect, now: Instant) -> (Uuid, Vec<Effect>) {
        let id = Uuid::new_v4();
        self.live.insert(
            id,
            OverlaySurface {
                id,
                rect,
                created_at: now,
            },
        );
        log::debug!("Overlay {} spawned at {:?} ({} live)", id, rect, self.live.len());

        let effects = vec![
            Effect::OpenSurface {
                id: SurfaceId::Overlay(id),
                rect,
            },
            Effect::StartTimer {
                timer: Timer::OverlayExpiry(id),
                duration: OVERLAY_LIFETIME,
            },
        ];
        (id, effects)
    }

    /// Expiry timer fired. Closes the overlay if it is still live.
    pub fn expire(&mut self, id: Uuid) -> Vec<Effect> {
        match self.live.remove(&id) {
            Some(_) => {
                log::debug!("Overlay {} expired ({} live)", id, self.live.len());
                vec![Effect::CloseSurface {
                    id: SurfaceId::Overlay(id),
                }]
            }
            None => {
                log::trace!("Overlay {} already released", id);
                vec![]
            }
        }
    }

    /// The surface for `id` could not be opened. Forgets it and disarms
    /// its expiry; there is nothing to close.
    pub fn discard(&mut self, id: Uuid) -> Vec<Effect> {
        if self.live.remove(&id).is_none() {
            return vec![];
        }
        log::debug!("Overlay {} discarded ({} live)", id, self.live.len());
        vec![Effect::CancelTimer {
            timer: Timer::OverlayExpiry(id),
        }]
    }

    /// Release every live overlay and cancel its pending timer
    pub fn shutdown_all(&mut self) -> Vec<Effect> {
        if !self.live.is_empty() {
            log::info!("Releasing {} live overlay(s)", self.live.len());
        }
        self.live
            .drain()
            .flat_map(|(id, _)| {
                [
                    Effect::CancelTimer {
                        timer: Timer::OverlayExpiry(id),
                    },
                    Effect::CloseSurface {
                        id: SurfaceId::Overlay(id),
                    },
                ]
            })
            .collect()
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.live.contains_key(&id)
    }

    pub fn get(&self, id: Uuid) -> Option<&OverlaySurface> {
        self.live.get(&id)
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }
}

/// Suppresses spawns that follow the previous accepted one too closely
#[derive(Debug)]
pub struct Throttle {
    interval: Duration,
    last_accepted: Option<Instant>,
}

impl Default for Throttle {
    fn default() -> Self {
        Self::new(THROTTLE_INTERVAL)
    }
}

impl Throttle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_accepted: None,
        }
    }

    pub fn permits(&self, now: Instant) -> bool {
        match self.last_accepted {
            Some(last) => {
                let elapsed = now.saturating_duration_since(last);
                if elapsed < self.interval {
                    log::trace!("Throttled ({:?} since last accepted spawn)", elapsed);
                    false
                } else {
                    true
                }
            }
            None => true,
        }
    }

    pub fn record(&mut self, now: Instant) {
        self.last_accepted = Some(now);
    }
}
