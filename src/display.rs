//! Multi-monitor targeting for overlay surfaces
//!
//! Maps a cursor point plus the current monitor layout to the rectangle an
//! overlay should occupy. The result always lies fully inside exactly one
//! monitor; a point that no monitor contains yields no rectangle at all.

use serde::{Deserialize, Serialize};

/// Default overlay surface size (width x height, pixels)
pub const OVERLAY_WIDTH: i32 = 128;
pub const OVERLAY_HEIGHT: i32 = 226;

/// Extra upward offset so the overlay sits above the cursor
pub const OVERLAY_VERTICAL_BIAS: i32 = 50;

/// A point in global screen coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Size {
    pub width: i32,
    pub height: i32,
}

/// Axis-aligned rectangle in global screen coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }

    /// Inclusive on all four edges, so a point on a shared seam is
    /// contained by both neighbouring monitors.
    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.x && point.x <= self.right() && point.y >= self.y && point.y <= self.bottom()
    }

    pub fn size(&self) -> Size {
        Size {
            width: self.width,
            height: self.height,
        }
    }
}

/// One display's bounds as reported by the windowing system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorGeometry {
    pub bounds: Rect,
    pub primary: bool,
}

impl MonitorGeometry {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            bounds: Rect::new(x, y, width, height),
            primary: false,
        }
    }

    pub fn with_primary(mut self, primary: bool) -> Self {
        self.primary = primary;
        self
    }
}

/// How an overlay is placed relative to the cursor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetPolicy {
    pub surface: Size,
    pub vertical_bias: i32,
}

impl Default for TargetPolicy {
    fn default() -> Self {
        Self {
            surface: Size {
                width: OVERLAY_WIDTH,
                height: OVERLAY_HEIGHT,
            },
            vertical_bias: OVERLAY_VERTICAL_BIAS,
        }
    }
}

/// Find the monitor owning `point`. First match in iteration order wins.
pub fn monitor_at(point: Point, monitors: &[MonitorGeometry]) -> Option<&MonitorGeometry> {
    monitors.iter().find(|m| m.bounds.contains(point))
}

/// The primary monitor, or the first one if none is flagged
pub fn primary_monitor(monitors: &[MonitorGeometry]) -> Option<&MonitorGeometry> {
    monitors
        .iter()
        .find(|m| m.primary)
        .or_else(|| monitors.first())
}

/// Resolve the overlay rectangle for a trigger at `point`.
///
/// Returns `None` when no monitor contains the point (the trigger is
/// dropped). Otherwise the surface is centred on the point, lifted by the
/// policy's vertical bias and clamped into the owning monitor.
pub fn resolve(point: Point, monitors: &[MonitorGeometry], policy: TargetPolicy) -> Option<Rect> {
    let monitor = monitor_at(point, monitors)?.bounds;
    let surface = policy.surface;

    let desired_x = point.x - surface.width / 2;
    let desired_y = point.y - surface.height / 2 - policy.vertical_bias;

    let x = clamp_axis(desired_x, monitor.x, monitor.width, surface.width);
    let y = clamp_axis(desired_y, monitor.y, monitor.height, surface.height);

    Some(Rect::new(x, y, surface.width, surface.height))
}

fn clamp_axis(desired: i32, origin: i32, extent: i32, surface_extent: i32) -> i32 {
    origin.max(desired.min(origin + extent - surface_extent))
}
