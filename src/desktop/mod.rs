//! Windowing-system collaborators
//!
//! The controller only decides *what* should be on screen. Implementations
//! of these traits answer geometry queries and own the native surfaces.

pub mod x11;

pub use x11::X11Desktop;

use crate::display::{MonitorGeometry, Point, Rect};
use crate::ipc::UiMessage;
use crate::state_machine::SurfaceId;

/// Pointer position, monitor layout and surface creation
pub trait Desktop: Send + Sync {
    /// Current cursor position in global screen coordinates
    fn cursor_position(&self) -> Result<Point, String>;

    /// All monitors in the order the windowing system reports them
    fn monitors(&self) -> Result<Vec<MonitorGeometry>, String>;

    /// Create a borderless, always-on-top, click-through surface at `rect`.
    /// The surface starts hidden.
    fn create_surface(&self, id: SurfaceId, rect: Rect) -> Result<Box<dyn Surface>, String>;
}

/// A native surface owned by the effect runner
pub trait Surface: Send {
    /// Map the surface and raise it above everything else
    fn show(&mut self) -> Result<(), String>;

    /// Destroy the surface. Calling it again does nothing.
    fn close(&mut self);

    /// Deliver a message to whatever is rendered inside the surface
    fn send_message(&mut self, message: &UiMessage) -> Result<(), String>;
}
