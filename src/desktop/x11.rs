//! X11 desktop backed by x11rb
//!
//! Monitors come from RandR; surfaces are override-redirect windows whose
//! input region is emptied through XFixes so clicks fall through to
//! whatever is underneath.

use std::sync::Arc;

use x11rb::connection::Connection;
use x11rb::protocol::randr::ConnectionExt as _;
use x11rb::protocol::shape;
use x11rb::protocol::xfixes::ConnectionExt as _;
use x11rb::protocol::xproto::{
    AtomEnum, ConfigureWindowAux, ConnectionExt as _, CreateWindowAux, PropMode, StackMode,
    Window, WindowClass,
};
use x11rb::rust_connection::RustConnection;
use x11rb::wrapper::ConnectionExt as _;
use x11rb::COPY_DEPTH_FROM_PARENT;

use super::{Desktop, Surface};
use crate::display::{MonitorGeometry, Point, Rect};
use crate::ipc::UiMessage;
use crate::state_machine::SurfaceId;

const WM_CLASS: &[u8] = b"cursor-ping\0cursor-ping\0";

/// Fill colours (0xRRGGBB)
const OVERLAY_COLOR: u32 = 0x00e8_5d3f;
const WARNING_COLOR: u32 = 0x0020_2124;

pub struct X11Desktop {
    conn: Arc<RustConnection>,
    root: Window,
    root_visual: u32,
    screen_size: (u16, u16),
}

impl X11Desktop {
    /// Connect to the display named by `$DISPLAY`
    pub fn connect() -> Result<Self, String> {
        let (conn, screen_num) =
            x11rb::connect(None).map_err(|e| format!("Failed to connect to X11: {}", e))?;

        let screen = conn
            .setup()
            .roots
            .get(screen_num)
            .ok_or_else(|| format!("X11 screen {} does not exist", screen_num))?;
        let root = screen.root;
        let root_visual = screen.root_visual;
        let screen_size = (screen.width_in_pixels, screen.height_in_pixels);

        // XFixes refuses requests from clients that never announced a version
        conn.xfixes_query_version(5, 0)
            .map_err(|e| format!("XFixes unavailable: {}", e))?
            .reply()
            .map_err(|e| format!("XFixes unavailable: {}", e))?;

        match conn.randr_query_version(1, 5).map(|cookie| cookie.reply()) {
            Ok(Ok(version)) => log::debug!(
                "RandR {}.{}",
                version.major_version,
                version.minor_version
            ),
            Ok(Err(e)) => log::warn!("RandR unavailable, using screen size: {}", e),
            Err(e) => log::warn!("RandR unavailable, using screen size: {}", e),
        }

        log::info!(
            "Connected to X11: screen={}, dimensions={}x{}",
            screen_num,
            screen_size.0,
            screen_size.1
        );

        Ok(Self {
            conn: Arc::new(conn),
            root,
            root_visual,
            screen_size,
        })
    }

    fn randr_monitors(&self) -> Result<Vec<MonitorGeometry>, String> {
        let reply = self
            .conn
            .randr_get_monitors(self.root, true)
            .map_err(|e| format!("RandR GetMonitors: {}", e))?
            .reply()
            .map_err(|e| format!("RandR GetMonitors: {}", e))?;

        Ok(reply
            .monitors
            .iter()
            .map(|m| {
                MonitorGeometry::new(m.x.into(), m.y.into(), m.width.into(), m.height.into())
                    .with_primary(m.primary)
            })
            .collect())
    }

    fn make_click_through(&self, window: Window) -> Result<(), String> {
        let region = self
            .conn
            .generate_id()
            .map_err(|e| format!("Failed to generate region id: {}", e))?;
        self.conn
            .xfixes_create_region(region, &[])
            .map_err(|e| format!("Failed to create input region: {}", e))?;
        self.conn
            .xfixes_set_window_shape_region(window, shape::SK::INPUT, 0, 0, region)
            .map_err(|e| format!("Failed to set input region: {}", e))?;
        self.conn
            .xfixes_destroy_region(region)
            .map_err(|e| format!("Failed to destroy input region: {}", e))?;
        Ok(())
    }
}

impl Desktop for X11Desktop {
    fn cursor_position(&self) -> Result<Point, String> {
        let reply = self
            .conn
            .query_pointer(self.root)
            .map_err(|e| format!("QueryPointer: {}", e))?
            .reply()
            .map_err(|e| format!("QueryPointer: {}", e))?;
        Ok(Point::new(reply.root_x.into(), reply.root_y.into()))
    }

    fn monitors(&self) -> Result<Vec<MonitorGeometry>, String> {
        match self.randr_monitors() {
            Ok(monitors) if !monitors.is_empty() => Ok(monitors),
            Ok(_) => {
                log::debug!("RandR reported no monitors, using screen size");
                Ok(vec![self.whole_screen()])
            }
            Err(e) => {
                log::debug!("{}, using screen size", e);
                Ok(vec![self.whole_screen()])
            }
        }
    }

    fn create_surface(&self, id: SurfaceId, rect: Rect) -> Result<Box<dyn Surface>, String> {
        let window = self
            .conn
            .generate_id()
            .map_err(|e| format!("Failed to generate window id: {}", e))?;

        let color = match id {
            SurfaceId::Overlay(_) => OVERLAY_COLOR,
            SurfaceId::Warning => WARNING_COLOR,
        };

        self.conn
            .create_window(
                COPY_DEPTH_FROM_PARENT,
                window,
                self.root,
                to_i16(rect.x),
                to_i16(rect.y),
                to_extent(rect.width),
                to_extent(rect.height),
                0,
                WindowClass::INPUT_OUTPUT,
                self.root_visual,
                &CreateWindowAux::new()
                    .override_redirect(1u32)
                    .background_pixel(color),
            )
            .map_err(|e| format!("Failed to create window for {:?}: {}", id, e))?;

        // Dropping the surface destroys the window if setup fails below
        let surface = X11Surface {
            conn: self.conn.clone(),
            window,
            closed: false,
        };

        self.conn
            .change_property8(
                PropMode::REPLACE,
                window,
                AtomEnum::WM_CLASS,
                AtomEnum::STRING,
                WM_CLASS,
            )
            .map_err(|e| format!("Failed to set WM_CLASS: {}", e))?;

        self.make_click_through(window)?;

        log::debug!("Created window {:#x} for {:?} at {:?}", window, id, rect);
        Ok(Box::new(surface))
    }
}

impl X11Desktop {
    fn whole_screen(&self) -> MonitorGeometry {
        MonitorGeometry::new(0, 0, self.screen_size.0.into(), self.screen_size.1.into())
            .with_primary(true)
    }
}

pub struct X11Surface {
    conn: Arc<RustConnection>,
    window: Window,
    closed: bool,
}

impl Surface for X11Surface {
    fn show(&mut self) -> Result<(), String> {
        if self.closed {
            return Err(format!("Window {:#x} is already closed", self.window));
        }
        self.conn
            .map_window(self.window)
            .map_err(|e| format!("Failed to map window: {}", e))?;
        self.conn
            .configure_window(
                self.window,
                &ConfigureWindowAux::new().stack_mode(StackMode::ABOVE),
            )
            .map_err(|e| format!("Failed to raise window: {}", e))?;
        self.conn
            .flush()
            .map_err(|e| format!("Failed to flush X11 connection: {}", e))?;
        Ok(())
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(e) = self.conn.destroy_window(self.window) {
            log::error!("Failed to destroy window {:#x}: {}", self.window, e);
        }
        if let Err(e) = self.conn.flush() {
            log::error!("Failed to flush X11 connection during cleanup: {}", e);
        }
    }

    fn send_message(&mut self, message: &UiMessage) -> Result<(), String> {
        match message {
            UiMessage::ShowWarning => self.show(),
            other => {
                log::debug!("Window {:#x} has no renderer for {:?}", self.window, other);
                Ok(())
            }
        }
    }
}

impl Drop for X11Surface {
    fn drop(&mut self) {
        self.close();
    }
}

fn to_i16(value: i32) -> i16 {
    value.clamp(i16::MIN.into(), i16::MAX.into()) as i16
}

/// X11 rejects zero-sized windows
fn to_extent(value: i32) -> u16 {
    value.clamp(1, u16::MAX.into()) as u16
}
