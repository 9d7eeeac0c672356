//! X11 session: one connection plus the extensions the mirror relies on

use std::fmt;

use x11rb::connection::{Connection, RequestConnection};
use x11rb::protocol::damage::{self, ConnectionExt as DamageExt};
use x11rb::protocol::xfixes::{self, ConnectionExt as XfixesExt};
use x11rb::protocol::xproto::{ConnectionExt, ImageOrder, Screen, Window};
use x11rb::protocol::Event;
use x11rb::rust_connection::RustConnection;

use crate::error::{MirrorError, Result};
use crate::event_loop::{EventSource, SourceEvent};
use crate::geometry::Rect;

/// Layout of the root window's pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelFormat {
    pub depth: u8,
    pub bits_per_pixel: u8,
    pub lsb_first: bool,
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "depth {} at {} bpp ({})",
            self.depth,
            self.bits_per_pixel,
            if self.lsb_first { "LSB first" } else { "MSB first" }
        )
    }
}

pub struct Session {
    conn: RustConnection,
    screen_num: usize,
    name: String,
}

impl Session {
    /// Connect to the display called `name` (e.g. `:0`)
    pub fn connect(name: &str) -> Result<Self> {
        let (conn, screen_num) =
            RustConnection::connect(Some(name)).map_err(|source| MirrorError::Connection {
                display: name.to_string(),
                source,
            })?;

        Ok(Self {
            conn,
            screen_num,
            name: name.to_string(),
        })
    }

    /// Connect and negotiate DAMAGE and XFixes in one go
    pub fn open(name: &str) -> Result<Self> {
        let session = Self::connect(name)?;
        session.discover_extensions()?;
        Ok(session)
    }

    /// Negotiate the DAMAGE and XFixes extensions. Both must be present.
    pub fn discover_extensions(&self) -> Result<()> {
        let damage_info = self.require_extension(damage::X11_EXTENSION_NAME)?;
        let damage_version = self.conn.damage_query_version(1, 1)?.reply()?;

        let xfixes_info = self.require_extension(xfixes::X11_EXTENSION_NAME)?;
        let xfixes_version = self.conn.xfixes_query_version(5, 0)?.reply()?;

        log::debug!(
            "{}: DAMAGE {}.{} (event base {}), XFIXES {}.{} (event base {})",
            self.name,
            damage_version.major_version,
            damage_version.minor_version,
            damage_info.first_event,
            xfixes_version.major_version,
            xfixes_version.minor_version,
            xfixes_info.first_event
        );
        Ok(())
    }

    /// Look up an extension, failing with `UnsupportedServer` when absent
    pub fn require_extension(
        &self,
        extension: &'static str,
    ) -> Result<x11rb::x11_utils::ExtensionInformation> {
        self.conn
            .extension_information(extension)?
            .ok_or_else(|| MirrorError::UnsupportedServer {
                display: self.name.clone(),
                extension,
            })
    }

    pub fn has_extension(&self, extension: &'static str) -> Result<bool> {
        Ok(self.conn.extension_information(extension)?.is_some())
    }

    /// Open an independent connection to the same display with DAMAGE and
    /// XFixes negotiated
    pub fn try_clone(&self) -> Result<Self> {
        Self::open(&self.name)
    }

    pub fn conn(&self) -> &RustConnection {
        &self.conn
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn screen(&self) -> &Screen {
        &self.conn.setup().roots[self.screen_num]
    }

    pub fn root(&self) -> Window {
        self.screen().root
    }

    /// The whole root window as one rectangle
    pub fn root_rect(&self) -> Rect {
        let screen = self.screen();
        Rect::new(
            0,
            0,
            screen.width_in_pixels as u32,
            screen.height_in_pixels as u32,
        )
    }

    pub fn pixel_format(&self) -> PixelFormat {
        let setup = self.conn.setup();
        let depth = self.screen().root_depth;
        let bits_per_pixel = setup
            .pixmap_formats
            .iter()
            .find(|f| f.depth == depth)
            .map(|f| f.bits_per_pixel)
            .unwrap_or(0);

        PixelFormat {
            depth,
            bits_per_pixel,
            lsb_first: setup.image_byte_order == ImageOrder::LSB_FIRST,
        }
    }

    /// Ask for cursor shape change notifications on `window`
    pub fn select_cursor_input(&self, window: Window) -> Result<()> {
        self.conn
            .xfixes_select_cursor_input(window, xfixes::CursorNotifyMask::DISPLAY_CURSOR)?
            .check()?;
        Ok(())
    }

    pub fn flush(&self) -> Result<()> {
        self.conn.flush()?;
        Ok(())
    }

    /// Round trip to the server; every request sent so far has been processed
    /// once this returns.
    pub fn sync(&self) -> Result<()> {
        self.conn.get_input_focus()?.reply()?;
        Ok(())
    }
}

/// Map an event to what the event loop cares about. X11 errors are fatal.
fn classify(event: Event, display: &str) -> Result<SourceEvent> {
    Ok(match event {
        Event::DamageNotify(e) => SourceEvent::Damage(Rect::new(
            e.area.x as i32,
            e.area.y as i32,
            e.area.width as u32,
            e.area.height as u32,
        )),
        Event::XfixesCursorNotify(_) => SourceEvent::CursorChanged,
        Event::Error(error) => {
            return Err(MirrorError::Protocol {
                display: display.to_string(),
                error,
            })
        }
        _ => SourceEvent::Other,
    })
}

impl EventSource for Session {
    fn next_event(&self) -> Result<SourceEvent> {
        classify(self.conn.wait_for_event()?, &self.name)
    }

    fn poll_event(&self) -> Result<Option<SourceEvent>> {
        self.conn
            .poll_for_event()?
            .map(|event| classify(event, &self.name))
            .transpose()
    }
}
