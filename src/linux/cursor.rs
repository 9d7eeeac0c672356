//! Pointer warping and cursor shape handling on X11

use std::sync::Arc;

use x11rb::connection::Connection;
use x11rb::protocol::render::{self, ConnectionExt as RenderExt, CreatePictureAux, PictType};
use x11rb::protocol::xfixes::ConnectionExt as XfixesExt;
use x11rb::protocol::xproto::{
    ChangeWindowAttributesAux, ConnectionExt, CreateGCAux, Cursor, ImageFormat, Rectangle, Window,
};

use crate::error::{MirrorError, Result};
use crate::linux::Session;
use crate::mirror::{CursorImage, CursorSource, PointerTarget};

/// Destination display pointer: warps, and swaps the root window cursor
pub struct X11Pointer {
    session: Arc<Session>,
    root: Window,
    invisible: Cursor,
    argb_format: render::Pictformat,
}

impl X11Pointer {
    pub fn new(session: Arc<Session>) -> Result<Self> {
        session.require_extension(render::X11_EXTENSION_NAME)?;
        session.conn().render_query_version(0, 11)?.reply()?;

        let root = session.root();
        let argb_format = find_argb_format(&session)?;
        let invisible = create_invisible_cursor(&session, root)?;

        Ok(Self {
            session,
            root,
            invisible,
            argb_format,
        })
    }

    fn define_cursor(&self, cursor: Cursor) -> Result<()> {
        self.session.conn().change_window_attributes(
            self.root,
            &ChangeWindowAttributesAux::new().cursor(cursor),
        )?;
        Ok(())
    }

    /// Upload `image` into a 32-bit pixmap and turn it into a cursor
    fn load_cursor(&self, image: &CursorImage) -> Result<Cursor> {
        let conn = self.session.conn();
        let lsb_first = self.session.pixel_format().lsb_first;
        let bytes: Vec<u8> = image
            .pixels
            .iter()
            .flat_map(|p| if lsb_first { p.to_le_bytes() } else { p.to_be_bytes() })
            .collect();

        let pixmap = conn.generate_id()?;
        conn.create_pixmap(32, pixmap, self.root, image.width, image.height)?;
        let gc = conn.generate_id()?;
        conn.create_gc(gc, pixmap, &CreateGCAux::new())?;
        conn.put_image(
            ImageFormat::Z_PIXMAP,
            pixmap,
            gc,
            image.width,
            image.height,
            0,
            0,
            0,
            32,
            &bytes,
        )?;

        let picture = conn.generate_id()?;
        conn.render_create_picture(picture, pixmap, self.argb_format, &CreatePictureAux::new())?;
        let cursor = conn.generate_id()?;
        conn.render_create_cursor(cursor, picture, image.xhot, image.yhot)?;

        conn.render_free_picture(picture)?;
        conn.free_gc(gc)?;
        conn.free_pixmap(pixmap)?;

        Ok(cursor)
    }
}

impl PointerTarget for X11Pointer {
    fn warp(&self, x: i32, y: i32) -> Result<()> {
        self.session
            .conn()
            .warp_pointer(x11rb::NONE, self.root, 0, 0, 0, 0, x as i16, y as i16)?;
        Ok(())
    }

    fn hide_cursor(&self) -> Result<()> {
        self.define_cursor(self.invisible)
    }

    fn show_cursor(&self, image: &CursorImage) -> Result<()> {
        let cursor = self.load_cursor(image)?;
        self.define_cursor(cursor)?;
        // The window keeps its own reference
        self.session.conn().free_cursor(cursor)?;
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        self.session.flush()
    }
}

/// The standard premultiplied ARGB32 picture format
fn find_argb_format(session: &Session) -> Result<render::Pictformat> {
    let formats = session.conn().render_query_pict_formats()?.reply()?;
    formats
        .formats
        .iter()
        .find(|f| {
            f.type_ == PictType::DIRECT
                && f.depth == 32
                && f.direct.alpha_shift == 24
                && f.direct.alpha_mask == 0xff
                && f.direct.red_shift == 16
                && f.direct.red_mask == 0xff
                && f.direct.green_shift == 8
                && f.direct.green_mask == 0xff
                && f.direct.blue_shift == 0
                && f.direct.blue_mask == 0xff
        })
        .map(|f| f.id)
        .ok_or_else(|| MirrorError::UnsupportedPixelFormat("no ARGB32 picture format".to_string()))
}

/// A 1x1 cursor whose mask is empty
fn create_invisible_cursor(session: &Session, root: Window) -> Result<Cursor> {
    let conn = session.conn();

    let pixmap = conn.generate_id()?;
    conn.create_pixmap(1, pixmap, root, 1, 1)?;
    let gc = conn.generate_id()?;
    conn.create_gc(gc, pixmap, &CreateGCAux::new().foreground(0))?;
    conn.poly_fill_rectangle(
        pixmap,
        gc,
        &[Rectangle {
            x: 0,
            y: 0,
            width: 1,
            height: 1,
        }],
    )?;

    let cursor = conn.generate_id()?;
    conn.create_cursor(cursor, pixmap, pixmap, 0, 0, 0, 0, 0, 0, 0, 0)?;

    conn.free_gc(gc)?;
    conn.free_pixmap(pixmap)?;
    Ok(cursor)
}

/// Source display cursor image, read through XFixes
pub struct X11CursorSource {
    session: Session,
}

impl X11CursorSource {
    /// `session` must have XFixes negotiated
    pub fn new(session: Session) -> Self {
        Self { session }
    }
}

impl CursorSource for X11CursorSource {
    fn cursor_image(&self) -> Result<CursorImage> {
        let reply = self.session.conn().xfixes_get_cursor_image()?.reply()?;
        Ok(CursorImage {
            width: reply.width,
            height: reply.height,
            xhot: reply.xhot,
            yhot: reply.yhot,
            pixels: reply.cursor_image,
        })
    }
}
