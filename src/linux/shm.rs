//! MIT-SHM frame transfer between two X servers on the same host
//!
//! One memfd-backed segment is attached to both servers. The source server
//! writes the captured monitor straight into it and the destination server
//! reads from it, so pixels never pass through this process.

use std::os::fd::OwnedFd;
use std::sync::Arc;

use nix::sys::memfd::{memfd_create, MemFdCreateFlag};
use nix::unistd::ftruncate;
use x11rb::connection::Connection;
use x11rb::protocol::shm::{self, ConnectionExt as ShmExt};
use x11rb::protocol::xproto::{ConnectionExt, CreateGCAux, Gcontext, ImageFormat};

use crate::error::{MirrorError, Result};
use crate::geometry::Rect;
use crate::linux::session::PixelFormat;
use crate::linux::Session;
use crate::replicator::FrameTransfer;

/// Bytes per pixel of the shared buffer
const BYTES_PER_PIXEL: usize = 4;

pub struct ShmTransfer {
    src: Arc<Session>,
    dst: Arc<Session>,
    src_seg: shm::Seg,
    dst_seg: shm::Seg,
    gc: Gcontext,
    depth: u8,
    _memory: OwnedFd,
}

impl ShmTransfer {
    /// Allocate a buffer large enough for `region` and attach it to both
    /// servers. Fails if the two displays do not share a 32 bpp pixel format.
    pub fn new(src: Arc<Session>, dst: Arc<Session>, region: &Rect) -> Result<Self> {
        let format = check_formats(src.pixel_format(), dst.pixel_format())?;

        require_fd_passing(&src)?;
        require_fd_passing(&dst)?;

        let size = region.width as usize * region.height as usize * BYTES_PER_PIXEL;
        let memory = memfd_create(c"xmirror-frame", MemFdCreateFlag::MFD_CLOEXEC)
            .map_err(std::io::Error::from)?;
        ftruncate(&memory, size as nix::libc::off_t).map_err(std::io::Error::from)?;

        // The source server writes captures, the destination only reads
        let src_seg = src.conn().generate_id()?;
        src.conn()
            .shm_attach_fd(src_seg, memory.try_clone()?, false)?
            .check()?;
        let dst_seg = dst.conn().generate_id()?;
        dst.conn()
            .shm_attach_fd(dst_seg, memory.try_clone()?, true)?
            .check()?;

        let gc = dst.conn().generate_id()?;
        dst.conn()
            .create_gc(gc, dst.root(), &CreateGCAux::new().graphics_exposures(0))?;

        log::info!("shared frame buffer: {} bytes, {}", size, format);

        Ok(Self {
            src,
            dst,
            src_seg,
            dst_seg,
            gc,
            depth: format.depth,
            _memory: memory,
        })
    }
}

/// Both displays must lay out pixels identically, at 32 bits per pixel
fn check_formats(src: PixelFormat, dst: PixelFormat) -> Result<PixelFormat> {
    if src != dst {
        return Err(MirrorError::DepthMismatch {
            src: src.to_string(),
            dst: dst.to_string(),
        });
    }
    if src.bits_per_pixel as usize != BYTES_PER_PIXEL * 8 {
        return Err(MirrorError::UnsupportedPixelFormat(src.to_string()));
    }
    Ok(src)
}

/// Attaching a segment by file descriptor needs MIT-SHM 1.2
fn require_fd_passing(session: &Session) -> Result<()> {
    session.require_extension(shm::X11_EXTENSION_NAME)?;
    let version = session.conn().shm_query_version()?.reply()?;
    if (version.major_version, version.minor_version) < (1, 2) {
        return Err(MirrorError::UnsupportedServer {
            display: session.name().to_string(),
            extension: "MIT-SHM 1.2",
        });
    }
    Ok(())
}

impl FrameTransfer for ShmTransfer {
    fn capture(&mut self, region: &Rect) -> Result<()> {
        self.src
            .conn()
            .shm_get_image(
                self.src.root(),
                region.x as i16,
                region.y as i16,
                region.width as u16,
                region.height as u16,
                !0,
                ImageFormat::Z_PIXMAP.into(),
                self.src_seg,
                0,
            )?
            .reply()?;
        Ok(())
    }

    fn blit(&mut self, width: u32, height: u32, x: i32, y: i32) -> Result<()> {
        // Checked so the next capture cannot overwrite pixels the destination
        // has not read yet
        self.dst
            .conn()
            .shm_put_image(
                self.dst.root(),
                self.gc,
                width as u16,
                height as u16,
                0,
                0,
                width as u16,
                height as u16,
                x as i16,
                y as i16,
                self.depth,
                ImageFormat::Z_PIXMAP.into(),
                false,
                self.dst_seg,
                0,
            )?
            .check()?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.dst.flush()
    }
}

impl Drop for ShmTransfer {
    fn drop(&mut self) {
        let _ = self.src.conn().shm_detach(self.src_seg);
        let _ = self.dst.conn().shm_detach(self.dst_seg);
        let _ = self.dst.conn().free_gc(self.gc);
        let _ = self.dst.conn().flush();
        let _ = self.src.conn().flush();
    }
}
