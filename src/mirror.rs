//! Pointer position and cursor shape mirroring
//!
//! The [`CursorMirror`] is driven from two threads: the pointer interceptor
//! reports every motion on the source display, and the event loop reports
//! cursor shape changes. Both paths serialize on the mirror's state lock.

use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::Result;
use crate::geometry::Rect;

/// Modulus applied to the pointer position while it is outside the mirrored
/// monitor and wiggling is enabled.
pub const WIGGLE_MODULUS: i32 = 50;

/// ARGB cursor image, premultiplied alpha, row-major
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CursorImage {
    pub width: u16,
    pub height: u16,
    pub xhot: u16,
    pub yhot: u16,
    pub pixels: Vec<u32>,
}

impl CursorImage {
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Pad the image into a square canvas of side `max(width, height)`.
    /// The image keeps its top-left placement, so the hotspot is unchanged.
    pub fn to_square(&self) -> CursorImage {
        let size = self.width.max(self.height);
        if size == self.width && size == self.height {
            return self.clone();
        }

        let (width, side) = (self.width as usize, size as usize);
        let mut pixels = vec![0u32; side * side];
        for (row, line) in self.pixels.chunks_exact(width).enumerate() {
            pixels[row * side..row * side + width].copy_from_slice(line);
        }

        CursorImage {
            width: size,
            height: size,
            xhot: self.xhot,
            yhot: self.yhot,
            pixels,
        }
    }
}

/// Destination side of the pointer mirror
pub trait PointerTarget: Send + Sync {
    fn warp(&self, x: i32, y: i32) -> Result<()>;

    /// Install the invisible cursor
    fn hide_cursor(&self) -> Result<()>;

    /// Install `image` as the active cursor
    fn show_cursor(&self, image: &CursorImage) -> Result<()>;

    fn flush(&self) -> Result<()>;
}

/// Source side of the cursor mirror
pub trait CursorSource: Send + Sync {
    fn cursor_image(&self) -> Result<CursorImage>;
}

#[derive(Debug, Default)]
struct MirrorState {
    /// Last known pointer position is inside the source region
    on: bool,
}

pub struct CursorMirror<P, C> {
    target: P,
    source: C,
    src_region: Rect,
    dst_region: Rect,
    wiggle: bool,
    state: Mutex<MirrorState>,
}

impl<P: PointerTarget, C: CursorSource> CursorMirror<P, C> {
    /// Creates the mirror and hides the destination cursor until the pointer
    /// enters the source region.
    pub fn new(target: P, source: C, src_region: Rect, dst_region: Rect, wiggle: bool) -> Result<Self> {
        target.hide_cursor()?;
        target.flush()?;

        Ok(Self {
            target,
            source,
            src_region,
            dst_region,
            wiggle,
            state: Mutex::new(MirrorState::default()),
        })
    }

    fn lock_state(&self) -> MutexGuard<'_, MirrorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[cfg(test)]
    pub fn is_on(&self) -> bool {
        self.lock_state().on
    }

    /// Handle a pointer motion at `(x, y)` in source desktop coordinates
    pub fn mouse_moved(&self, x: i32, y: i32) -> Result<()> {
        let mut state = self.lock_state();

        let was_on = state.on;
        state.on = self.src_region.contains(x, y);

        if state.on {
            let (dx, dy) = self.src_region.translate_to(&self.dst_region, x, y);
            self.target.warp(dx, dy)?;
        } else if self.wiggle {
            // Keeps the destination's screensaver away; position is meaningless
            self.target
                .warp(x.rem_euclid(WIGGLE_MODULUS), y.rem_euclid(WIGGLE_MODULUS))?;
        }

        if state.on != was_on {
            if state.on {
                log::debug!("pointer entered {} at ({x}, {y})", self.src_region);
                self.mirror_shape()?;
            } else {
                log::debug!("pointer left {} at ({x}, {y})", self.src_region);
                self.target.hide_cursor()?;
            }
        }

        self.target.flush()
    }

    /// Handle a cursor shape change on the source display
    pub fn cursor_changed(&self) -> Result<()> {
        let state = self.lock_state();
        if !state.on {
            return Ok(());
        }

        self.mirror_shape()?;
        self.target.flush()
    }

    /// Copy the source cursor to the destination. Caller holds the state lock.
    fn mirror_shape(&self) -> Result<()> {
        let image = self.source.cursor_image()?;
        if image.is_empty() {
            return self.target.hide_cursor();
        }

        log::debug!(
            "cursor changed: {}x{} hotspot ({}, {})",
            image.width,
            image.height,
            image.xhot,
            image.yhot
        );
        self.target.show_cursor(&image.to_square())
    }
}
