//! Damage-driven frame replication between two displays

use std::time::Instant;

use crate::error::Result;
use crate::geometry::Rect;

/// Moves pixels from the source display to the destination display through
/// a buffer both servers can reach.
pub trait FrameTransfer {
    /// Read `region` of the source into the shared buffer. Blocks until the
    /// source server has written the pixels.
    fn capture(&mut self, region: &Rect) -> Result<()>;

    /// Draw the `width`x`height` buffer contents at `(x, y)` on the destination
    fn blit(&mut self, width: u32, height: u32, x: i32, y: i32) -> Result<()>;

    fn flush(&mut self) -> Result<()>;
}

/// Mirrors one source monitor onto one destination monitor.
///
/// Only the event-loop thread owns a replicator, so the dirty flag needs no
/// synchronization.
pub struct FrameReplicator<T: FrameTransfer> {
    transfer: T,
    src_region: Rect,
    dst_region: Rect,
    dirty: bool,
    passes: u64,
}

impl<T: FrameTransfer> FrameReplicator<T> {
    /// The replicator starts dirty so the destination is painted on the first pass.
    pub fn new(transfer: T, src_region: Rect, dst_region: Rect) -> Self {
        Self {
            transfer,
            src_region,
            dst_region,
            dirty: true,
            passes: 0,
        }
    }

    #[cfg(test)]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Number of completed replication passes
    #[cfg(test)]
    pub fn passes(&self) -> u64 {
        self.passes
    }

    /// Record a changed area of the source desktop
    pub fn damage(&mut self, rect: &Rect) {
        self.dirty = self.dirty || self.src_region.intersects(rect);
    }

    /// Copy the source monitor to the destination if anything changed since
    /// the last pass.
    pub fn copy_if_damaged(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }

        let start = Instant::now();
        self.transfer.capture(&self.src_region)?;
        let captured = start.elapsed();

        self.transfer.blit(
            self.src_region.width,
            self.src_region.height,
            self.dst_region.x,
            self.dst_region.y,
        )?;
        self.transfer.flush()?;

        self.dirty = false;
        self.passes += 1;

        log::trace!(
            "pass {}: capture {:?}, total {:?}",
            self.passes,
            captured,
            start.elapsed()
        );

        Ok(())
    }

    #[cfg(test)]
    pub fn transfer(&self) -> &T {
        &self.transfer
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;

    #[derive(Debug, Default)]
    pub struct RecordingTransfer {
        pub captures: Vec<Rect>,
        pub blits: Vec<(u32, u32, i32, i32)>,
        pub flushes: usize,
    }

    impl FrameTransfer for RecordingTransfer {
        fn capture(&mut self, region: &Rect) -> Result<()> {
            self.captures.push(*region);
            Ok(())
        }

        fn blit(&mut self, width: u32, height: u32, x: i32, y: i32) -> Result<()> {
            self.blits.push((width, height, x, y));
            Ok(())
        }

        fn flush(&mut self) -> Result<()> {
            self.flushes += 1;
            Ok(())
        }
    }

    /// Replicator with its initial full-screen pass already done
    pub fn clean_replicator(src: Rect, dst: Rect) -> FrameReplicator<RecordingTransfer> {
        let mut replicator = FrameReplicator::new(RecordingTransfer::default(), src, dst);
        replicator.copy_if_damaged().unwrap();
        replicator.transfer = RecordingTransfer::default();
        replicator
    }

    fn src() -> Rect {
        Rect::new(1920, 0, 1280, 1024)
    }

    fn dst() -> Rect {
        Rect::new(0, 0, 1280, 1024)
    }

    #[test]
    fn test_starts_dirty() {
        let mut replicator = FrameReplicator::new(RecordingTransfer::default(), src(), dst());
        assert!(replicator.is_dirty());
        replicator.copy_if_damaged().unwrap();
        assert_eq!(replicator.transfer().captures.len(), 1);
        assert!(!replicator.is_dirty());
    }

    #[test]
    fn test_damage_outside_leaves_flag() {
        let mut replicator = clean_replicator(src(), dst());
        replicator.damage(&Rect::new(0, 0, 1920, 1080));
        assert!(!replicator.is_dirty());

        replicator.damage(&Rect::new(2000, 10, 5, 5));
        replicator.damage(&Rect::new(0, 0, 100, 100));
        assert!(replicator.is_dirty());
    }

    #[test]
    fn test_damage_inside_sets_flag() {
        let mut replicator = clean_replicator(src(), dst());
        replicator.damage(&Rect::new(1919, 0, 2, 2));
        assert!(replicator.is_dirty());
    }

    #[test]
    fn test_copy_twice_transfers_once() {
        let mut replicator = clean_replicator(src(), dst());
        replicator.damage(&Rect::new(2000, 100, 50, 50));

        replicator.copy_if_damaged().unwrap();
        replicator.copy_if_damaged().unwrap();

        let transfer = replicator.transfer();
        assert_eq!(transfer.captures, vec![src()]);
        assert_eq!(transfer.blits, vec![(1280, 1024, 0, 0)]);
        assert_eq!(transfer.flushes, 1);
        assert_eq!(replicator.passes(), 2);
    }

    #[test]
    fn test_blit_targets_destination_origin() {
        let dst = Rect::new(640, 480, 1280, 1024);
        let mut replicator = clean_replicator(src(), dst);
        replicator.damage(&src());
        replicator.copy_if_damaged().unwrap();
        assert_eq!(replicator.transfer().blits, vec![(1280, 1024, 640, 480)]);
    }
}
