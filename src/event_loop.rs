//! Main-thread event loop
//!
//! Drains the source display's event queue, feeding damage to the frame
//! replicator and cursor notifications to the cursor mirror, then runs one
//! replication pass over everything accumulated. Errors queued on either
//! display end the loop.

use crate::error::Result;
use crate::geometry::Rect;
use crate::replicator::{FrameReplicator, FrameTransfer};

/// Events of interest on the source display
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceEvent {
    Damage(Rect),
    CursorChanged,
    Other,
}

pub trait EventSource {
    /// Block until the next event arrives
    fn next_event(&self) -> Result<SourceEvent>;

    /// Return an already queued event without blocking
    fn poll_event(&self) -> Result<Option<SourceEvent>>;
}

/// Re-arms damage reporting after a pass
pub trait DamageAck {
    fn acknowledge(&self) -> Result<()>;
}

pub trait CursorListener {
    fn cursor_changed(&self) -> Result<()>;
}

impl<P, C> CursorListener for crate::mirror::CursorMirror<P, C>
where
    P: crate::mirror::PointerTarget,
    C: crate::mirror::CursorSource,
{
    fn cursor_changed(&self) -> Result<()> {
        crate::mirror::CursorMirror::cursor_changed(self)
    }
}

/// Run one iteration: wait for at least one event, drain the queue, then
/// acknowledge damage and replicate.
///
/// `destination` only ever queues errors of unchecked requests (pointer
/// warps, cursor uploads); any of them fails the iteration.
pub fn iterate<T: FrameTransfer>(
    events: &dyn EventSource,
    destination: &dyn EventSource,
    damage: &dyn DamageAck,
    replicator: &mut FrameReplicator<T>,
    cursor: &dyn CursorListener,
) -> Result<()> {
    let mut next = Some(events.next_event()?);
    while let Some(event) = next {
        match event {
            SourceEvent::Damage(rect) => replicator.damage(&rect),
            SourceEvent::CursorChanged => cursor.cursor_changed()?,
            SourceEvent::Other => {}
        }
        next = events.poll_event()?;
    }
    while destination.poll_event()?.is_some() {}

    damage.acknowledge()?;
    replicator.copy_if_damaged()
}

/// Run forever; only returns on error
pub fn run<T: FrameTransfer>(
    events: &dyn EventSource,
    destination: &dyn EventSource,
    damage: &dyn DamageAck,
    replicator: &mut FrameReplicator<T>,
    cursor: &dyn CursorListener,
) -> Result<()> {
    loop {
        iterate(events, destination, damage, replicator, cursor)?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MirrorError;
    use crate::linux::session::tests::bad_value;
    use crate::mirror::tests::{mirror, Call};
    use crate::replicator::tests::clean_replicator;
    use std::cell::{Cell, RefCell};
    use std::collections::VecDeque;

    /// Queue of events; `next_event` pops the first, `poll_event` the rest
    struct ScriptedEvents {
        queue: RefCell<VecDeque<SourceEvent>>,
    }

    impl ScriptedEvents {
        fn new(events: &[SourceEvent]) -> Self {
            Self {
                queue: RefCell::new(events.iter().copied().collect()),
            }
        }
    }

    impl EventSource for ScriptedEvents {
        fn next_event(&self) -> Result<SourceEvent> {
            Ok(self
                .queue
                .borrow_mut()
                .pop_front()
                .expect("test scripted too few events"))
        }

        fn poll_event(&self) -> Result<Option<SourceEvent>> {
            Ok(self.queue.borrow_mut().pop_front())
        }
    }

    fn idle() -> ScriptedEvents {
        ScriptedEvents::new(&[])
    }

    /// Display whose queue holds a single X11 error
    struct FailingDisplay;

    impl EventSource for FailingDisplay {
        fn next_event(&self) -> Result<SourceEvent> {
            Err(protocol_error())
        }

        fn poll_event(&self) -> Result<Option<SourceEvent>> {
            Err(protocol_error())
        }
    }

    fn protocol_error() -> MirrorError {
        MirrorError::Protocol {
            display: ":1".to_string(),
            error: bad_value("WarpPointer"),
        }
    }

    #[derive(Default)]
    struct CountingAck {
        acks: Cell<usize>,
    }

    impl DamageAck for CountingAck {
        fn acknowledge(&self) -> Result<()> {
            self.acks.set(self.acks.get() + 1);
            Ok(())
        }
    }

    fn src() -> Rect {
        Rect::new(1920, 0, 1280, 1024)
    }

    fn dst() -> Rect {
        Rect::new(0, 300, 1280, 1024)
    }

    #[test]
    fn test_damage_outside_region_copies_nothing() {
        let events = ScriptedEvents::new(&[SourceEvent::Damage(Rect::new(0, 0, 800, 600))]);
        let ack = CountingAck::default();
        let mut replicator = clean_replicator(src(), dst());
        let (cursor, _, _) = mirror(false);

        iterate(&events, &idle(), &ack, &mut replicator, &cursor).unwrap();

        assert_eq!(ack.acks.get(), 1);
        assert!(replicator.transfer().captures.is_empty());
        assert!(replicator.transfer().blits.is_empty());
    }

    #[test]
    fn test_damage_inside_region_copies_once() {
        let events = ScriptedEvents::new(&[
            SourceEvent::Damage(Rect::new(2000, 10, 10, 10)),
            SourceEvent::Other,
            SourceEvent::Damage(Rect::new(2500, 500, 64, 64)),
        ]);
        let ack = CountingAck::default();
        let mut replicator = clean_replicator(src(), dst());
        let (cursor, _, _) = mirror(false);

        iterate(&events, &idle(), &ack, &mut replicator, &cursor).unwrap();

        let transfer = replicator.transfer();
        assert_eq!(transfer.captures, vec![src()]);
        assert_eq!(transfer.blits, vec![(1280, 1024, 0, 300)]);
        assert!(events.queue.borrow().is_empty());
    }

    #[test]
    fn test_cursor_notification_reaches_mirror() {
        let events = ScriptedEvents::new(&[SourceEvent::CursorChanged]);
        let ack = CountingAck::default();
        let mut replicator = clean_replicator(src(), dst());
        let (cursor, target, source) = mirror(false);
        cursor.mouse_moved(2000, 10).unwrap();

        iterate(&events, &idle(), &ack, &mut replicator, &cursor).unwrap();

        assert_eq!(source.captures(), 2);
        assert_eq!(target.calls().last(), Some(&Call::Flush));
        assert!(replicator.transfer().captures.is_empty());
    }

    #[test]
    fn test_source_error_ends_iteration() {
        let ack = CountingAck::default();
        let mut replicator = clean_replicator(src(), dst());
        let (cursor, _, _) = mirror(false);

        let err = iterate(&FailingDisplay, &idle(), &ack, &mut replicator, &cursor).unwrap_err();

        assert!(matches!(err, MirrorError::Protocol { .. }));
        assert_eq!(ack.acks.get(), 0);
    }

    #[test]
    fn test_destination_error_ends_iteration() {
        let events = ScriptedEvents::new(&[SourceEvent::Damage(Rect::new(2000, 10, 10, 10))]);
        let ack = CountingAck::default();
        let mut replicator = clean_replicator(src(), dst());
        let (cursor, _, _) = mirror(false);

        let err = iterate(&events, &FailingDisplay, &ack, &mut replicator, &cursor).unwrap_err();

        assert!(matches!(err, MirrorError::Protocol { .. }));
        assert!(replicator.transfer().captures.is_empty());
    }
}
