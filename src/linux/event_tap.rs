//! Global pointer motion interception using the RECORD extension

use std::thread;

use x11rb::connection::Connection;
use x11rb::protocol::record::{self, ConnectionExt as RecordExt, ExtRange, Range16, Range8, CS};
use x11rb::protocol::xproto::{MotionNotifyEvent, MOTION_NOTIFY_EVENT};
use x11rb::x11_utils::TryParse;

use crate::error::{MirrorError, Result};
use crate::linux::Session;

/// Category of intercepted data that the server sent to a client
const RECORD_FROM_SERVER: u8 = 0;

/// Size of a core protocol event on the wire
const EVENT_SIZE: usize = 32;

/// Background thread that reports every pointer motion on a display
pub struct PointerInterceptor {
    handle: thread::JoinHandle<Result<()>>,
}

impl PointerInterceptor {
    /// Start reporting pointer motions of all clients to `on_motion`.
    ///
    /// Recording blocks its connection, so the data is read on a clone of
    /// `session`. Motions are delivered one at a time, in server order. The
    /// thread stops when `on_motion` fails or the connection is lost.
    pub fn start<F>(session: &Session, mut on_motion: F) -> Result<Self>
    where
        F: FnMut(i32, i32) -> Result<()> + Send + 'static,
    {
        session.require_extension(record::X11_EXTENSION_NAME)?;
        let version = session.conn().record_query_version(1, 13)?.reply()?;
        log::debug!(
            "{}: RECORD {}.{}",
            session.name(),
            version.major_version,
            version.minor_version
        );

        let data = session.try_clone()?;

        let context = session.conn().generate_id()?;
        session
            .conn()
            .record_create_context(context, 0, &[CS::ALL_CLIENTS.into()], &[motion_range()])?
            .check()?;

        // Both connections must be in sync or enabling the context fails
        session.sync()?;
        data.sync()?;

        let handle = thread::Builder::new()
            .name("pointer-intercept".to_string())
            .spawn(move || -> Result<()> {
                for reply in data.conn().record_enable_context(context)? {
                    let reply = reply?;
                    if reply.client_swapped || reply.category != RECORD_FROM_SERVER {
                        continue;
                    }
                    for (x, y) in decode_motions(&reply.data) {
                        on_motion(x, y)?;
                    }
                }
                log::warn!("pointer recording context was disabled");
                Ok(())
            })?;

        Ok(Self { handle })
    }

    /// Wait for the interception thread to end
    pub fn join(self) -> Result<()> {
        self.handle
            .join()
            .map_err(|_| MirrorError::InterceptorPanicked)?
    }
}

/// Record core `MotionNotify` device events only
fn motion_range() -> record::Range {
    let none8 = Range8 { first: 0, last: 0 };
    let none_ext = ExtRange {
        major: none8,
        minor: Range16 { first: 0, last: 0 },
    };

    record::Range {
        core_requests: none8,
        core_replies: none8,
        ext_requests: none_ext,
        ext_replies: none_ext,
        delivered_events: none8,
        device_events: Range8 {
            first: MOTION_NOTIFY_EVENT,
            last: MOTION_NOTIFY_EVENT,
        },
        errors: none8,
        client_started: false,
        client_died: false,
    }
}

/// Extract root coordinates of every motion event in a block of recorded data
fn decode_motions(data: &[u8]) -> Vec<(i32, i32)> {
    data.chunks_exact(EVENT_SIZE)
        .filter(|event| event[0] & 0x7f == MOTION_NOTIFY_EVENT)
        .filter_map(|event| MotionNotifyEvent::try_parse(event).ok())
        .map(|(event, _)| (event.root_x as i32, event.root_y as i32))
        .collect()
}
