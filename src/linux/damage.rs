//! DAMAGE extension tracking of a window's changed areas

use x11rb::connection::Connection;
use x11rb::errors::{ConnectionError, ReplyError};
use x11rb::protocol::damage::{self, ConnectionExt as DamageExt, ReportLevel};
use x11rb::protocol::xproto::Window;

use crate::error::{MirrorError, Result};
use crate::event_loop::DamageAck;
use crate::linux::Session;

/// Requests a tracker sends once its damage object exists
pub trait DamageRequests {
    fn subtract(&self, damage: damage::Damage) -> Result<()>;
    fn destroy(&self, damage: damage::Damage);
    fn flush(&self) -> Result<()>;
}

impl DamageRequests for Session {
    fn subtract(&self, damage: damage::Damage) -> Result<()> {
        self.conn()
            .damage_subtract(damage, x11rb::NONE, x11rb::NONE)?;
        Ok(())
    }

    fn destroy(&self, damage: damage::Damage) {
        let _ = self.conn().damage_destroy(damage);
        let _ = self.conn().flush();
    }

    fn flush(&self) -> Result<()> {
        Session::flush(self)
    }
}

/// Reports every changed rectangle of a window as a `DamageNotify` event on
/// the owning session.
pub struct DamageTracker<'a, S: DamageRequests = Session> {
    session: &'a S,
    damage: damage::Damage,
}

impl<'a> DamageTracker<'a, Session> {
    pub fn attach(session: &'a Session, window: Window) -> Result<Self> {
        if !session.has_extension(damage::X11_EXTENSION_NAME)? {
            return Err(missing_extension());
        }

        let damage = session.conn().generate_id()?;
        session
            .conn()
            .damage_create(damage, window, ReportLevel::RAW_RECTANGLES)
            .map_err(|e| MirrorError::Registration(e.into()))?
            .check()
            .map_err(MirrorError::Registration)?;

        log::debug!("{}: tracking damage on window {:#x}", session.name(), window);
        Ok(Self { session, damage })
    }
}

/// Registration without DAMAGE on the server
fn missing_extension() -> MirrorError {
    MirrorError::Registration(ReplyError::ConnectionError(
        ConnectionError::UnsupportedExtension,
    ))
}

impl<S: DamageRequests> DamageAck for DamageTracker<'_, S> {
    /// Empty the damage region so the server keeps reporting changes. The
    /// request is flushed here since waiting for events does not write.
    fn acknowledge(&self) -> Result<()> {
        self.session.subtract(self.damage)?;
        self.session.flush()
    }
}

impl<S: DamageRequests> Drop for DamageTracker<'_, S> {
    fn drop(&mut self) {
        self.session.destroy(self.damage);
    }
}
