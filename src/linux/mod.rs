//! Linux X11 support module
//!
//! Provides sessions, monitor enumeration, damage tracking, shared-memory
//! frame transfer, pointer interception and cursor handling on top of x11rb.

pub mod cursor;
pub mod damage;
pub mod display;
pub mod event_tap;
pub mod session;
pub mod shm;

// Re-export commonly used types
pub use cursor::{X11CursorSource, X11Pointer};
pub use damage::DamageTracker;
pub use display::{list_regions, RandrOutputs};
pub use event_tap::PointerInterceptor;
pub use session::Session;
pub use shm::ShmTransfer;
