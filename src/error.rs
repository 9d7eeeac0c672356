//! Error type shared by the mirroring pipeline

use thiserror::Error;
use x11rb::errors::{ConnectError, ConnectionError, ReplyError, ReplyOrIdError};
use x11rb::x11_utils::X11Error;

#[derive(Debug, Error)]
pub enum MirrorError {
    #[error("cannot connect to display {display}")]
    Connection {
        display: String,
        #[source]
        source: ConnectError,
    },

    #[error("display {display} does not support the {extension} extension")]
    UnsupportedServer {
        display: String,
        extension: &'static str,
    },

    #[error("invalid monitor number {index}: display has {count} monitor(s)")]
    OutOfRange { index: usize, count: usize },

    #[error("no output named {name:?} (available: {})", .candidates.join(", "))]
    NotFound {
        name: String,
        candidates: Vec<String>,
    },

    #[error("output {name:?} is not driven by any CRTC")]
    NoCrtc { name: String },

    #[error("output {name:?} does not match any enumerated monitor")]
    NoMatchingRegion { name: String },

    #[error("failed to register damage reporting")]
    Registration(#[source] ReplyError),

    #[error("pixel formats differ: source is {src}, destination is {dst}")]
    DepthMismatch { src: String, dst: String },

    #[error("unsupported pixel format: {0}")]
    UnsupportedPixelFormat(String),

    #[error("source and destination are the same display ({0})")]
    SameDisplay(String),

    #[error("X11 error on display {display}: {error:?}")]
    Protocol { display: String, error: X11Error },

    #[error("pointer interception thread panicked")]
    InterceptorPanicked,

    #[error(transparent)]
    X11Connection(#[from] ConnectionError),

    #[error(transparent)]
    X11Reply(#[from] ReplyError),

    #[error(transparent)]
    X11Id(#[from] ReplyOrIdError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = MirrorError> = std::result::Result<T, E>;
