//! Error taxonomy for the window manager core.
//!
//! Transport races on windows the server already invalidated are expected
//! and tolerated; anything else means the manager's view of the server can
//! no longer be trusted.

use thiserror::Error;

use crate::shared::Xid;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// The server no longer knows this window
    #[error("window 0x{0:x} no longer exists")]
    BadWindow(Xid),

    /// A protocol error we have no recovery strategy for
    #[error("unexpected protocol error {kind} from {request}")]
    Protocol { request: String, kind: String },

    #[error("connection to the display server failed: {0}")]
    Connection(String),

    #[error("the display server ran out of resource ids")]
    IdsExhausted,

    #[error("the event stream was closed")]
    Disconnected,

    #[error("invalid key binding: {0}")]
    InvalidBinding(String),
}

impl Error {
    /// Races against a window that vanished mid-operation
    pub fn is_benign(&self) -> bool {
        matches!(self, Error::BadWindow(_))
    }
}

/// Swallow benign transport races, propagating everything else
pub fn tolerate<T>(result: Result<T>, op: &str) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_benign() => {
            tracing::debug!(op, error = %e, "ignoring benign race");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}
