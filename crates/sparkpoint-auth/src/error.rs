//! Error types.

use thiserror::Error;

use crate::session::SessionPhase;

/// Crate result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// Cookie name or attributes cannot be expressed in a `Set-Cookie` header.
    #[error("invalid cookie: {0}")]
    InvalidCookie(String),

    /// A session transition was requested from a state that does not allow it.
    #[error("cannot {transition} while session is {from:?}")]
    InvalidTransition {
        /// Name of the rejected transition.
        transition: &'static str,
        /// Phase the session was in.
        from: SessionPhase,
    },

    /// Reading or writing a cookie jar file failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON encoding error.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
