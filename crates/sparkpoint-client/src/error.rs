//! Error types.

use serde_json::Value;
use sparkpoint_api::{SparkpointError, body_detail};
use sparkpoint_core::ValidationErrors;
use thiserror::Error;

/// Crate result type.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Fallback when a failed login carries no usable explanation.
pub const NETWORK_ERROR: &str = "Network error";

/// Errors returned by this crate.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The server answered with a non-2xx status.
    #[error("request failed with status {status}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Decoded body (`Null` when empty, a string when not JSON).
        body: Value,
    },

    /// No response was received.
    #[error(transparent)]
    Transport(#[from] SparkpointError),

    /// The response body did not have the expected shape.
    #[error("unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),

    /// The session state machine refused a transition.
    #[error(transparent)]
    Session(#[from] sparkpoint_auth::Error),

    /// The form failed client-side validation; nothing was sent.
    #[error("validation failed: {0}")]
    Validation(ValidationErrors),

    /// Role gate for administrator-only operations.
    #[error("Only administrators can register new admins.")]
    NotAdministrator,

    /// A 401 on a user-service call, after any refresh attempt.
    #[error("Authentication failed. Please log in again.")]
    AuthenticationFailed,

    /// A 403 on a user-service call.
    #[error("{0}")]
    AccessDenied(String),

    /// Any other user-service failure, with the best available message.
    #[error("{0}")]
    Rejected(String),
}

impl ClientError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }

    /// Best explanation for a human: the server's `message`, then its
    /// `error`, then the transport's own message, then [`NETWORK_ERROR`].
    pub fn best_message(&self) -> String {
        let message = match self {
            ClientError::Status { body, .. } => body_detail(body)
                .map_or_else(|| self.to_string(), str::to_string),
            ClientError::Transport(SparkpointError::Connection(m)) => m.clone(),
            other => other.to_string(),
        };
        if message.trim().is_empty() {
            NETWORK_ERROR.to_string()
        } else {
            message
        }
    }
}
