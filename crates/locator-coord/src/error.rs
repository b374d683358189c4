//! Coordination client errors.

use thiserror::Error;

/// Errors reported by a coordination client operation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoordError {
    /// The node does not exist. Expected under races (a child listed a
    /// moment ago may already be gone).
    #[error("no node: {0}")]
    NoNode(String),

    /// The node already exists.
    #[error("node exists: {0}")]
    NodeExists(String),

    /// The client is not currently connected.
    #[error("connection loss")]
    ConnectionLoss,

    /// The session backing the client has expired.
    #[error("session expired")]
    SessionExpired,

    /// The client was closed.
    #[error("client closed")]
    Closed,

    /// The connect string could not be parsed.
    #[error("invalid connect string: {0}")]
    InvalidConnectString(String),

    /// Any other server-side failure.
    #[error("coordination error: {0}")]
    Other(String),
}

impl CoordError {
    /// Returns true if this is a "node does not exist" failure.
    pub fn is_no_node(&self) -> bool {
        matches!(self, Self::NoNode(_))
    }
}

/// Result type for coordination client operations.
pub type CoordResult<T> = Result<T, CoordError>;
