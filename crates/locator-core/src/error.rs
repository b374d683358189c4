//! Caller-facing error types following panic-free policy.

use thiserror::Error;

/// Errors a locator can report to the caller of `locate()`.
///
/// Failures tied to a specific request (timeout, empty pool) are only ever
/// returned to that request. Everything the dynamic locator can retry on its
/// own (session loss, child fetch races) never shows up here directly.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LocatorError {
    /// A queued request waited longer than the configured locator timeout.
    #[error("timed out after {timeout_ms}ms waiting for a location on {path}")]
    ResolutionTimeout { path: String, timeout_ms: u64 },

    /// The effective pool had no entries at dispatch time.
    #[error("child pool is empty for {path}")]
    EmptyPool { path: String },

    /// The requested path is not a valid coordination path.
    #[error("invalid path {path:?}: {reason}")]
    InvalidPath { path: String, reason: String },

    /// A static resource string could not be parsed.
    #[error("invalid resource: {0}")]
    InvalidResource(String),

    /// An HTTP lookup answered with a non-2xx status.
    #[error("bad response (status {status})")]
    BadResponse { status: u16 },

    /// A response body did not contain a usable location.
    #[error("response did not contain a location")]
    MalformedResponse,

    /// Transport-level HTTP failure.
    #[error("http request failed: {0}")]
    Http(String),

    /// The bootstrap resolver failed to produce a cluster address.
    #[error("failed to find coordination cluster: {0}")]
    Bootstrap(String),

    /// The actor behind a handle has shut down.
    #[error("locator channel closed")]
    ChannelClosed,
}

impl LocatorError {
    /// Creates an invalid path error.
    pub fn invalid_path(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Creates an HTTP error from any displayable error.
    pub fn http<E: std::fmt::Display>(err: E) -> Self {
        Self::Http(err.to_string())
    }

    /// Returns true for per-request failures that a later call may not hit.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::ResolutionTimeout { .. } | Self::EmptyPool { .. } | Self::Http(_)
        )
    }
}

/// Result type for locator operations.
pub type LocatorResult<T> = Result<T, LocatorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = LocatorError::ResolutionTimeout {
            path: "/svc/a".to_string(),
            timeout_ms: 100,
        };
        assert_eq!(
            err.to_string(),
            "timed out after 100ms waiting for a location on /svc/a"
        );

        let err = LocatorError::EmptyPool {
            path: "/svc/b".to_string(),
        };
        assert_eq!(err.to_string(), "child pool is empty for /svc/b");

        let err = LocatorError::BadResponse { status: 503 };
        assert_eq!(err.to_string(), "bad response (status 503)");

        let err = LocatorError::ChannelClosed;
        assert_eq!(err.to_string(), "locator channel closed");
    }

    #[test]
    fn test_invalid_path_helper() {
        let err = LocatorError::invalid_path("a//b", "empty segment");
        assert!(matches!(err, LocatorError::InvalidPath { .. }));
        assert_eq!(err.to_string(), "invalid path \"a//b\": empty segment");
    }

    #[test]
    fn test_is_transient() {
        assert!(LocatorError::EmptyPool { path: "/x".into() }.is_transient());
        assert!(!LocatorError::InvalidResource("x".into()).is_transient());
        assert!(!LocatorError::ChannelClosed.is_transient());
    }
}
