//! Error types for Tributary

use thiserror::Error;

/// Result type alias for Tributary operations
pub type Result<T> = std::result::Result<T, SyncError>;

/// Main error type for the sync pipeline.
///
/// Every variant here is structural: it terminates the run it occurs in.
/// Per-entity failures (a malformed record inside a page) are handled where
/// they happen — logged and skipped — and never surface as a `SyncError`.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Credentials were rejected by the source. Fatal, never retried.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// Invalid configuration, detected before any entity is emitted.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The upstream API is unavailable or returned a fatal response,
    /// reported after the call wrapper has exhausted its retries.
    #[error("upstream unavailable{}: {detail}", status.map(|s| format!(" (status {s})")).unwrap_or_default())]
    Upstream {
        status: Option<u16>,
        detail: String,
    },

    /// The hash store failed a read or write. Fatal for the run.
    #[error("hash store error: {0}")]
    HashStore(String),

    /// The indexing destination rejected an operation. Fatal for the run.
    #[error("destination error: {0}")]
    Destination(String),

    /// The run was cancelled by an external request.
    #[error("sync cancelled")]
    Cancelled,

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SyncError {
    /// One-line cause description stored on a failed job.
    ///
    /// Status code and message only; callers polling job status should never
    /// see a backtrace.
    pub fn summary(&self) -> String {
        self.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_display_with_status() {
        let err = SyncError::Upstream {
            status: Some(503),
            detail: "service unavailable".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "upstream unavailable (status 503): service unavailable"
        );
    }

    #[test]
    fn test_upstream_display_without_status() {
        let err = SyncError::Upstream {
            status: None,
            detail: "connection refused".to_string(),
        };
        assert_eq!(err.to_string(), "upstream unavailable: connection refused");
    }

    #[test]
    fn test_summary_is_single_line() {
        let err = SyncError::Authentication("token expired".to_string());
        assert!(!err.summary().contains('\n'));
    }
}
