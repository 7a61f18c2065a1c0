//! Error types for the specfetch pipeline.
//!
//! Retryability is a property of the error itself: the retry executor asks
//! [`FetchError::is_retryable`] instead of matching status codes at each
//! call site. All errors use stable string messages; no API keys or other
//! sensitive data appear in error messages.

/// Errors that can occur while retrieving specs from external providers.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// A single network attempt exceeded its deadline. Retryable.
    #[error("attempt timed out after {0}ms")]
    Timeout(u64),

    /// The upstream service answered 429 or 5xx. Retryable.
    #[error("upstream server error: HTTP {status}")]
    UpstreamServer {
        /// The HTTP status code (429 or 500..=599).
        status: u16,
    },

    /// The upstream service answered with another 4xx. Not retried —
    /// adapters treat this as "no usable result".
    #[error("upstream client error: HTTP {status}")]
    UpstreamClient {
        /// The HTTP status code.
        status: u16,
    },

    /// The request failed before an HTTP status was received
    /// (DNS, connect, TLS, read). Retryable.
    #[error("network error: {0}")]
    Network(String),

    /// A response body did not match the expected shape. Not retried —
    /// the adapter fails closed to an empty result.
    #[error("parse error: {0}")]
    Parse(String),

    /// Invalid configuration or query. Surfaced synchronously, before any
    /// network activity.
    #[error("config error: {0}")]
    Config(String),

    /// The pipeline is shutting down; queued rate-limiter waiters are
    /// rejected with this instead of being left pending.
    #[error("service shutting down")]
    ShuttingDown,

    /// All retry attempts were exhausted. Carries the final underlying
    /// cause and how many attempts were made.
    #[error("retries exhausted after {attempts} attempts: {last}")]
    RetriesExhausted {
        /// Number of attempts made before giving up.
        attempts: u32,
        /// The error from the final attempt.
        last: Box<FetchError>,
    },
}

impl FetchError {
    /// Classify an HTTP status code into the pipeline error taxonomy.
    ///
    /// 429 and 5xx map to [`FetchError::UpstreamServer`] (retryable);
    /// every other non-success status maps to
    /// [`FetchError::UpstreamClient`] (not retried).
    pub fn from_status(status: u16) -> Self {
        if status == 429 || (500..=599).contains(&status) {
            Self::UpstreamServer { status }
        } else {
            Self::UpstreamClient { status }
        }
    }

    /// Whether the retry executor may attempt the operation again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout(_) | Self::UpstreamServer { .. } | Self::Network(_)
        )
    }
}

/// Convenience type alias for specfetch results.
pub type Result<T> = std::result::Result<T, FetchError>;
