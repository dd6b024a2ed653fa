//! Per-attempt error type for retry classification.

/// Error from a single HTTP attempt (curl failure, HTTP status, or local storage failure).
/// Kept separate from `anyhow` so the attempt loop can classify and decide retries.
#[derive(Debug, thiserror::Error)]
pub enum AttemptError {
    /// Curl reported an error (timeout, connection, short body, etc.).
    #[error("{0}")]
    Curl(#[source] curl::Error),
    /// HTTP response had a status other than 200.
    #[error("HTTP {0}")]
    Http(u32),
    /// Disk write failed (e.g. disk full, permission denied). Not retried.
    #[error("storage: {0}")]
    Storage(#[source] std::io::Error),
}
