use thiserror::Error;

/// Main error type for query execution
///
/// A term missing from the index is not an error (it yields an empty
/// cursor), and arithmetic overflow during scoring is not an error (scores
/// saturate). Everything else that can go wrong during a query is one of
/// the kinds below.
#[derive(Error, Debug)]
pub enum FtqlError {
    #[error("index I/O error: {0}")]
    IndexIo(#[from] std::io::Error),

    #[error("mirror unavailable: {0}")]
    MirrorUnavailable(String),

    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("query cancelled")]
    Cancelled,
}

/// Result type alias for query operations
pub type Result<T> = std::result::Result<T, FtqlError>;

impl FtqlError {
    /// Check if this error aborts the whole query (vs. being observed
    /// cancellation, which the caller requested itself)
    pub fn is_fatal(&self) -> bool {
        !matches!(self, FtqlError::Cancelled)
    }
}
