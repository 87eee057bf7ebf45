//! Error kinds surfaced by the lookup pipeline

use thiserror::Error;

/// Failures reported to whoever asked for a lookup.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LookupError {
    #[error("Symbol not found: {0}")]
    SymbolNotFound(String),

    #[error("Price source unavailable: {0}")]
    UpstreamTransient(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl LookupError {
    /// Only upstream outages are worth retrying; the other kinds are final.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LookupError::UpstreamTransient(_))
    }
}

/// Failures of a [`crate::core::PriceSource`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    #[error("Unknown instrument: {0}")]
    UnknownSymbol(String),

    #[error("{0}")]
    Transient(String),
}

impl From<SourceError> for LookupError {
    fn from(err: SourceError) -> Self {
        match err {
            SourceError::UnknownSymbol(symbol) => LookupError::SymbolNotFound(symbol),
            SourceError::Transient(msg) => LookupError::UpstreamTransient(msg),
        }
    }
}

/// Storage failures. These are logged by the caller and never fail a lookup.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    #[error("Cache read failed for {key}: {reason}")]
    ReadFailure { key: String, reason: String },

    #[error("Cache write failed for {key}: {reason}")]
    WriteFailure { key: String, reason: String },
}
