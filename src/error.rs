//! Error types for proximo.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ProximoError>;

/// Errors produced by dataset loading and spatial queries.
#[derive(Debug, Error)]
pub enum ProximoError {
    /// Transient network or parse failure while loading a dataset.
    ///
    /// The loader retries these automatically; callers only see one after
    /// the retry budget is exhausted.
    #[error("dataset fetch failed: {0}")]
    FetchFailure(String),

    /// A service-area query was made while the service-area dataset is not
    /// in the loaded state (never loaded, or its load permanently failed).
    ///
    /// Not retryable by the crate; the caller must trigger a fresh load.
    #[error("service area dataset is unavailable")]
    ServiceAreaUnavailable,

    /// A feature lacks usable coordinates where a point or polygon was
    /// required.
    #[error("malformed geometry: {0}")]
    MalformedGeometry(String),

    /// The service-area dataset lacks the sentinel combined-boundary
    /// feature. A configuration/data error, reported without retry.
    #[error("reserved feature missing: {0}")]
    ReservedFeatureMissing(String),

    /// Caller-supplied parameters are out of range.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}
