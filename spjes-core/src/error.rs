//! Error types for spjes-core.

use thiserror::Error;

/// Result type alias for spjes operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for spjes operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Axis definition is unusable (no bins, empty or non-finite range).
    #[error("invalid axis: {n_bins} bins over [{min}, {max})")]
    InvalidAxis { n_bins: usize, min: f64, max: f64 },

    /// Two histograms with different binning cannot be merged.
    #[error("cannot merge histogram '{other}' into '{name}': binning differs")]
    IncompatibleHistograms { name: String, other: String },

    /// Two cut flows with different filter chains cannot be merged.
    #[error("cannot merge cut flows with different filters")]
    IncompatibleCutFlows,

    /// Configuration error.
    #[error("configuration error: {0}")]
    ConfigError(String),
}
