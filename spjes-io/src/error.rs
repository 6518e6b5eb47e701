//! I/O error types.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for I/O operations.
pub type Result<T> = std::result::Result<T, Error>;

/// I/O error types.
#[derive(Error, Debug)]
pub enum Error {
    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed JSON document.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid file format.
    #[error("invalid file format: {0}")]
    InvalidFormat(String),

    /// The requested tree is not present in an input file.
    #[error("tree '{tree}' not found in {}", path.display())]
    MissingTree { tree: String, path: PathBuf },

    /// An event lacks one of the configured collections.
    #[error("event {event} has no collection '{collection}'")]
    MissingCollection { collection: String, event: usize },

    /// An object of a collection could not be decoded.
    #[error("event {event}: invalid '{collection}' entry: {message}")]
    InvalidEvent {
        event: usize,
        collection: String,
        message: String,
    },

    /// The output container could not be opened.
    #[error("could not open output file {}: {source}", path.display())]
    OutputOpen {
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The input files hold no events.
    #[error("input file(s) contain no events in the tree '{tree}'")]
    NoEvents { tree: String },

    /// The file format needs a cargo feature that is not enabled.
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    /// HDF5 library error.
    #[cfg(feature = "hdf5")]
    #[error("HDF5 error: {0}")]
    Hdf5(#[from] hdf5::Error),

    /// Core library error.
    #[error("core error: {0}")]
    CoreError(#[from] spjes_core::Error),
}
