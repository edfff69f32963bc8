//! Error types for the archiving pipeline.

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while resolving and archiving photos.
#[derive(Debug, Error)]
pub enum Error {
    /// Source directory does not exist or is not a directory.
    #[error("Source directory not found: {path}")]
    SourceMissing { path: PathBuf },

    /// Every fallback stage failed to produce a capture timestamp.
    #[error("No usable capture timestamp for {path}")]
    NoTimestamp { path: PathBuf },

    /// Failed to create an archive directory.
    #[error("Failed to create directory: {path}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to move a photo into the archive.
    #[error("Failed to move {from} to {to}")]
    Move {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to transcode a photo to JPEG.
    #[error("Cannot convert {path} to JPEG: {message}")]
    Convert { path: PathBuf, message: String },

    /// The collision ladder exhausted its sequence counter.
    #[error("No free destination name near {base} after {limit} attempts")]
    SequenceOverflow { base: PathBuf, limit: u32 },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
