//! Custom error types for the stardict-reader crate.

use std::path::PathBuf;
use thiserror::Error;

/// The primary error type for all operations in this crate.
#[derive(Debug, Error)]
pub enum DictError {
    /// An error originating from I/O operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A required dictionary file is missing.
    #[error("File not found: {0}")]
    NotFound(PathBuf),

    /// The file is structurally invalid or does not conform to the StarDict
    /// format specification.
    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    /// A caller supplied an argument outside the documented range.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A search operation failed because of an underlying I/O or format error.
    ///
    /// A legitimate "word not found" is never reported through this variant;
    /// search operations return an absent result for that case.
    #[error("Lookup failed in `{book}`: {source}")]
    Lookup {
        book: String,
        #[source]
        source: Box<DictError>,
    },

    /// A mutex lock was poisoned, indicating a panic in another thread holding the lock.
    #[error("A mutex lock was poisoned, indicating a panic in another thread holding the lock.")]
    LockPoisoned,
}

/// A convenience `Result` type alias using the crate's `DictError` type.
pub type Result<T> = std::result::Result<T, DictError>;
