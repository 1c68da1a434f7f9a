//! Error types for jarsmith-core

use std::path::PathBuf;
use thiserror::Error;

/// Core error types for the jarsmith library
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Source root or library path does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Archive could not be decoded or written as a zip container
    #[error("Archive format error: {0}")]
    ArchiveFormat(String),

    /// The injected compiler reported a non-zero exit status
    #[error("Compilation failed with exit status {status}")]
    Compile { status: i32 },

    /// Two sources staged the same path and the merge policy refused it
    #[error("Merge conflict on {path} (from {origin:?})")]
    MergeConflict { path: String, origin: PathBuf },

    /// The same path was written to an archive twice
    #[error("Duplicate archive entry: {0}")]
    DuplicateEntry(String),

    /// Invalid file or directory path
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Manifest attribute name or value cannot be encoded
    #[error("Invalid manifest: {0}")]
    InvalidManifest(String),

    /// Configuration-related error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<zip::result::ZipError> for Error {
    fn from(err: zip::result::ZipError) -> Self {
        match err {
            zip::result::ZipError::Io(e) => Error::Io(e),
            other => Error::ArchiveFormat(other.to_string()),
        }
    }
}

impl From<walkdir::Error> for Error {
    fn from(err: walkdir::Error) -> Self {
        Error::Io(err.into())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
