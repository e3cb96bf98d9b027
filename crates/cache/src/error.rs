//! Cache Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};
use std::io::Error as IoError;
use std::path::PathBuf;

/// A cache error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for cache operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The resource isn't in the source. Nothing was written.
    #[display("resource not found: {_0}")]
    NotFound(#[error(not(source))] String),
    /// The source failed to hand out the resource for some other reason.
    #[display("failed to read resource: {_0}")]
    Read(#[error(not(source))] String),
    /// Creating, writing, renaming or verifying a cache file failed.
    #[display("I/O error: {_0}")]
    Io(IoError),
    /// A cache file still didn't match its content hash after a rewrite.
    #[display("cache file is corrupt: {}", _0.display())]
    Corrupt(#[error(not(source))] PathBuf),
}
impl From<IoError> for ErrorKind {
    fn from(err: IoError) -> Self {
        Self::Io(err)
    }
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io(_) | Self::Corrupt(_))
    }
}
