//! Platform Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// A platform error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for platform operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The raw OS/architecture pair has no canonical mapping. Fatal for the
    /// whole process when it comes from the host.
    #[display("unsupported platform: os={os:?}, arch={arch:?}")]
    UnsupportedPlatform {
        /// Raw operating system string as reported by the host.
        os: String,
        /// Raw CPU architecture string as reported by the host.
        arch: String,
    },
    /// The logical library name can't be turned into a filename.
    #[display("invalid library name: {_0:?}")]
    InvalidName(#[error(not(source))] String),
    /// The resource namespace is malformed.
    #[display("invalid resource namespace: {_0:?}")]
    InvalidNamespace(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        // The host doesn't change underneath a running process.
        false
    }
}
