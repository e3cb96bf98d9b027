//! Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction. Errors from the workspace crates are
//! kept as children in the tree, so the underlying diagnostic is never lost.

use derive_more::{Display, Error};
use embedlib_platform::error::ErrorKind as PlatformErrorKind;

/// An embedlib error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for embedlib operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// No bundled variant can exist for this host. Fatal; don't retry.
    #[display("unsupported platform: os={os:?}, arch={arch:?}")]
    UnsupportedPlatform { os: String, arch: String },
    /// The bundle has no variant of the library for this platform. A
    /// packaging gap; retrying won't help.
    #[display("library {name:?} is not bundled for {platform} (expected {path})")]
    ResourceNotFound { name: String, platform: String, path: String },
    /// The library couldn't be written to, or verified in, the cache.
    #[display("failed to extract library {name:?} for {platform}")]
    ExtractionIo { name: String, platform: String },
    /// The dynamic loader rejected the library. Memoized for the process.
    #[display("failed to load library {name:?}: {reason}")]
    Load { name: String, reason: String },
    /// The logical library name can't be turned into a filename.
    #[display("invalid library name: {_0:?}")]
    InvalidName(#[error(not(source))] String),
    /// The bundle itself couldn't be read (e.g. listing its contents).
    #[display("failed to read bundle {_0:?}")]
    Source(#[error(not(source))] String),
    /// The bundle manifest is malformed or inconsistent.
    #[display("invalid bundle manifest: {_0}")]
    Manifest(#[error(not(source))] String),
    #[display("invalid configuration")]
    Config,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ExtractionIo { .. } | Self::Source(_))
    }
}

impl From<&PlatformErrorKind> for ErrorKind {
    fn from(kind: &PlatformErrorKind) -> Self {
        match kind {
            PlatformErrorKind::UnsupportedPlatform { os, arch } => {
                Self::UnsupportedPlatform { os: os.clone(), arch: arch.clone() }
            },
            PlatformErrorKind::InvalidName(name) => Self::InvalidName(name.clone()),
            PlatformErrorKind::InvalidNamespace(_) => Self::Config,
        }
    }
}
