//! Loader Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// A loader error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for loader operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The dynamic loader rejected the library. Replayed, never retried.
    #[display("failed to load library {name:?}: {reason}")]
    Load { name: String, reason: String },
    /// The library is loaded but doesn't export the symbol.
    #[display("symbol {symbol:?} not found: {reason}")]
    Symbol { symbol: String, reason: String },
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        // A load outcome is memoized for the life of the process.
        false
    }
}
