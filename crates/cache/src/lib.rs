//! Content-addressed extraction of bundled libraries.
//!
//! Every distinct resource content gets exactly one file on disk, at
//! `<root>/<blake3>/<filename>`. Files are written to a temporary file in the
//! same directory and atomically renamed into place, so readers (including
//! other processes sharing the cache root) only ever see complete files, and
//! concurrent writers of the same content converge on the same result.

mod content;
mod entry;
pub mod error;
mod verify;

pub use crate::content::{ContentCache, Effort, Materialized, Sweep};
pub use crate::entry::EntryState;
pub use crate::verify::Verification;
