//! Where bundled native libraries come from.
//!
//! A [`ResourceSource`] hands out the raw bytes of a bundled library; the
//! optional per-platform [`Manifest`] says which bundled libraries depend on
//! which. Neither knows anything about extraction or loading.

pub mod error;
mod manifest;
mod source;

pub use crate::manifest::{LibraryEntry, Manifest};
#[cfg(feature = "mock")]
pub use crate::source::MockSource;
pub use crate::source::{DirectorySource, Embedded, ResourceSource};
use std::sync::Arc;

pub type SourceHandle = Arc<dyn ResourceSource>;
