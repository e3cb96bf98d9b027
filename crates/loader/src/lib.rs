//! Load-once native library registry.
//!
//! Wraps the platform dynamic loader behind the [`Loader`] trait and
//! memoizes the outcome of loading each logical library, failures included,
//! for the lifetime of the [`Registry`].

pub mod error;
mod handle;
mod loader;
mod registry;

pub use crate::handle::Handle;
#[cfg(feature = "mock")]
pub use crate::loader::MockLoader;
pub use crate::loader::{Loader, SystemLoader};
pub use crate::registry::{LoadedLibrary, Outcome, Registry};
