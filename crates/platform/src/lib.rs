//! Platform identification and resource location.
//!
//! Turns "what is this machine" into a canonical [`Platform`], and a logical
//! library name plus a platform into a [`ResourcePath`] inside a bundle.
//! Both are pure: no I/O happens in this crate.

pub mod error;
mod locate;
mod platform;

pub use crate::locate::{DEFAULT_NAMESPACE, Locator, MANIFEST_FILENAME, ResourcePath, validate_name};
pub use crate::platform::{Arch, Os, Platform};
