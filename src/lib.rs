//! Ship native shared libraries inside your artifact, load them at runtime.
//!
//! A [`Bundle`] holds precompiled libraries for every supported
//! OS/architecture pair under `native/<os>-<arch>/`. Asking it for a logical
//! name resolves the host [`Platform`], finds the matching resource,
//! extracts it into a content-addressed cache directory and loads it, once
//! per process:
//!
//! ```ignore
//! use embedlib::{Bundle, Embedded};
//! use rust_embed::Embed;
//! use std::sync::{Arc, LazyLock};
//!
//! #[derive(Embed)]
//! #[folder = "resources/"]
//! #[include = "native/**"]
//! struct Natives;
//!
//! static NATIVES: LazyLock<Bundle> =
//!     LazyLock::new(|| Bundle::builder(Arc::new(Embedded::<Natives>::default())).build());
//!
//! let handle = NATIVES.request_library("example")?;
//! let init = unsafe { handle.symbol::<unsafe extern "C" fn() -> i32>("example_init")? };
//! ```

mod builder;
mod bundle;
pub mod error;
mod lifecycle;

pub use crate::builder::BundleBuilder;
pub use crate::bundle::{Bundle, ShutdownGuard};
pub use embedlib_bundle::{DirectorySource, Embedded, LibraryEntry, Manifest, ResourceSource, SourceHandle};
pub use embedlib_cache::{Effort, Materialized, Sweep, Verification};
pub use embedlib_config::Config;
pub use embedlib_loader::{Handle, Loader, SystemLoader};
pub use embedlib_platform::{Arch, Locator, Os, Platform, ResourcePath};
