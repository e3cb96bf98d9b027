//! Resources embedded into the binary at compile time.
//!
//! Uses [`rust-embed`](rust_embed): the consuming crate derives
//! [`Embed`] on a unit struct pointing at its packaged resource folder and
//! wraps that type in [`Embedded`].

use crate::error::{ErrorKind, Result};
use crate::source::{ResourceSource, has_prefix};
use embedlib_platform::ResourcePath;
use exn::OptionExt;
use rust_embed::Embed;
use std::borrow::Cow;
use std::marker::PhantomData;

/// A [`ResourceSource`] backed by a [`rust_embed::Embed`] type.
///
/// # Example
///
/// ```ignore
/// use embedlib_bundle::Embedded;
/// use rust_embed::Embed;
///
/// #[derive(Embed)]
/// #[folder = "resources/"]
/// #[include = "native/**"]
/// struct Natives;
///
/// let source = Embedded::<Natives>::new("natives");
/// ```
pub struct Embedded<E: Embed> {
    name: String,
    // `fn() -> E` keeps this Send + Sync regardless of `E`.
    _assets: PhantomData<fn() -> E>,
}

impl<E: Embed> Embedded<E> {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), _assets: PhantomData }
    }
}

impl<E: Embed> Default for Embedded<E> {
    fn default() -> Self {
        Self::new("embedded")
    }
}

impl<E: Embed> ResourceSource for Embedded<E> {
    fn name(&self) -> &str {
        &self.name
    }

    fn exists(&self, path: &ResourcePath) -> bool {
        E::get(path.as_str()).is_some()
    }

    fn read(&self, path: &ResourcePath) -> Result<Cow<'static, [u8]>> {
        E::get(path.as_str()).map(|f| f.data).ok_or_raise(|| ErrorKind::NotFound(path.to_string()))
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let mut paths: Vec<String> = E::iter().filter(|p| has_prefix(p, prefix)).map(Cow::into_owned).collect();
        paths.sort();
        Ok(paths)
    }
}
