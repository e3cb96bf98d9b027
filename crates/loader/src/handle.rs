use crate::error::{ErrorKind, Result};
use libloading::{Library, Symbol};
use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A loaded native library.
///
/// Cheap to clone; every clone refers to the same underlying library, which
/// stays loaded for as long as any clone (or the registry) is alive. Two
/// handles compare equal only if they came from the same load.
#[derive(Clone)]
pub struct Handle {
    inner: Arc<Inner>,
}

struct Inner {
    path: PathBuf,
    // `None` for handles that were never backed by a real library (mocks).
    library: Option<Library>,
}

impl Handle {
    /// Wrap a library that was loaded from `path`.
    pub fn from_library(path: impl Into<PathBuf>, library: Library) -> Self {
        Self { inner: Arc::new(Inner { path: path.into(), library: Some(library) }) }
    }

    /// A handle with no library behind it. Symbol lookups always fail.
    #[cfg_attr(not(feature = "mock"), allow(dead_code))]
    pub(crate) fn detached(path: impl Into<PathBuf>) -> Self {
        Self { inner: Arc::new(Inner { path: path.into(), library: None }) }
    }

    /// The file the library was loaded from.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Look up an exported symbol.
    ///
    /// # Safety
    ///
    /// `T` must match the actual type of the symbol; see
    /// [`libloading::Library::get`]. The returned symbol borrows this handle,
    /// so it can't outlive the library.
    pub unsafe fn symbol<T>(&self, symbol: &str) -> Result<Symbol<'_, T>> {
        let Some(library) = &self.inner.library else {
            exn::bail!(ErrorKind::Symbol {
                symbol: symbol.to_string(),
                reason: format!("{} isn't backed by a native library", self.inner.path.display()),
            });
        };
        // SAFETY: upheld by the caller.
        let found = unsafe { library.get::<T>(symbol.as_bytes()) };
        found.map_err(|e| exn::Exn::from(ErrorKind::Symbol { symbol: symbol.to_string(), reason: e.to_string() }))
    }
}

impl PartialEq for Handle {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Handle {}

impl Debug for Handle {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("Handle")
            .field("path", &self.inner.path)
            .field("native", &self.inner.library.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_is_identity() {
        let a = Handle::detached("/tmp/liba.so");
        let b = Handle::detached("/tmp/liba.so");
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
        assert_eq!(a.path(), Path::new("/tmp/liba.so"));
    }

    #[test]
    fn detached_handles_have_no_symbols() {
        let handle = Handle::detached("/tmp/liba.so");
        let err = unsafe { handle.symbol::<unsafe extern "C" fn()>("init") }.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Symbol { symbol, .. } if symbol == "init"));
    }
}
