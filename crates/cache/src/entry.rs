use std::path::PathBuf;

/// Where a cache file is in its life.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryState {
    /// Being written; nothing is at the target path yet (as far as we know).
    Pending,
    /// Complete and verified. Only set after a successful rename or check.
    Ready,
    /// Failed verification; about to be deleted and written again.
    Corrupt,
}

/// One materialized content, as seen by this process.
#[derive(Clone, Debug)]
pub(crate) struct CacheEntry {
    pub(crate) content_hash: String,
    pub(crate) path: PathBuf,
    pub(crate) refs: usize,
    pub(crate) state: EntryState,
    /// This process wrote the file, rather than finding it already there.
    pub(crate) owned: bool,
}

impl CacheEntry {
    pub(crate) fn new(content_hash: String, path: PathBuf) -> Self {
        Self { content_hash, path, refs: 0, state: EntryState::Pending, owned: false }
    }

    /// Eligible for deletion at the next sweep.
    pub(crate) fn is_reclaimable(&self) -> bool {
        self.refs == 0 && self.owned && self.state == EntryState::Ready
    }
}
