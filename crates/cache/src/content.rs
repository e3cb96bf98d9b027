use crate::entry::{CacheEntry, EntryState};
use crate::error::{ErrorKind, Result};
use crate::verify::{Check, Verification, check};
use embedlib_bundle::ResourceSource;
use embedlib_bundle::error::ErrorKind as BundleErrorKind;
use embedlib_platform::ResourcePath;
use std::collections::HashMap;
use std::fs;
use std::io::{ErrorKind as IoErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::instrument;

/// Attempts at writing a target before giving up.
const WRITE_ATTEMPTS: usize = 2;
/// Temporary files left alone for this long are assumed to be from a crash.
const STALE_TEMP_AGE: Duration = Duration::from_secs(60 * 60);

/// How much work [`ContentCache::materialize`] had to do.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Effort {
    /// A valid file was already at the target path; nothing was written.
    Reused,
    /// The file didn't exist and was written.
    Extracted,
    /// A file existed but failed verification, so it was deleted and
    /// written again.
    Repaired,
}

/// A resource that now exists as a complete file on local disk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Materialized {
    /// Hex BLAKE3 hash of the content; also the name of its directory.
    pub content_hash: String,
    pub path: PathBuf,
    pub effort: Effort,
}

/// The outcome of [`ContentCache::sweep`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Sweep {
    /// Files deleted.
    pub removed: Vec<PathBuf>,
    /// Unreferenced files another process wrote; dropped from bookkeeping
    /// but left on disk.
    pub forgotten: Vec<PathBuf>,
    /// Files still referenced, left alone.
    pub retained: Vec<PathBuf>,
    /// Files that couldn't be deleted, with the reason. They stay tracked
    /// so a later sweep can try again.
    pub failed: Vec<(PathBuf, String)>,
}

impl Sweep {
    /// Nothing needed deleting, or everything that did was deleted.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// A content-addressed cache directory.
///
/// Cheap to construct: nothing touches the filesystem until the first
/// [`materialize`](Self::materialize). Several instances (in this process or
/// others) may share a root.
pub struct ContentCache {
    root: PathBuf,
    verification: Verification,
    entries: Mutex<HashMap<PathBuf, CacheEntry>>,
}

impl ContentCache {
    pub fn new(root: impl Into<PathBuf>, verification: Verification) -> Self {
        Self { root: root.into(), verification, entries: Mutex::new(HashMap::new()) }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn verification(&self) -> Verification {
        self.verification
    }

    /// Make sure `resource` exists as a complete file under the cache root,
    /// and take a reference to it.
    ///
    /// The resource is read once. If a file with the same content is already
    /// in place it's reused without copying; otherwise the bytes go to a
    /// temporary file next to the target which is then atomically renamed.
    /// Every successful call must eventually be paired with a
    /// [`release`](Self::release) for the file to become reclaimable.
    #[instrument(skip_all, fields(source = source.name(), %resource))]
    pub fn materialize(&self, source: &dyn ResourceSource, resource: &ResourcePath) -> Result<Materialized> {
        let bytes = source.read(resource).map_err(|err| {
            let kind = match &*err {
                BundleErrorKind::NotFound(path) => ErrorKind::NotFound(path.clone()),
                _ => ErrorKind::Read(resource.to_string()),
            };
            err.raise(kind)
        })?;
        let hash = blake3::hash(&bytes);
        let content_hash = hash.to_string();
        let target = self.root.join(&content_hash).join(resource.file_name());

        // Referenced before the disk is checked; sweep skips referenced entries.
        let trusted = self.with_entry(&target, &content_hash, |entry| {
            entry.refs += 1;
            entry.state == EntryState::Ready
        });
        let effort = match self.place(&target, &bytes, &hash, trusted) {
            Ok(effort) => effort,
            Err(err) => {
                self.release(&target);
                return Err(err);
            },
        };

        self.with_entry(&target, &content_hash, |entry| {
            entry.state = EntryState::Ready;
            entry.owned |= effort != Effort::Reused;
        });
        Ok(Materialized { content_hash, path: target, effort })
    }

    /// Take another reference to an already materialized file.
    ///
    /// Returns `false` if the path isn't tracked (never materialized, or
    /// already swept).
    pub fn retain(&self, path: &Path) -> bool {
        let mut entries = self.lock();
        let Some(entry) = entries.get_mut(path) else {
            return false;
        };
        entry.refs += 1;
        true
    }

    /// Drop one reference to a materialized file.
    ///
    /// Returns `false` if the path isn't tracked by this cache. The file
    /// itself is only deleted by [`sweep`](Self::sweep).
    pub fn release(&self, path: &Path) -> bool {
        let mut entries = self.lock();
        let Some(entry) = entries.get_mut(path) else {
            return false;
        };
        entry.refs = entry.refs.saturating_sub(1);
        tracing::debug!(path = %path.display(), refs = entry.refs, "Released cache file");
        true
    }

    /// Outstanding references to a materialized file.
    #[must_use]
    pub fn refs(&self, path: &Path) -> Option<usize> {
        self.lock().get(path).map(|entry| entry.refs)
    }

    #[must_use]
    pub fn state(&self, path: &Path) -> Option<EntryState> {
        self.lock().get(path).map(|entry| entry.state)
    }

    /// Best-effort deletion of every unreferenced file this cache wrote.
    ///
    /// Files reused from somebody else's extraction are never deleted, since
    /// another process may still have them loaded. Failures are logged and
    /// reported, never raised.
    #[instrument(skip(self), fields(root = %self.root.display()))]
    pub fn sweep(&self) -> Sweep {
        let mut sweep = Sweep::default();
        let mut entries = self.lock();
        entries.retain(|path, entry| {
            if entry.refs > 0 {
                sweep.retained.push(path.clone());
                return true;
            }
            if !entry.is_reclaimable() {
                sweep.forgotten.push(path.clone());
                return false;
            }
            match fs::remove_file(path) {
                Ok(()) => {},
                Err(e) if e.kind() == IoErrorKind::NotFound => {},
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Failed to delete cache file");
                    sweep.failed.push((path.clone(), e.to_string()));
                    return true;
                },
            }
            tracing::debug!(path = %path.display(), content_hash = %entry.content_hash, "Deleted cache file");
            Self::remove_stale_temps(path);
            // Only succeeds once the directory is empty; another process may
            // still be extracting into it.
            if let Some(parent) = path.parent() {
                let _ = fs::remove_dir(parent);
            }
            sweep.removed.push(entry.path.clone());
            false
        });
        sweep.removed.sort();
        sweep.forgotten.sort();
        sweep.retained.sort();
        sweep
    }

    /// Get the expected bytes to `target`, writing them if needed.
    fn place(&self, target: &Path, bytes: &[u8], hash: &blake3::Hash, trusted: bool) -> Result<Effort> {
        match check(target, bytes.len(), hash, self.verification, trusted).map_err(ErrorKind::Io)? {
            Check::Valid => {
                tracing::debug!(path = %target.display(), "Reusing cached file");
                Ok(Effort::Reused)
            },
            Check::Missing => {
                self.set_state(target, EntryState::Pending);
                Self::write(target, bytes, hash)?;
                tracing::info!(path = %target.display(), size = bytes.len(), "Extracted resource");
                Ok(Effort::Extracted)
            },
            Check::Mismatch => {
                tracing::warn!(path = %target.display(), "Cached file failed verification; extracting again");
                self.set_state(target, EntryState::Corrupt);
                match fs::remove_file(target) {
                    Ok(()) => {},
                    Err(e) if e.kind() == IoErrorKind::NotFound => {},
                    Err(e) => exn::bail!(ErrorKind::Io(e)),
                }
                Self::write(target, bytes, hash)?;
                Self::verify_rewrite(target, bytes.len(), hash)?;
                Ok(Effort::Repaired)
            },
        }
    }

    /// A repaired file gets one full rehash. Failing that, the corruption is
    /// persistent and the file is removed again.
    fn verify_rewrite(target: &Path, expected_len: usize, hash: &blake3::Hash) -> Result<()> {
        if check(target, expected_len, hash, Verification::Always, false).map_err(ErrorKind::Io)? == Check::Valid {
            return Ok(());
        }
        tracing::error!(path = %target.display(), "Cached file is still corrupt after a rewrite");
        let _ = fs::remove_file(target);
        exn::bail!(ErrorKind::Corrupt(target.to_path_buf()))
    }

    /// Write `bytes` to `target` via a temporary file and atomic rename.
    fn write(target: &Path, bytes: &[u8], hash: &blake3::Hash) -> Result<()> {
        let mut attempt = 1;
        loop {
            let Err(e) = Self::write_once(target, bytes) else {
                return Ok(());
            };
            // Another writer may have won the race with identical content, in
            // which case the rename failing is harmless.
            if check(target, bytes.len(), hash, Verification::Always, false).map_err(ErrorKind::Io)? == Check::Valid {
                tracing::debug!(path = %target.display(), "Lost extraction race to an identical file");
                return Ok(());
            }
            if attempt == WRITE_ATTEMPTS {
                exn::bail!(ErrorKind::Io(e));
            }
            tracing::debug!(path = %target.display(), attempt, error = %e, "Extraction attempt failed");
            attempt += 1;
        }
    }

    fn write_once(target: &Path, bytes: &[u8]) -> std::io::Result<()> {
        let dir = target.parent().ok_or_else(|| std::io::Error::from(IoErrorKind::InvalidInput))?;
        fs::create_dir_all(dir)?;
        let basename = target.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
        let mut temp = tempfile::Builder::new().prefix(&format!(".{basename}.")).suffix(".tmp").tempfile_in(dir)?;
        temp.write_all(bytes)?;
        temp.as_file().sync_all()?;
        temp.persist(target).map_err(|e| e.error)?;
        Ok(())
    }

    /// Delete temporary files that a crashed write left next to `target`.
    ///
    /// Only files older than [`STALE_TEMP_AGE`] go; younger ones may belong
    /// to a write in progress in another process.
    fn remove_stale_temps(target: &Path) {
        let (Some(dir), Some(basename)) = (target.parent(), target.file_name()) else {
            return;
        };
        let prefix = format!(".{}.", basename.to_string_lossy());
        let Ok(entries) = fs::read_dir(dir) else {
            return;
        };
        for entry in entries.flatten() {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if !name.starts_with(&prefix) || !name.ends_with(".tmp") {
                continue;
            }
            let stale = entry
                .metadata()
                .and_then(|metadata| metadata.modified())
                .ok()
                .and_then(|modified| modified.elapsed().ok())
                .is_some_and(|age| age >= STALE_TEMP_AGE);
            if !stale {
                continue;
            }
            match fs::remove_file(entry.path()) {
                Ok(()) => tracing::debug!(path = %entry.path().display(), "Deleted stale temporary file"),
                Err(e) => tracing::debug!(path = %entry.path().display(), error = %e, "Failed to delete stale temporary file"),
            }
        }
    }

    fn set_state(&self, target: &Path, state: EntryState) {
        if let Some(entry) = self.lock().get_mut(target) {
            entry.state = state;
        }
    }

    /// Run `f` against the entry for `target`, creating it if needed.
    fn with_entry<T>(&self, target: &Path, content_hash: &str, f: impl FnOnce(&mut CacheEntry) -> T) -> T {
        let mut entries = self.lock();
        let entry = entries
            .entry(target.to_path_buf())
            .or_insert_with(|| CacheEntry::new(content_hash.to_string(), target.to_path_buf()));
        f(entry)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<PathBuf, CacheEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedlib_bundle::MockSource;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::SystemTime;

    const LIBZ: &str = "native/linux-x86_64/libz.so";

    fn resource() -> ResourcePath {
        ResourcePath::new(LIBZ).unwrap()
    }

    fn source() -> MockSource {
        MockSource::with_files([(LIBZ, "libz contents v1")])
    }

    fn files_in(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> =
            fs::read_dir(dir).unwrap().map(|e| e.unwrap().file_name().to_string_lossy().into_owned()).collect();
        names.sort();
        names
    }

    #[test]
    fn materialize_is_idempotent() {
        let temp_dir = tempfile::tempdir().unwrap();
        let cache = ContentCache::new(temp_dir.path(), Verification::FirstUse);
        let source = source();

        let first = cache.materialize(&source, &resource()).unwrap();
        assert_eq!(first.effort, Effort::Extracted);
        assert_eq!(first.path, temp_dir.path().join(&first.content_hash).join("libz.so"));
        assert_eq!(fs::read(&first.path).unwrap(), b"libz contents v1");

        let second = cache.materialize(&source, &resource()).unwrap();
        assert_eq!(second.effort, Effort::Reused);
        assert_eq!(second.path, first.path);
        assert_eq!(cache.refs(&first.path), Some(2));
        assert_eq!(cache.state(&first.path), Some(EntryState::Ready));
        assert_eq!(files_in(first.path.parent().unwrap()), vec!["libz.so"]);
    }

    #[test]
    fn different_content_gets_different_paths() {
        let temp_dir = tempfile::tempdir().unwrap();
        let cache = ContentCache::new(temp_dir.path(), Verification::FirstUse);
        let v1 = cache.materialize(&source(), &resource()).unwrap();
        let v2 = cache.materialize(&MockSource::with_files([(LIBZ, "libz contents v2")]), &resource()).unwrap();
        assert_ne!(v1.content_hash, v2.content_hash);
        assert_ne!(v1.path, v2.path);
        assert_eq!(v2.effort, Effort::Extracted);
    }

    #[test]
    fn missing_resource_writes_nothing() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path().join("cache");
        let cache = ContentCache::new(&root, Verification::FirstUse);
        let missing = ResourcePath::new("native/linux-x86_64/libmissing.so").unwrap();
        let err = cache.materialize(&source(), &missing).unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(p) if p == "native/linux-x86_64/libmissing.so"));
        assert!(!root.exists());
    }

    #[test]
    fn instances_share_a_root() {
        let temp_dir = tempfile::tempdir().unwrap();
        let writer = ContentCache::new(temp_dir.path(), Verification::FirstUse);
        let reader = ContentCache::new(temp_dir.path(), Verification::FirstUse);

        let written = writer.materialize(&source(), &resource()).unwrap();
        let reused = reader.materialize(&source(), &resource()).unwrap();
        assert_eq!(reused.effort, Effort::Reused);
        assert_eq!(reused.path, written.path);

        // The reader didn't write the file, so it mustn't delete it.
        assert!(reader.release(&reused.path));
        let sweep = reader.sweep();
        assert_eq!(sweep.forgotten, vec![reused.path.clone()]);
        assert!(sweep.removed.is_empty());
        assert!(written.path.exists());

        assert!(writer.release(&written.path));
        let sweep = writer.sweep();
        assert_eq!(sweep.removed, vec![written.path.clone()]);
        assert!(!written.path.exists());
        assert!(!written.path.parent().unwrap().exists());
    }

    #[test]
    fn concurrent_materialize_converges() {
        let temp_dir = tempfile::tempdir().unwrap();
        let cache = Arc::new(ContentCache::new(temp_dir.path(), Verification::FirstUse));
        let source = Arc::new(source());

        let results: Vec<Materialized> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    let cache = Arc::clone(&cache);
                    let source = Arc::clone(&source);
                    scope.spawn(move || cache.materialize(source.as_ref(), &resource()).unwrap())
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let path = &results[0].path;
        assert!(results.iter().all(|m| &m.path == path));
        assert!(results.iter().any(|m| m.effort == Effort::Extracted));
        assert_eq!(cache.refs(path), Some(8));
        assert_eq!(fs::read(path).unwrap(), b"libz contents v1");
        // Losing writers clean up their temporary files.
        assert_eq!(files_in(path.parent().unwrap()), vec!["libz.so"]);
    }

    #[test]
    fn stray_temporary_file_does_not_block_extraction() {
        let temp_dir = tempfile::tempdir().unwrap();
        let content_hash = blake3::hash(b"libz contents v1").to_string();
        let dir = temp_dir.path().join(&content_hash);
        fs::create_dir_all(&dir).unwrap();
        // What a crash halfway through a write leaves behind.
        fs::write(dir.join(".libz.so.crashed.tmp"), b"libz con").unwrap();

        let cache = ContentCache::new(temp_dir.path(), Verification::FirstUse);
        let materialized = cache.materialize(&source(), &resource()).unwrap();
        assert_eq!(materialized.effort, Effort::Extracted);
        assert_eq!(fs::read(&materialized.path).unwrap(), b"libz contents v1");
    }

    #[test]
    fn corrupt_file_is_repaired_on_first_use() {
        let temp_dir = tempfile::tempdir().unwrap();
        let first = ContentCache::new(temp_dir.path(), Verification::FirstUse);
        let path = first.materialize(&source(), &resource()).unwrap().path;
        // Same size, different bytes.
        fs::write(&path, b"libz contents XX").unwrap();

        // Trusted by the process that already verified it...
        assert_eq!(first.materialize(&source(), &resource()).unwrap().effort, Effort::Reused);

        // ...but not by a fresh one.
        let fresh = ContentCache::new(temp_dir.path(), Verification::FirstUse);
        let repaired = fresh.materialize(&source(), &resource()).unwrap();
        assert_eq!(repaired.effort, Effort::Repaired);
        assert_eq!(fs::read(&path).unwrap(), b"libz contents v1");
        assert_eq!(fresh.state(&path), Some(EntryState::Ready));
    }

    #[test]
    fn always_verification_rehashes_every_time() {
        let temp_dir = tempfile::tempdir().unwrap();
        let cache = ContentCache::new(temp_dir.path(), Verification::Always);
        let path = cache.materialize(&source(), &resource()).unwrap().path;
        fs::write(&path, b"libz contents XX").unwrap();
        assert_eq!(cache.materialize(&source(), &resource()).unwrap().effort, Effort::Repaired);
        assert_eq!(fs::read(&path).unwrap(), b"libz contents v1");
    }

    #[test]
    fn truncated_file_is_repaired() {
        let temp_dir = tempfile::tempdir().unwrap();
        let cache = ContentCache::new(temp_dir.path(), Verification::SizeOnly);
        let path = cache.materialize(&source(), &resource()).unwrap().path;
        fs::write(&path, b"libz").unwrap();
        assert_eq!(cache.materialize(&source(), &resource()).unwrap().effort, Effort::Repaired);
    }

    #[test]
    fn unusable_root_is_an_io_error() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path().join("not-a-directory");
        fs::write(&root, b"").unwrap();
        let cache = ContentCache::new(&root, Verification::FirstUse);
        let err = cache.materialize(&source(), &resource()).unwrap_err();
        assert!(matches!(&*err, ErrorKind::Io(_)));
        assert!(err.is_retryable());

        // The failed attempt doesn't keep a reference.
        let target = root.join(blake3::hash(b"libz contents v1").to_string()).join("libz.so");
        assert_eq!(cache.refs(&target), Some(0));
        assert_eq!(cache.sweep().forgotten, vec![target]);
    }

    #[test]
    fn rewrite_that_still_mismatches_is_corrupt() {
        let temp_dir = tempfile::tempdir().unwrap();
        let target = temp_dir.path().join("libz.so");
        fs::write(&target, b"libz contents XX").unwrap();
        let hash = blake3::hash(b"libz contents v1");

        let err = ContentCache::verify_rewrite(&target, 16, &hash).unwrap_err();
        assert!(matches!(&*err, ErrorKind::Corrupt(p) if *p == target));
        assert!(!target.exists());

        fs::write(&target, b"libz contents v1").unwrap();
        assert!(ContentCache::verify_rewrite(&target, 16, &hash).is_ok());
    }

    #[test]
    fn concurrent_sweep_never_deletes_a_materialized_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let cache = ContentCache::new(temp_dir.path(), Verification::FirstUse);
        let source = source();
        let done = AtomicBool::new(false);

        let vanished = std::thread::scope(|scope| {
            scope.spawn(|| {
                while !done.load(Ordering::SeqCst) {
                    cache.sweep();
                }
            });
            let mut vanished = 0;
            for _ in 0..2_000 {
                let materialized = cache.materialize(&source, &resource()).unwrap();
                if !materialized.path.exists() {
                    vanished += 1;
                }
                assert!(cache.release(&materialized.path));
            }
            done.store(true, Ordering::SeqCst);
            vanished
        });
        assert_eq!(vanished, 0);
    }

    #[test]
    fn sweep_only_deletes_unreferenced_files() {
        let temp_dir = tempfile::tempdir().unwrap();
        let cache = ContentCache::new(temp_dir.path(), Verification::FirstUse);
        let libz = cache.materialize(&source(), &resource()).unwrap().path;
        let other = ResourcePath::new("native/linux-x86_64/libother.so").unwrap();
        let libother = cache.materialize(&MockSource::with_files([(other.as_str(), "other")]), &other).unwrap().path;

        assert!(cache.release(&libz));
        let sweep = cache.sweep();
        assert!(sweep.is_clean());
        assert_eq!(sweep.removed, vec![libz.clone()]);
        assert_eq!(sweep.retained, vec![libother.clone()]);
        assert!(!libz.exists());
        assert!(libother.exists());
        assert_eq!(cache.refs(&libz), None);
        assert!(!cache.release(&libz));
        assert!(!cache.retain(&libz));

        assert!(cache.retain(&libother));
        assert!(cache.release(&libother));
        assert!(cache.release(&libother));
        assert_eq!(cache.sweep().removed, vec![libother]);
    }

    #[test]
    fn failed_deletion_is_reported_and_retried() {
        let temp_dir = tempfile::tempdir().unwrap();
        let cache = ContentCache::new(temp_dir.path(), Verification::FirstUse);
        let path = cache.materialize(&source(), &resource()).unwrap().path;
        assert!(cache.release(&path));
        // Something that plain file removal can't delete.
        fs::remove_file(&path).unwrap();
        fs::create_dir(&path).unwrap();
        fs::write(path.join("pinned"), b"").unwrap();

        let sweep = cache.sweep();
        assert!(!sweep.is_clean());
        assert_eq!(sweep.failed.len(), 1);
        assert_eq!(sweep.failed[0].0, path);
        assert!(sweep.removed.is_empty());
        assert_eq!(cache.refs(&path), Some(0));

        fs::remove_dir_all(&path).unwrap();
        let sweep = cache.sweep();
        assert!(sweep.is_clean());
        assert_eq!(sweep.removed, vec![path.clone()]);
        assert_eq!(cache.refs(&path), None);
    }

    #[test]
    fn sweep_deletes_stale_temporary_files() {
        let temp_dir = tempfile::tempdir().unwrap();
        let cache = ContentCache::new(temp_dir.path(), Verification::FirstUse);
        let path = cache.materialize(&source(), &resource()).unwrap().path;
        let dir = path.parent().unwrap().to_path_buf();
        let stale = dir.join(".libz.so.crashed.tmp");
        let fresh = dir.join(".libz.so.writing.tmp");
        fs::write(&stale, b"libz con").unwrap();
        fs::write(&fresh, b"libz con").unwrap();
        let two_hours_ago = SystemTime::now() - Duration::from_secs(2 * 60 * 60);
        fs::File::options().write(true).open(&stale).unwrap().set_modified(two_hours_ago).unwrap();

        assert!(cache.release(&path));
        assert_eq!(cache.sweep().removed, vec![path.clone()]);
        assert!(!stale.exists());
        assert!(fresh.exists());
        assert_eq!(files_in(&dir), vec![".libz.so.writing.tmp"]);

        // Once nothing is left, the directory goes too.
        fs::File::options().write(true).open(&fresh).unwrap().set_modified(two_hours_ago).unwrap();
        let again = cache.materialize(&source(), &resource()).unwrap().path;
        assert!(cache.release(&again));
        cache.sweep();
        assert!(!dir.exists());
    }
}
