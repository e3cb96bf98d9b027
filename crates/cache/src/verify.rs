use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind as IoErrorKind;
use std::path::Path;

/// How much to trust a cache file that already exists.
#[derive(Clone, Copy, Debug, Default, Display, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Verification {
    /// Rehash the file every time it's materialized.
    #[display("always")]
    Always,
    /// Rehash the first time this process sees the file, trust it afterwards.
    #[default]
    #[display("first-use")]
    FirstUse,
    /// Only compare the file size. Catches truncation, not bit rot.
    #[display("size-only")]
    SizeOnly,
}

/// What's currently at a target path, relative to the bytes we expect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Check {
    Missing,
    Valid,
    Mismatch,
}

/// Compare the file at `target` against the expected content.
///
/// `trusted` is whether this process already verified the file once.
pub(crate) fn check(
    target: &Path,
    expected_len: usize,
    expected: &blake3::Hash,
    verification: Verification,
    trusted: bool,
) -> std::io::Result<Check> {
    let metadata = match fs::metadata(target) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == IoErrorKind::NotFound => return Ok(Check::Missing),
        Err(e) => return Err(e),
    };
    if !metadata.is_file() || metadata.len() != expected_len as u64 {
        return Ok(Check::Mismatch);
    }
    let rehash = match verification {
        Verification::Always => true,
        Verification::FirstUse => !trusted,
        Verification::SizeOnly => false,
    };
    if !rehash {
        return Ok(Check::Valid);
    }
    let mut hasher = blake3::Hasher::new();
    hasher.update_reader(fs::File::open(target)?)?;
    Ok(if hasher.finalize() == *expected { Check::Valid } else { Check::Mismatch })
}
