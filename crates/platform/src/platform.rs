//! Host platform identification.
//!
//! Raw operating system and architecture strings are normalized through
//! small alias tables into a closed set of [`Os`] and [`Arch`] variants. The
//! host [`Platform`] is resolved once per process and cached, including the
//! failure case: an unsupported host stays unsupported.

use crate::error::{ErrorKind, Result};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use std::sync::OnceLock;
use tracing::instrument;

/// Supported operating systems.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Os {
    Linux,
    MacOs,
    Windows,
}

/// Supported CPU architectures.
///
/// This is the architecture of the running process, not necessarily of the
/// machine: a 32-bit process on a 64-bit CPU reports [`Arch::X86`], which is
/// what matters since it can only link same-architecture libraries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Arch {
    X86,
    X86_64,
    Aarch64,
}

impl Os {
    pub const ALL: [Os; 3] = [Os::Linux, Os::MacOs, Os::Windows];

    /// Canonical token used in resource paths.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Os::Linux => "linux",
            Os::MacOs => "macos",
            Os::Windows => "windows",
        }
    }

    /// Normalize a raw OS string (`std::env::consts::OS`, `uname -s`, a JVM
    /// style `os.name`, ...). Returns `None` when there's no mapping.
    #[must_use]
    pub fn from_raw(raw: &str) -> Option<Self> {
        let raw = raw.trim().to_ascii_lowercase();
        match raw.as_str() {
            "linux" => Some(Os::Linux),
            "macos" | "mac os x" | "darwin" | "osx" => Some(Os::MacOs),
            // Windows reports itself with a version suffix ("Windows 10").
            s if s.starts_with("windows") => Some(Os::Windows),
            _ => None,
        }
    }

    /// Platform-conventional shared library filename for a logical name.
    #[must_use]
    pub fn library_filename(&self, name: &str) -> String {
        match self {
            Os::Linux => format!("lib{name}.so"),
            Os::MacOs => format!("lib{name}.dylib"),
            Os::Windows => format!("{name}.dll"),
        }
    }
}

impl Arch {
    pub const ALL: [Arch; 3] = [Arch::X86, Arch::X86_64, Arch::Aarch64];

    /// Canonical token used in resource paths.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Arch::X86 => "x86",
            Arch::X86_64 => "x86_64",
            Arch::Aarch64 => "aarch64",
        }
    }

    /// Normalize a raw architecture string. Returns `None` when there's no
    /// mapping.
    #[must_use]
    pub fn from_raw(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "x86" | "i386" | "i486" | "i586" | "i686" => Some(Arch::X86),
            "x86_64" | "amd64" | "x64" => Some(Arch::X86_64),
            "aarch64" | "arm64" => Some(Arch::Aarch64),
            _ => None,
        }
    }
}

impl Display for Os {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

impl Display for Arch {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

/// Canonical (operating system, architecture) pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Platform {
    pub os: Os,
    pub arch: Arch,
}

impl Platform {
    #[must_use]
    pub const fn new(os: Os, arch: Arch) -> Self {
        Self { os, arch }
    }

    /// Normalize a raw pair of system-reported strings.
    ///
    /// Both values are checked before failing so that the error always
    /// carries the full raw pair for diagnostics.
    pub fn resolve(os: impl AsRef<str>, arch: impl AsRef<str>) -> Result<Self> {
        let (raw_os, raw_arch) = (os.as_ref(), arch.as_ref());
        match (Os::from_raw(raw_os), Arch::from_raw(raw_arch)) {
            (Some(os), Some(arch)) => Ok(Self { os, arch }),
            _ => exn::bail!(ErrorKind::UnsupportedPlatform {
                os: raw_os.to_string(),
                arch: raw_arch.to_string(),
            }),
        }
    }

    /// The platform this process runs on.
    ///
    /// Resolved from [`std::env::consts`] on first call and cached for the
    /// lifetime of the process; every later call returns the same value (or
    /// the same error).
    pub fn current() -> Result<Self> {
        static HOST: OnceLock<std::result::Result<Platform, ErrorKind>> = OnceLock::new();
        HOST.get_or_init(Self::detect).clone().map_err(exn::Exn::from)
    }

    #[instrument(level = "debug")]
    fn detect() -> std::result::Result<Self, ErrorKind> {
        let (os, arch) = (std::env::consts::OS, std::env::consts::ARCH);
        match Self::resolve(os, arch) {
            Ok(platform) => {
                tracing::debug!(%platform, "Resolved host platform");
                Ok(platform)
            },
            Err(e) => {
                tracing::error!(os, arch, "Host platform is not supported");
                Err((*e).clone())
            },
        }
    }

    /// Directory token, e.g. `linux-x86_64`.
    #[must_use]
    pub fn token(&self) -> String {
        format!("{}-{}", self.os, self.arch)
    }

    #[must_use]
    pub fn library_filename(&self, name: &str) -> String {
        self.os.library_filename(name)
    }
}

impl Display for Platform {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}-{}", self.os, self.arch)
    }
}

impl FromStr for Platform {
    type Err = crate::error::Error;

    /// Parses a directory token (`linux-x86_64`). Only the canonical OS
    /// token may precede the first `-`; the architecture goes through the
    /// alias table.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.split_once('-') {
            Some((os, arch)) => Self::resolve(os, arch),
            None => exn::bail!(ErrorKind::UnsupportedPlatform { os: s.to_string(), arch: String::new() }),
        }
    }
}
