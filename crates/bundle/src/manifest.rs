//! Per-platform bundle manifest.
//!
//! A bundle may ship a `bundle.toml` next to each platform's libraries that
//! describes how they relate to each other:
//!
//! ```toml
//! # Libraries expected to come from the host system (informational).
//! system = ["m", "pthread"]
//!
//! [[library]]
//! name = "example"
//! # Bundled libraries that must be loaded before `example`.
//! depends = ["z"]
//!
//! [[library]]
//! name = "z"
//! ```
//!
//! The manifest is optional. Without one, every library is assumed to be
//! self-contained.

use crate::ResourceSource;
use crate::error::{ErrorKind, Result};
use embedlib_platform::{ResourcePath, validate_name};
use exn::ResultExt;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::instrument;

/// A bundled library and the bundled libraries it links against.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct LibraryEntry {
    pub name: String,
    #[serde(default)]
    pub depends: Vec<String>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    /// Non-bundled libraries the bundle expects the host to provide.
    #[serde(default)]
    pub system: Vec<String>,
    #[serde(default, rename = "library")]
    pub libraries: Vec<LibraryEntry>,
}

impl Manifest {
    /// Parse and validate a manifest.
    ///
    /// Rejects duplicate entries, dependencies on libraries that aren't part
    /// of the manifest, and dependency cycles; any of those would otherwise
    /// surface as a confusing load failure (or a deadlock) much later.
    pub fn parse(text: &str) -> Result<Self> {
        let manifest: Manifest = toml::from_str(text).or_raise(|| ErrorKind::Manifest("malformed TOML".to_string()))?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Load the manifest at `path` from a source, if there is one.
    #[instrument(skip_all, fields(source = source.name(), %path))]
    pub fn load(source: &dyn ResourceSource, path: &ResourcePath) -> Result<Option<Self>> {
        if !source.exists(path) {
            tracing::debug!("No bundle manifest; libraries are assumed to be self-contained");
            return Ok(None);
        }
        let bytes = source.read(path)?;
        let text = std::str::from_utf8(&bytes).or_raise(|| ErrorKind::Manifest(format!("{path} is not UTF-8")))?;
        let manifest = Self::parse(text)?;
        if !manifest.system.is_empty() {
            tracing::debug!(system = ?manifest.system, "Bundle expects system libraries");
        }
        Ok(Some(manifest))
    }

    /// Bundled libraries that must be loaded before `name`, in load order.
    #[must_use]
    pub fn dependencies(&self, name: &str) -> &[String] {
        self.libraries.iter().find(|l| l.name == name).map(|l| l.depends.as_slice()).unwrap_or_default()
    }

    /// Every bundled library in an order where dependencies come first.
    #[must_use]
    pub fn load_order(&self) -> Vec<&str> {
        let mut ordered = Vec::with_capacity(self.libraries.len());
        let mut seen = BTreeSet::new();
        for entry in &self.libraries {
            self.visit(&entry.name, &mut seen, &mut ordered);
        }
        ordered
    }

    fn visit<'a>(&'a self, name: &'a str, seen: &mut BTreeSet<&'a str>, ordered: &mut Vec<&'a str>) {
        if !seen.insert(name) {
            return;
        }
        for dep in self.dependencies(name) {
            self.visit(dep, seen, ordered);
        }
        ordered.push(name);
    }

    fn validate(&self) -> Result<()> {
        let mut graph: BTreeMap<&str, &[String]> = BTreeMap::new();
        for entry in &self.libraries {
            validate_name(&entry.name)
                .map_err(|err| err.raise(ErrorKind::Manifest(format!("invalid name {:?}", entry.name))))?;
            if graph.insert(&entry.name, &entry.depends).is_some() {
                exn::bail!(ErrorKind::Manifest(format!("duplicate library {:?}", entry.name)));
            }
        }
        for (name, depends) in &graph {
            if let Some(unknown) = depends.iter().find(|d| !graph.contains_key(d.as_str())) {
                exn::bail!(ErrorKind::Manifest(format!("{name:?} depends on unknown library {unknown:?}")));
            }
        }
        // Colour-marking DFS: `visiting` is the current path, `done` is safe.
        let mut done = BTreeSet::new();
        for name in graph.keys().copied() {
            let mut visiting = Vec::new();
            Self::find_cycle(&graph, name, &mut visiting, &mut done)?;
        }
        Ok(())
    }

    fn find_cycle<'a>(
        graph: &BTreeMap<&'a str, &'a [String]>,
        name: &'a str,
        visiting: &mut Vec<&'a str>,
        done: &mut BTreeSet<&'a str>,
    ) -> Result<()> {
        if done.contains(name) {
            return Ok(());
        }
        if visiting.contains(&name) {
            visiting.push(name);
            exn::bail!(ErrorKind::Manifest(format!("dependency cycle: {}", visiting.join(" -> "))));
        }
        visiting.push(name);
        for dep in graph.get(name).copied().unwrap_or_default() {
            Self::find_cycle(graph, dep, visiting, done)?;
        }
        visiting.pop();
        done.insert(name);
        Ok(())
    }
}
