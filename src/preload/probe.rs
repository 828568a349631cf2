//! Resource existence checks
//!
//! Scene data names images by folder and base name, without extension, and
//! editors happily leave references to files that were later deleted. The
//! [`PathResolver`] turns a candidate into a [`ResourceId`] only when one of
//! the configured extensions exists on disk, and remembers the answer.

use std::path::{Path, PathBuf};

use rustc_hash::FxHashMap;

use crate::assets::{ResourceCategory, ResourceId};

/// Filesystem existence check
pub trait FileProbe {
    /// True if a regular file exists at `path`, relative to the game root
    fn exists(&self, path: &Path) -> bool;
}

impl<F> FileProbe for F
where
    F: Fn(&Path) -> bool,
{
    fn exists(&self, path: &Path) -> bool {
        self(path)
    }
}

/// Probe rooted at the game directory
#[derive(Debug, Clone)]
pub struct FsProbe {
    root: PathBuf,
}

impl FsProbe {
    /// Create a probe resolving paths against `root`
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Game root directory
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl FileProbe for FsProbe {
    fn exists(&self, path: &Path) -> bool {
        self.root.join(path).is_file()
    }
}

/// Memoizing candidate → [`ResourceId`] resolver
pub struct PathResolver<P: FileProbe> {
    probe: P,
    extensions: Vec<String>,
    known: FxHashMap<ResourceId, bool>,
    probes: usize,
}

impl<P: FileProbe> PathResolver<P> {
    /// Create a resolver trying `extensions` in order
    #[must_use]
    pub fn new(probe: P, extensions: Vec<String>) -> Self {
        Self {
            probe,
            extensions,
            known: FxHashMap::default(),
            probes: 0,
        }
    }

    /// Return `id` if a file for it exists. Each id hits the filesystem once.
    pub fn resolve(&mut self, id: ResourceId) -> Option<ResourceId> {
        if let Some(&exists) = self.known.get(&id) {
            return exists.then_some(id);
        }

        let exists = self.extensions.iter().any(|ext| {
            self.probes += 1;
            self.probe.exists(Path::new(&id.with_extension(ext)))
        });
        self.known.insert(id.clone(), exists);
        exists.then_some(id)
    }

    /// Resolve `name` inside a category folder. Empty names never resolve.
    pub fn resolve_in(&mut self, category: ResourceCategory, name: &str) -> Option<ResourceId> {
        if name.trim().is_empty() {
            return None;
        }
        self.resolve(ResourceId::in_category(category, name))
    }

    /// Number of filesystem checks issued so far
    #[must_use]
    pub fn probe_count(&self) -> usize {
        self.probes
    }

    /// Number of memoized ids
    #[must_use]
    pub fn known_count(&self) -> usize {
        self.known.len()
    }

    /// Drop every memoized answer, e.g. after the game files changed
    pub fn forget(&mut self) {
        self.known.clear();
    }
}
