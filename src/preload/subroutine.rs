//! Subroutine-scoped image sets
//!
//! A subroutine's images are loaded when it is invoked and released when it
//! completes, independently of the scene retention window. Long-running
//! (parallel) subroutines ignore completion and keep their images until
//! stopped explicitly.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::assets::ResourceId;
use crate::core::PreloadConfig;
use crate::data::GameDatabase;

use super::batch::{BatchLoader, SweepId, SweepTag};
use super::probe::FileProbe;
use super::scanner::ReferenceScanner;

/// Result of [`SubroutineAssetTracker::on_invoke`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvokeOutcome {
    /// A load sweep was queued for the subroutine's images
    Scheduled(SweepId),
    /// The image set was recorded without loading it
    Recorded,
    /// The subroutine is already tracked; the invocation was counted
    AlreadyTracked,
    /// The subroutine references no existing image
    NoResources,
    /// No subroutine with this id
    Unknown,
    /// Preloading is switched off
    Disabled,
}

/// Where a subroutine's images stand
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubroutineStatus {
    /// Not tracked: never invoked, completed, or without images
    Untracked,
    /// Load sweep queued or running
    Loading,
    /// Every image was requested and resolved
    Ready,
}

#[derive(Debug)]
struct TrackedSubroutine {
    resources: FxHashSet<ResourceId>,
    long_running: bool,
    sweep: Option<SweepId>,
    ready: bool,
    // Invocations still running
    running: usize,
}

/// Live subroutine image sets
#[derive(Debug)]
pub struct SubroutineAssetTracker {
    tracked: FxHashMap<u32, TrackedSubroutine>,
    on_demand: bool,
    load_batch_size: usize,
    unload_batch_size: usize,
}

impl SubroutineAssetTracker {
    /// Create an empty tracker using the batch sizes of `config`
    #[must_use]
    pub fn new(config: &PreloadConfig) -> Self {
        Self {
            tracked: FxHashMap::default(),
            on_demand: config.on_demand_subroutine_preload,
            load_batch_size: config.load_batch_size,
            unload_batch_size: config.unload_batch_size,
        }
    }

    /// Handle a subroutine invocation.
    ///
    /// The first invocation scans the subroutine's own tree and starts
    /// tracking it right away. Later invocations are only counted, without
    /// rescanning, so the images stay until the last of them completes.
    pub fn on_invoke<P: FileProbe>(
        &mut self,
        id: u32,
        db: &GameDatabase,
        scanner: &mut ReferenceScanner<P>,
        loader: &mut BatchLoader,
    ) -> InvokeOutcome {
        if let Some(entry) = self.tracked.get_mut(&id) {
            entry.running += 1;
            return InvokeOutcome::AlreadyTracked;
        }
        let Some(subroutine) = db.subroutine(id) else {
            log::warn!("Invoked unknown subroutine {id}");
            return InvokeOutcome::Unknown;
        };
        let Some(resources) = scanner.scan_subroutine(id, db) else {
            return InvokeOutcome::Unknown;
        };
        if resources.is_empty() {
            return InvokeOutcome::NoResources;
        }

        let (sweep, outcome) = if self.on_demand {
            let sweep = loader.load_batch(
                sorted(&resources),
                self.load_batch_size,
                SweepTag::Subroutine(id),
            );
            (Some(sweep), InvokeOutcome::Scheduled(sweep))
        } else {
            (None, InvokeOutcome::Recorded)
        };

        log::info!(
            "Tracking subroutine {id} ({}): {} images",
            subroutine.name,
            resources.len()
        );
        self.tracked.insert(
            id,
            TrackedSubroutine {
                resources,
                long_running: subroutine.is_long_running(),
                sweep,
                ready: sweep.is_none(),
                running: 1,
            },
        );
        outcome
    }

    /// Handle one invocation of a subroutine finishing. Long-running
    /// subroutines are ignored; others release their images once no
    /// invocation is left running.
    ///
    /// Returns the queued unload sweep, if any.
    pub fn on_complete(&mut self, id: u32, loader: &mut BatchLoader) -> Option<SweepId> {
        let entry = self.tracked.get_mut(&id)?;
        if entry.long_running {
            return None;
        }
        entry.running = entry.running.saturating_sub(1);
        if entry.running > 0 {
            log::trace!("Subroutine {id} completed, {} still running", entry.running);
            return None;
        }
        self.release(id, loader)
    }

    /// Stop tracking a subroutine regardless of its trigger and release its
    /// images.
    pub fn stop(&mut self, id: u32, loader: &mut BatchLoader) -> Option<SweepId> {
        self.release(id, loader)
    }

    fn release(&mut self, id: u32, loader: &mut BatchLoader) -> Option<SweepId> {
        let entry = self.tracked.remove(&id)?;
        log::info!(
            "Releasing subroutine {id}: {} images",
            entry.resources.len()
        );
        Some(loader.unload_batch(
            sorted(&entry.resources),
            self.unload_batch_size,
            SweepTag::Subroutine(id),
        ))
    }

    /// Mark the subroutine owning `sweep` as ready.
    ///
    /// Returns the subroutine id, or `None` if it completed in the meantime.
    pub fn mark_ready(&mut self, sweep: SweepId) -> Option<u32> {
        let (&id, entry) = self
            .tracked
            .iter_mut()
            .find(|(_, entry)| entry.sweep == Some(sweep))?;
        entry.ready = true;
        Some(id)
    }

    /// True if a live subroutine references `id`
    #[must_use]
    pub fn protects(&self, id: &ResourceId) -> bool {
        self.tracked.values().any(|entry| entry.resources.contains(id))
    }

    /// Load status of subroutine `id`
    #[must_use]
    pub fn status(&self, id: u32) -> SubroutineStatus {
        match self.tracked.get(&id) {
            None => SubroutineStatus::Untracked,
            Some(entry) if entry.ready => SubroutineStatus::Ready,
            Some(_) => SubroutineStatus::Loading,
        }
    }

    /// Images of subroutine `id`, if tracked
    #[must_use]
    pub fn resources(&self, id: u32) -> Option<&FxHashSet<ResourceId>> {
        self.tracked.get(&id).map(|entry| &entry.resources)
    }

    /// Number of tracked subroutines
    #[must_use]
    pub fn len(&self) -> usize {
        self.tracked.len()
    }

    /// True if no subroutine is tracked
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tracked.is_empty()
    }
}

/// Stable sweep order for a set of ids
pub(crate) fn sorted(ids: &FxHashSet<ResourceId>) -> Vec<ResourceId> {
    let mut ids: Vec<ResourceId> = ids.iter().cloned().collect();
    ids.sort_unstable();
    ids
}
