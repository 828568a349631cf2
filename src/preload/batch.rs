//! Frame-paced batch loading and unloading
//!
//! A sweep is an ordered list of ids processed in groups of at most
//! `batch_size`. A group is dispatched in one [`BatchLoader::update`] call and
//! the next group waits until every member of the previous one resolved and a
//! later `update` call came around. Only one sweep runs at a time; sweeps
//! requested meanwhile queue up in request order.

use std::cell::Cell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;
use std::time::{Duration, Instant};

use crate::assets::{AssetCache, AssetSource, ResourceId};
use crate::core::detail_level;

/// Identifies a requested sweep
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SweepId(u64);

impl SweepId {
    /// Wrap a raw sweep number
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Raw sweep number
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

/// Direction of a sweep
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SweepKind {
    /// Request every id through the cache
    Load,
    /// Release every unprotected id from the cache
    Unload,
}

/// Owner of the ids a sweep works on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SweepTag {
    /// Images of a scene
    Scene(u32),
    /// Images of a subroutine
    Subroutine(u32),
}

impl fmt::Display for SweepTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scene(id) => write!(f, "scene {id}"),
            Self::Subroutine(id) => write!(f, "subroutine {id}"),
        }
    }
}

/// Outcome of a finished sweep
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepReport {
    /// Sweep that finished
    pub id: SweepId,
    /// Load or unload
    pub kind: SweepKind,
    /// Owner of the ids
    pub tag: SweepTag,
    /// Ids in the sweep
    pub total: usize,
    /// Loads that became ready, or entries released
    pub succeeded: usize,
    /// Loads that failed
    pub failed: usize,
    /// Unloads skipped because the id was protected or not cached
    pub skipped: usize,
    /// Groups dispatched
    pub batches: usize,
    /// `update` calls while the sweep was active
    pub frames: usize,
    /// Wall time from start to report
    pub elapsed: Duration,
}

/// Decides, at execution time, whether an id must stay cached
pub trait UnloadGuard {
    /// True if `id` must not be unloaded
    fn is_protected(&self, id: &ResourceId) -> bool;
}

impl<F> UnloadGuard for F
where
    F: Fn(&ResourceId) -> bool,
{
    fn is_protected(&self, id: &ResourceId) -> bool {
        self(id)
    }
}

struct Sweep {
    id: SweepId,
    kind: SweepKind,
    tag: SweepTag,
    ids: Vec<ResourceId>,
    batch_size: usize,
    cursor: usize,
    outstanding: Rc<Cell<usize>>,
    succeeded: Rc<Cell<usize>>,
    failed: Rc<Cell<usize>>,
    skipped: usize,
    batches: usize,
    frames: usize,
    started: Instant,
}

impl Sweep {
    fn new(
        id: SweepId,
        kind: SweepKind,
        tag: SweepTag,
        ids: Vec<ResourceId>,
        batch_size: usize,
    ) -> Self {
        Self {
            id,
            kind,
            tag,
            ids,
            batch_size: batch_size.max(1),
            cursor: 0,
            outstanding: Rc::new(Cell::new(0)),
            succeeded: Rc::new(Cell::new(0)),
            failed: Rc::new(Cell::new(0)),
            skipped: 0,
            batches: 0,
            frames: 0,
            started: Instant::now(),
        }
    }

    fn is_exhausted(&self) -> bool {
        self.cursor >= self.ids.len()
    }

    fn report(&self) -> SweepReport {
        SweepReport {
            id: self.id,
            kind: self.kind,
            tag: self.tag,
            total: self.ids.len(),
            succeeded: self.succeeded.get(),
            failed: self.failed.get(),
            skipped: self.skipped,
            batches: self.batches,
            frames: self.frames,
            elapsed: self.started.elapsed(),
        }
    }
}

/// Sequential sweep executor
pub struct BatchLoader {
    active: Option<Sweep>,
    queue: VecDeque<Sweep>,
    reports: Vec<SweepReport>,
    next_id: u64,
    verbose: bool,
}

impl BatchLoader {
    /// Create an idle loader. `verbose` promotes per-resource logs to debug.
    #[must_use]
    pub fn new(verbose: bool) -> Self {
        Self {
            active: None,
            queue: VecDeque::new(),
            reports: Vec::new(),
            next_id: 1,
            verbose,
        }
    }

    /// Queue a load sweep over `ids` in groups of `batch_size`
    pub fn load_batch(
        &mut self,
        ids: Vec<ResourceId>,
        batch_size: usize,
        tag: SweepTag,
    ) -> SweepId {
        self.enqueue(SweepKind::Load, ids, batch_size, tag)
    }

    /// Queue an unload sweep over `ids` in groups of `batch_size`.
    ///
    /// Each id is checked against the guard passed to `update` when its group
    /// runs, not when the sweep is queued.
    pub fn unload_batch(
        &mut self,
        ids: Vec<ResourceId>,
        batch_size: usize,
        tag: SweepTag,
    ) -> SweepId {
        self.enqueue(SweepKind::Unload, ids, batch_size, tag)
    }

    fn enqueue(
        &mut self,
        kind: SweepKind,
        ids: Vec<ResourceId>,
        batch_size: usize,
        tag: SweepTag,
    ) -> SweepId {
        let id = SweepId(self.next_id);
        self.next_id += 1;

        log::debug!(
            "Queued {kind:?} sweep {} for {tag}: {} images",
            id.value(),
            ids.len()
        );
        self.queue.push_back(Sweep::new(id, kind, tag, ids, batch_size));
        id
    }

    /// Advance by one frame: start the next queued sweep, dispatch the next
    /// group once the previous one resolved, or finish the active sweep.
    pub fn update<S: AssetSource>(&mut self, cache: &mut AssetCache<S>, guard: &impl UnloadGuard) {
        let Some(sweep) = self.active.as_mut() else {
            if let Some(sweep) = self.queue.pop_front() {
                let sweep = self.active.insert(sweep);
                sweep.started = Instant::now();
                sweep.frames = 1;
                Self::dispatch(sweep, cache, guard, self.verbose);
            }
            return;
        };

        sweep.frames += 1;
        if sweep.outstanding.get() > 0 {
            return;
        }

        if !sweep.is_exhausted() {
            Self::dispatch(sweep, cache, guard, self.verbose);
            return;
        }

        let report = sweep.report();
        log::info!(
            "{:?} sweep for {} finished: {}/{} in {} batches, {:.1}ms",
            report.kind,
            report.tag,
            report.succeeded,
            report.total,
            report.batches,
            report.elapsed.as_secs_f64() * 1000.0
        );
        self.reports.push(report);
        self.active = None;
    }

    fn dispatch<S: AssetSource>(
        sweep: &mut Sweep,
        cache: &mut AssetCache<S>,
        guard: &impl UnloadGuard,
        verbose: bool,
    ) {
        let end = (sweep.cursor + sweep.batch_size).min(sweep.ids.len());
        let group = &sweep.ids[sweep.cursor..end];
        sweep.cursor = end;
        if group.is_empty() {
            return;
        }
        sweep.batches += 1;

        let level = detail_level(verbose);
        match sweep.kind {
            SweepKind::Load => {
                sweep.outstanding.set(group.len());
                for id in group {
                    log::log!(level, "Loading {id}");
                    let outstanding = Rc::clone(&sweep.outstanding);
                    let succeeded = Rc::clone(&sweep.succeeded);
                    let failed = Rc::clone(&sweep.failed);
                    cache.ensure(id, move |asset| {
                        if asset.is_ready() {
                            succeeded.set(succeeded.get() + 1);
                        } else {
                            failed.set(failed.get() + 1);
                        }
                        outstanding.set(outstanding.get().saturating_sub(1));
                    });
                }
            }
            SweepKind::Unload => {
                for id in group {
                    if guard.is_protected(id) {
                        log::log!(level, "Keeping protected {id}");
                        sweep.skipped += 1;
                    } else if cache.unload(id) {
                        log::log!(level, "Unloaded {id}");
                        sweep.succeeded.set(sweep.succeeded.get() + 1);
                    } else {
                        sweep.skipped += 1;
                    }
                }
            }
        }
    }

    /// Take the reports of sweeps finished since the last call
    pub fn drain_reports(&mut self) -> Vec<SweepReport> {
        std::mem::take(&mut self.reports)
    }

    /// True if no sweep is active or queued
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.active.is_none() && self.queue.is_empty()
    }

    /// Sweeps waiting behind the active one
    #[must_use]
    pub fn pending_sweeps(&self) -> usize {
        self.queue.len()
    }

    /// The running sweep, if any
    #[must_use]
    pub fn active_sweep(&self) -> Option<SweepId> {
        self.active.as_ref().map(|sweep| sweep.id)
    }

    /// Loads of the current group that have not resolved yet
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.active
            .as_ref()
            .map_or(0, |sweep| sweep.outstanding.get())
    }
}

impl Default for BatchLoader {
    fn default() -> Self {
        Self::new(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::testing::ManualSource;

    fn ids(prefix: &str, count: usize) -> Vec<ResourceId> {
        (0..count)
            .map(|i| ResourceId::new(format!("img/pictures/{prefix}{i:02}")))
            .collect()
    }

    fn unprotected(_: &ResourceId) -> bool {
        false
    }

    /// One frame: apply completions, then advance the loader
    fn frame(loader: &mut BatchLoader, cache: &mut AssetCache<ManualSource>) {
        cache.poll();
        loader.update(cache, &unprotected);
    }

    #[test]
    fn test_load_in_bounded_groups() {
        let mut cache = AssetCache::new(ManualSource::default());
        let mut loader = BatchLoader::default();
        let sweep = loader.load_batch(ids("p", 13), 5, SweepTag::Scene(1));

        let mut dispatched = Vec::new();
        for _ in 0..3 {
            frame(&mut loader, &mut cache);
            dispatched.push(cache.source().begun.len());
            assert!(loader.drain_reports().is_empty());
        }
        assert_eq!(dispatched, vec![5, 10, 13]);
        assert!(cache.source().max_in_flight <= 5);

        frame(&mut loader, &mut cache);
        let reports = loader.drain_reports();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].id, sweep);
        assert_eq!(reports[0].batches, 3);
        assert_eq!(reports[0].succeeded, 13);
        assert_eq!(cache.len(), 13);
        assert!(loader.is_idle());
    }

    #[test]
    fn test_group_waits_for_slow_member() {
        let mut source = ManualSource::default();
        source.held.insert(ResourceId::new("img/pictures/p01"));
        let mut cache = AssetCache::new(source);
        let mut loader = BatchLoader::default();
        loader.load_batch(ids("p", 4), 2, SweepTag::Scene(1));

        for _ in 0..5 {
            frame(&mut loader, &mut cache);
        }
        assert_eq!(cache.source().begun.len(), 2);
        assert_eq!(loader.in_flight(), 1);

        cache.source_mut().held.clear();
        frame(&mut loader, &mut cache);
        assert_eq!(cache.source().begun.len(), 4);
    }

    #[test]
    fn test_failed_loads_still_advance() {
        let mut source = ManualSource::default();
        source.broken.insert(ResourceId::new("img/pictures/p00"));
        let mut cache = AssetCache::new(source);
        let mut loader = BatchLoader::default();
        loader.load_batch(ids("p", 3), 2, SweepTag::Subroutine(4));

        while !loader.is_idle() {
            frame(&mut loader, &mut cache);
        }
        let report = &loader.drain_reports()[0];
        assert_eq!(report.tag, SweepTag::Subroutine(4));
        assert_eq!((report.succeeded, report.failed), (2, 1));
    }

    #[test]
    fn test_sweeps_run_one_at_a_time() {
        let mut cache = AssetCache::new(ManualSource::default());
        let mut loader = BatchLoader::default();
        let first = loader.load_batch(ids("a", 4), 2, SweepTag::Scene(1));
        let second = loader.load_batch(ids("b", 2), 2, SweepTag::Scene(2));
        assert_eq!(loader.pending_sweeps(), 2);

        frame(&mut loader, &mut cache);
        assert_eq!(loader.active_sweep(), Some(first));
        assert_eq!(loader.pending_sweeps(), 1);

        let mut order = Vec::new();
        while !loader.is_idle() {
            frame(&mut loader, &mut cache);
            order.extend(loader.drain_reports().into_iter().map(|report| report.id));
        }
        assert_eq!(order, vec![first, second]);

        // No image of the second sweep was requested before the first finished
        let begun: Vec<&str> = cache.source().begun.iter().map(ResourceId::as_str).collect();
        assert!(begun[..4].iter().all(|id| id.contains("/a")));
        assert!(begun[4..].iter().all(|id| id.contains("/b")));
    }

    #[test]
    fn test_unload_respects_guard() {
        let mut cache = AssetCache::new(ManualSource::default());
        let mut loader = BatchLoader::default();
        let all = ids("p", 6);
        for id in &all {
            cache.ensure(id, |_| {});
        }
        cache.poll();

        loader.unload_batch(all.clone(), 4, SweepTag::Scene(1));
        let keep = ResourceId::new("img/pictures/p05");
        let guard = |id: &ResourceId| *id == keep;
        while !loader.is_idle() {
            cache.poll();
            loader.update(&mut cache, &guard);
        }

        let report = &loader.drain_reports()[0];
        assert_eq!(report.kind, SweepKind::Unload);
        assert_eq!((report.succeeded, report.skipped, report.batches), (5, 1, 2));
        assert_eq!(cache.len(), 1);
        assert!(cache.contains(&keep));
    }

    #[test]
    fn test_empty_sweep_reports() {
        let mut cache = AssetCache::new(ManualSource::default());
        let mut loader = BatchLoader::default();
        loader.unload_batch(Vec::new(), 10, SweepTag::Scene(3));

        frame(&mut loader, &mut cache);
        frame(&mut loader, &mut cache);
        let reports = loader.drain_reports();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].batches, 0);
    }
}
