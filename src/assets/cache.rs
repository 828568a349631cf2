//! Shared image cache with get-or-load semantics
//!
//! Every image request goes through [`AssetCache::ensure`]. The first request
//! for an id starts exactly one load; later requests for the same id attach
//! themselves as waiters on that load. Completions are applied in
//! [`AssetCache::poll`], once per frame.
//!
//! The cache has no notion of scenes or subroutines. Callers decide what may be
//! unloaded.

use rustc_hash::FxHashMap;

use super::handle::ImageHandle;
use super::resource::ResourceId;
use super::source::{AssetSource, LoadCompletion, LoadError, LoadTicket};

/// Callback run once when a requested image resolved (ready or failed).
pub type ReadyCallback = Box<dyn FnOnce(&Asset)>;

/// Load state of an [`Asset`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetState {
    /// A load is in flight
    Loading,
    /// Pixels are decoded and usable
    Ready,
    /// The load failed or the entry was released before it finished
    Failed,
}

/// An image as seen by requesters.
#[derive(Debug, Clone)]
pub struct Asset {
    id: ResourceId,
    state: AssetState,
    image: Option<ImageHandle>,
}

impl Asset {
    fn loading(id: ResourceId) -> Self {
        Self {
            id,
            state: AssetState::Loading,
            image: None,
        }
    }

    /// Resource this asset was loaded from
    #[must_use]
    pub fn id(&self) -> &ResourceId {
        &self.id
    }

    /// Current load state
    #[must_use]
    pub const fn state(&self) -> AssetState {
        self.state
    }

    /// True once the pixels are usable
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.state == AssetState::Ready
    }

    /// True if the load never produced pixels
    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.state == AssetState::Failed
    }

    /// The decoded image, when ready
    #[must_use]
    pub fn image(&self) -> Option<&ImageHandle> {
        self.image.as_ref()
    }
}

struct CacheEntry {
    asset: Asset,
    ticket: LoadTicket,
    waiters: Vec<ReadyCallback>,
    /// Tick of the last request or completion. Diagnostics only.
    last_touch: u64,
}

/// Counters reported by [`AssetCache::counters`]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheCounters {
    /// Underlying loads started
    pub loads_started: u64,
    /// Loads that produced an image
    pub loads_completed: u64,
    /// Loads that failed
    pub loads_failed: u64,
    /// Entries released through `unload`
    pub unloads: u64,
    /// Requests answered by an existing entry
    pub hits: u64,
}

/// Process-wide identifier → image map.
pub struct AssetCache<S: AssetSource> {
    source: S,
    entries: FxHashMap<ResourceId, CacheEntry>,
    next_ticket: u64,
    tick: u64,
    completions: Vec<LoadCompletion>,
    failures: Vec<(ResourceId, LoadError)>,
    counters: CacheCounters,
}

impl<S: AssetSource> AssetCache<S> {
    /// Create an empty cache loading through `source`
    #[must_use]
    pub fn new(source: S) -> Self {
        Self {
            source,
            entries: FxHashMap::default(),
            next_ticket: 1,
            tick: 0,
            completions: Vec::new(),
            failures: Vec::new(),
            counters: CacheCounters::default(),
        }
    }

    /// Cached asset for `id`, loading or ready. Never starts a load.
    #[must_use]
    pub fn get(&self, id: &ResourceId) -> Option<&Asset> {
        self.entries.get(id).map(|entry| &entry.asset)
    }

    /// Request `id`, starting a load only if no entry exists.
    ///
    /// `on_ready` runs immediately when the image is already decoded, otherwise
    /// when the in-flight load resolves. It runs exactly once, also on failure.
    pub fn ensure(&mut self, id: &ResourceId, on_ready: impl FnOnce(&Asset) + 'static) {
        let tick = self.tick;

        if let Some(entry) = self.entries.get_mut(id) {
            self.counters.hits += 1;
            entry.last_touch = tick;
            match entry.asset.state {
                AssetState::Ready => on_ready(&entry.asset),
                _ => entry.waiters.push(Box::new(on_ready)),
            }
            return;
        }

        let ticket = LoadTicket(self.next_ticket);
        self.next_ticket += 1;
        self.counters.loads_started += 1;

        self.entries.insert(
            id.clone(),
            CacheEntry {
                asset: Asset::loading(id.clone()),
                ticket,
                waiters: vec![Box::new(on_ready)],
                last_touch: tick,
            },
        );
        self.source.begin(ticket, id);
    }

    /// Release the image and drop the entry.
    ///
    /// Returns false if `id` was not cached. Waiters of a load still in flight
    /// are resolved with a failed asset; its late completion is ignored.
    pub fn unload(&mut self, id: &ResourceId) -> bool {
        let Some(entry) = self.entries.remove(id) else {
            return false;
        };
        self.counters.unloads += 1;

        if entry.asset.state == AssetState::Loading {
            let mut asset = entry.asset;
            asset.state = AssetState::Failed;
            for waiter in entry.waiters {
                waiter(&asset);
            }
        }
        true
    }

    /// Apply every load completion reported by the source.
    ///
    /// Returns the number of entries resolved this call.
    pub fn poll(&mut self) -> usize {
        self.tick += 1;

        let mut completions = std::mem::take(&mut self.completions);
        self.source.drain(&mut completions);

        let mut resolved = 0;
        for completion in completions.drain(..) {
            if self.resolve(completion) {
                resolved += 1;
            }
        }
        self.completions = completions;
        resolved
    }

    fn resolve(&mut self, completion: LoadCompletion) -> bool {
        let LoadCompletion { ticket, id, result } = completion;

        let current = self.entries.get(&id).map(|entry| entry.ticket);
        if current != Some(ticket) {
            log::trace!("Dropping stale completion for {id}");
            return false;
        }

        match result {
            Ok(image) => {
                self.counters.loads_completed += 1;
                let tick = self.tick;
                if let Some(entry) = self.entries.get_mut(&id) {
                    entry.asset.state = AssetState::Ready;
                    entry.asset.image = Some(ImageHandle::new(image));
                    entry.last_touch = tick;
                    for waiter in std::mem::take(&mut entry.waiters) {
                        waiter(&entry.asset);
                    }
                }
            }
            Err(error) => {
                self.counters.loads_failed += 1;
                log::warn!("Failed to load image {id}: {error}");
                // Not kept: the next request retries the load.
                if let Some(entry) = self.entries.remove(&id) {
                    let mut asset = entry.asset;
                    asset.state = AssetState::Failed;
                    for waiter in entry.waiters {
                        waiter(&asset);
                    }
                }
                self.failures.push((id, error));
            }
        }
        true
    }

    /// Take the failures recorded since the last call
    pub fn take_failures(&mut self) -> Vec<(ResourceId, LoadError)> {
        std::mem::take(&mut self.failures)
    }

    /// Check if an entry exists for `id`
    #[must_use]
    pub fn contains(&self, id: &ResourceId) -> bool {
        self.entries.contains_key(id)
    }

    /// Check if `id` is cached and decoded
    #[must_use]
    pub fn is_ready(&self, id: &ResourceId) -> bool {
        self.get(id).is_some_and(Asset::is_ready)
    }

    /// Tick at which `id` was last requested or completed
    #[must_use]
    pub fn last_touch(&self, id: &ResourceId) -> Option<u64> {
        self.entries.get(id).map(|entry| entry.last_touch)
    }

    /// Number of loads still in flight
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.entries
            .values()
            .filter(|entry| entry.asset.state == AssetState::Loading)
            .count()
    }

    /// Iterate over cached ids
    pub fn ids(&self) -> impl Iterator<Item = &ResourceId> {
        self.entries.keys()
    }

    /// Number of cached entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the cache is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Current poll tick
    #[must_use]
    pub const fn tick(&self) -> u64 {
        self.tick
    }

    /// Load/unload counters
    #[must_use]
    pub const fn counters(&self) -> &CacheCounters {
        &self.counters
    }

    /// The underlying load primitive
    #[must_use]
    pub fn source(&self) -> &S {
        &self.source
    }

    /// The underlying load primitive, mutably
    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }
}


#[cfg(test)]
mod tests {
    use super::testing::ManualSource;
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    fn id(path: &str) -> ResourceId {
        ResourceId::new(path)
    }

    #[test]
    fn test_get_does_not_load() {
        let cache = AssetCache::new(ManualSource::default());
        assert!(cache.get(&id("img/a")).is_none());
        assert!(cache.source().begun.is_empty());
    }

    #[test]
    fn test_concurrent_ensure_loads_once() {
        let mut cache = AssetCache::new(ManualSource::default());
        let fired = Rc::new(Cell::new(0));
        let seen = Rc::new(RefCell::new(Vec::new()));

        for _ in 0..3 {
            let fired = Rc::clone(&fired);
            let seen = Rc::clone(&seen);
            cache.ensure(&id("img/a"), move |asset| {
                fired.set(fired.get() + 1);
                seen.borrow_mut().push(asset.image().map(ImageHandle::id));
            });
        }

        assert_eq!(cache.source().begun_count("img/a"), 1);
        assert_eq!(fired.get(), 0);
        assert_eq!(cache.get(&id("img/a")).map(Asset::state), Some(AssetState::Loading));

        cache.poll();
        assert_eq!(fired.get(), 3);

        // Every requester observed the same decoded image
        let seen = seen.borrow();
        assert!(seen[0].is_some());
        assert!(seen.iter().all(|handle| *handle == seen[0]));

        cache.poll();
        assert_eq!(fired.get(), 3);
    }

    #[test]
    fn test_ensure_on_ready_entry_runs_synchronously() {
        let mut cache = AssetCache::new(ManualSource::default());
        cache.ensure(&id("img/a"), |_| {});
        cache.poll();

        let fired = Rc::new(Cell::new(false));
        let flag = Rc::clone(&fired);
        cache.ensure(&id("img/a"), move |asset| flag.set(asset.is_ready()));
        assert!(fired.get());
        assert_eq!(cache.counters().loads_started, 1);
        assert_eq!(cache.counters().hits, 1);
    }

    #[test]
    fn test_failure_notifies_and_allows_retry() {
        let mut source = ManualSource::default();
        source.broken.insert(id("img/bad"));
        let mut cache = AssetCache::new(source);

        let failed = Rc::new(Cell::new(false));
        let flag = Rc::clone(&failed);
        cache.ensure(&id("img/bad"), move |asset| flag.set(asset.is_failed()));
        cache.poll();

        assert!(failed.get());
        assert!(!cache.contains(&id("img/bad")));
        assert_eq!(cache.take_failures().len(), 1);
        assert!(cache.take_failures().is_empty());

        cache.source_mut().broken.clear();
        cache.ensure(&id("img/bad"), |_| {});
        cache.poll();
        assert!(cache.is_ready(&id("img/bad")));
        assert_eq!(cache.source().begun_count("img/bad"), 2);
    }

    #[test]
    fn test_unload_releases_image() {
        let mut cache = AssetCache::new(ManualSource::default());
        cache.ensure(&id("img/a"), |_| {});
        cache.poll();

        let weak = cache
            .get(&id("img/a"))
            .and_then(Asset::image)
            .map(ImageHandle::downgrade)
            .unwrap();
        assert!(weak.is_alive());

        assert!(cache.unload(&id("img/a")));
        assert!(!weak.is_alive());
        assert!(!cache.unload(&id("img/a")));
        assert_eq!(cache.counters().unloads, 1);
    }

    #[test]
    fn test_unload_while_loading_drops_late_completion() {
        let mut source = ManualSource::default();
        source.held.insert(id("img/slow"));
        let mut cache = AssetCache::new(source);

        let outcome = Rc::new(Cell::new(None));
        let slot = Rc::clone(&outcome);
        cache.ensure(&id("img/slow"), move |asset| slot.set(Some(asset.state())));
        assert_eq!(cache.in_flight(), 1);

        assert!(cache.unload(&id("img/slow")));
        assert_eq!(outcome.get(), Some(AssetState::Failed));

        // A new request starts a fresh load; the old completion must not satisfy it.
        cache.ensure(&id("img/slow"), |_| {});
        cache.source_mut().held.clear();
        cache.poll();
        assert!(cache.is_ready(&id("img/slow")));
        assert_eq!(cache.counters().loads_completed, 1);
    }

    #[test]
    fn test_last_touch_tracks_requests() {
        let mut cache = AssetCache::new(ManualSource::default());
        cache.ensure(&id("img/a"), |_| {});
        cache.poll();
        cache.poll();
        cache.ensure(&id("img/a"), |_| {});
        assert_eq!(cache.last_touch(&id("img/a")), Some(2));
    }
}
