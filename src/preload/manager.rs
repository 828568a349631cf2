//! Preload orchestration
//!
//! [`PreloadManager`] is the single cache service of a running game. The
//! scene loader calls [`PreloadManager::on_scene_loaded`] on every transfer,
//! the interpreter reports subroutine invocations and completions, and the
//! main loop calls [`PreloadManager::update`] once per frame. Renderers and
//! other consumers request images through [`PreloadManager::request`] or read
//! them from [`PreloadManager::cache`].

use rustc_hash::FxHashSet;

use crate::assets::{Asset, AssetCache, AssetSource, ResourceId};
use crate::core::{ConfigError, PreloadConfig, PreloadStats};
use crate::data::{GameDatabase, SceneData};

use super::batch::{BatchLoader, SweepId, SweepKind, SweepReport, SweepTag, UnloadGuard};
use super::events::{EventQueue, PreloadEvent};
use super::probe::FileProbe;
use super::retention::RetentionWindow;
use super::scanner::{ReferenceScanner, ScanOptions};
use super::subroutine::{InvokeOutcome, SubroutineAssetTracker, SubroutineStatus, sorted};

/// The one do-not-unload rule: an image stays while any retained scene or any
/// live subroutine references it.
struct Protection<'a> {
    retention: &'a RetentionWindow,
    subroutines: &'a SubroutineAssetTracker,
}

impl UnloadGuard for Protection<'_> {
    fn is_protected(&self, id: &ResourceId) -> bool {
        self.retention.contains(id) || self.subroutines.protects(id)
    }
}

/// Scene and subroutine image preloader
pub struct PreloadManager<S: AssetSource, P: FileProbe> {
    config: PreloadConfig,
    database: GameDatabase,
    cache: AssetCache<S>,
    scanner: ReferenceScanner<P>,
    loader: BatchLoader,
    retention: RetentionWindow,
    subroutines: SubroutineAssetTracker,
    events: EventQueue,
    stats: PreloadStats,
    active_scene: Option<u32>,
}

impl<S: AssetSource, P: FileProbe> PreloadManager<S, P> {
    /// Create a manager loading through `source` and checking files with
    /// `probe`
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid
    pub fn new(
        config: PreloadConfig,
        source: S,
        probe: P,
        database: GameDatabase,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        log::info!(
            "Preloader ready (enabled: {}, window: {}, batches: {}/{})",
            config.preloading_enabled,
            config.retention_window_size,
            config.load_batch_size,
            config.unload_batch_size
        );

        Ok(Self {
            scanner: ReferenceScanner::new(
                probe,
                config.image_extensions.clone(),
                ScanOptions::from_config(&config),
            ),
            loader: BatchLoader::new(config.debug_logging),
            retention: RetentionWindow::new(config.retention_window_size),
            subroutines: SubroutineAssetTracker::new(&config),
            cache: AssetCache::new(source),
            events: EventQueue::new(),
            stats: PreloadStats::new(),
            active_scene: None,
            database,
            config,
        })
    }

    /// Scan a freshly loaded scene and schedule its sweeps.
    ///
    /// Returns false if nothing was scheduled because preloading is off or
    /// the scene is already the active one.
    pub fn on_scene_loaded(&mut self, scene: &SceneData) -> bool {
        if !self.accepts_scene(scene.id) {
            return false;
        }
        let resources = self.scanner.scan_scene(scene, &self.database);
        self.on_scene_resources(scene.id, resources)
    }

    /// Schedule sweeps for a scene whose images are already known.
    ///
    /// The scene becomes the head of the retention window. Images that left
    /// the window (an evicted scene, or a revisited scene's previous set) and
    /// that no retained scene and no live subroutine reference are unloaded,
    /// then every image of the new scene is requested.
    pub fn on_scene_resources(&mut self, scene_id: u32, resources: FxHashSet<ResourceId>) -> bool {
        if !self.accepts_scene(scene_id) {
            return false;
        }

        let requested = sorted(&resources);
        log::info!("Scene {scene_id}: preloading {} images", requested.len());

        if let Some(dropped) = self.retention.push(scene_id, resources) {
            let protection = self.protection();
            let candidates: FxHashSet<ResourceId> = dropped
                .resources
                .iter()
                .filter(|id| !protection.is_protected(id))
                .cloned()
                .collect();

            log::debug!(
                "Scene {} set left the window: {} of {} images eligible for unload",
                dropped.scene_id,
                candidates.len(),
                dropped.resources.len()
            );
            if !candidates.is_empty() {
                self.loader.unload_batch(
                    sorted(&candidates),
                    self.config.unload_batch_size,
                    SweepTag::Scene(dropped.scene_id),
                );
            }
        }

        self.loader.load_batch(
            requested,
            self.config.load_batch_size,
            SweepTag::Scene(scene_id),
        );
        self.active_scene = Some(scene_id);
        true
    }

    fn accepts_scene(&self, scene_id: u32) -> bool {
        if !self.config.preloading_enabled {
            log::trace!("Preloading disabled, ignoring scene {scene_id}");
            return false;
        }
        if self.active_scene == Some(scene_id) {
            log::trace!("Scene {scene_id} is already active");
            return false;
        }
        true
    }

    /// Report that the interpreter invoked subroutine `id`
    pub fn on_subroutine_invoke(&mut self, id: u32) -> InvokeOutcome {
        if !self.config.preloading_enabled {
            return InvokeOutcome::Disabled;
        }
        self.subroutines
            .on_invoke(id, &self.database, &mut self.scanner, &mut self.loader)
    }

    /// Report that subroutine `id` finished running
    pub fn on_subroutine_complete(&mut self, id: u32) -> Option<SweepId> {
        self.subroutines.on_complete(id, &mut self.loader)
    }

    /// Stop a long-running subroutine and release its images
    pub fn stop_subroutine(&mut self, id: u32) -> Option<SweepId> {
        self.subroutines.stop(id, &mut self.loader)
    }

    /// Load status of subroutine `id`
    #[must_use]
    pub fn subroutine_status(&self, id: u32) -> SubroutineStatus {
        self.subroutines.status(id)
    }

    /// Resolve battler and battle event images of every troop once
    pub fn warm_troops(&mut self) -> usize {
        self.scanner.warm_troops(&self.database)
    }

    /// Request an image on behalf of a consumer
    pub fn request(&mut self, id: &ResourceId, on_ready: impl FnOnce(&Asset) + 'static) {
        self.cache.ensure(id, on_ready);
    }

    /// Advance one frame: apply load completions, advance the active sweep
    /// and publish what finished.
    pub fn update(&mut self) {
        self.events.swap();
        self.cache.poll();

        for (id, error) in self.cache.take_failures() {
            self.events.push(PreloadEvent::AssetFailed { id, error });
        }

        let protection = Protection {
            retention: &self.retention,
            subroutines: &self.subroutines,
        };
        self.loader.update(&mut self.cache, &protection);

        for report in self.loader.drain_reports() {
            self.handle_report(&report);
        }
    }

    fn handle_report(&mut self, report: &SweepReport) {
        self.stats.record_sweep(report);

        match (report.kind, report.tag) {
            (SweepKind::Load, SweepTag::Scene(scene_id)) => {
                self.events.push(PreloadEvent::ScenePreloaded {
                    scene_id,
                    resources: report.total,
                });
            }
            (SweepKind::Load, SweepTag::Subroutine(_)) => {
                if let Some(subroutine_id) = self.subroutines.mark_ready(report.id) {
                    self.events.push(PreloadEvent::SubroutineReady {
                        subroutine_id,
                        resources: report.total,
                    });
                }
            }
            (SweepKind::Unload, tag) => {
                self.events.push(PreloadEvent::ResourcesReleased {
                    tag,
                    count: report.succeeded,
                });
            }
        }
    }

    fn protection(&self) -> Protection<'_> {
        Protection {
            retention: &self.retention,
            subroutines: &self.subroutines,
        }
    }

    /// True if `id` must stay cached
    #[must_use]
    pub fn is_protected(&self, id: &ResourceId) -> bool {
        self.protection().is_protected(id)
    }

    /// True if no sweep is running or queued
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.loader.is_idle()
    }

    /// Sweeps queued behind the running one
    #[must_use]
    pub fn pending_sweeps(&self) -> usize {
        self.loader.pending_sweeps()
    }

    /// Scene most recently handed to the preloader
    #[must_use]
    pub const fn active_scene(&self) -> Option<u32> {
        self.active_scene
    }

    /// Active configuration
    #[must_use]
    pub const fn config(&self) -> &PreloadConfig {
        &self.config
    }

    /// Game database
    #[must_use]
    pub const fn database(&self) -> &GameDatabase {
        &self.database
    }

    /// The shared image cache
    #[must_use]
    pub const fn cache(&self) -> &AssetCache<S> {
        &self.cache
    }

    /// The shared image cache, mutably
    pub fn cache_mut(&mut self) -> &mut AssetCache<S> {
        &mut self.cache
    }

    /// Recently visited scenes
    #[must_use]
    pub const fn retention(&self) -> &RetentionWindow {
        &self.retention
    }

    /// Live subroutine image sets
    #[must_use]
    pub const fn subroutines(&self) -> &SubroutineAssetTracker {
        &self.subroutines
    }

    /// Events published during the previous frame
    #[must_use]
    pub const fn events(&self) -> &EventQueue {
        &self.events
    }

    /// Events published during the previous frame, mutably for draining
    pub fn events_mut(&mut self) -> &mut EventQueue {
        &mut self.events
    }

    /// Sweep statistics
    #[must_use]
    pub const fn stats(&self) -> &PreloadStats {
        &self.stats
    }
}
