//! Preload notifications
//!
//! A double-buffered queue of things the preloader did, for consumers that
//! should not be coupled to it (debug overlays, loading indicators, the
//! interpreter waiting on a subroutine). Events pushed during frame N are
//! readable during frame N+1.
//!
//! # Example
//!
//! ```ignore
//! manager.update();
//! for event in manager.events().iter() {
//!     if let PreloadEvent::ScenePreloaded { scene_id, .. } = event {
//!         overlay.mark_ready(*scene_id);
//!     }
//! }
//! ```

use std::collections::VecDeque;

use crate::assets::{LoadError, ResourceId};

use super::batch::SweepTag;

/// Things that happened inside the preloader.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum PreloadEvent {
    /// Every image of a scene was requested and resolved
    ScenePreloaded {
        /// Scene id
        scene_id: u32,
        /// Images requested by the sweep
        resources: usize,
    },

    /// Every image of an invoked subroutine was requested and resolved
    SubroutineReady {
        /// Subroutine id
        subroutine_id: u32,
        /// Images requested by the sweep
        resources: usize,
    },

    /// An unload sweep finished
    ResourcesReleased {
        /// Owner of the released images
        tag: SweepTag,
        /// Images actually released
        count: usize,
    },

    /// An image failed to load
    AssetFailed {
        /// Failed image
        id: ResourceId,
        /// Cause
        error: LoadError,
    },
}

/// Events of the current frame and of the previous one.
///
/// The manager pushes while it runs a frame; consumers read what the
/// previous frame published. [`EventQueue::swap`] turns the page.
#[derive(Debug, Default)]
pub struct EventQueue {
    pending: VecDeque<PreloadEvent>,
    published: VecDeque<PreloadEvent>,
}

impl EventQueue {
    /// Create an empty queue
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish `event` at the next swap
    pub fn push(&mut self, event: PreloadEvent) {
        self.pending.push_back(event);
    }

    /// Publish the pending events, dropping what was published before.
    /// Called at the start of every `PreloadManager::update`.
    pub fn swap(&mut self) {
        std::mem::swap(&mut self.pending, &mut self.published);
        self.pending.clear();
    }

    /// Events published by the previous frame
    pub fn iter(&self) -> impl Iterator<Item = &PreloadEvent> {
        self.published.iter()
    }

    /// Take the published events
    pub fn drain(&mut self) -> impl Iterator<Item = PreloadEvent> + '_ {
        self.published.drain(..)
    }

    /// True if nothing is published
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.published.is_empty()
    }

    /// Number of published events
    #[must_use]
    pub fn len(&self) -> usize {
        self.published.len()
    }

    /// Events waiting for the next swap
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}
