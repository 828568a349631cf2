//! Recently visited scenes
//!
//! The window remembers the image sets of the last N scenes, newest first.
//! Backtracking into any of them finds its images still cached.

use std::collections::VecDeque;

use rustc_hash::FxHashSet;

use crate::assets::ResourceId;

/// Images discovered for one scene
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneResourceSet {
    /// Scene id
    pub scene_id: u32,
    /// Images the scene can display
    pub resources: FxHashSet<ResourceId>,
}

/// Bounded list of scene image sets, head = most recent
#[derive(Debug)]
pub struct RetentionWindow {
    scenes: VecDeque<SceneResourceSet>,
    capacity: usize,
}

impl RetentionWindow {
    /// Create an empty window holding at most `capacity` scenes (at least one)
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            scenes: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    /// Record a visit to `scene_id`.
    ///
    /// Visiting the head scene again changes nothing. Otherwise the set is
    /// inserted at the head and the set that left the window is returned:
    /// the scene's previous set when it was deeper in the window, else the
    /// oldest scene if the window overflowed.
    pub fn push(
        &mut self,
        scene_id: u32,
        resources: FxHashSet<ResourceId>,
    ) -> Option<SceneResourceSet> {
        if self.head().is_some_and(|head| head.scene_id == scene_id) {
            return None;
        }

        let displaced = self
            .position(scene_id)
            .and_then(|index| self.scenes.remove(index));

        self.scenes.push_front(SceneResourceSet {
            scene_id,
            resources,
        });
        if displaced.is_some() {
            return displaced;
        }
        if self.scenes.len() > self.capacity {
            self.scenes.pop_back()
        } else {
            None
        }
    }

    fn position(&self, scene_id: u32) -> Option<usize> {
        self.scenes.iter().position(|set| set.scene_id == scene_id)
    }

    /// Every image of every retained scene
    #[must_use]
    pub fn retained_union(&self) -> FxHashSet<ResourceId> {
        self.scenes
            .iter()
            .flat_map(|set| set.resources.iter().cloned())
            .collect()
    }

    /// True if any retained scene references `id`
    #[must_use]
    pub fn contains(&self, id: &ResourceId) -> bool {
        self.scenes.iter().any(|set| set.resources.contains(id))
    }

    /// True if `scene_id` is in the window
    #[must_use]
    pub fn contains_scene(&self, scene_id: u32) -> bool {
        self.position(scene_id).is_some()
    }

    /// Most recently visited scene
    #[must_use]
    pub fn head(&self) -> Option<&SceneResourceSet> {
        self.scenes.front()
    }

    /// Retained scene by id
    #[must_use]
    pub fn get(&self, scene_id: u32) -> Option<&SceneResourceSet> {
        self.scenes.iter().find(|set| set.scene_id == scene_id)
    }

    /// Scene ids, newest first
    pub fn scene_ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.scenes.iter().map(|set| set.scene_id)
    }

    /// Number of retained scenes
    #[must_use]
    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    /// True if no scene was recorded yet
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }

    /// Maximum number of retained scenes
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }
}
