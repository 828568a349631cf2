//! Decoded image handles
//!
//! The cache owns the strong handle of every image it loaded. Renderers hold
//! clones while drawing, and may keep a [`WeakImageHandle`] to notice when the
//! cache released an image.

use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use image::RgbaImage;

static NEXT_HANDLE_ID: AtomicU64 = AtomicU64::new(1);

fn next_id() -> u64 {
    NEXT_HANDLE_ID.fetch_add(1, Ordering::Relaxed)
}

/// A shared, render-ready image.
#[derive(Debug)]
pub struct ImageHandle {
    id: u64,
    inner: Arc<RgbaImage>,
}

impl ImageHandle {
    /// Wrap a decoded image
    #[must_use]
    pub fn new(image: RgbaImage) -> Self {
        Self {
            id: next_id(),
            inner: Arc::new(image),
        }
    }

    /// Unique id of this decoded image (a reload gets a new id)
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Pixel dimensions
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        self.inner.dimensions()
    }

    /// Create a weak handle that doesn't keep the pixels alive
    #[must_use]
    pub fn downgrade(&self) -> WeakImageHandle {
        WeakImageHandle {
            id: self.id,
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Number of strong holders, the cache included
    #[must_use]
    pub fn strong_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }
}

impl Clone for ImageHandle {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            inner: Arc::clone(&self.inner),
        }
    }
}

impl PartialEq for ImageHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ImageHandle {}

impl Hash for ImageHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl std::ops::Deref for ImageHandle {
    type Target = RgbaImage;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

/// Weak view of an [`ImageHandle`].
#[derive(Debug, Clone)]
pub struct WeakImageHandle {
    id: u64,
    inner: Weak<RgbaImage>,
}

impl WeakImageHandle {
    /// Id of the image this handle points at
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Returns `None` once every strong handle was dropped
    #[must_use]
    pub fn upgrade(&self) -> Option<ImageHandle> {
        self.inner
            .upgrade()
            .map(|inner| ImageHandle { id: self.id, inner })
    }

    /// Check if the pixels are still held somewhere
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.inner.strong_count() > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_clone_shares_pixels() {
        let handle = ImageHandle::new(RgbaImage::new(4, 2));
        let other = handle.clone();
        assert_eq!(handle, other);
        assert_eq!(handle.strong_count(), 2);
        assert_eq!(other.dimensions(), (4, 2));
    }

    #[test]
    fn test_weak_handle_expires() {
        let strong = ImageHandle::new(RgbaImage::new(1, 1));
        let weak = strong.downgrade();
        assert!(weak.is_alive());
        assert_eq!(weak.upgrade().map(|h| h.id()), Some(strong.id()));

        drop(strong);
        assert!(!weak.is_alive());
        assert!(weak.upgrade().is_none());
    }
}
