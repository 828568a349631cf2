//! Image asset management
//!
//! Provides the shared image cache and its building blocks:
//! - Normalized resource identifiers
//! - Shared decoded image handles
//! - The pluggable load primitive
//! - Get-or-load caching with in-flight deduplication

mod cache;
mod handle;
mod resource;
mod source;

pub use cache::{Asset, AssetCache, AssetState, CacheCounters, ReadyCallback};
pub use handle::{ImageHandle, WeakImageHandle};
pub use resource::{ResourceCategory, ResourceId};
pub use source::{AssetSource, FileImageSource, LoadCompletion, LoadError, LoadTicket};

#[cfg(test)]
pub(crate) use cache::testing;
