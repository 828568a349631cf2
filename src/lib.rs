//! Scene image preloader for tile-based RPG runtimes
//!
//! This crate provides:
//! - A shared image cache with in-flight load deduplication
//! - Command tree scanning for every image a scene or subroutine can show
//! - Frame-paced batch loading and unloading
//! - A retention window of recently visited scenes
//! - Subroutine-scoped image lifetimes

pub mod assets;
pub mod core;
pub mod data;
pub mod preload;

/// Prelude module for common imports
pub mod prelude {
    pub use crate::assets::{
        Asset, AssetCache, AssetSource, AssetState, FileImageSource, ImageHandle, LoadError,
        ResourceCategory, ResourceId,
    };
    pub use crate::core::{ConfigError, PreloadConfig, PreloadStats};
    pub use crate::data::{Command, DataError, GameDatabase, SceneData, Subroutine};
    pub use crate::preload::{
        FileProbe, FsProbe, InvokeOutcome, PreloadEvent, PreloadManager, SubroutineStatus,
        SweepTag,
    };
}
