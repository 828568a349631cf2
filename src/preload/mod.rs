//! Scene and subroutine image preloading
//!
//! Discovers the images a scene or subroutine can display, loads them in
//! frame-paced batches through the shared [`AssetCache`](crate::assets::AssetCache),
//! and releases them once no retained scene and no live subroutine needs
//! them anymore.

mod batch;
mod events;
mod manager;
mod probe;
mod retention;
mod scanner;
mod subroutine;

pub use batch::{BatchLoader, SweepId, SweepKind, SweepReport, SweepTag, UnloadGuard};
pub use events::{EventQueue, PreloadEvent};
pub use manager::PreloadManager;
pub use probe::{FileProbe, FsProbe, PathResolver};
pub use retention::{RetentionWindow, SceneResourceSet};
pub use scanner::{ReferenceScanner, ScanOptions};
pub use subroutine::{InvokeOutcome, SubroutineAssetTracker, SubroutineStatus};
