//! Core module
//!
//! Contains the preloader configuration and statistics

mod config;
mod debug;

pub use config::{ConfigError, PreloadConfig};
pub(crate) use debug::detail_level;
pub use debug::PreloadStats;
