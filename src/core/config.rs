//! Preloader configuration

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Preloader configuration
///
/// Field names follow the camelCase option names used in project settings
/// files, e.g. `(loadBatchSize: 8, retentionWindowSize: 2)` in RON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PreloadConfig {
    /// Master switch for scene preloading
    pub preloading_enabled: bool,
    /// Log every resource decision at debug level instead of trace
    pub debug_logging: bool,
    /// Loads issued per batch
    pub load_batch_size: usize,
    /// Unloads issued per batch
    pub unload_batch_size: usize,
    /// Load subroutine images when the subroutine is invoked. When off, they
    /// are folded into the scans of scenes that call them.
    pub on_demand_subroutine_preload: bool,
    /// Number of recently visited scenes whose images stay cached
    pub retention_window_size: usize,
    /// Look for image paths inside script commands
    pub check_scripts: bool,
    /// Extensions tried, in order, when checking that an image exists
    pub image_extensions: Vec<String>,
}

impl Default for PreloadConfig {
    fn default() -> Self {
        Self {
            preloading_enabled: true,
            debug_logging: false,
            load_batch_size: 5,
            unload_batch_size: 10,
            on_demand_subroutine_preload: true,
            retention_window_size: 3,
            check_scripts: false,
            image_extensions: vec![String::from("png")],
        }
    }
}

impl PreloadConfig {
    /// Enable or disable preloading
    pub fn with_preloading(mut self, enabled: bool) -> Self {
        self.preloading_enabled = enabled;
        self
    }

    /// Enable or disable per-resource debug logging
    pub fn with_debug_logging(mut self, enabled: bool) -> Self {
        self.debug_logging = enabled;
        self
    }

    /// Set load and unload batch sizes
    pub fn with_batch_sizes(mut self, load: usize, unload: usize) -> Self {
        self.load_batch_size = load;
        self.unload_batch_size = unload;
        self
    }

    /// Set how many recent scenes keep their images
    pub fn with_retention_window(mut self, size: usize) -> Self {
        self.retention_window_size = size;
        self
    }

    /// Choose between on-demand and scene-folded subroutine preloading
    pub fn with_on_demand_subroutines(mut self, enabled: bool) -> Self {
        self.on_demand_subroutine_preload = enabled;
        self
    }

    /// Enable or disable script scanning
    pub fn with_script_scanning(mut self, enabled: bool) -> Self {
        self.check_scripts = enabled;
        self
    }

    /// Set the image extensions to probe
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.image_extensions = extensions.into_iter().map(Into::into).collect();
        self
    }

    /// Check option ranges
    ///
    /// # Errors
    ///
    /// Returns an error if a batch size or the window size is zero, or no
    /// image extension is configured
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.load_batch_size == 0 {
            return Err(ConfigError::InvalidBatchSize("loadBatchSize"));
        }
        if self.unload_batch_size == 0 {
            return Err(ConfigError::InvalidBatchSize("unloadBatchSize"));
        }
        if self.retention_window_size == 0 {
            return Err(ConfigError::InvalidWindowSize);
        }
        if self.image_extensions.is_empty() {
            return Err(ConfigError::NoImageExtensions);
        }
        Ok(())
    }

    /// Load and validate a configuration from a RON file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, deserialization fails or
    /// validation fails
    pub fn load_ron(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;
        let config: Self =
            ron::from_str(&content).map_err(|e| ConfigError::DeserializeError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a configuration from a JSON file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, deserialization fails or
    /// validation fails
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| ConfigError::DeserializeError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}

/// Errors that can occur while loading or validating a configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A batch size option is zero
    InvalidBatchSize(&'static str),
    /// The retention window size is zero
    InvalidWindowSize,
    /// `imageExtensions` is empty
    NoImageExtensions,
    /// IO error
    IoError(String),
    /// Deserialization error
    DeserializeError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidBatchSize(option) => write!(f, "{option} must be at least 1"),
            Self::InvalidWindowSize => write!(f, "retentionWindowSize must be at least 1"),
            Self::NoImageExtensions => write!(f, "imageExtensions must not be empty"),
            Self::IoError(e) => write!(f, "IO error: {e}"),
            Self::DeserializeError(e) => write!(f, "Deserialization error: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}
