//! Configuration file support for the annotation engine.
//!
//! Settings are stored as versioned JSON, either at an explicit path or in
//! the per-user config directory.

use std::path::{Path, PathBuf};

use ebat_geometry::ZoomLimits;
use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_CELL_TYPES, DEFAULT_POINT_SIZE, DEFAULT_STRICTNESS, MAX_BACKOFF_MULTIPLIER,
    MAX_STRICTNESS, MIN_SNAP_DISTANCE, MIN_STRICTNESS, UNDO_HISTORY_LIMIT, ZOOM_STEP,
};
use crate::detection::{RetryPolicy, SimilarityMode};
use crate::selection::MatchTolerances;
use crate::stroke::StrokeConfig;

/// Log level setting for the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Show only errors
    Error,
    /// Show errors and warnings
    Warn,
    /// Show errors, warnings, and info messages
    #[default]
    Info,
    /// Show debug-level logging
    Debug,
    /// Show all log messages including trace
    Trace,
}

impl LogLevel {
    /// Convert to log crate's LevelFilter.
    pub fn to_level_filter(&self) -> log::LevelFilter {
        match self {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

/// Current configuration file format version.
/// Increment this when making breaking changes to the config format.
pub const CONFIG_VERSION: u32 = 1;

/// Engine configuration that can be exported and imported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Version of the configuration file format
    pub version: u32,

    #[serde(default)]
    pub zoom: ZoomConfig,

    #[serde(default)]
    pub matching: MatchTolerances,

    #[serde(default)]
    pub stroke: StrokeConfig,

    #[serde(default)]
    pub selection: SelectionConfig,

    #[serde(default)]
    pub detection: DetectionConfig,

    /// Cell types offered when committing a selection
    #[serde(default = "default_cell_types")]
    pub cell_types: Vec<String>,

    /// Log verbosity level
    #[serde(default)]
    pub log_level: LogLevel,
}

fn default_cell_types() -> Vec<String> {
    DEFAULT_CELL_TYPES.iter().map(|s| s.to_string()).collect()
}

/// Zoom range and button step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoomConfig {
    pub limits: ZoomLimits,
    /// Factor applied by zoom in/out buttons
    pub step: f32,
}

impl Default for ZoomConfig {
    fn default() -> Self {
        Self {
            limits: ZoomLimits::default(),
            step: ZOOM_STEP,
        }
    }
}

/// Click snapping and undo depth.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    /// Rendered point radius (pixels)
    pub point_size: f32,
    /// Lower bound on the click snap radius (pixels)
    pub min_snap_distance: f32,
    /// Maximum number of undo entries kept
    pub max_history: usize,
}

impl SelectionConfig {
    /// Clicks snap to the nearest centroid within this radius.
    pub fn snap_distance(&self) -> f32 {
        self.min_snap_distance.max(self.point_size * 2.0)
    }
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            point_size: DEFAULT_POINT_SIZE,
            min_snap_distance: MIN_SNAP_DISTANCE,
            max_history: UNDO_HISTORY_LIMIT,
        }
    }
}

/// Similarity-detection defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    pub default_mode: SimilarityMode,
    pub default_strictness: u8,
    /// Selected cells required before a `user_only` request
    pub user_only_min_seeds: usize,
    /// Selected cells required before a `cumulative` request
    pub cumulative_min_seeds: usize,
    pub retry: RetryPolicy,
}

impl DetectionConfig {
    /// Selected cells required before a request in `mode`.
    pub fn min_seeds(&self, mode: SimilarityMode) -> usize {
        match mode {
            SimilarityMode::UserOnly => self.user_only_min_seeds,
            SimilarityMode::Cumulative => self.cumulative_min_seeds,
        }
    }
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            default_mode: SimilarityMode::default(),
            default_strictness: DEFAULT_STRICTNESS,
            user_only_min_seeds: SimilarityMode::UserOnly.default_min_seeds(),
            cumulative_min_seeds: SimilarityMode::Cumulative.default_min_seeds(),
            retry: RetryPolicy::default(),
        }
    }
}

impl EngineConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self {
            version: CONFIG_VERSION,
            zoom: ZoomConfig::default(),
            matching: MatchTolerances::default(),
            stroke: StrokeConfig::default(),
            selection: SelectionConfig::default(),
            detection: DetectionConfig::default(),
            cell_types: default_cell_types(),
            log_level: LogLevel::default(),
        }
    }

    /// Serialize the configuration to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialize configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;

        if config.version > CONFIG_VERSION {
            return Err(ConfigError::VersionTooNew {
                file_version: config.version,
                supported_version: CONFIG_VERSION,
            });
        }
        config.validate()?;

        Ok(config)
    }

    /// Check value ranges that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let limits = &self.zoom.limits;
        let ordered = limits.min > 0.0 && limits.min <= limits.max;
        if !ordered {
            return Err(ConfigError::invalid(format!(
                "zoom limits {}..{} are not a positive range",
                limits.min, limits.max
            )));
        }
        if self.zoom.step.is_nan() || self.zoom.step <= 1.0 {
            return Err(ConfigError::invalid(format!(
                "zoom step {} must be greater than 1",
                self.zoom.step
            )));
        }
        let strictness = self.detection.default_strictness;
        if !(MIN_STRICTNESS..=MAX_STRICTNESS).contains(&strictness) {
            return Err(ConfigError::invalid(format!(
                "default strictness {} is outside {}..={}",
                strictness, MIN_STRICTNESS, MAX_STRICTNESS
            )));
        }
        if self.stroke.min_points < 3 {
            return Err(ConfigError::invalid("stroke.min_points must be at least 3"));
        }
        let multiplier = self.detection.retry.backoff_multiplier;
        if !(0.0..=MAX_BACKOFF_MULTIPLIER).contains(&multiplier) {
            return Err(ConfigError::invalid(format!(
                "retry backoff multiplier {} is outside 0..={}",
                multiplier, MAX_BACKOFF_MULTIPLIER
            )));
        }
        Ok(())
    }

    /// Load configuration from a file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path.as_ref())?;
        let config = Self::from_json(&json)?;
        log::info!("Loaded configuration from {:?}", path.as_ref());
        Ok(config)
    }

    /// Save configuration to a file, creating parent directories.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_json()?)?;
        log::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Get the default filename for config export.
    pub fn default_filename() -> &'static str {
        "ebat-config.json"
    }

    /// Get the default config file path for auto-load/save.
    pub fn default_path() -> Option<PathBuf> {
        if let Some(config_dir) = dirs::config_dir() {
            Some(config_dir.join("ebat").join(Self::default_filename()))
        } else {
            dirs::home_dir().map(|home_dir| {
                home_dir
                    .join(".config")
                    .join("ebat")
                    .join(Self::default_filename())
            })
        }
    }

    /// Try to load configuration from the default path.
    /// Returns None if the file doesn't exist or can't be read.
    pub fn load_from_default_path() -> Option<Self> {
        let path = Self::default_path()?;
        if !path.exists() {
            log::debug!("No config file found at {:?}", path);
            return None;
        }

        match Self::load(&path) {
            Ok(config) => Some(config),
            Err(e) => {
                log::warn!("Failed to load config file {:?}: {}", path, e);
                None
            }
        }
    }

    /// Save configuration to the default path.
    pub fn save_to_default_path(&self) -> Result<(), ConfigError> {
        let path = Self::default_path().ok_or_else(|| {
            ConfigError::IoError(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "Could not determine config directory",
            ))
        })?;
        self.save(path)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// JSON parsing error
    #[error("Failed to parse configuration: {0}")]
    ParseError(#[from] serde_json::Error),

    /// Configuration version is newer than supported
    #[error(
        "Configuration file version {file_version} is newer than supported version {supported_version}"
    )]
    VersionTooNew {
        file_version: u32,
        supported_version: u32,
    },

    /// A value is out of its accepted range
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    /// I/O error when reading/writing config
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl ConfigError {
    /// Create an invalid-value error.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }
}
