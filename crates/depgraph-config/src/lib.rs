//! depgraph Configuration Management
//!
//! Provides configuration loading with support for:
//! - Global config: `~/.depgraph/config.toml`
//! - Local config: `.depgraph/config.toml` (in the analyzed repository)
//! - CLI overrides via `ConfigOverrides`
//!
//! Configuration is merged in order: global → local → CLI overrides.

mod error;
mod loader;

pub use error::ConfigError;
pub use loader::ConfigLoader;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Root configuration for depgraph.
///
/// Represents the fully merged configuration from all sources.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct DepGraphConfig {
    /// Storage configuration
    pub storage: StorageConfig,

    /// Analysis configuration
    pub analysis: AnalysisConfig,

    /// Component filter configuration
    pub filter: FilterConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Where and how the graph is persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding the graph (default: `.depgraph`, relative to the repository)
    pub graph_dir: PathBuf,

    /// Graph storage format
    pub format: StorageFormat,
}

pub const DEFAULT_GRAPH_DIR: &str = ".depgraph";

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            graph_dir: PathBuf::from(DEFAULT_GRAPH_DIR),
            format: StorageFormat::default(),
        }
    }
}

/// Graph storage format.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageFormat {
    /// Single JSON document (default)
    #[default]
    Json,
    /// SQLite database with node and edge tables
    Sqlite,
}

impl StorageFormat {
    /// File name of the graph inside the graph directory.
    pub fn file_name(&self) -> &'static str {
        match self {
            StorageFormat::Json => "graph.json",
            StorageFormat::Sqlite => "graph.db",
        }
    }
}

impl std::fmt::Display for StorageFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Json => write!(f, "json"),
            Self::Sqlite => write!(f, "sqlite"),
        }
    }
}

impl std::str::FromStr for StorageFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "sqlite" | "db" => Ok(Self::Sqlite),
            _ => Err(ConfigError::invalid_value(
                "storage.format",
                format!("unknown format '{}'. Valid values: json, sqlite", s),
            )),
        }
    }
}

/// Analysis configuration for graph construction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AnalysisConfig {
    /// File patterns to exclude (glob patterns)
    pub exclude_patterns: Vec<String>,

    /// Maximum file size to analyze (in KB, 0 = unlimited)
    pub max_file_size_kb: u64,

    /// Parallelism level (0 = auto-detect)
    pub parallelism: usize,

    /// Re-link untouched components against rebuilt ones during updates
    pub relink_retained: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            exclude_patterns: vec![
                "**/node_modules/**".to_string(),
                "**/target/**".to_string(),
                "**/.git/**".to_string(),
                "**/__pycache__/**".to_string(),
                "**/dist/**".to_string(),
                "**/build/**".to_string(),
            ],
            max_file_size_kb: 1024,
            parallelism: 0,
            relink_retained: false,
        }
    }
}

/// Keeps only components whose qualified name matches `component_pattern`.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct FilterConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub component_pattern: Option<String>,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// JSON structured logging
    Json,
}

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// CLI overrides for configuration values.
///
/// Used to apply command-line arguments over file-based config.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// Override graph directory
    pub graph_dir: Option<PathBuf>,
    /// Override storage format
    pub format: Option<StorageFormat>,
    /// Override component filter
    pub component_pattern: Option<String>,
    /// Override log level
    pub log_level: Option<String>,
    /// Override parallelism
    pub parallelism: Option<usize>,
    /// Override retained-component relinking
    pub relink_retained: Option<bool>,
}

impl DepGraphConfig {
    /// Apply CLI overrides to this configuration.
    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(ref dir) = overrides.graph_dir {
            self.storage.graph_dir = dir.clone();
        }
        if let Some(format) = overrides.format {
            self.storage.format = format;
        }
        if let Some(ref pattern) = overrides.component_pattern {
            self.filter.component_pattern = Some(pattern.clone());
        }
        if let Some(ref level) = overrides.log_level {
            self.logging.level = level.clone();
        }
        if let Some(parallelism) = overrides.parallelism {
            self.analysis.parallelism = parallelism;
        }
        if let Some(relink) = overrides.relink_retained {
            self.analysis.relink_retained = relink;
        }
    }

    /// Validate the configuration.
    ///
    /// Checks the log level and that the component filter is a valid regex.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let level = self.logging.level.to_lowercase();
        if !LOG_LEVELS.contains(&level.as_str()) {
            return Err(ConfigError::invalid_value(
                "logging.level",
                format!(
                    "unknown level '{}'. Valid values: {}",
                    self.logging.level,
                    LOG_LEVELS.join(", ")
                ),
            ));
        }
        if let Some(ref pattern) = self.filter.component_pattern {
            regex::Regex::new(pattern).map_err(|e| {
                ConfigError::invalid_value("filter.component_pattern", e.to_string())
            })?;
        }
        Ok(())
    }

    /// Get the effective graph directory for a repository.
    pub fn graph_dir(&self, repo_root: &Path) -> PathBuf {
        if self.storage.graph_dir.is_absolute() {
            self.storage.graph_dir.clone()
        } else {
            repo_root.join(&self.storage.graph_dir)
        }
    }

    /// Get the graph file path for a repository.
    pub fn graph_path(&self, repo_root: &Path) -> PathBuf {
        self.graph_dir(repo_root).join(self.storage.format.file_name())
    }

    /// Pretty JSON rendering, used by `config show --json`.
    pub fn to_json(&self) -> Result<String, ConfigError> {
        serde_json::to_string_pretty(self).map_err(ConfigError::from)
    }

    /// TOML rendering in the layout of `config.toml`.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::from)
    }
}
