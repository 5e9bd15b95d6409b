//! Configuration loader with inheritance support.
//!
//! Loads configuration from multiple sources and merges them:
//! 1. Global config: `~/.depgraph/config.toml`
//! 2. Local config: `.depgraph/config.toml` (in the repository)
//! 3. CLI overrides
//!
//! Later sources override earlier ones. A field set to its default value in a
//! later source does not override an earlier value.

use crate::error::ConfigError;
use crate::{
    AnalysisConfig, ConfigOverrides, DepGraphConfig, FilterConfig, LogFormat, LoggingConfig,
    StorageConfig, StorageFormat, DEFAULT_GRAPH_DIR,
};
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// Configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Global configuration directory name.
const GLOBAL_CONFIG_DIR: &str = ".depgraph";

/// Local configuration directory name.
const LOCAL_CONFIG_DIR: &str = ".depgraph";

/// Configuration loader with caching and inheritance support.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Global config directory (e.g., `~/.depgraph`)
    global_config_dir: Option<PathBuf>,

    /// Cached global config
    global_config: Option<DepGraphConfig>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Create a new configuration loader.
    ///
    /// Automatically detects the global config directory (`~/.depgraph`).
    pub fn new() -> Self {
        let global_config_dir = dirs::home_dir().map(|h| h.join(GLOBAL_CONFIG_DIR));

        Self {
            global_config_dir,
            global_config: None,
        }
    }

    /// Create a loader with a custom global config directory.
    pub fn with_global_dir(global_dir: impl Into<PathBuf>) -> Self {
        Self {
            global_config_dir: Some(global_dir.into()),
            global_config: None,
        }
    }

    pub fn global_config_path(&self) -> Option<PathBuf> {
        self.global_config_dir
            .as_ref()
            .map(|d| d.join(CONFIG_FILE_NAME))
    }

    pub fn local_config_path(&self, repo_root: &Path) -> PathBuf {
        repo_root.join(LOCAL_CONFIG_DIR).join(CONFIG_FILE_NAME)
    }

    /// Load configuration for a repository with optional CLI overrides.
    ///
    /// Merges config in order: global → local → overrides.
    pub fn load(
        &mut self,
        repo_root: &Path,
        overrides: Option<&ConfigOverrides>,
    ) -> Result<DepGraphConfig, ConfigError> {
        let mut config = DepGraphConfig::default();

        if let Some(global_config) = self.load_global()? {
            config = merge_configs(config, global_config);
        }

        if let Some(local_config) = self.load_local(repo_root)? {
            config = merge_configs(config, local_config);
        }

        if let Some(ovr) = overrides {
            config.apply_overrides(ovr);
        }

        config.validate()?;
        Ok(config)
    }

    /// Load only the global configuration.
    pub fn load_global(&mut self) -> Result<Option<DepGraphConfig>, ConfigError> {
        if let Some(ref config) = self.global_config {
            return Ok(Some(config.clone()));
        }

        let Some(global_path) = self.global_config_path() else {
            debug!("No home directory found, skipping global config");
            return Ok(None);
        };

        if !global_path.exists() {
            trace!("Global config not found at {:?}", global_path);
            return Ok(None);
        }

        debug!("Loading global config from {:?}", global_path);
        let config = load_config_file(&global_path)?;
        self.global_config = Some(config.clone());

        Ok(Some(config))
    }

    /// Load only the local configuration for a repository.
    pub fn load_local(&self, repo_root: &Path) -> Result<Option<DepGraphConfig>, ConfigError> {
        let local_path = self.local_config_path(repo_root);

        if !local_path.exists() {
            trace!("Local config not found at {:?}", local_path);
            return Ok(None);
        }

        debug!("Loading local config from {:?}", local_path);
        load_config_file(&local_path).map(Some)
    }

    /// Load a single explicit config file on top of the defaults.
    pub fn load_file(&self, path: &Path) -> Result<DepGraphConfig, ConfigError> {
        debug!("Loading config from {:?}", path);
        let config = merge_configs(DepGraphConfig::default(), load_config_file(path)?);
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to the local config file for a repository.
    pub fn save_local(
        &self,
        repo_root: &Path,
        config: &DepGraphConfig,
    ) -> Result<PathBuf, ConfigError> {
        let local_path = self.local_config_path(repo_root);
        save_config_file(&local_path, config)?;
        Ok(local_path)
    }

    /// Initialize local configuration for a repository.
    ///
    /// Creates `.depgraph/config.toml` with default configuration. An
    /// existing file is left untouched.
    pub fn init_local(&self, repo_root: &Path) -> Result<PathBuf, ConfigError> {
        let config_path = self.local_config_path(repo_root);
        if !config_path.exists() {
            save_config_file(&config_path, &DepGraphConfig::default())?;
        }
        Ok(config_path)
    }

    /// Initialize the global configuration file.
    pub fn init_global(&self) -> Result<PathBuf, ConfigError> {
        let Some(config_path) = self.global_config_path() else {
            return Err(ConfigError::NoHomeDir);
        };
        if !config_path.exists() {
            save_config_file(&config_path, &DepGraphConfig::default())?;
        }
        Ok(config_path)
    }

    /// Forget the cached global configuration.
    pub fn clear_cache(&mut self) {
        self.global_config = None;
    }
}

fn load_config_file(path: &Path) -> Result<DepGraphConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;

    toml::from_str(&content).map_err(|e| ConfigError::parse_toml(path, e))
}

fn save_config_file(path: &Path, config: &DepGraphConfig) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        if !parent.exists() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::create_dir(parent, e))?;
        }
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|e| ConfigError::write_file(path, e))
}

/// Merge two configurations, with `overlay` taking precedence.
fn merge_configs(base: DepGraphConfig, overlay: DepGraphConfig) -> DepGraphConfig {
    DepGraphConfig {
        storage: merge_storage(base.storage, overlay.storage),
        analysis: merge_analysis(base.analysis, overlay.analysis),
        filter: FilterConfig {
            component_pattern: overlay
                .filter
                .component_pattern
                .or(base.filter.component_pattern),
        },
        logging: merge_logging(base.logging, overlay.logging),
    }
}

fn merge_storage(base: StorageConfig, overlay: StorageConfig) -> StorageConfig {
    StorageConfig {
        graph_dir: if overlay.graph_dir != Path::new(DEFAULT_GRAPH_DIR) {
            overlay.graph_dir
        } else {
            base.graph_dir
        },
        format: if overlay.format != StorageFormat::default() {
            overlay.format
        } else {
            base.format
        },
    }
}

fn merge_analysis(base: AnalysisConfig, overlay: AnalysisConfig) -> AnalysisConfig {
    let defaults = AnalysisConfig::default();
    AnalysisConfig {
        // Overlay patterns extend base patterns
        exclude_patterns: {
            let mut patterns = base.exclude_patterns;
            for pattern in overlay.exclude_patterns {
                if !patterns.contains(&pattern) {
                    patterns.push(pattern);
                }
            }
            patterns
        },
        max_file_size_kb: if overlay.max_file_size_kb != defaults.max_file_size_kb {
            overlay.max_file_size_kb
        } else {
            base.max_file_size_kb
        },
        parallelism: if overlay.parallelism != defaults.parallelism {
            overlay.parallelism
        } else {
            base.parallelism
        },
        relink_retained: overlay.relink_retained || base.relink_retained,
    }
}

fn merge_logging(base: LoggingConfig, overlay: LoggingConfig) -> LoggingConfig {
    LoggingConfig {
        level: if overlay.level != "info" {
            overlay.level
        } else {
            base.level
        },
        format: if overlay.format != LogFormat::default() {
            overlay.format
        } else {
            base.format
        },
    }
}
