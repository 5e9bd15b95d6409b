//! Configuration error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during configuration loading.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read configuration file
    #[error("failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse TOML configuration
    #[error("failed to parse config file '{path}': {source}")]
    ParseToml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// Failed to serialize configuration
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// Failed to render configuration as JSON
    #[error("failed to render config as JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Failed to write configuration file
    #[error("failed to write config file '{path}': {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to create configuration directory
    #[error("failed to create config directory '{path}': {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Home directory not found
    #[error("could not determine home directory")]
    NoHomeDir,

    /// Invalid configuration value
    #[error("invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },
}

impl ConfigError {
    /// `path` could not be read.
    pub fn read_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::ReadFile {
            path: path.into(),
            source,
        }
    }

    /// `path` is not valid TOML for [`crate::DepGraphConfig`].
    pub fn parse_toml(path: impl Into<PathBuf>, source: toml::de::Error) -> Self {
        Self::ParseToml {
            path: path.into(),
            source,
        }
    }

    /// `path` could not be written.
    pub fn write_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::WriteFile {
            path: path.into(),
            source,
        }
    }

    /// The directory holding a config file could not be created.
    pub fn create_dir(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::CreateDir {
            path: path.into(),
            source,
        }
    }

    /// `key` holds a value the loader rejects, described by `message`.
    pub fn invalid_value(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            key: key.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ConfigError::NoHomeDir;
        assert_eq!(err.to_string(), "could not determine home directory");

        let err = ConfigError::invalid_value("storage.format", "unknown format 'xml'");
        assert!(err.to_string().contains("storage.format"));
        assert!(err.to_string().contains("unknown format"));
    }

    #[test]
    fn test_parse_error_names_file() {
        let source = toml::from_str::<toml::Value>("not = [valid").unwrap_err();
        let err = ConfigError::parse_toml("/repo/.depgraph/config.toml", source);
        assert!(err.to_string().contains("/repo/.depgraph/config.toml"));
    }

    #[test]
    fn test_io_errors_name_path_and_cause() {
        let source = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = ConfigError::write_file("/etc/depgraph/config.toml", source);
        let message = err.to_string();
        assert!(message.starts_with("failed to write config file"));
        assert!(message.contains("/etc/depgraph/config.toml"));
        assert!(message.contains("denied"));

        let source = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err = ConfigError::create_dir("/nowhere", source);
        assert!(err.to_string().contains("config directory '/nowhere'"));
    }
}
