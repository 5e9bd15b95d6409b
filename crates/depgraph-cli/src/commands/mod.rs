//! CLI command implementations

pub mod config;
pub mod deps;
pub mod generate;
pub mod stats;
pub mod update;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use depgraph_config::{ConfigLoader, DepGraphConfig, StorageFormat};
use depgraph_core::{BuilderConfig, GraphBuilder, GraphDocument, GraphFormat, GraphStore};
use regex::Regex;

use crate::GlobalOptions;

/// Where the analyzed repository comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepoSource {
    Local(PathBuf),
    Remote(String),
}

fn looks_like_url(repo: &str) -> bool {
    repo.contains("://") || repo.starts_with("git@")
}

/// Resolve `--repo` to a local working tree or a clone URL.
pub fn resolve_repo(global: &GlobalOptions) -> Result<RepoSource> {
    match global.repo.as_deref() {
        Some(repo) if looks_like_url(repo) => Ok(RepoSource::Remote(repo.to_string())),
        Some(repo) => {
            let path = PathBuf::from(repo);
            if !path.is_dir() {
                anyhow::bail!("Repository path does not exist: {}", path.display());
            }
            Ok(RepoSource::Local(path.canonicalize()?))
        }
        None => Ok(RepoSource::Local(
            std::env::current_dir().context("Failed to get current directory")?,
        )),
    }
}

/// Resolve `--repo` to a local working tree, rejecting URLs.
pub fn resolve_local_repo(global: &GlobalOptions) -> Result<PathBuf> {
    match resolve_repo(global)? {
        RepoSource::Local(path) => Ok(path),
        RepoSource::Remote(url) => anyhow::bail!(
            "'{}' is a remote URL; this command needs a local working tree",
            url
        ),
    }
}

/// Directory whose `.depgraph/config.toml` applies.
pub fn config_root(global: &GlobalOptions) -> Result<PathBuf> {
    match resolve_repo(global)? {
        RepoSource::Local(path) => Ok(path),
        RepoSource::Remote(_) => std::env::current_dir().context("Failed to get current directory"),
    }
}

/// Load configuration, honoring an explicit `--config` file.
pub fn load_config(global: &GlobalOptions) -> Result<DepGraphConfig> {
    let mut loader = ConfigLoader::new();

    if let Some(ref config_path) = global.config {
        return loader
            .load_file(config_path)
            .with_context(|| format!("Failed to load config file {}", config_path.display()));
    }

    let root = config_root(global)?;
    loader
        .load(&root, None)
        .context("Failed to load configuration")
}

pub fn parse_format(s: &str) -> Result<StorageFormat, String> {
    s.parse()
        .map_err(|e: depgraph_config::ConfigError| e.to_string())
}

pub fn graph_format(format: StorageFormat) -> GraphFormat {
    match format {
        StorageFormat::Json => GraphFormat::Json,
        StorageFormat::Sqlite => GraphFormat::Sqlite,
    }
}

/// Builder honoring the `[analysis]` settings.
pub fn graph_builder(config: &DepGraphConfig) -> GraphBuilder {
    GraphBuilder::with_config(BuilderConfig {
        exclude_patterns: config.analysis.exclude_patterns.clone(),
        max_file_size_kb: config.analysis.max_file_size_kb,
        parallelism: config.analysis.parallelism,
        max_files: None,
    })
}

pub fn component_filter(config: &DepGraphConfig) -> Result<Option<Regex>> {
    config
        .filter
        .component_pattern
        .as_deref()
        .map(|pattern| {
            Regex::new(pattern).with_context(|| format!("Invalid component filter /{}/", pattern))
        })
        .transpose()
}

/// Load the stored graph of a repository, or the file given with `--graph`.
pub fn load_graph(
    config: &DepGraphConfig,
    repo: &Path,
    graph: Option<&Path>,
) -> Result<(PathBuf, GraphDocument)> {
    let store = match graph {
        Some(path) => GraphStore::from_path(path),
        None => GraphStore::new(
            config.graph_path(repo),
            graph_format(config.storage.format),
        ),
    };
    if !store.exists() {
        anyhow::bail!(
            "No graph found at {}. Run 'depgraph generate' first.",
            store.path().display()
        );
    }
    let document = store
        .load()
        .with_context(|| format!("Failed to load graph from {}", store.path().display()))?;
    Ok((store.path().to_path_buf(), document))
}

/// Print an info message (respects quiet flag).
pub fn print_info(message: &str, quiet: bool) {
    if !quiet {
        eprintln!("{}", message);
    }
}
