//! Graph Builder
//!
//! This module provides the `GraphBuilder` struct for constructing dependency
//! graphs from a repository working tree.
//!
//! A build pass runs in four steps:
//! 1. extract every file on a bounded worker pool (per-file failures are
//!    logged and skipped)
//! 2. register every component under a provisional id
//! 3. assemble component code and references on the worker pool
//!    (per-component failures are logged and skipped)
//! 4. finalize content-addressed ids and link components
//!
//! ## Usage
//!
//! ```ignore
//! use depgraph_core::builder::GraphBuilder;
//! use std::path::Path;
//!
//! let builder = GraphBuilder::new();
//! let output = builder.build_from_directory(Path::new("/path/to/repo"))?;
//! println!("{} components", output.graph.components.len());
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::extractor::{ExtractError, ExtractorRegistry, FileExtractor};
use crate::identity::{AssembledComponent, IdentityAssigner, ProvisionalComponent};
use crate::linker::{LinkStats, Linker};
use crate::model::{CodeGraph, ComponentId, ExternalSymbolTable, File, FileId};

/// Name of the per-repository ignore file honored during file collection.
pub const IGNORE_FILE_NAME: &str = ".depgraphignore";

// ============================================================================
// Errors
// ============================================================================

/// Errors that can occur during graph building.
#[derive(Debug, Error)]
pub enum BuilderError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Repository path missing or not a directory
    #[error("Repository not found: {0}")]
    RepositoryNotFound(PathBuf),

    /// No supported files found
    #[error("No supported files found in directory: {0}")]
    NoFilesFound(PathBuf),

    /// Worker pool could not be created
    #[error("Failed to create worker pool: {0}")]
    ThreadPool(String),
}

// ============================================================================
// Builder Configuration
// ============================================================================

/// Configuration for the graph builder.
#[derive(Debug, Clone)]
pub struct BuilderConfig {
    /// File patterns to exclude (glob patterns, relative to the repository root)
    pub exclude_patterns: Vec<String>,
    /// Files larger than this are skipped (KiB, 0 = unlimited)
    pub max_file_size_kb: u64,
    /// Worker threads (0 = one per core)
    pub parallelism: usize,
    /// Maximum number of files to process (None = unlimited)
    pub max_files: Option<usize>,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            exclude_patterns: default_exclude_patterns(),
            max_file_size_kb: 1024,
            parallelism: 0,
            max_files: None,
        }
    }
}

/// Directories never worth analyzing.
pub fn default_exclude_patterns() -> Vec<String> {
    [
        "**/.git/**",
        "**/node_modules/**",
        "**/target/**",
        "**/__pycache__/**",
        "**/.venv/**",
        "**/venv/**",
        "**/.tox/**",
        "**/dist/**",
        "**/build/**",
    ]
    .iter()
    .map(|p| p.to_string())
    .collect()
}

// ============================================================================
// Build Output
// ============================================================================

/// Counters for one build pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildStats {
    pub files_seen: usize,
    pub files_extracted: usize,
    pub files_failed: usize,
    pub components: usize,
    pub components_failed: usize,
    pub duplicate_components: usize,
    pub internal_links: usize,
    pub external_links: usize,
    pub new_external_symbols: usize,
}

impl BuildStats {
    fn record_links(&mut self, links: LinkStats) {
        self.internal_links += links.internal_links;
        self.external_links += links.external_links;
        self.new_external_symbols += links.new_external_symbols;
    }
}

/// Names and external symbols a scoped build links against in addition to
/// the components it extracts itself.
#[derive(Debug, Clone, Default)]
pub struct LinkSeed {
    pub known_components: HashMap<String, ComponentId>,
    pub external_symbols: ExternalSymbolTable,
}

/// Result of a build pass.
#[derive(Debug, Clone, Default)]
pub struct BuildOutput {
    pub graph: CodeGraph,
    pub stats: BuildStats,
    /// Qualified names visible to the linker after this pass
    pub name_table: HashMap<String, ComponentId>,
}

// ============================================================================
// Graph Builder
// ============================================================================

/// Builds dependency graphs from repository working trees.
///
/// ## Example
///
/// ```ignore
/// use depgraph_core::builder::{BuilderConfig, GraphBuilder};
///
/// let config = BuilderConfig { parallelism: 4, ..Default::default() };
/// let builder = GraphBuilder::with_config(config);
/// let output = builder.build_from_directory(Path::new("repo"))?;
/// ```
#[derive(Debug, Clone)]
pub struct GraphBuilder {
    config: BuilderConfig,
    registry: ExtractorRegistry,
    exclude: GlobSet,
}

impl Default for GraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphBuilder {
    /// Create a builder with default configuration and all built-in languages.
    pub fn new() -> Self {
        Self::with_config(BuilderConfig::default())
    }

    pub fn with_config(config: BuilderConfig) -> Self {
        Self::with_registry(config, ExtractorRegistry::with_defaults())
    }

    /// Create a builder with a custom extractor registry.
    pub fn with_registry(config: BuilderConfig, registry: ExtractorRegistry) -> Self {
        let exclude = build_exclude_glob_set(&config.exclude_patterns);
        Self {
            config,
            registry,
            exclude,
        }
    }

    pub fn config(&self) -> &BuilderConfig {
        &self.config
    }

    pub fn registry(&self) -> &ExtractorRegistry {
        &self.registry
    }

    /// Whether `relative_path` would be analyzed (supported and not excluded).
    pub fn accepts(&self, relative_path: &str) -> bool {
        self.registry.supports(relative_path) && !self.exclude.is_match(relative_path)
    }

    /// Build the full graph of a repository.
    pub fn build_from_directory(&self, directory: &Path) -> Result<BuildOutput, BuilderError> {
        if !directory.is_dir() {
            return Err(BuilderError::RepositoryNotFound(directory.to_path_buf()));
        }

        info!("Processing files in {}", directory.display());
        let files = self.collect_files(directory)?;
        if files.is_empty() {
            return Err(BuilderError::NoFilesFound(directory.to_path_buf()));
        }
        info!("Found {} files to process", files.len());

        let output = self.build_files(directory, &files, LinkSeed::default())?;

        info!("Graph summary:");
        info!("  - Files: {}", output.graph.files.len());
        info!("  - Components: {}", output.graph.components.len());
        info!("  - Internal links: {}", output.stats.internal_links);
        info!("  - External links: {}", output.stats.external_links);
        info!(
            "  - External symbols: {}",
            output.graph.external_symbols.len()
        );

        Ok(output)
    }

    /// Build the given files, linking against `seed` as well as the
    /// components extracted in this pass. On a name collision the component
    /// extracted here wins.
    pub fn build_files(
        &self,
        directory: &Path,
        relative_paths: &[String],
        seed: LinkSeed,
    ) -> Result<BuildOutput, BuilderError> {
        let pool = self.thread_pool()?;
        let mut stats = BuildStats {
            files_seen: relative_paths.len(),
            ..Default::default()
        };

        // Extract files
        let results: Vec<(&String, Result<Box<dyn FileExtractor>, ExtractError>)> =
            pool.install(|| {
                relative_paths
                    .par_iter()
                    .map(|path| (path, self.extract_file(directory, path)))
                    .collect()
            });

        let mut extracted: Vec<Box<dyn FileExtractor>> = Vec::with_capacity(results.len());
        for (path, result) in results {
            match result {
                Ok(file) => extracted.push(file),
                Err(e) => {
                    warn!("Error processing {}: {}", path, e);
                    stats.files_failed += 1;
                }
            }
        }
        stats.files_extracted = extracted.len();

        // Provisional identities
        let mut assigner = IdentityAssigner::new();
        let mut pending: Vec<ProvisionalComponent> = Vec::new();
        for (file_index, file) in extracted.iter().enumerate() {
            for name in file.extract_component_names() {
                let Some(component) = file.component(&name) else {
                    continue;
                };
                pending.push(assigner.provisional(
                    file_index,
                    name.as_str(),
                    component.kind(),
                    component.parent().map(str::to_string),
                ));
            }
        }
        debug!("Registered {} provisional components", assigner.len());

        // Assemble component code
        let assembled: Vec<Result<AssembledComponent, (String, ExtractError)>> =
            pool.install(|| {
                pending
                    .into_par_iter()
                    .map(|p| assemble(extracted[p.file_index].as_ref(), p))
                    .collect()
            });

        let mut components = Vec::with_capacity(assembled.len());
        for result in assembled {
            match result {
                Ok(component) => components.push(component),
                Err((name, e)) => {
                    warn!("Skipping component {}: {}", name, e);
                    stats.components_failed += 1;
                }
            }
        }

        // Files
        let files: Vec<File> = extracted
            .iter()
            .map(|f| {
                File::new(
                    f.relative_path(),
                    f.formatted_text(),
                    f.extract_imports(),
                    f.extract_called_components(),
                    f.extract_callable_components(),
                )
            })
            .collect();
        let file_ids: Vec<FileId> = files.iter().map(|f| f.id.clone()).collect();

        // Final identities
        let finalized = assigner.finalize(components, &file_ids);
        stats.components = finalized.components.len();
        stats.duplicate_components = finalized.duplicates;

        // Link
        let mut name_table = seed.known_components;
        name_table.extend(finalized.name_table);
        let mut external_symbols = seed.external_symbols;
        let mut components = finalized.components;
        let links = Linker::new(&name_table).link_all(&mut components, &mut external_symbols);
        stats.record_links(links);

        Ok(BuildOutput {
            graph: CodeGraph::new(components, files, external_symbols),
            stats,
            name_table,
        })
    }

    /// Collect analyzable files, relative to `directory`, sorted.
    ///
    /// Uses the `ignore` crate to respect:
    /// - `.gitignore` files
    /// - `.depgraphignore` files
    /// - Global gitignore patterns
    pub fn collect_files(&self, directory: &Path) -> Result<Vec<String>, BuilderError> {
        let mut files = Vec::new();

        let walker = WalkBuilder::new(directory)
            .follow_links(false)
            .hidden(true)
            .git_ignore(true)
            .git_global(true)
            .git_exclude(true)
            .add_custom_ignore_filename(IGNORE_FILE_NAME)
            .build();

        for entry in walker {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    debug!("Error walking directory: {}", e);
                    continue;
                }
            };

            let file_type = match entry.file_type() {
                Some(ft) => ft,
                None => continue,
            };
            if !file_type.is_file() {
                continue;
            }

            let path = entry.path();
            let rel_path = relative_path(directory, path);
            if !self.accepts(&rel_path) {
                continue;
            }

            if self.config.max_file_size_kb > 0 {
                let too_large = entry
                    .metadata()
                    .map(|m| m.len() > self.config.max_file_size_kb * 1024)
                    .unwrap_or(false);
                if too_large {
                    debug!("Skipping large file {}", rel_path);
                    continue;
                }
            }

            files.push(rel_path);
        }

        files.sort();

        if let Some(max) = self.config.max_files {
            if files.len() > max {
                info!("Reached maximum file limit of {}", max);
                files.truncate(max);
            }
        }

        Ok(files)
    }

    fn extract_file(
        &self,
        directory: &Path,
        relative_path: &str,
    ) -> Result<Box<dyn FileExtractor>, ExtractError> {
        let extractor = self
            .registry
            .for_path(relative_path)
            .ok_or_else(|| ExtractError::UnsupportedLanguage(relative_path.to_string()))?;
        let source = std::fs::read_to_string(directory.join(relative_path))?;
        extractor.extract(relative_path, &source)
    }

    fn thread_pool(&self) -> Result<rayon::ThreadPool, BuilderError> {
        let mut builder = rayon::ThreadPoolBuilder::new();
        if self.config.parallelism > 0 {
            builder = builder.num_threads(self.config.parallelism);
        }
        builder
            .build()
            .map_err(|e| BuilderError::ThreadPool(e.to_string()))
    }
}

fn assemble(
    file: &dyn FileExtractor,
    provisional: ProvisionalComponent,
) -> Result<AssembledComponent, (String, ExtractError)> {
    let name = provisional.qualified_name.clone();
    let Some(component) = file.component(&name) else {
        return Err((name.clone(), ExtractError::ComponentNotFound(name)));
    };
    let code_text = component
        .extract_component_code()
        .map_err(|e| (name.clone(), e))?;
    let referenced_symbols = component
        .extract_callable_objects()
        .map_err(|e| (name.clone(), e))?;
    let spans = component.spans().to_vec();

    Ok(AssembledComponent {
        provisional,
        code_text,
        spans,
        referenced_symbols,
    })
}

/// Repository-relative path with forward slashes.
pub fn relative_path(directory: &Path, path: &Path) -> String {
    path.strip_prefix(directory)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

/// Build a glob set from exclude patterns. Invalid patterns are ignored.
fn build_exclude_glob_set(patterns: &[String]) -> GlobSet {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        match Glob::new(pattern) {
            Ok(glob) => {
                builder.add(glob);
            }
            Err(e) => warn!("Ignoring invalid exclude pattern {}: {}", pattern, e),
        }
    }
    builder.build().unwrap_or_else(|_| GlobSet::empty())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::{normalize_source, LanguageExtractor, ParsedComponent, ParsedFile};
    use crate::model::{ComponentKind, Span};
    use std::fs;
    use std::sync::Arc;
    use tempfile::TempDir;

    /// Temp directory with a non-hidden name, so the walker does not skip it.
    fn temp_dir() -> TempDir {
        tempfile::Builder::new()
            .prefix("depgraph_test_")
            .tempdir()
            .unwrap()
    }

    fn write(dir: &Path, rel: &str, content: &str) {
        let path = dir.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_builder_config_default() {
        let config = BuilderConfig::default();
        assert_eq!(config.max_file_size_kb, 1024);
        assert_eq!(config.parallelism, 0);
        assert!(config.exclude_patterns.iter().any(|p| p.contains("node_modules")));
    }

    #[test]
    fn test_build_exclude_glob_set() {
        let set = build_exclude_glob_set(&["**/vendor/**".to_string(), "[".to_string()]);
        assert!(set.is_match("a/vendor/x.py"));
        assert!(!set.is_match("a/src/x.py"));
    }

    #[test]
    fn test_collect_files_filters_and_sorts() {
        let temp = temp_dir();
        write(temp.path(), "b.py", "x = 1\n");
        write(temp.path(), "a.py", "y = 2\n");
        write(temp.path(), "notes.md", "# notes\n");
        write(temp.path(), "node_modules/dep/index.js", "module.exports = 1;\n");
        write(temp.path(), "skip/me.py", "z = 3\n");
        write(temp.path(), ".depgraphignore", "skip/\n");

        let builder = GraphBuilder::new();
        let files = builder.collect_files(temp.path()).unwrap();
        assert_eq!(files, vec!["a.py".to_string(), "b.py".to_string()]);
    }

    #[test]
    fn test_collect_files_respects_size_limit() {
        let temp = temp_dir();
        write(temp.path(), "small.py", "x = 1\n");
        write(temp.path(), "big.py", &"x = 1\n".repeat(400));

        let builder = GraphBuilder::with_config(BuilderConfig {
            max_file_size_kb: 1,
            ..Default::default()
        });
        let files = builder.collect_files(temp.path()).unwrap();
        assert_eq!(files, vec!["small.py".to_string()]);
    }

    #[test]
    fn test_build_empty_directory_fails() {
        let temp = temp_dir();
        let result = GraphBuilder::new().build_from_directory(temp.path());
        assert!(matches!(result, Err(BuilderError::NoFilesFound(_))));
    }

    #[test]
    fn test_build_missing_directory_fails() {
        let temp = temp_dir();
        let result = GraphBuilder::new().build_from_directory(&temp.path().join("nope"));
        assert!(matches!(result, Err(BuilderError::RepositoryNotFound(_))));
    }

    #[test]
    fn test_unreadable_file_is_skipped() {
        let temp = temp_dir();
        write(temp.path(), "ok.py", "def f():\n    pass\n");

        let files = vec!["ok.py".to_string(), "missing.py".to_string()];
        let output = GraphBuilder::new()
            .build_files(temp.path(), &files, LinkSeed::default())
            .unwrap();

        assert_eq!(output.stats.files_failed, 1);
        assert_eq!(output.graph.files.len(), 1);
        assert!(output.graph.component_by_name("ok.f").is_some());
    }

    /// Emits `f` with a valid span and `broken` with a span past the end.
    struct BrokenSpanExtractor;

    impl LanguageExtractor for BrokenSpanExtractor {
        fn name(&self) -> &str {
            "broken"
        }

        fn extract(
            &self,
            relative_path: &str,
            source: &str,
        ) -> Result<Box<dyn FileExtractor>, ExtractError> {
            let text = normalize_source(source);
            let len = text.len();
            let component = |name: &str, kind, span: Span| ParsedComponent {
                qualified_name: name.to_string(),
                kind,
                parent: None,
                spans: vec![span],
                referenced_symbols: Vec::new(),
            };
            Ok(Box::new(ParsedFile {
                relative_path: relative_path.to_string(),
                module: "m".to_string(),
                imports: Vec::new(),
                called_symbols: Vec::new(),
                callable_symbols: vec!["m.f".to_string()],
                components: vec![
                    component("m.f", ComponentKind::Function, Span::new(0, len)),
                    component("m.broken", ComponentKind::Function, Span::new(len, len + 10)),
                ],
                text,
            }))
        }
    }

    #[test]
    fn test_failed_component_is_skipped() {
        let temp = temp_dir();
        write(temp.path(), "m.brk", "def f():\n    pass\n");

        let mut registry = ExtractorRegistry::new();
        registry.register("brk", Arc::new(BrokenSpanExtractor));
        let builder = GraphBuilder::with_registry(BuilderConfig::default(), registry);

        let output = builder.build_from_directory(temp.path()).unwrap();

        assert_eq!(output.stats.components_failed, 1);
        assert_eq!(output.stats.files_failed, 0);
        assert_eq!(output.graph.files.len(), 1);
        assert!(output.graph.component_by_name("m.f").is_some());
        assert!(output.graph.component_by_name("m.broken").is_none());
    }

    #[test]
    fn test_seeded_names_link_across_passes() {
        let temp = temp_dir();
        write(temp.path(), "a.py", "from b import bar\n\ndef foo():\n    bar()\n");

        let bar_id = ComponentId::new("bar-id");
        let seed = LinkSeed {
            known_components: [("b.bar".to_string(), bar_id.clone())].into(),
            external_symbols: ExternalSymbolTable::new(),
        };
        let output = GraphBuilder::new()
            .build_files(temp.path(), &["a.py".to_string()], seed)
            .unwrap();

        let foo = output.graph.component_by_name("a.foo").unwrap();
        assert_eq!(foo.linked_component_ids, vec![bar_id]);
    }
}
