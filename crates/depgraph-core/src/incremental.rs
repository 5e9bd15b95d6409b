//! Incremental Updater for Dependency Graphs
//!
//! This module applies a file-level change set to a previously built graph.
//! Only files that were modified or added are re-extracted; everything else
//! is carried over verbatim, so untouched components keep their ids.
//!
//! ## Update steps
//!
//! 1. Classify previous files as removed, stale (modified or re-added) or
//!    untouched, and their components with them.
//! 2. Retain untouched files and components, pruning every internal link that
//!    points at a removed or stale component.
//! 3. Rebuild the changed files in a scoped build pass that links against the
//!    names of untouched components and reuses the previous external symbol
//!    table.
//! 4. Merge retained and rebuilt parts.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::builder::{BuildStats, BuilderError, GraphBuilder, LinkSeed};
use crate::linker::Linker;
use crate::model::{CodeGraph, Component, ComponentId, FileId};
use crate::vcs::ChangeSet;

// ============================================================================
// Errors
// ============================================================================

/// Errors that can occur during incremental updates.
#[derive(Debug, Error)]
pub enum UpdaterError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Repository not found
    #[error("Repository not found: {0}")]
    RepoNotFound(PathBuf),

    /// Builder error
    #[error("Builder error: {0}")]
    Builder(#[from] BuilderError),
}

/// Result type for updater operations.
pub type Result<T> = std::result::Result<T, UpdaterError>;

// ============================================================================
// Classification
// ============================================================================

/// Bucket of a previous file (and its components) with respect to a change set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileBucket {
    /// Path deleted
    Removed,
    /// Path modified or (re-)added; will be rebuilt
    Stale,
    /// Not mentioned by the change set
    Untouched,
}

/// Bucket assignment of a previous graph's files and components.
#[derive(Debug, Clone, Default)]
pub struct Classification {
    pub files: HashMap<FileId, FileBucket>,
    pub components: HashMap<ComponentId, FileBucket>,
}

impl Classification {
    /// Ids of components whose identity may change or vanish.
    pub fn dropped_components(&self) -> HashSet<&ComponentId> {
        self.components
            .iter()
            .filter(|(_, bucket)| **bucket != FileBucket::Untouched)
            .map(|(id, _)| id)
            .collect()
    }

    pub fn file_count(&self, bucket: FileBucket) -> usize {
        self.files.values().filter(|b| **b == bucket).count()
    }

    pub fn component_count(&self, bucket: FileBucket) -> usize {
        self.components.values().filter(|b| **b == bucket).count()
    }
}

/// Classify the files and components of `previous` against `changes`.
///
/// A path that is both deleted and added was re-created and counts as stale.
/// Components whose file is unknown are treated as removed.
pub fn classify(previous: &CodeGraph, changes: &ChangeSet) -> Classification {
    let rebuilt: HashSet<&str> = changes.files_to_process().into_iter().collect();
    let deleted: HashSet<&str> = changes.deleted.iter().map(String::as_str).collect();

    let files: HashMap<FileId, FileBucket> = previous
        .files
        .iter()
        .map(|file| {
            let path = file.relative_path.as_str();
            let bucket = if rebuilt.contains(path) {
                FileBucket::Stale
            } else if deleted.contains(path) {
                FileBucket::Removed
            } else {
                FileBucket::Untouched
            };
            (file.id.clone(), bucket)
        })
        .collect();

    let components = previous
        .components
        .iter()
        .map(|component| {
            let bucket = files
                .get(&component.file_id)
                .copied()
                .unwrap_or(FileBucket::Removed);
            (component.id.clone(), bucket)
        })
        .collect();

    Classification { files, components }
}

// ============================================================================
// Configuration and Results
// ============================================================================

/// Configuration for the graph updater.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdaterConfig {
    /// Re-resolve retained components against the merged name table after
    /// the scoped rebuild, restoring edges to re-created targets.
    pub relink_retained: bool,
}

/// Counters for one update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateStats {
    pub removed_files: usize,
    pub stale_files: usize,
    pub untouched_files: usize,
    pub removed_components: usize,
    pub stale_components: usize,
    pub retained_components: usize,
    pub pruned_links: usize,
    pub rebuilt_files: usize,
    pub rebuilt_components: usize,
    pub relinked_components: usize,
    pub build: BuildStats,
}

/// Result of an incremental update operation.
#[derive(Debug, Clone)]
pub struct UpdateResult {
    pub graph: CodeGraph,
    pub stats: UpdateStats,
    /// Changes that were processed.
    pub changes: ChangeSet,
}

impl UpdateResult {
    /// Check if any changes were made.
    pub fn has_changes(&self) -> bool {
        self.changes.has_changes()
    }
}

// ============================================================================
// Graph Updater
// ============================================================================

/// Applies change sets to previously built graphs.
///
/// ## Example
///
/// ```ignore
/// use depgraph_core::incremental::GraphUpdater;
///
/// let updater = GraphUpdater::new(GraphBuilder::new());
/// let result = updater.update(Path::new("repo"), previous_graph, &changes)?;
/// println!("rebuilt {} components", result.stats.rebuilt_components);
/// ```
#[derive(Debug, Clone, Default)]
pub struct GraphUpdater {
    builder: GraphBuilder,
    config: UpdaterConfig,
}

impl GraphUpdater {
    pub fn new(builder: GraphBuilder) -> Self {
        Self::with_config(builder, UpdaterConfig::default())
    }

    pub fn with_config(builder: GraphBuilder, config: UpdaterConfig) -> Self {
        Self { builder, config }
    }

    pub fn builder(&self) -> &GraphBuilder {
        &self.builder
    }

    pub fn config(&self) -> &UpdaterConfig {
        &self.config
    }

    /// Apply `changes` to `previous`, re-extracting files under `directory`.
    pub fn update(
        &self,
        directory: &Path,
        previous: CodeGraph,
        changes: &ChangeSet,
    ) -> Result<UpdateResult> {
        if !directory.is_dir() {
            return Err(UpdaterError::RepoNotFound(directory.to_path_buf()));
        }

        if !changes.has_changes() {
            info!("No changes detected, graph is up to date");
            let stats = UpdateStats {
                untouched_files: previous.files.len(),
                retained_components: previous.components.len(),
                ..Default::default()
            };
            return Ok(UpdateResult {
                graph: previous,
                stats,
                changes: changes.clone(),
            });
        }

        info!(
            "Applying {} changes ({} modified, {} added, {} deleted)",
            changes.total_changes(),
            changes.modified.len(),
            changes.added.len(),
            changes.deleted.len()
        );

        // Classify
        let classification = classify(&previous, changes);
        let mut stats = UpdateStats {
            removed_files: classification.file_count(FileBucket::Removed),
            stale_files: classification.file_count(FileBucket::Stale),
            untouched_files: classification.file_count(FileBucket::Untouched),
            removed_components: classification.component_count(FileBucket::Removed),
            stale_components: classification.component_count(FileBucket::Stale),
            ..Default::default()
        };

        // Retain and prune
        let CodeGraph {
            components: previous_components,
            files: previous_files,
            external_symbols,
        } = previous;

        let (mut retained, pruned) = {
            let dropped = classification.dropped_components();
            let mut retained: Vec<Component> = Vec::new();
            let mut pruned = 0;
            for mut component in previous_components {
                if classification.components.get(&component.id) != Some(&FileBucket::Untouched) {
                    continue;
                }
                let before = component.linked_component_ids.len();
                component
                    .linked_component_ids
                    .retain(|target| !dropped.contains(target));
                pruned += before - component.linked_component_ids.len();
                retained.push(component);
            }
            (retained, pruned)
        };
        stats.retained_components = retained.len();
        stats.pruned_links = pruned;
        debug!("Pruned {} links to removed or stale components", pruned);

        let mut files: Vec<_> = previous_files
            .into_iter()
            .filter(|f| classification.files.get(&f.id) == Some(&FileBucket::Untouched))
            .collect();

        // Scoped rebuild
        let to_rebuild = self.rebuild_paths(directory, changes);
        stats.rebuilt_files = to_rebuild.len();

        let seed = LinkSeed {
            known_components: retained
                .iter()
                .map(|c| (c.qualified_name.clone(), c.id.clone()))
                .collect(),
            external_symbols,
        };

        let output = if to_rebuild.is_empty() {
            debug!("No files to rebuild");
            crate::builder::BuildOutput {
                name_table: seed.known_components.clone(),
                graph: CodeGraph::new(Vec::new(), Vec::new(), seed.external_symbols),
                stats: BuildStats::default(),
            }
        } else {
            self.builder.build_files(directory, &to_rebuild, seed)?
        };
        stats.build = output.stats;

        let mut external_symbols = output.graph.external_symbols;

        if self.config.relink_retained {
            let linker = Linker::new(&output.name_table);
            for component in retained.iter_mut() {
                let before = (
                    component.linked_component_ids.clone(),
                    component.external_component_ids.clone(),
                );
                linker.link(component, &mut external_symbols);
                if before
                    != (
                        component.linked_component_ids.clone(),
                        component.external_component_ids.clone(),
                    )
                {
                    stats.relinked_components += 1;
                }
            }
            debug!("Relinked {} retained components", stats.relinked_components);
        }

        // Merge
        let retained_ids: HashSet<ComponentId> = retained.iter().map(|c| c.id.clone()).collect();
        let mut components = retained;
        for component in output.graph.components {
            if retained_ids.contains(&component.id) {
                debug!("Rebuilt component {} already retained", component.qualified_name);
                continue;
            }
            stats.rebuilt_components += 1;
            components.push(component);
        }
        files.extend(output.graph.files);

        info!(
            "Update complete: {} retained, {} rebuilt, {} removed components",
            stats.retained_components,
            stats.rebuilt_components,
            stats.removed_components + stats.stale_components
        );

        Ok(UpdateResult {
            graph: CodeGraph::new(components, files, external_symbols),
            stats,
            changes: changes.clone(),
        })
    }

    /// Modified and added paths that still exist and are analyzable.
    fn rebuild_paths(&self, directory: &Path, changes: &ChangeSet) -> Vec<String> {
        let mut paths = BTreeSet::new();
        for path in changes.files_to_process() {
            if !self.builder.accepts(path) {
                debug!("Skipping unsupported or excluded path {}", path);
                continue;
            }
            if !directory.join(path).is_file() {
                warn!("Changed file {} no longer exists, dropping it", path);
                continue;
            }
            paths.insert(path.to_string());
        }
        paths.into_iter().collect()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn setup_test_repo() -> TempDir {
        let temp = tempfile::Builder::new()
            .prefix("depgraph_test_")
            .tempdir()
            .unwrap();
        fs::write(
            temp.path().join("a.py"),
            "from b import bar\n\ndef foo():\n    bar()\n",
        )
        .unwrap();
        fs::write(temp.path().join("b.py"), "def bar():\n    print(\"x\")\n").unwrap();
        temp
    }

    fn build(dir: &Path) -> CodeGraph {
        GraphBuilder::new().build_from_directory(dir).unwrap().graph
    }

    fn id_of(graph: &CodeGraph, name: &str) -> ComponentId {
        graph.component_by_name(name).unwrap().id.clone()
    }

    fn modified(path: &str) -> ChangeSet {
        ChangeSet {
            modified: vec![path.to_string()],
            ..Default::default()
        }
    }

    #[test]
    fn test_classify_buckets() {
        let temp = setup_test_repo();
        let graph = build(temp.path());
        let changes = ChangeSet {
            modified: vec!["a.py".into()],
            deleted: vec!["b.py".into()],
            ..Default::default()
        };

        let classification = classify(&graph, &changes);
        assert_eq!(classification.file_count(FileBucket::Stale), 1);
        assert_eq!(classification.file_count(FileBucket::Removed), 1);
        assert_eq!(classification.file_count(FileBucket::Untouched), 0);
        assert_eq!(
            classification.components.get(&id_of(&graph, "b.bar")),
            Some(&FileBucket::Removed)
        );
    }

    #[test]
    fn test_deleted_and_added_path_is_stale() {
        let temp = setup_test_repo();
        let graph = build(temp.path());
        let changes = ChangeSet {
            added: vec!["b.py".into()],
            deleted: vec!["b.py".into()],
            ..Default::default()
        };
        let classification = classify(&graph, &changes);
        assert_eq!(classification.file_count(FileBucket::Stale), 1);
        assert_eq!(classification.file_count(FileBucket::Removed), 0);
    }

    #[test]
    fn test_no_changes_returns_previous() {
        let temp = setup_test_repo();
        let graph = build(temp.path());
        let result = GraphUpdater::new(GraphBuilder::new())
            .update(temp.path(), graph.clone(), &ChangeSet::new())
            .unwrap();
        assert_eq!(result.graph, graph);
        assert!(!result.has_changes());
    }

    #[test]
    fn test_modified_caller_keeps_callee_id() {
        let temp = setup_test_repo();
        let graph = build(temp.path());
        let bar_before = id_of(&graph, "b.bar");
        let foo_before = id_of(&graph, "a.foo");
        let print_before = graph.external_symbols.get("print").cloned();

        fs::write(
            temp.path().join("a.py"),
            "from b import bar\n\ndef foo():\n    # calls bar\n    bar()\n",
        )
        .unwrap();

        let result = GraphUpdater::new(GraphBuilder::new())
            .update(temp.path(), graph, &modified("a.py"))
            .unwrap();
        let graph = result.graph;

        assert_eq!(id_of(&graph, "b.bar"), bar_before);
        let foo = graph.component_by_name("a.foo").unwrap();
        assert_ne!(foo.id, foo_before);
        assert_eq!(foo.linked_component_ids, vec![bar_before]);
        assert_eq!(graph.external_symbols.get("print").cloned(), print_before);
        assert_eq!(result.stats.stale_files, 1);
        assert_eq!(result.stats.untouched_files, 1);
    }

    #[test]
    fn test_stale_targets_are_pruned_from_retained() {
        let temp = setup_test_repo();
        let graph = build(temp.path());
        let foo_before = id_of(&graph, "a.foo");
        let bar_before = id_of(&graph, "b.bar");

        fs::write(temp.path().join("b.py"), "def bar():\n    print(\"y\")\n").unwrap();

        let result = GraphUpdater::new(GraphBuilder::new())
            .update(temp.path(), graph, &modified("b.py"))
            .unwrap();
        let graph = result.graph;

        let foo = graph.component_by_name("a.foo").unwrap();
        assert_eq!(foo.id, foo_before);
        assert!(foo.linked_component_ids.is_empty());
        assert_ne!(id_of(&graph, "b.bar"), bar_before);
        assert_eq!(result.stats.pruned_links, 1);
    }

    #[test]
    fn test_relink_retained_restores_edges() {
        let temp = setup_test_repo();
        let graph = build(temp.path());

        fs::write(temp.path().join("b.py"), "def bar():\n    print(\"y\")\n").unwrap();

        let updater = GraphUpdater::with_config(
            GraphBuilder::new(),
            UpdaterConfig {
                relink_retained: true,
            },
        );
        let result = updater
            .update(temp.path(), graph, &modified("b.py"))
            .unwrap();
        let graph = result.graph;

        let foo = graph.component_by_name("a.foo").unwrap();
        assert_eq!(foo.linked_component_ids, vec![id_of(&graph, "b.bar")]);
        assert_eq!(result.stats.relinked_components, 1);
    }

    #[test]
    fn test_deleted_file_removes_components() {
        let temp = setup_test_repo();
        let graph = build(temp.path());
        let bar = id_of(&graph, "b.bar");

        fs::remove_file(temp.path().join("b.py")).unwrap();
        let changes = ChangeSet {
            deleted: vec!["b.py".into()],
            ..Default::default()
        };
        let result = GraphUpdater::new(GraphBuilder::new())
            .update(temp.path(), graph, &changes)
            .unwrap();

        assert!(result.graph.file_by_path("b.py").is_none());
        assert!(result.graph.component(&bar).is_none());
        assert!(result
            .graph
            .components
            .iter()
            .all(|c| !c.linked_component_ids.contains(&bar)));
        assert_eq!(result.stats.rebuilt_files, 0);
    }

    #[test]
    fn test_added_file_links_to_untouched_code() {
        let temp = setup_test_repo();
        let graph = build(temp.path());
        let bar = id_of(&graph, "b.bar");

        fs::write(
            temp.path().join("c.py"),
            "from b import bar\n\ndef baz():\n    bar()\n",
        )
        .unwrap();
        let changes = ChangeSet {
            added: vec!["c.py".into()],
            ..Default::default()
        };
        let result = GraphUpdater::new(GraphBuilder::new())
            .update(temp.path(), graph, &changes)
            .unwrap();

        let baz = result.graph.component_by_name("c.baz").unwrap();
        assert_eq!(baz.linked_component_ids, vec![bar]);
        assert_eq!(result.graph.files.len(), 3);
    }
}
