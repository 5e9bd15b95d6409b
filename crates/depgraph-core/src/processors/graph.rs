//! Stages that build, update and filter the graph.

use std::collections::HashSet;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::builder::GraphBuilder;
use crate::incremental::GraphUpdater;
use crate::model::{CodeGraph, ComponentId};
use crate::pipeline::{
    AttrKey, AttrValue, AttributeUpdates, Container, Processor, ProcessorSchema, StageError,
};
use crate::vcs::{detect_snapshot_changes, GitRepository};

const GRAPH: &[AttrKey] = &[AttrKey::Components, AttrKey::Files, AttrKey::ExternalSymbols];

// ============================================================================
// Build
// ============================================================================

/// Builds the full graph of the working tree.
#[derive(Debug, Clone, Default)]
pub struct BuildGraph {
    builder: GraphBuilder,
}

impl BuildGraph {
    pub const SCHEMA: ProcessorSchema = ProcessorSchema::new("BuildGraph", &[], GRAPH);

    pub fn new(builder: GraphBuilder) -> Self {
        Self { builder }
    }
}

impl Processor for BuildGraph {
    fn schema(&self) -> ProcessorSchema {
        Self::SCHEMA
    }

    fn apply(&self, container: &Container) -> Result<AttributeUpdates, StageError> {
        let output = self.builder.build_from_directory(container.repo_path())?;
        Ok(AttributeUpdates::from_graph(output.graph))
    }
}

// ============================================================================
// Change detection
// ============================================================================

/// How [`DetectChanges`] finds changed files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeDetection {
    /// git diff joined with a snapshot comparison when the working tree is a
    /// repository and the stored graph records a commit, snapshot comparison
    /// otherwise
    #[default]
    Auto,
    /// git diff against the stored graph's commit
    Git,
    /// Compare stored file ids with the working tree
    Snapshot,
}

/// Computes the change set between the stored graph and the working tree.
#[derive(Debug, Clone, Default)]
pub struct DetectChanges {
    mode: ChangeDetection,
    builder: GraphBuilder,
    /// Explicit base commit, replacing the stored graph's
    since: Option<String>,
}

impl DetectChanges {
    pub const SCHEMA: ProcessorSchema = ProcessorSchema::new(
        "DetectChanges",
        &[AttrKey::Files, AttrKey::PreviousCommitHash],
        &[AttrKey::Changes],
    );

    const SNAPSHOT_SCHEMA: ProcessorSchema =
        ProcessorSchema::new("DetectChanges", &[AttrKey::Files], &[AttrKey::Changes]);

    /// `builder` decides which working-tree files count in snapshot mode.
    pub fn new(mode: ChangeDetection, builder: GraphBuilder) -> Self {
        Self {
            mode,
            builder,
            since: None,
        }
    }

    /// git diff against `commit` regardless of what the stored graph records.
    pub fn since(commit: impl Into<String>, builder: GraphBuilder) -> Self {
        Self {
            mode: ChangeDetection::Git,
            builder,
            since: Some(commit.into()),
        }
    }

    pub fn mode(&self) -> ChangeDetection {
        self.mode
    }
}

impl Processor for DetectChanges {
    fn schema(&self) -> ProcessorSchema {
        if self.since.is_some() || self.mode == ChangeDetection::Snapshot {
            Self::SNAPSHOT_SCHEMA
        } else {
            Self::SCHEMA
        }
    }

    fn apply(&self, container: &Container) -> Result<AttributeUpdates, StageError> {
        let path = container.repo_path();
        let previous_commit = match (&self.since, self.mode) {
            (Some(commit), _) => Some(commit.as_str()),
            (None, ChangeDetection::Snapshot) => None,
            (None, _) => container.optional_text(AttrKey::PreviousCommitHash)?,
        };

        let use_git = match self.mode {
            ChangeDetection::Snapshot => false,
            ChangeDetection::Git => true,
            ChangeDetection::Auto => {
                previous_commit.is_some() && GitRepository::is_repository(path)
            }
        };

        let changes = if use_git {
            let commit = previous_commit.ok_or_else(|| {
                StageError::Invalid("stored graph records no commit to diff against".to_string())
            })?;
            let mut changes = GitRepository::open(path)?.changes_since(commit)?;
            changes.retain(|p| self.builder.accepts(p));
            if self.mode == ChangeDetection::Auto {
                // The stored graph may hold uncommitted or untracked content
                // that HEAD does not describe.
                let snapshot = detect_snapshot_changes(&self.builder, path, container.files()?)?;
                changes = changes.union(snapshot);
            }
            changes
        } else {
            detect_snapshot_changes(&self.builder, path, container.files()?)?
        };

        Ok(AttributeUpdates::new().set(AttrKey::Changes, AttrValue::Changes(changes)))
    }
}

// ============================================================================
// Update
// ============================================================================

/// Applies the detected changes to the stored graph.
#[derive(Debug, Clone, Default)]
pub struct UpdateGraph {
    updater: GraphUpdater,
}

impl UpdateGraph {
    pub const SCHEMA: ProcessorSchema = ProcessorSchema::new(
        "UpdateGraph",
        &[
            AttrKey::Components,
            AttrKey::Files,
            AttrKey::ExternalSymbols,
            AttrKey::Changes,
        ],
        GRAPH,
    );

    pub fn new(updater: GraphUpdater) -> Self {
        Self { updater }
    }
}

impl Processor for UpdateGraph {
    fn schema(&self) -> ProcessorSchema {
        Self::SCHEMA
    }

    fn apply(&self, container: &Container) -> Result<AttributeUpdates, StageError> {
        let previous = container.code_graph()?;
        let changes = container.changes()?;
        let result = self
            .updater
            .update(container.repo_path(), previous, changes)?;
        Ok(AttributeUpdates::from_graph(result.graph))
    }
}

// ============================================================================
// Filter
// ============================================================================

/// Keeps only components whose qualified name matches a pattern.
///
/// Links to dropped components are removed from the kept ones.
#[derive(Debug, Clone)]
pub struct FilterComponents {
    pattern: Regex,
}

impl FilterComponents {
    pub const SCHEMA: ProcessorSchema = ProcessorSchema::new(
        "FilterComponents",
        &[AttrKey::Components],
        &[AttrKey::Components],
    );

    pub fn new(pattern: Regex) -> Self {
        Self { pattern }
    }

    pub fn pattern(&self) -> &Regex {
        &self.pattern
    }

    /// Filter `graph` in place, returning the number of dropped components.
    pub fn filter_graph(&self, graph: &mut CodeGraph) -> usize {
        let before = graph.components.len();
        let (kept, dropped): (Vec<_>, Vec<_>) = std::mem::take(&mut graph.components)
            .into_iter()
            .partition(|c| self.pattern.is_match(&c.qualified_name));
        let dropped_ids: HashSet<ComponentId> = dropped.into_iter().map(|c| c.id).collect();

        graph.components = kept;
        for component in &mut graph.components {
            component
                .linked_component_ids
                .retain(|id| !dropped_ids.contains(id));
            if component
                .parent_id
                .as_ref()
                .is_some_and(|p| dropped_ids.contains(p))
            {
                component.parent_id = None;
            }
        }
        before - graph.components.len()
    }
}

impl Processor for FilterComponents {
    fn schema(&self) -> ProcessorSchema {
        Self::SCHEMA
    }

    fn apply(&self, container: &Container) -> Result<AttributeUpdates, StageError> {
        let mut graph = CodeGraph::new(
            container.components()?.to_vec(),
            Vec::new(),
            Default::default(),
        );
        let dropped = self.filter_graph(&mut graph);
        info!(
            "Filter /{}/ kept {} components, dropped {}",
            self.pattern.as_str(),
            graph.components.len(),
            dropped
        );
        Ok(AttributeUpdates::new().set(AttrKey::Components, AttrValue::Components(graph.components)))
    }
}
