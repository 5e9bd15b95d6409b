//! Built-in pipeline stages.
//!
//! | Stage              | Needs                                         | Produces                              |
//! |--------------------|-----------------------------------------------|---------------------------------------|
//! | `LocalRepository`  |                                               | `is_downloaded`                       |
//! | `CloneRepository`  |                                               | `is_downloaded`                       |
//! | `GitMetadata`      |                                               | `commit_hash`, `author`               |
//! | `LoadGraph`        |                                               | graph, `previous_commit_hash`         |
//! | `BuildGraph`       |                                               | graph                                 |
//! | `DetectChanges`    | `files`, `previous_commit_hash`               | `changes`                             |
//! | `UpdateGraph`      | graph, `changes`                              | graph                                 |
//! | `FilterComponents` | `components`                                  | `components`                          |
//! | `SaveGraph`        | graph                                         | `persisted_path`                      |
//!
//! "graph" stands for `components`, `files` and `external_symbols`.

mod graph;
mod persistence;
mod repository;

pub use graph::{BuildGraph, ChangeDetection, DetectChanges, FilterComponents, UpdateGraph};
pub use persistence::{LoadGraph, SaveGraph};
pub use repository::{CloneRepository, GitMetadata, LocalRepository};

use regex::Regex;

use crate::builder::GraphBuilder;
use crate::incremental::GraphUpdater;
use crate::pipeline::{Compose, ProcessorSchema};
use crate::store::GraphFormat;

/// Schemas of every built-in processor, for the attribute registry.
pub const BUILTIN_SCHEMAS: &[ProcessorSchema] = &[
    LocalRepository::SCHEMA,
    CloneRepository::SCHEMA,
    GitMetadata::SCHEMA,
    LoadGraph::SCHEMA,
    BuildGraph::SCHEMA,
    DetectChanges::SCHEMA,
    UpdateGraph::SCHEMA,
    FilterComponents::SCHEMA,
    SaveGraph::SCHEMA,
];

/// Working tree source → metadata → full build → filter → save.
pub fn generate_pipeline(
    clone: bool,
    builder: GraphBuilder,
    filter: Option<Regex>,
    format: GraphFormat,
) -> Compose {
    let mut pipeline = if clone {
        Compose::new().then_async(CloneRepository)
    } else {
        Compose::new().then(LocalRepository)
    };
    pipeline = pipeline.then(GitMetadata).then(BuildGraph::new(builder));
    if let Some(pattern) = filter {
        pipeline = pipeline.then(FilterComponents::new(pattern));
    }
    pipeline.then(SaveGraph::with_format(format))
}

/// Load → metadata → change detection → incremental update → filter → save.
pub fn update_pipeline(
    mode: ChangeDetection,
    updater: GraphUpdater,
    filter: Option<Regex>,
    format: GraphFormat,
) -> Compose {
    let detector = DetectChanges::new(mode, updater.builder().clone());
    update_pipeline_with(detector, updater, filter, format)
}

/// [`update_pipeline`] with a preconfigured change detector.
pub fn update_pipeline_with(
    detector: DetectChanges,
    updater: GraphUpdater,
    filter: Option<Regex>,
    format: GraphFormat,
) -> Compose {
    let mut pipeline = Compose::new()
        .then(LocalRepository)
        .then(LoadGraph::with_format(format))
        .then(GitMetadata)
        .then(detector)
        .then(UpdateGraph::new(updater));
    if let Some(pattern) = filter {
        pipeline = pipeline.then(FilterComponents::new(pattern));
    }
    pipeline.then(SaveGraph::with_format(format))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_pipelines_are_well_formed() {
        let generate = generate_pipeline(
            false,
            GraphBuilder::new(),
            Some(Regex::new(".").unwrap()),
            GraphFormat::Json,
        );
        assert!(generate.check(&[]).is_ok());
        assert_eq!(
            generate.stage_names(),
            vec![
                "LocalRepository",
                "GitMetadata",
                "BuildGraph",
                "FilterComponents",
                "SaveGraph"
            ]
        );

        let update = update_pipeline(
            ChangeDetection::Auto,
            GraphUpdater::default(),
            None,
            GraphFormat::Sqlite,
        );
        assert!(update.check(&[]).is_ok());
    }
}
