//! Update command - Incremental graph update

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use depgraph_config::{ConfigOverrides, DepGraphConfig, StorageFormat};
use depgraph_core::processors::{update_pipeline_with, ChangeDetection, DetectChanges};
use depgraph_core::{
    AttrKey, Container, GraphFormat, GraphStore, GraphUpdater, RepoIdentity, UpdaterConfig,
};
use tracing::{debug, info};

use super::{
    component_filter, graph_builder, graph_format, parse_format, print_info, resolve_local_repo,
};
use crate::progress::{finish_spinner, finish_spinner_error, spinner};
use crate::GlobalOptions;

/// Arguments for the update command
#[derive(Args, Debug)]
pub struct UpdateArgs {
    /// Diff against this commit instead of the one recorded in the graph
    #[arg(long, conflicts_with = "snapshot")]
    since: Option<String>,

    /// Compare file contents with the stored graph instead of using git
    #[arg(long)]
    snapshot: bool,

    /// Keep only components whose qualified name matches this regex
    #[arg(long)]
    filter: Option<String>,

    /// Storage format (json, sqlite)
    #[arg(long, value_parser = parse_format)]
    format: Option<StorageFormat>,

    /// Graph file to update (default: <repo>/.depgraph/graph.<ext>)
    #[arg(long)]
    graph: Option<PathBuf>,

    /// Re-resolve untouched components against the rebuilt files
    #[arg(long)]
    relink: bool,
}

/// Execute the update command
pub async fn execute(
    args: UpdateArgs,
    global: GlobalOptions,
    mut config: DepGraphConfig,
) -> Result<()> {
    config.apply_overrides(&ConfigOverrides {
        format: args.format,
        component_pattern: args.filter.clone(),
        relink_retained: args.relink.then_some(true),
        ..Default::default()
    });
    config.validate()?;

    let repo_path = resolve_local_repo(&global)?;
    let (graph_path, format) = match args.graph {
        Some(path) => {
            let format = GraphFormat::from_path(&path);
            (path, format)
        }
        None => (
            config.graph_path(&repo_path),
            graph_format(config.storage.format),
        ),
    };

    if !GraphStore::new(&graph_path, format).exists() {
        anyhow::bail!(
            "No graph found at {}. Run 'depgraph generate' first.",
            graph_path.display()
        );
    }

    let builder = graph_builder(&config);
    let detector = match (&args.since, args.snapshot) {
        (Some(commit), _) => DetectChanges::since(commit.clone(), builder.clone()),
        (None, true) => DetectChanges::new(ChangeDetection::Snapshot, builder.clone()),
        (None, false) => DetectChanges::new(ChangeDetection::Auto, builder.clone()),
    };
    debug!("Change detection: {:?}", detector.mode());

    let updater = GraphUpdater::with_config(
        builder,
        UpdaterConfig {
            relink_retained: config.analysis.relink_retained,
        },
    );
    let mut pipeline = update_pipeline_with(detector, updater, component_filter(&config)?, format);

    info!("Updating graph at {}", graph_path.display());
    let pb = spinner("Detecting changes...", global.quiet);
    let identity = RepoIdentity::local(&repo_path, &graph_path);
    let container = match pipeline.run(Container::new(identity)).await {
        Ok(container) => container,
        Err(e) => {
            finish_spinner_error(pb, "Graph update failed");
            return Err(e).context("Graph update failed");
        }
    };

    let changes = container.changes()?;
    if !changes.has_changes() {
        finish_spinner(pb, "Graph is up to date");
        return Ok(());
    }

    let graph = container.code_graph()?;
    finish_spinner(
        pb,
        &format!(
            "Updated graph: {} modified, {} added, {} deleted",
            changes.modified.len(),
            changes.added.len(),
            changes.deleted.len()
        ),
    );
    print_info(
        &format!(
            "  Now {} files, {} components, {} external symbols",
            graph.files.len(),
            graph.components.len(),
            graph.external_symbols.len()
        ),
        global.quiet,
    );
    if let Ok(Some(commit)) = container.optional_text(AttrKey::CommitHash) {
        print_info(&format!("  At commit {}", commit), global.quiet);
    }

    Ok(())
}
