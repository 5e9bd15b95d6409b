//! Generate command - Full graph build

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use depgraph_config::{ConfigOverrides, DepGraphConfig, StorageFormat};
use depgraph_core::pipeline::repo_name_from_url;
use depgraph_core::processors::generate_pipeline;
use depgraph_core::{AttrKey, Container, RepoIdentity};
use tracing::info;

use super::{
    component_filter, graph_builder, graph_format, parse_format, print_info, resolve_repo,
    RepoSource,
};
use crate::progress::{finish_spinner, finish_spinner_error, spinner};
use crate::GlobalOptions;

/// Arguments for the generate command
#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// Where to write the graph (default: <repo>/.depgraph/graph.<ext>)
    #[arg(long, short = 'o')]
    output: Option<PathBuf>,

    /// Storage format (json, sqlite)
    #[arg(long, value_parser = parse_format)]
    format: Option<StorageFormat>,

    /// Keep only components whose qualified name matches this regex
    #[arg(long)]
    filter: Option<String>,

    /// Directory to clone into when --repo is a URL (default: ./<repo name>)
    #[arg(long)]
    clone_dir: Option<PathBuf>,
}

/// Execute the generate command
pub async fn execute(
    args: GenerateArgs,
    global: GlobalOptions,
    mut config: DepGraphConfig,
) -> Result<()> {
    config.apply_overrides(&ConfigOverrides {
        format: args.format,
        component_pattern: args.filter.clone(),
        ..Default::default()
    });
    config.validate()?;

    let identity = match resolve_repo(&global)? {
        RepoSource::Local(path) => {
            let persist = args
                .output
                .clone()
                .unwrap_or_else(|| config.graph_path(&path));
            RepoIdentity::local(path, persist)
        }
        RepoSource::Remote(url) => {
            let destination = match args.clone_dir.clone() {
                Some(dir) => dir,
                None => std::env::current_dir()
                    .context("Failed to get current directory")?
                    .join(repo_name_from_url(&url)),
            };
            let persist = args
                .output
                .clone()
                .unwrap_or_else(|| config.graph_path(&destination));
            RepoIdentity::remote(url, destination, persist)
        }
    };
    info!(
        "Generating graph for {} at {}",
        identity.name,
        identity.path.display()
    );

    let mut pipeline = generate_pipeline(
        identity.url.is_some(),
        graph_builder(&config),
        component_filter(&config)?,
        graph_format(config.storage.format),
    );

    let pb = spinner("Building dependency graph...", global.quiet);
    let container = match pipeline.run(Container::new(identity)).await {
        Ok(container) => container,
        Err(e) => {
            finish_spinner_error(pb, "Graph generation failed");
            return Err(e).context("Graph generation failed");
        }
    };

    let graph = container.code_graph()?;
    finish_spinner(
        pb,
        &format!(
            "Generated graph: {} files, {} components, {} external symbols",
            graph.files.len(),
            graph.components.len(),
            graph.external_symbols.len()
        ),
    );

    let persisted = container.path(AttrKey::PersistedPath)?;
    print_info(&format!("  Saved to {}", persisted.display()), global.quiet);
    if let Ok(Some(commit)) = container.optional_text(AttrKey::CommitHash) {
        print_info(&format!("  At commit {}", commit), global.quiet);
    }

    Ok(())
}
