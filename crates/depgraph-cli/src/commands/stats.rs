//! Stats command - Summary of the stored graph

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use depgraph_config::DepGraphConfig;
use depgraph_core::{validate, PetDependencyGraph};

use super::{load_graph, resolve_local_repo};
use crate::GlobalOptions;

/// Arguments for the stats command
#[derive(Args, Debug)]
pub struct StatsArgs {
    /// Output as JSON
    #[arg(long)]
    json: bool,

    /// Graph file to read (default: <repo>/.depgraph/graph.<ext>)
    #[arg(long)]
    graph: Option<PathBuf>,

    /// Also check structural invariants and list violations
    #[arg(long)]
    validate: bool,
}

/// Execute the stats command
pub async fn execute(args: StatsArgs, global: GlobalOptions, config: DepGraphConfig) -> Result<()> {
    let repo_path = resolve_local_repo(&global)?;
    let (graph_path, document) = load_graph(&config, &repo_path, args.graph.as_deref())?;

    let graph = document.graph();
    let stats = PetDependencyGraph::from_code_graph(&graph).stats();
    let issues = if args.validate {
        Some(validate(&graph))
    } else {
        None
    };

    if args.json {
        let mut output = serde_json::json!({
            "graph": graph_path,
            "repository": document.repository,
            "commit": document.commit_hash,
            "stats": stats,
        });
        if let Some(ref issues) = issues {
            output["issues"] = serde_json::json!(issues
                .iter()
                .map(|issue| issue.to_string())
                .collect::<Vec<_>>());
        }
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("Graph: {}", graph_path.display());
    if let Some(ref repository) = document.repository {
        println!("Repository: {}", repository);
    }
    if let Some(ref commit) = document.commit_hash {
        println!("Commit: {}", commit);
    }
    println!();
    println!("  Files:            {}", stats.files);
    println!("  Components:       {}", stats.components);
    println!("  External symbols: {}", stats.external_symbols);
    println!("  Internal edges:   {}", stats.internal_edges);
    println!("  External edges:   {}", stats.external_edges);

    if !stats.components_by_kind.is_empty() {
        println!("\n  Components by kind:");
        for (kind, count) in &stats.components_by_kind {
            println!("    {}: {}", kind, count);
        }
    }

    if let Some(issues) = issues {
        if issues.is_empty() {
            println!("\nNo invariant violations");
        } else {
            println!("\n{} invariant violations:", issues.len());
            for issue in &issues {
                println!("  - {}", issue);
            }
            anyhow::bail!("Graph failed validation");
        }
    }

    Ok(())
}
