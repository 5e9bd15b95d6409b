//! Deps command - Dependencies and dependents of a component

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use depgraph_config::DepGraphConfig;
use depgraph_core::graph::GraphNode;
use depgraph_core::PetDependencyGraph;
use serde::Serialize;

use super::{load_graph, resolve_local_repo};
use crate::GlobalOptions;

/// Arguments for the deps command
#[derive(Args, Debug)]
pub struct DepsArgs {
    /// Qualified name of the component, or a dotted suffix of it
    name: String,

    /// List the components that depend on it instead
    #[arg(long, short = 'R')]
    reverse: bool,

    /// Follow dependencies transitively
    #[arg(long, short = 't', conflicts_with = "reverse")]
    transitive: bool,

    /// Output as JSON
    #[arg(long)]
    json: bool,

    /// Graph file to read (default: <repo>/.depgraph/graph.<ext>)
    #[arg(long)]
    graph: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct DepsReport<'a> {
    component: &'a str,
    direction: &'static str,
    nodes: Vec<&'a GraphNode>,
}

/// Execute the deps command
pub async fn execute(args: DepsArgs, global: GlobalOptions, config: DepGraphConfig) -> Result<()> {
    let repo_path = resolve_local_repo(&global)?;
    let (_, document) = load_graph(&config, &repo_path, args.graph.as_deref())?;
    let view = PetDependencyGraph::from_code_graph(&document.graph());

    let matches = view.find_by_name(&args.name);
    let (id, name) = match matches.as_slice() {
        [] => anyhow::bail!("No component named '{}'", args.name),
        [GraphNode::Component { id, name, .. }] => (id.clone(), name.as_str()),
        [_] => anyhow::bail!("'{}' is not a component", args.name),
        many => {
            let names: Vec<&str> = many.iter().map(|node| node.name()).collect();
            anyhow::bail!(
                "'{}' is ambiguous; candidates:\n  {}",
                args.name,
                names.join("\n  ")
            );
        }
    };

    let (direction, nodes) = if args.reverse {
        ("dependents", view.dependents(&id))
    } else if args.transitive {
        ("transitive", view.transitive_dependencies(&id))
    } else {
        ("dependencies", view.dependencies(&id))
    };

    if args.json {
        let report = DepsReport {
            component: name,
            direction,
            nodes,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    if nodes.is_empty() {
        println!("{} has no {}", name, direction);
        return Ok(());
    }

    println!("{} ({}):", name, direction);
    for node in nodes {
        match node {
            GraphNode::Component { name, kind, .. } => {
                println!("  {} [{}]", name, kind.as_str())
            }
            GraphNode::External { name, .. } => println!("  {} [external]", name),
            GraphNode::File { path, .. } => println!("  {} [file]", path),
        }
    }

    Ok(())
}
