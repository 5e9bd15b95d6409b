//! Config command - View and manage configuration
//!
//! - Show the effective configuration and where it was loaded from
//! - Write a default configuration file (local or global)

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Subcommand;
use depgraph_config::{ConfigLoader, DepGraphConfig};
use serde::Serialize;

use super::{config_root, print_info};
use crate::GlobalOptions;

/// Config management commands
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show the effective configuration and config file paths
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Write a default configuration file
    Init {
        /// Write ~/.depgraph/config.toml instead of the repository's
        #[arg(long)]
        global: bool,

        /// Overwrite an existing file
        #[arg(long, short = 'f')]
        force: bool,
    },
}

/// Configuration file paths
#[derive(Debug, Clone, Serialize)]
struct ConfigPaths {
    global: Option<PathBuf>,
    local: PathBuf,
    explicit: Option<PathBuf>,
    global_exists: bool,
    local_exists: bool,
}

/// Execute the config command
pub async fn execute(
    cmd: ConfigCommand,
    global: GlobalOptions,
    config: DepGraphConfig,
) -> Result<()> {
    match cmd {
        ConfigCommand::Show { json } => execute_show(json, global, config),
        ConfigCommand::Init {
            global: to_global,
            force,
        } => execute_init(to_global, force, global),
    }
}

fn execute_show(json: bool, global: GlobalOptions, config: DepGraphConfig) -> Result<()> {
    let loader = ConfigLoader::new();
    let root = config_root(&global)?;
    let global_path = loader.global_config_path();
    let local_path = loader.local_config_path(&root);
    let paths = ConfigPaths {
        global_exists: global_path.as_ref().is_some_and(|p| p.exists()),
        local_exists: local_path.exists(),
        global: global_path,
        local: local_path,
        explicit: global.config.clone(),
    };

    if json {
        let output = serde_json::json!({
            "config": config,
            "paths": paths,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("# Effective configuration");
    if let Some(ref explicit) = paths.explicit {
        println!("# from {}", explicit.display());
    } else {
        if let Some(ref path) = paths.global {
            let marker = missing_marker(paths.global_exists);
            println!("# global: {}{}", path.display(), marker);
        }
        let marker = missing_marker(paths.local_exists);
        println!("# local:  {}{}", paths.local.display(), marker);
    }
    println!();
    print!("{}", config.to_toml()?);
    Ok(())
}

fn missing_marker(exists: bool) -> &'static str {
    if exists {
        ""
    } else {
        " (not found)"
    }
}

fn execute_init(to_global: bool, force: bool, global: GlobalOptions) -> Result<()> {
    let loader = ConfigLoader::new();

    let path = if to_global {
        if force {
            if let Some(path) = loader.global_config_path() {
                if path.exists() {
                    std::fs::remove_file(&path)
                        .with_context(|| format!("Failed to remove {}", path.display()))?;
                }
            }
        }
        loader.init_global()?
    } else {
        let root = config_root(&global)?;
        if force {
            loader.save_local(&root, &DepGraphConfig::default())?
        } else {
            let path = loader.local_config_path(&root);
            if path.exists() {
                print_info(
                    &format!(
                        "Config already exists at {} (use --force to overwrite)",
                        path.display()
                    ),
                    global.quiet,
                );
                return Ok(());
            }
            loader.init_local(&root)?
        }
    };

    println!("Wrote {}", path.display());
    Ok(())
}
