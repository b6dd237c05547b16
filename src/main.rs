//! # cbuild CLI Entry Point
//!
//! `cb [DIR] <command>` loads the project graph rooted at `DIR` (default: current
//! directory) and routes the command to the [`Orchestrator`].

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use cbuild::build::Orchestrator;
use cbuild::config::BuildConfiguration;
use cbuild::toolchain::{ProcessExecutor, probe};

#[derive(Parser)]
#[command(name = "cb")]
#[command(about = "Incremental build orchestrator for C/C++ projects", version = env!("CARGO_PKG_VERSION"))]
#[command(propagate_version = true)]
struct Cli {
    /// Root project directory
    #[arg(default_value = ".")]
    dir: PathBuf,

    #[command(subcommand)]
    command: Commands,

    /// Build configuration name (loads <config-dir>/<NAME>.json)
    #[arg(long, short, global = true)]
    config: Option<String>,

    /// Directory holding configuration files [default: project directory]
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    /// Tool registry file [default: ~/.cbuild/tools.toml, else PATH search]
    #[arg(long, global = true)]
    tools: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the project and its dependencies incrementally
    Compile {
        /// Recompile every source of the root project
        #[arg(long)]
        force: bool,
    },
    /// Clear the root project's outputs and build it from scratch
    Recompile,
    /// Remove the root project's outputs for the configuration
    Clear,
    /// Compile, then run the root executable
    Run,
    /// Start the debugger on the root executable
    Debug,
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_target(false)
        .init();

    match execute(&cli) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("{} {:#}", "x".red(), e);
            std::process::exit(1);
        }
    }
}

fn execute(cli: &Cli) -> Result<i32> {
    let config = load_configuration(cli)?;
    let registry = probe::discover(cli.tools.as_deref()).context("Failed to build tool registry")?;
    let orchestrator = Orchestrator::new(registry, Arc::new(ProcessExecutor));
    let root = cli.dir.as_path();

    match &cli.command {
        Commands::Compile { force } => {
            orchestrator.compile(root, &config, *force)?;
            Ok(0)
        }
        Commands::Recompile => {
            orchestrator.recompile(root, &config)?;
            Ok(0)
        }
        Commands::Clear => {
            orchestrator.clear(root, &config)?;
            Ok(0)
        }
        Commands::Run => {
            orchestrator.compile(root, &config, false)?;
            let code = orchestrator.run(root, &config)?;
            if code != 0 {
                println!("\n{} Process exited with code {}", "!".yellow(), code);
            }
            Ok(code)
        }
        Commands::Debug => Ok(orchestrator.debug(root, &config)?),
    }
}

fn load_configuration(cli: &Cli) -> Result<BuildConfiguration> {
    let Some(name) = &cli.config else {
        tracing::debug!("no configuration given, using defaults");
        return Ok(BuildConfiguration::default());
    };
    let dir: &Path = cli.config_dir.as_deref().unwrap_or(cli.dir.as_path());
    let config = BuildConfiguration::load(dir, name)
        .with_context(|| format!("Failed to load configuration '{name}'"))?;
    tracing::debug!(
        name = %config.name,
        toolchain = %config.toolchain,
        "loaded configuration"
    );
    Ok(config)
}
