// src/cli/mod.rs — CLI definition (clap derive)

pub mod export;
pub mod run;
pub mod status;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "roundtable", about = "Multi-agent meeting orchestrator", version)]
pub struct Cli {
    /// Config file path
    #[arg(long)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a meeting chain from a TOML definition file
    Run {
        /// Path to the chain definition (TOML)
        file: String,
        /// Print each agent's output as it completes
        #[arg(short, long)]
        verbose: bool,
        /// Skip the local database, keep the run in memory only
        #[arg(long)]
        no_persist: bool,
    },
    /// Start the HTTP API server
    Serve {
        /// Override the configured port
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Export a stored run
    Export {
        /// Run id to export
        run_id: String,
        /// Output format (markdown, html, json, csv)
        #[arg(long, default_value = "markdown")]
        format: String,
        /// Output file path (defaults to stdout)
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Show recent runs and spend
    Status,
}
