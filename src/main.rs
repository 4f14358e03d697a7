// src/main.rs — Roundtable entry point

use clap::Parser;

use roundtable::api::{self, ApiState};
use roundtable::cli::{run as cli_run, Cli, Commands};
use roundtable::infra::config::Config;
use roundtable::infra::logger;

#[tokio::main]
async fn main() {
    // Initialize logging (respects RUST_LOG / ROUNDTABLE_LOG)
    logger::init_logging("warn");

    if let Err(e) = run().await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load config (falls back to defaults if no config.toml)
    let config = if let Some(ref path) = cli.config {
        Config::load_from(std::path::Path::new(path))?
    } else {
        Config::load()?
    };

    match cli.command {
        Commands::Run {
            file,
            verbose,
            no_persist,
        } => cli_run::run_meeting(&file, &config, verbose, no_persist).await,
        Commands::Serve { port } => serve(&config, port).await,
        Commands::Export {
            run_id,
            format,
            output,
        } => roundtable::cli::export::run_export(&run_id, &format, output.as_deref()).await,
        Commands::Status => roundtable::cli::status::show_status().await,
    }
}

async fn serve(config: &Config, port: Option<u16>) -> anyhow::Result<()> {
    let sink = cli_run::open_sink();
    let (executor, registry, broadcaster, accountant) = cli_run::build_parts(config, sink);

    let state = ApiState {
        executor,
        registry,
        broadcaster,
        accountant,
        token: config.api.token.clone(),
    };

    let mut api_config = config.api.clone();
    if let Some(port) = port {
        api_config.port = port;
    }
    api::start_server(&api_config, state).await
}
