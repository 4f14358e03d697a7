// src/cli/run.rs — Run a meeting chain from a definition file

use std::sync::Arc;
use std::time::Duration;

use crate::api::types::MeetingRequest;
use crate::broadcast::MoodBroadcaster;
use crate::core::cost::CostAccountant;
use crate::core::executor::SequenceExecutor;
use crate::core::registry::RunRegistry;
use crate::core::types::{RunEvent, RunStatus};
use crate::infra::config::Config;
use crate::persist::sqlite::SqliteSink;
use crate::persist::{MemorySink, PersistenceSink};
use crate::provider::openai_compat::OpenAiCompatGateway;
use crate::provider::rates::RateTable;
use crate::report;

/// Wire the engine from config: gateway, registry, broadcaster, ledger.
pub fn build_parts(
    config: &Config,
    sink: Arc<dyn PersistenceSink>,
) -> (
    Arc<SequenceExecutor>,
    Arc<RunRegistry>,
    Arc<MoodBroadcaster>,
    Arc<CostAccountant>,
) {
    let gateway = Arc::new(OpenAiCompatGateway::new(
        &config.providers.endpoints,
        Duration::from_secs(config.engine.call_timeout_secs),
    ));
    let registry = Arc::new(RunRegistry::new());
    let broadcaster = Arc::new(MoodBroadcaster::new(
        config.broadcast.subscriber_capacity,
        Duration::from_secs(config.broadcast.heartbeat_secs),
    ));
    let accountant = Arc::new(CostAccountant::new());
    let executor = Arc::new(SequenceExecutor::new(
        gateway,
        Arc::clone(&registry),
        sink,
        Arc::clone(&broadcaster),
        Arc::clone(&accountant),
        &config.engine,
        RateTable::new(&config.providers.rates_per_1k),
    ));
    (executor, registry, broadcaster, accountant)
}

/// Open the SQLite sink, falling back to in-memory when the database is
/// unavailable. The run still executes; only durability is lost.
pub fn open_sink() -> Arc<dyn PersistenceSink> {
    let db_path = crate::infra::paths::db_path();
    if let Some(parent) = db_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    match SqliteSink::open(&db_path) {
        Ok(sink) => Arc::new(sink),
        Err(e) => {
            tracing::warn!("Could not open database: {e}. Run will not be persisted.");
            Arc::new(MemorySink::new())
        }
    }
}

/// Execute one chain to completion and print the result.
pub async fn run_meeting(
    file: &str,
    config: &Config,
    verbose: bool,
    no_persist: bool,
) -> anyhow::Result<()> {
    let content = std::fs::read_to_string(file)?;
    let request: MeetingRequest = toml::from_str(&content)?;
    let def = request.into_definition()?;
    let total_steps = def.total_steps();

    let sink: Arc<dyn PersistenceSink> = if no_persist {
        Arc::new(MemorySink::new())
    } else {
        open_sink()
    };
    let (executor, registry, _broadcaster, accountant) = build_parts(config, sink);

    let mut events = executor.subscribe_events();
    let handle = executor.start(def).await?;
    let run_id = handle.run_id.clone();
    eprintln!("Meeting {run_id} started ({total_steps} steps)");

    let progress = tokio::spawn({
        let run_id = run_id.clone();
        async move {
            while let Ok(event) = events.recv().await {
                match event {
                    RunEvent::StepCompleted {
                        run_id: id,
                        sequence,
                        iteration,
                        provider,
                        is_synthesis,
                    } if id == run_id => {
                        if is_synthesis {
                            eprintln!("  [{sequence}/{total_steps}] synthesis ({provider})");
                        } else {
                            eprintln!(
                                "  [{sequence}/{total_steps}] round {iteration} ({provider})"
                            );
                        }
                    }
                    RunEvent::StepFailed {
                        run_id: id,
                        sequence,
                        reason,
                    } if id == run_id => {
                        eprintln!("  [{sequence}/{total_steps}] FAILED: {reason}");
                    }
                    RunEvent::RunFinished { run_id: id, .. } if id == run_id => break,
                    _ => {}
                }
            }
        }
    });

    handle.task.await?;
    let _ = progress.await;

    let run = registry
        .run(&run_id)
        .await
        .ok_or_else(|| anyhow::anyhow!("run {run_id} vanished from the registry"))?;
    let steps = registry.steps(&run_id).await.unwrap_or_default();

    if verbose {
        println!("{}", report::render_markdown(&run, &steps));
    } else if let Some(last) = steps.iter().rev().find_map(|s| s.output.as_ref()) {
        println!("{last}");
    }

    eprintln!(
        "Total cost: {} (today: {})",
        accountant.total(&run_id),
        accountant.daily()
    );

    if run.status == RunStatus::Failed {
        anyhow::bail!(
            "meeting failed: {}",
            run.error_reason.as_deref().unwrap_or("unknown")
        );
    }
    if let Some(ref reason) = run.error_reason {
        eprintln!("Warning: {reason}");
    }
    Ok(())
}
