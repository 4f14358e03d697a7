// src/cli/export.rs — Export a stored run

use crate::persist::sqlite::SqliteSink;
use crate::report::{self, ReportFormat};

/// Load a finished run from the local database and render it.
pub async fn run_export(run_id: &str, format: &str, output: Option<&str>) -> anyhow::Result<()> {
    let format = ReportFormat::parse(format)?;

    let db_path = crate::infra::paths::db_path();
    if !db_path.exists() {
        anyhow::bail!("No database found. Complete a meeting first to create data.");
    }
    let sink = SqliteSink::open(&db_path)?;

    let run = sink
        .load_run(run_id)?
        .ok_or_else(|| anyhow::anyhow!("Run '{run_id}' not found"))?;
    let steps = sink.load_steps(run_id)?;

    let rendered = report::render(format, &run, &steps)?;

    if let Some(path) = output {
        std::fs::write(path, &rendered)?;
        eprintln!("Exported {} to {}", run_id, path);
    } else {
        println!("{rendered}");
    }
    Ok(())
}
