// src/cli/status.rs — Recent runs and spend

use chrono::{Datelike, TimeZone, Utc};

use crate::persist::sqlite::SqliteSink;

pub async fn show_status() -> anyhow::Result<()> {
    println!("roundtable v{}", env!("CARGO_PKG_VERSION"));

    let db_path = crate::infra::paths::db_path();
    if !db_path.exists() {
        println!("No database yet. Run a meeting to create one.");
        return Ok(());
    }
    let sink = SqliteSink::open(&db_path)?;

    let now = Utc::now();
    let day_start = now
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .map(|dt| Utc.from_utc_datetime(&dt))
        .unwrap_or(now);
    let month_start = now
        .date_naive()
        .with_day(1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| Utc.from_utc_datetime(&dt))
        .unwrap_or(now);

    println!(
        "Spend: {} today, {} this month",
        sink.cost_since(day_start)?,
        sink.cost_since(month_start)?
    );
    println!();

    let run_ids = sink.list_run_ids(10)?;
    if run_ids.is_empty() {
        println!("No runs recorded.");
        return Ok(());
    }

    println!("Recent runs:");
    for id in run_ids {
        if let Some(run) = sink.load_run(&id)? {
            println!(
                "  {}  {:<9}  {}  {}",
                run.id,
                run.status.to_string(),
                run.total_cost,
                run.definition.name
            );
        }
    }
    Ok(())
}
