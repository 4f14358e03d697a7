// src/persist/sqlite.rs — SQLite persistence sink
//
// Appends are idempotent: primary keys plus INSERT OR IGNORE make a replayed
// append a no-op. Ordering within a run is the caller's job, not ours.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::Mutex;

use super::PersistenceSink;
use crate::core::cost::{CostLedgerEntry, CostUsd};
use crate::core::types::{ChainStep, MeetingRun, RunStatus, StepStatus};
use crate::infra::errors::RoundtableError;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS runs (
    id              TEXT PRIMARY KEY,
    name            TEXT NOT NULL,
    objective       TEXT NOT NULL DEFAULT '',
    status          TEXT NOT NULL,
    error_reason    TEXT,
    total_cost_micro INTEGER NOT NULL DEFAULT 0,
    definition_json TEXT NOT NULL,
    created_at      TEXT NOT NULL,
    completed_at    TEXT
);

CREATE TABLE IF NOT EXISTS steps (
    id            TEXT PRIMARY KEY,
    run_id        TEXT NOT NULL,
    iteration     INTEGER NOT NULL,
    sequence      INTEGER NOT NULL,
    provider      TEXT NOT NULL,
    persona       TEXT NOT NULL,
    input_prompt  TEXT NOT NULL,
    output        TEXT,
    status        TEXT NOT NULL,
    tokens_used   INTEGER,
    cost_micro    INTEGER,
    latency_ms    INTEGER,
    error_reason  TEXT,
    is_synthesis  INTEGER NOT NULL DEFAULT 0,
    UNIQUE(run_id, sequence)
);

CREATE TABLE IF NOT EXISTS cost_ledger (
    step_id    TEXT PRIMARY KEY,
    run_id     TEXT NOT NULL,
    cost_micro INTEGER NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_steps_run ON steps(run_id, sequence);
CREATE INDEX IF NOT EXISTS idx_ledger_run ON cost_ledger(run_id);
"#;

pub struct SqliteSink {
    conn: Mutex<Connection>,
}

impl SqliteSink {
    pub fn open(path: &Path) -> Result<Self, RoundtableError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self, RoundtableError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, RoundtableError> {
        self.conn
            .lock()
            .map_err(|_| RoundtableError::Persistence("sqlite connection poisoned".into()))
    }

    /// Load a finalized run record.
    pub fn load_run(&self, run_id: &str) -> Result<Option<MeetingRun>, RoundtableError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT definition_json, status, error_reason, total_cost_micro, created_at, completed_at
             FROM runs WHERE id = ?1",
        )?;
        let mut rows = stmt.query(params![run_id])?;
        let Some(row) = rows.next()? else {
            return Ok(None);
        };
        let definition_json: String = row.get(0)?;
        let definition = serde_json::from_str(&definition_json)
            .map_err(|e| RoundtableError::Persistence(format!("corrupt definition: {e}")))?;
        let status: String = row.get(1)?;
        Ok(Some(MeetingRun {
            id: run_id.to_string(),
            definition,
            status: parse_run_status(&status),
            error_reason: row.get(2)?,
            total_cost: CostUsd::from_micro(row.get::<_, i64>(3)?.max(0) as u64),
            created_at: parse_ts(row.get::<_, String>(4)?),
            completed_at: row.get::<_, Option<String>>(5)?.map(parse_ts),
        }))
    }

    /// Ordered step records for a run.
    pub fn load_steps(&self, run_id: &str) -> Result<Vec<ChainStep>, RoundtableError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, iteration, sequence, provider, persona, input_prompt, output,
                    status, tokens_used, cost_micro, latency_ms, error_reason, is_synthesis
             FROM steps WHERE run_id = ?1 ORDER BY sequence ASC",
        )?;
        let rows = stmt.query_map(params![run_id], |row| {
            Ok(ChainStep {
                id: row.get(0)?,
                run_id: run_id.to_string(),
                iteration: row.get::<_, i64>(1)? as u8,
                sequence: row.get::<_, i64>(2)? as u32,
                provider: row.get(3)?,
                persona: row.get(4)?,
                input_prompt: row.get(5)?,
                output: row.get(6)?,
                status: parse_step_status(&row.get::<_, String>(7)?),
                tokens_used: row.get::<_, Option<i64>>(8)?.map(|v| v as u32),
                cost: row
                    .get::<_, Option<i64>>(9)?
                    .map(|v| CostUsd::from_micro(v.max(0) as u64)),
                latency_ms: row.get::<_, Option<i64>>(10)?.map(|v| v as u64),
                error_reason: row.get(11)?,
                is_synthesis: row.get::<_, i64>(12)? != 0,
            })
        })?;
        let mut steps = Vec::new();
        for row in rows {
            steps.push(row?);
        }
        Ok(steps)
    }

    /// Ledger total for entries created on or after the given instant.
    pub fn cost_since(&self, since: DateTime<Utc>) -> Result<CostUsd, RoundtableError> {
        let conn = self.lock()?;
        let total: i64 = conn.query_row(
            "SELECT COALESCE(SUM(cost_micro), 0) FROM cost_ledger WHERE created_at >= ?1",
            params![since.to_rfc3339()],
            |row| row.get(0),
        )?;
        Ok(CostUsd::from_micro(total.max(0) as u64))
    }

    pub fn list_run_ids(&self, limit: usize) -> Result<Vec<String>, RoundtableError> {
        let conn = self.lock()?;
        let mut stmt =
            conn.prepare("SELECT id FROM runs ORDER BY created_at DESC LIMIT ?1")?;
        let rows = stmt.query_map(params![limit as i64], |row| row.get::<_, String>(0))?;
        let mut ids = Vec::new();
        for row in rows {
            ids.push(row?);
        }
        Ok(ids)
    }
}

fn parse_run_status(s: &str) -> RunStatus {
    match s {
        "pending" => RunStatus::Pending,
        "running" => RunStatus::Running,
        "completed" => RunStatus::Completed,
        _ => RunStatus::Failed,
    }
}

fn parse_step_status(s: &str) -> StepStatus {
    match s {
        "pending" => StepStatus::Pending,
        "running" => StepStatus::Running,
        "completed" => StepStatus::Completed,
        _ => StepStatus::Failed,
    }
}

fn parse_ts(s: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

#[async_trait]
impl PersistenceSink for SqliteSink {
    async fn append_step(&self, step: &ChainStep) -> Result<(), RoundtableError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR IGNORE INTO steps
             (id, run_id, iteration, sequence, provider, persona, input_prompt, output,
              status, tokens_used, cost_micro, latency_ms, error_reason, is_synthesis)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![
                step.id,
                step.run_id,
                step.iteration as i64,
                step.sequence as i64,
                step.provider,
                step.persona,
                step.input_prompt,
                step.output,
                step.status.to_string(),
                step.tokens_used.map(|v| v as i64),
                step.cost.map(|c| c.micro() as i64),
                step.latency_ms.map(|v| v as i64),
                step.error_reason,
                step.is_synthesis as i64,
            ],
        )?;
        Ok(())
    }

    async fn append_cost(&self, entry: &CostLedgerEntry) -> Result<(), RoundtableError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR IGNORE INTO cost_ledger (step_id, run_id, cost_micro, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                entry.step_id,
                entry.run_id,
                entry.cost.micro() as i64,
                entry.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    async fn finalize_run(&self, run: &MeetingRun) -> Result<(), RoundtableError> {
        let definition_json = serde_json::to_string(&run.definition)
            .map_err(|e| RoundtableError::Persistence(e.to_string()))?;
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO runs
             (id, name, objective, status, error_reason, total_cost_micro,
              definition_json, created_at, completed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                run.id,
                run.definition.name,
                run.definition.objective,
                run.status.to_string(),
                run.error_reason,
                run.total_cost.micro() as i64,
                definition_json,
                run.created_at.to_rfc3339(),
                run.completed_at.map(|t| t.to_rfc3339()),
            ],
        )?;
        Ok(())
    }
}
