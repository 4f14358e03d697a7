// src/persist/mod.rs — Persistence sink contract
//
// The executor is the only writer and preserves append order per run; the
// sink only promises durability and idempotence (duplicate ids are ignored,
// so a replayed append is safe).

pub mod sqlite;

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::core::cost::CostLedgerEntry;
use crate::core::types::{ChainStep, MeetingRun};
use crate::infra::errors::RoundtableError;

#[async_trait]
pub trait PersistenceSink: Send + Sync {
    async fn append_step(&self, step: &ChainStep) -> Result<(), RoundtableError>;
    async fn append_cost(&self, entry: &CostLedgerEntry) -> Result<(), RoundtableError>;
    async fn finalize_run(&self, run: &MeetingRun) -> Result<(), RoundtableError>;
}

/// In-memory sink. Backs tests and degraded mode when no database is wanted.
#[derive(Default)]
pub struct MemorySink {
    steps: Mutex<Vec<ChainStep>>,
    ledger: Mutex<Vec<CostLedgerEntry>>,
    runs: Mutex<HashMap<String, MeetingRun>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn steps(&self, run_id: &str) -> Vec<ChainStep> {
        self.steps
            .lock()
            .map(|s| s.iter().filter(|x| x.run_id == run_id).cloned().collect())
            .unwrap_or_default()
    }

    pub fn ledger_len(&self) -> usize {
        self.ledger.lock().map(|l| l.len()).unwrap_or(0)
    }

    pub fn finalized_run(&self, run_id: &str) -> Option<MeetingRun> {
        self.runs.lock().ok()?.get(run_id).cloned()
    }
}

#[async_trait]
impl PersistenceSink for MemorySink {
    async fn append_step(&self, step: &ChainStep) -> Result<(), RoundtableError> {
        let mut steps = self
            .steps
            .lock()
            .map_err(|_| RoundtableError::Persistence("step store poisoned".into()))?;
        if !steps.iter().any(|s| s.id == step.id) {
            steps.push(step.clone());
        }
        Ok(())
    }

    async fn append_cost(&self, entry: &CostLedgerEntry) -> Result<(), RoundtableError> {
        let mut ledger = self
            .ledger
            .lock()
            .map_err(|_| RoundtableError::Persistence("ledger store poisoned".into()))?;
        if !ledger.iter().any(|e| e.step_id == entry.step_id) {
            ledger.push(entry.clone());
        }
        Ok(())
    }

    async fn finalize_run(&self, run: &MeetingRun) -> Result<(), RoundtableError> {
        let mut runs = self
            .runs
            .lock()
            .map_err(|_| RoundtableError::Persistence("run store poisoned".into()))?;
        runs.insert(run.id.clone(), run.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::cost::CostUsd;

    fn step(id: &str) -> ChainStep {
        let mut s =
            ChainStep::dispatched("run-1", 1, 1, "openai", "analyst".into(), "p".into(), false);
        s.id = id.into();
        s
    }

    #[tokio::test]
    async fn test_append_step_dedup() {
        let sink = MemorySink::new();
        sink.append_step(&step("a")).await.unwrap();
        sink.append_step(&step("a")).await.unwrap();
        assert_eq!(sink.steps("run-1").len(), 1);
    }

    #[tokio::test]
    async fn test_append_cost_dedup() {
        let sink = MemorySink::new();
        let entry = CostLedgerEntry {
            run_id: "run-1".into(),
            step_id: "s1".into(),
            cost: CostUsd::from_micro(100),
            created_at: chrono::Utc::now(),
        };
        sink.append_cost(&entry).await.unwrap();
        sink.append_cost(&entry).await.unwrap();
        assert_eq!(sink.ledger_len(), 1);
    }
}
