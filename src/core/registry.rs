// src/core/registry.rs — Run registry
//
// Injectable, internally-synchronized table of runs. Every reader (progress
// polls, API handlers, exports) goes through here; the executor is the only
// writer for a given run. Never a module-level singleton.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use super::cost::CostUsd;
use super::types::{ChainStep, MeetingRun, RunProgress, RunStatus, StepStatus};
use crate::infra::errors::RoundtableError;

struct RunEntry {
    run: MeetingRun,
    steps: Vec<ChainStep>,
    progress: RunProgress,
    cancelled: Arc<AtomicBool>,
    /// Persistence failure noted here and surfaced on the next run read.
    pending_error: Option<String>,
}

#[derive(Default)]
pub struct RunRegistry {
    runs: RwLock<HashMap<String, RunEntry>>,
}

impl RunRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a run and return its cancellation flag.
    pub async fn register(&self, run: MeetingRun) -> Arc<AtomicBool> {
        let cancelled = Arc::new(AtomicBool::new(false));
        let progress = RunProgress {
            run_id: run.id.clone(),
            status: run.status,
            iteration: 0,
            sequence: 0,
            steps_completed: 0,
            total_steps: run.definition.total_steps(),
            error_reason: None,
        };
        let entry = RunEntry {
            progress,
            cancelled: cancelled.clone(),
            pending_error: None,
            steps: Vec::new(),
            run,
        };
        self.runs.write().await.insert(entry.run.id.clone(), entry);
        cancelled
    }

    /// Read a run, folding in any pending persistence error.
    pub async fn run(&self, run_id: &str) -> Option<MeetingRun> {
        let runs = self.runs.read().await;
        runs.get(run_id).map(|e| {
            let mut run = e.run.clone();
            if run.error_reason.is_none() {
                run.error_reason = e.pending_error.clone();
            }
            run
        })
    }

    pub async fn progress(&self, run_id: &str) -> Option<RunProgress> {
        let runs = self.runs.read().await;
        runs.get(run_id).map(|e| {
            let mut p = e.progress.clone();
            if p.error_reason.is_none() {
                p.error_reason = e.pending_error.clone();
            }
            p
        })
    }

    /// Ordered step records, sequence-ascending by construction.
    pub async fn steps(&self, run_id: &str) -> Option<Vec<ChainStep>> {
        let runs = self.runs.read().await;
        runs.get(run_id).map(|e| e.steps.clone())
    }

    pub async fn list_runs(&self) -> Vec<MeetingRun> {
        let runs = self.runs.read().await;
        let mut all: Vec<MeetingRun> = runs.values().map(|e| e.run.clone()).collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        all
    }

    pub async fn mark_running(&self, run_id: &str) {
        let mut runs = self.runs.write().await;
        if let Some(e) = runs.get_mut(run_id) {
            e.run.status = RunStatus::Running;
            e.progress.status = RunStatus::Running;
        }
    }

    /// Record the position of the step about to be dispatched.
    pub async fn begin_step(&self, run_id: &str, iteration: u8, sequence: u32) {
        let mut runs = self.runs.write().await;
        if let Some(e) = runs.get_mut(run_id) {
            e.progress.iteration = iteration;
            e.progress.sequence = sequence;
        }
    }

    /// Append a finalized step record.
    pub async fn finish_step(&self, step: ChainStep) {
        let mut runs = self.runs.write().await;
        if let Some(e) = runs.get_mut(&step.run_id) {
            if step.status == StepStatus::Completed {
                e.progress.steps_completed += 1;
            }
            e.steps.push(step);
        }
    }

    pub async fn complete_run(&self, run_id: &str, total_cost: CostUsd) {
        let mut runs = self.runs.write().await;
        if let Some(e) = runs.get_mut(run_id) {
            e.run.status = RunStatus::Completed;
            e.run.total_cost = total_cost;
            e.run.completed_at = Some(chrono::Utc::now());
            e.progress.status = RunStatus::Completed;
        }
    }

    pub async fn fail_run(&self, run_id: &str, reason: &str, total_cost: CostUsd) {
        let mut runs = self.runs.write().await;
        if let Some(e) = runs.get_mut(run_id) {
            e.run.status = RunStatus::Failed;
            e.run.error_reason = Some(reason.to_string());
            e.run.total_cost = total_cost;
            e.run.completed_at = Some(chrono::Utc::now());
            e.progress.status = RunStatus::Failed;
            e.progress.error_reason = Some(reason.to_string());
        }
    }

    /// Note a persistence failure without interrupting the run.
    pub async fn set_pending_error(&self, run_id: &str, message: String) {
        let mut runs = self.runs.write().await;
        if let Some(e) = runs.get_mut(run_id) {
            e.pending_error.get_or_insert(message);
        }
    }

    /// Request cooperative cancellation; checked at step boundaries.
    pub async fn request_cancel(&self, run_id: &str) -> Result<(), RoundtableError> {
        let runs = self.runs.read().await;
        let entry = runs
            .get(run_id)
            .ok_or_else(|| RoundtableError::RunNotFound(run_id.to_string()))?;
        if entry.run.status.is_terminal() {
            return Err(RoundtableError::RunTerminal {
                run_id: run_id.to_string(),
                status: entry.run.status.to_string(),
            });
        }
        entry.cancelled.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::chain::{AgentStep, ChainDefinition, Persona};

    fn definition() -> ChainDefinition {
        ChainDefinition {
            name: "t".into(),
            description: String::new(),
            objective: String::new(),
            initial_prompt: "p".into(),
            steps: vec![AgentStep {
                provider: "openai".into(),
                primary_persona: Persona::Analyst,
                secondary_persona: None,
                devils_advocate: false,
                supplemental_prompt: None,
            }],
            iterations: 2,
            synthesis_provider: None,
        }
    }

    #[tokio::test]
    async fn test_register_and_progress() {
        let reg = RunRegistry::new();
        let run = MeetingRun::new(definition());
        let id = run.id.clone();
        reg.register(run).await;

        let p = reg.progress(&id).await.unwrap();
        assert_eq!(p.total_steps, 2);
        assert_eq!(p.steps_completed, 0);
    }

    #[tokio::test]
    async fn test_finish_step_counts_completed_only() {
        let reg = RunRegistry::new();
        let run = MeetingRun::new(definition());
        let id = run.id.clone();
        reg.register(run).await;

        let mut ok = ChainStep::dispatched(&id, 1, 1, "openai", "analyst".into(), "p".into(), false);
        ok.status = StepStatus::Completed;
        reg.finish_step(ok).await;

        let mut bad =
            ChainStep::dispatched(&id, 1, 2, "openai", "analyst".into(), "p".into(), false);
        bad.status = StepStatus::Failed;
        reg.finish_step(bad).await;

        let p = reg.progress(&id).await.unwrap();
        assert_eq!(p.steps_completed, 1);
        assert_eq!(reg.steps(&id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_cancel_unknown_run() {
        let reg = RunRegistry::new();
        assert!(matches!(
            reg.request_cancel("nope").await,
            Err(RoundtableError::RunNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_cancel_terminal_run_rejected() {
        let reg = RunRegistry::new();
        let run = MeetingRun::new(definition());
        let id = run.id.clone();
        reg.register(run).await;
        reg.complete_run(&id, CostUsd::ZERO).await;
        assert!(matches!(
            reg.request_cancel(&id).await,
            Err(RoundtableError::RunTerminal { .. })
        ));
    }

    #[tokio::test]
    async fn test_cancel_sets_flag() {
        let reg = RunRegistry::new();
        let run = MeetingRun::new(definition());
        let id = run.id.clone();
        let flag = reg.register(run).await;
        reg.mark_running(&id).await;
        reg.request_cancel(&id).await.unwrap();
        assert!(flag.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_pending_error_surfaces_on_read() {
        let reg = RunRegistry::new();
        let run = MeetingRun::new(definition());
        let id = run.id.clone();
        reg.register(run).await;
        reg.set_pending_error(&id, "disk full".into()).await;

        let run = reg.run(&id).await.unwrap();
        assert_eq!(run.error_reason.as_deref(), Some("disk full"));
        // The run itself is not failed by a persistence error
        assert_eq!(run.status, RunStatus::Pending);
    }
}
