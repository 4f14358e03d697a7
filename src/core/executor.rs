// src/core/executor.rs — Sequence executor
//
// Drives a validated ChainDefinition through the provider gateway: strictly
// sequential steps within a run (step N's prompt depends on step N-1's
// output), any number of runs concurrently. Each run is one tokio task.
// Cancellation is cooperative and checked at step boundaries only; in-flight
// calls are bounded by the gateway's own per-call timeout.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use super::chain::ChainDefinition;
use super::cost::{step_cost, CostAccountant, CostLedgerEntry};
use super::mood::{LexicalMoodStrategy, MoodStrategy};
use super::prompt::{build_step_prompt, build_synthesis_prompt, TranscriptEntry};
use super::registry::RunRegistry;
use super::types::{ChainStep, MeetingRun, RunEvent, RunProgress, RunStatus, StepStatus};
use crate::broadcast::MoodBroadcaster;
use crate::infra::config::EngineConfig;
use crate::infra::errors::RoundtableError;
use crate::persist::PersistenceSink;
use crate::provider::rates::RateTable;
use crate::provider::retry::{RetryGateway, RetryPolicy, TimeoutGateway};
use crate::provider::ProviderGateway;

pub const CANCELLED_REASON: &str = "cancelled";

/// Handle returned by `start`: the run id plus the driving task.
#[derive(Debug)]
pub struct RunHandle {
    pub run_id: String,
    pub task: JoinHandle<()>,
}

pub struct SequenceExecutor {
    /// Retry-and-timeout wrapped gateway; the raw gateway never sees retries.
    gateway: Arc<dyn ProviderGateway>,
    registry: Arc<RunRegistry>,
    sink: Arc<dyn PersistenceSink>,
    broadcaster: Arc<MoodBroadcaster>,
    accountant: Arc<CostAccountant>,
    mood: Arc<dyn MoodStrategy>,
    rates: RateTable,
    max_tokens: u32,
    events: broadcast::Sender<RunEvent>,
}

impl SequenceExecutor {
    pub fn new(
        gateway: Arc<dyn ProviderGateway>,
        registry: Arc<RunRegistry>,
        sink: Arc<dyn PersistenceSink>,
        broadcaster: Arc<MoodBroadcaster>,
        accountant: Arc<CostAccountant>,
        config: &EngineConfig,
        rates: RateTable,
    ) -> Self {
        let timeout = Duration::from_secs(config.call_timeout_secs);
        let bounded = Arc::new(TimeoutGateway::new(gateway, timeout));
        let policy = RetryPolicy::from_ms(config.max_retries, &config.retry_backoff_ms);
        let gateway: Arc<dyn ProviderGateway> =
            Arc::new(RetryGateway::with_policy(bounded, policy));
        let (events, _) = broadcast::channel(256);
        Self {
            gateway,
            registry,
            sink,
            broadcaster,
            accountant,
            mood: Arc::new(LexicalMoodStrategy),
            rates,
            max_tokens: config.max_tokens,
            events,
        }
    }

    /// Swap the mood derivation heuristic.
    pub fn with_mood_strategy(mut self, strategy: Arc<dyn MoodStrategy>) -> Self {
        self.mood = strategy;
        self
    }

    /// Validate and launch a run. Rejects on a malformed chain before
    /// anything is registered; on success the run is already `running`
    /// and visible in the registry when this returns.
    pub async fn start(self: &Arc<Self>, def: ChainDefinition) -> Result<RunHandle, RoundtableError> {
        def.validate()?;

        let run = MeetingRun::new(def.clone());
        let run_id = run.id.clone();
        let cancelled = self.registry.register(run).await;
        self.registry.mark_running(&run_id).await;

        let executor = Arc::clone(self);
        let task = tokio::spawn({
            let run_id = run_id.clone();
            async move {
                executor.execute_run(&run_id, def, cancelled).await;
            }
        });

        tracing::info!(run_id, "meeting run started");
        Ok(RunHandle { run_id, task })
    }

    pub async fn cancel(&self, run_id: &str) -> Result<(), RoundtableError> {
        self.registry.request_cancel(run_id).await?;
        tracing::info!(run_id, "cancellation requested");
        Ok(())
    }

    pub async fn progress(&self, run_id: &str) -> Option<RunProgress> {
        self.registry.progress(run_id).await
    }

    pub async fn run(&self, run_id: &str) -> Option<MeetingRun> {
        self.registry.run(run_id).await
    }

    pub async fn steps(&self, run_id: &str) -> Option<Vec<ChainStep>> {
        self.registry.steps(run_id).await
    }

    /// Typed step/run notifications for observers.
    pub fn subscribe_events(&self) -> broadcast::Receiver<RunEvent> {
        self.events.subscribe()
    }

    async fn execute_run(&self, run_id: &str, def: ChainDefinition, cancelled: Arc<AtomicBool>) {
        let agent_ids: Vec<String> = (1..=def.steps.len())
            .map(|i| format!("agent-{i}"))
            .collect();
        self.broadcaster.init_meeting(run_id, &agent_ids).await;

        let mut sequence = 0u32;
        let mut context: Option<String> = None;
        let mut transcript: Vec<TranscriptEntry> = Vec::new();

        for iteration in 1..=def.iterations {
            for (idx, agent) in def.steps.iter().enumerate() {
                if cancelled.load(Ordering::SeqCst) {
                    self.finish_failed(run_id, CANCELLED_REASON).await;
                    return;
                }
                sequence += 1;
                self.registry.begin_step(run_id, iteration, sequence).await;

                let prompt = build_step_prompt(&def, agent, context.as_deref());
                let step = ChainStep::dispatched(
                    run_id,
                    iteration,
                    sequence,
                    &agent.provider,
                    agent.persona_label(),
                    prompt.clone(),
                    false,
                );

                match self.dispatch(step, &prompt).await {
                    Ok(output) => {
                        let agent_id = format!("agent-{}", idx + 1);
                        let mood = self.mood.derive(&agent_id, &output);
                        self.broadcaster.publish(run_id, mood).await;
                        transcript.push(TranscriptEntry {
                            iteration,
                            speaker: agent.persona_label(),
                            output: output.clone(),
                        });
                        context = Some(output);
                    }
                    Err(reason) => {
                        self.finish_failed(run_id, &reason).await;
                        return;
                    }
                }
            }
        }

        if let Some(ref provider) = def.synthesis_provider {
            if cancelled.load(Ordering::SeqCst) {
                self.finish_failed(run_id, CANCELLED_REASON).await;
                return;
            }
            sequence += 1;
            self.registry
                .begin_step(run_id, def.iterations, sequence)
                .await;

            let prompt = build_synthesis_prompt(&def, &transcript);
            let step = ChainStep::dispatched(
                run_id,
                def.iterations,
                sequence,
                provider,
                "synthesis".into(),
                prompt.clone(),
                true,
            );

            match self.dispatch(step, &prompt).await {
                Ok(output) => {
                    let mood = self.mood.derive("synthesis", &output);
                    self.broadcaster.publish(run_id, mood).await;
                }
                Err(reason) => {
                    self.finish_failed(run_id, &reason).await;
                    return;
                }
            }
        }

        let total = self.accountant.total(run_id);
        self.registry.complete_run(run_id, total).await;
        self.persist_final(run_id).await;
        let _ = self.events.send(RunEvent::RunFinished {
            run_id: run_id.to_string(),
            status: RunStatus::Completed,
        });
        self.broadcaster.retire(run_id).await;
        tracing::info!(run_id, total_cost = %total, "meeting run completed");
    }

    /// Execute one step through the (already retry-wrapped) gateway and
    /// finalize its record. Returns the output on success, the failure
    /// reason once retries are exhausted.
    async fn dispatch(&self, mut step: ChainStep, prompt: &str) -> Result<String, String> {
        let run_id = step.run_id.clone();
        let provider = step.provider.clone();

        match self
            .gateway
            .call(&provider, prompt, Some(self.max_tokens))
            .await
        {
            Ok(reply) => {
                let cost = step_cost(reply.tokens_used, self.rates.rate_per_1k(&provider));
                step.status = StepStatus::Completed;
                step.output = Some(reply.content.clone());
                step.tokens_used = Some(reply.tokens_used);
                step.cost = Some(cost);
                step.latency_ms = Some(reply.latency.as_millis() as u64);

                let entry = CostLedgerEntry {
                    run_id: run_id.clone(),
                    step_id: step.id.clone(),
                    cost,
                    created_at: chrono::Utc::now(),
                };
                self.accountant.append(entry.clone());

                if let Err(e) = self.sink.append_step(&step).await {
                    self.note_persistence_error(&run_id, &e).await;
                }
                if let Err(e) = self.sink.append_cost(&entry).await {
                    self.note_persistence_error(&run_id, &e).await;
                }

                let _ = self.events.send(RunEvent::StepCompleted {
                    run_id: run_id.clone(),
                    sequence: step.sequence,
                    iteration: step.iteration,
                    provider: provider.clone(),
                    is_synthesis: step.is_synthesis,
                });
                tracing::debug!(
                    run_id,
                    sequence = step.sequence,
                    provider,
                    tokens = reply.tokens_used,
                    "step completed"
                );
                self.registry.finish_step(step).await;
                Ok(reply.content)
            }
            Err(e) => {
                let reason = e.to_string();
                step.status = StepStatus::Failed;
                step.error_reason = Some(reason.clone());

                if let Err(pe) = self.sink.append_step(&step).await {
                    self.note_persistence_error(&run_id, &pe).await;
                }
                let _ = self.events.send(RunEvent::StepFailed {
                    run_id: run_id.clone(),
                    sequence: step.sequence,
                    reason: reason.clone(),
                });
                tracing::warn!(run_id, sequence = step.sequence, provider, "step failed: {reason}");
                self.registry.finish_step(step).await;
                Err(reason)
            }
        }
    }

    async fn finish_failed(&self, run_id: &str, reason: &str) {
        let total = self.accountant.total(run_id);
        self.registry.fail_run(run_id, reason, total).await;
        self.persist_final(run_id).await;
        let _ = self.events.send(RunEvent::RunFinished {
            run_id: run_id.to_string(),
            status: RunStatus::Failed,
        });
        self.broadcaster.retire(run_id).await;
        tracing::warn!(run_id, reason, "meeting run failed");
    }

    async fn persist_final(&self, run_id: &str) {
        if let Some(run) = self.registry.run(run_id).await {
            if let Err(e) = self.sink.finalize_run(&run).await {
                self.note_persistence_error(run_id, &e).await;
            }
        }
    }

    /// Persistence failures degrade the run, never abort it.
    async fn note_persistence_error(&self, run_id: &str, error: &RoundtableError) {
        tracing::warn!(run_id, "persistence degraded: {error}");
        self.registry
            .set_pending_error(run_id, format!("persistence degraded: {error}"))
            .await;
    }
}
