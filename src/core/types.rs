// src/core/types.rs — Core domain types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::chain::ChainDefinition;
use super::cost::CostUsd;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Failed)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RunStatus::Pending => "pending",
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            StepStatus::Pending => "pending",
            StepStatus::Running => "running",
            StepStatus::Completed => "completed",
            StepStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// One full execution of a ChainDefinition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeetingRun {
    pub id: String,
    pub definition: ChainDefinition,
    pub status: RunStatus,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub total_cost: CostUsd,
    pub error_reason: Option<String>,
}

impl MeetingRun {
    pub fn new(definition: ChainDefinition) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            definition,
            status: RunStatus::Pending,
            created_at: Utc::now(),
            completed_at: None,
            total_cost: CostUsd::ZERO,
            error_reason: None,
        }
    }
}

/// A single executed unit: one agent invocation, or the final synthesis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainStep {
    pub id: String,
    pub run_id: String,
    pub iteration: u8,
    /// Strictly increasing within the run; synthesis carries the highest.
    pub sequence: u32,
    pub provider: String,
    pub persona: String,
    pub input_prompt: String,
    pub output: Option<String>,
    pub status: StepStatus,
    pub tokens_used: Option<u32>,
    pub cost: Option<CostUsd>,
    pub latency_ms: Option<u64>,
    pub error_reason: Option<String>,
    pub is_synthesis: bool,
}

impl ChainStep {
    pub fn dispatched(
        run_id: &str,
        iteration: u8,
        sequence: u32,
        provider: &str,
        persona: String,
        input_prompt: String,
        is_synthesis: bool,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            run_id: run_id.to_string(),
            iteration,
            sequence,
            provider: provider.to_string(),
            persona,
            input_prompt,
            output: None,
            status: StepStatus::Running,
            tokens_used: None,
            cost: None,
            latency_ms: None,
            error_reason: None,
            is_synthesis,
        }
    }
}

/// Live, single-valued-per-agent emotional/status label.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MoodState {
    pub agent_id: String,
    pub mood: Mood,
    /// In [0, 1].
    pub intensity: f32,
    pub status: AgentActivity,
    pub updated_at: DateTime<Utc>,
}

impl MoodState {
    pub fn neutral(agent_id: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            mood: Mood::Neutral,
            intensity: 0.0,
            status: AgentActivity::Idle,
            updated_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mood {
    Neutral,
    Confident,
    Curious,
    Excited,
    Skeptical,
    Concerned,
    Frustrated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentActivity {
    Idle,
    Thinking,
    Spoke,
    Done,
}

/// Snapshot returned by the executor's progress query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunProgress {
    pub run_id: String,
    pub status: RunStatus,
    pub iteration: u8,
    pub sequence: u32,
    pub steps_completed: u32,
    pub total_steps: u32,
    pub error_reason: Option<String>,
}

/// Typed notifications emitted by the executor for observers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunEvent {
    StepCompleted {
        run_id: String,
        sequence: u32,
        iteration: u8,
        provider: String,
        is_synthesis: bool,
    },
    StepFailed {
        run_id: String,
        sequence: u32,
        reason: String,
    },
    RunFinished {
        run_id: String,
        status: RunStatus,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::chain::{AgentStep, Persona};

    fn tiny_definition() -> ChainDefinition {
        ChainDefinition {
            name: "t".into(),
            description: String::new(),
            objective: "o".into(),
            initial_prompt: "p".into(),
            steps: vec![AgentStep {
                provider: "openai".into(),
                primary_persona: Persona::Analyst,
                secondary_persona: None,
                devils_advocate: false,
                supplemental_prompt: None,
            }],
            iterations: 1,
            synthesis_provider: None,
        }
    }

    #[test]
    fn test_new_run_is_pending() {
        let run = MeetingRun::new(tiny_definition());
        assert_eq!(run.status, RunStatus::Pending);
        assert!(run.completed_at.is_none());
        assert_eq!(run.total_cost, CostUsd::ZERO);
    }

    #[test]
    fn test_terminal_states() {
        assert!(!RunStatus::Pending.is_terminal());
        assert!(!RunStatus::Running.is_terminal());
        assert!(RunStatus::Completed.is_terminal());
        assert!(RunStatus::Failed.is_terminal());
    }

    #[test]
    fn test_dispatched_step_is_running() {
        let s = ChainStep::dispatched("r", 1, 1, "openai", "analyst".into(), "hi".into(), false);
        assert_eq!(s.status, StepStatus::Running);
        assert!(s.output.is_none());
        assert!(!s.is_synthesis);
    }

    #[test]
    fn test_neutral_mood() {
        let m = MoodState::neutral("agent-1");
        assert_eq!(m.mood, Mood::Neutral);
        assert_eq!(m.intensity, 0.0);
        assert_eq!(m.status, AgentActivity::Idle);
    }

    #[test]
    fn test_run_event_serializes_tagged() {
        let e = RunEvent::RunFinished {
            run_id: "r1".into(),
            status: RunStatus::Completed,
        };
        let json = serde_json::to_string(&e).unwrap();
        assert!(json.contains("\"type\":\"run_finished\""));
        assert!(json.contains("\"completed\""));
    }
}
