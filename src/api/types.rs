// src/api/types.rs

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::core::chain::{AgentStep, ChainDefinition, Persona};
use crate::infra::errors::RoundtableError;

/// Request body for starting a meeting. Personas arrive as strings and are
/// validated against the closed set before anything executes.
#[derive(Debug, Clone, Deserialize)]
pub struct MeetingRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub objective: String,
    pub initial_prompt: String,
    pub steps: Vec<StepRequest>,
    #[serde(default = "default_iterations")]
    pub iterations: u8,
    #[serde(default)]
    pub synthesis_provider: Option<String>,
    /// Accepted for compatibility; folder context injection is handled by an
    /// external document store, so the ids are not expanded here.
    #[serde(default)]
    pub selected_folders: Vec<String>,
}

fn default_iterations() -> u8 {
    1
}

#[derive(Debug, Clone, Deserialize)]
pub struct StepRequest {
    pub provider: String,
    pub persona: String,
    #[serde(default)]
    pub secondary_persona: Option<String>,
    #[serde(default)]
    pub devils_advocate: bool,
    #[serde(default)]
    pub supplemental_prompt: Option<String>,
}

impl MeetingRequest {
    pub fn into_definition(self) -> Result<ChainDefinition, RoundtableError> {
        if !self.selected_folders.is_empty() {
            tracing::debug!(
                folders = self.selected_folders.len(),
                "selected_folders accepted but not expanded; no document store is attached"
            );
        }
        let mut steps = Vec::with_capacity(self.steps.len());
        for step in self.steps {
            let secondary = match step.secondary_persona {
                Some(ref s) => Some(Persona::from_str(s)?),
                None => None,
            };
            steps.push(AgentStep {
                provider: step.provider,
                primary_persona: Persona::from_str(&step.persona)?,
                secondary_persona: secondary,
                devils_advocate: step.devils_advocate,
                supplemental_prompt: step.supplemental_prompt,
            });
        }
        let def = ChainDefinition {
            name: self.name,
            description: self.description,
            objective: self.objective,
            initial_prompt: self.initial_prompt,
            steps,
            iterations: self.iterations,
            synthesis_provider: self.synthesis_provider,
        };
        def.validate()?;
        Ok(def)
    }
}

/// Response for meeting creation.
#[derive(Debug, Serialize)]
pub struct MeetingCreatedResponse {
    pub run_id: String,
    pub status: String,
    pub total_steps: u32,
}

/// Cost summary response.
#[derive(Debug, Serialize)]
pub struct CostSummaryResponse {
    pub daily_usd: f64,
    pub monthly_usd: f64,
    pub ledger_entries: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
