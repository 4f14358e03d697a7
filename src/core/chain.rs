// src/core/chain.rs — Chain definitions and validation
//
// A ChainDefinition is validated once at construction and never mutated after
// a run starts. Personas are a closed enum: an unknown persona name is
// rejected here, before any step executes.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::infra::errors::RoundtableError;

pub const MAX_CHAIN_LEN: usize = 5;
pub const MAX_ITERATIONS: u8 = 10;

/// Named thinking-style templates applied to an agent's prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Persona {
    Analyst,
    Visionary,
    Pragmatist,
    Skeptic,
    Mediator,
    Historian,
    Futurist,
    Economist,
}

impl Persona {
    pub const ALL: [Persona; 8] = [
        Persona::Analyst,
        Persona::Visionary,
        Persona::Pragmatist,
        Persona::Skeptic,
        Persona::Mediator,
        Persona::Historian,
        Persona::Futurist,
        Persona::Economist,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Persona::Analyst => "analyst",
            Persona::Visionary => "visionary",
            Persona::Pragmatist => "pragmatist",
            Persona::Skeptic => "skeptic",
            Persona::Mediator => "mediator",
            Persona::Historian => "historian",
            Persona::Futurist => "futurist",
            Persona::Economist => "economist",
        }
    }

    /// Prompt framing injected ahead of the discussion context.
    pub fn template(&self) -> &'static str {
        match self {
            Persona::Analyst => {
                "You are a rigorous analyst. Break the question into parts, \
                 quantify what can be quantified, and flag unsupported claims."
            }
            Persona::Visionary => {
                "You are a visionary thinker. Look past present constraints and \
                 describe where this could lead in five years."
            }
            Persona::Pragmatist => {
                "You are a pragmatist. Focus on what can actually be shipped, \
                 by whom, and in what order."
            }
            Persona::Skeptic => {
                "You are a constructive skeptic. Probe the weakest assumptions \
                 and name the failure modes nobody has mentioned."
            }
            Persona::Mediator => {
                "You are a mediator. Reconcile the positions taken so far and \
                 state the strongest shared ground."
            }
            Persona::Historian => {
                "You are a historian of this domain. Relate the discussion to \
                 prior attempts and what they teach."
            }
            Persona::Futurist => {
                "You are a futurist. Extrapolate current trends and describe \
                 second-order effects."
            }
            Persona::Economist => {
                "You are an economist. Weigh costs, incentives, and trade-offs \
                 explicitly."
            }
        }
    }
}

impl FromStr for Persona {
    type Err = RoundtableError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Persona::ALL
            .iter()
            .copied()
            .find(|p| p.label() == s)
            .ok_or_else(|| RoundtableError::validation(format!("unknown persona '{s}'")))
    }
}

impl std::fmt::Display for Persona {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// One agent's slot in the chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentStep {
    pub provider: String,
    pub primary_persona: Persona,
    #[serde(default)]
    pub secondary_persona: Option<Persona>,
    #[serde(default)]
    pub devils_advocate: bool,
    #[serde(default)]
    pub supplemental_prompt: Option<String>,
}

impl AgentStep {
    /// Label shown to observers, e.g. "analyst+skeptic".
    pub fn persona_label(&self) -> String {
        match self.secondary_persona {
            Some(second) => format!("{}+{}", self.primary_persona, second),
            None => self.primary_persona.to_string(),
        }
    }
}

/// Validated description of a run. Immutable once a run starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainDefinition {
    pub name: String,
    /// Free-form notes shown in reports, not fed to any prompt.
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub objective: String,
    pub initial_prompt: String,
    pub steps: Vec<AgentStep>,
    pub iterations: u8,
    #[serde(default)]
    pub synthesis_provider: Option<String>,
}

impl ChainDefinition {
    pub fn validate(&self) -> Result<(), RoundtableError> {
        if self.steps.is_empty() || self.steps.len() > MAX_CHAIN_LEN {
            return Err(RoundtableError::validation(format!(
                "chain length must be 1-{MAX_CHAIN_LEN}, got {}",
                self.steps.len()
            )));
        }
        if self.iterations == 0 || self.iterations > MAX_ITERATIONS {
            return Err(RoundtableError::validation(format!(
                "iterations must be 1-{MAX_ITERATIONS}, got {}",
                self.iterations
            )));
        }
        if self.initial_prompt.trim().is_empty() {
            return Err(RoundtableError::validation("initial prompt is empty"));
        }
        for (i, step) in self.steps.iter().enumerate() {
            if step.provider.trim().is_empty() {
                return Err(RoundtableError::validation(format!(
                    "step {} has an empty provider id",
                    i + 1
                )));
            }
        }
        if let Some(ref p) = self.synthesis_provider {
            if p.trim().is_empty() {
                return Err(RoundtableError::validation("synthesis provider id is empty"));
            }
        }
        Ok(())
    }

    /// Steps in a full run, synthesis included.
    pub fn total_steps(&self) -> u32 {
        let base = self.iterations as u32 * self.steps.len() as u32;
        base + if self.synthesis_provider.is_some() { 1 } else { 0 }
    }
}
