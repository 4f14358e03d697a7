// src/core/prompt.rs — Step prompt assembly
//
// Sections (in order):
//   1. Persona framing (primary, then secondary if set)
//   2. Devil's-advocate clause
//   3. Meeting objective + supplemental instructions
//   4. Accumulated context — the previous speaker's output, or the previous
//      iteration's closing output when a new iteration starts

use super::chain::{AgentStep, ChainDefinition};

const DEVILS_ADVOCATE_CLAUSE: &str =
    "Play devil's advocate: argue against the prevailing direction of the \
     discussion, even where you privately agree with it.";

/// Build the prompt for one chain step.
///
/// `context` is the accumulated discussion so far: `None` only for the very
/// first step of the run, which receives the initial prompt instead.
pub fn build_step_prompt(def: &ChainDefinition, step: &AgentStep, context: Option<&str>) -> String {
    let mut prompt = String::with_capacity(2048);

    prompt.push_str(step.primary_persona.template());
    prompt.push_str("\n\n");
    if let Some(second) = step.secondary_persona {
        prompt.push_str(second.template());
        prompt.push_str("\n\n");
    }
    if step.devils_advocate {
        prompt.push_str(DEVILS_ADVOCATE_CLAUSE);
        prompt.push_str("\n\n");
    }

    prompt.push_str("# Meeting\n\n");
    if !def.objective.trim().is_empty() {
        prompt.push_str("Objective: ");
        prompt.push_str(&def.objective);
        prompt.push('\n');
    }
    if let Some(ref extra) = step.supplemental_prompt {
        if !extra.trim().is_empty() {
            prompt.push_str(extra);
            prompt.push('\n');
        }
    }
    prompt.push('\n');

    match context {
        Some(prior) => {
            prompt.push_str("# Discussion so far\n\n");
            prompt.push_str(prior);
            prompt.push_str("\n\nRespond to the discussion above.\n");
        }
        None => {
            prompt.push_str("# Topic\n\n");
            prompt.push_str(&def.initial_prompt);
            prompt.push_str("\n\nOpen the discussion.\n");
        }
    }

    prompt
}

/// One completed step's contribution, kept for the synthesis prompt.
#[derive(Debug, Clone)]
pub struct TranscriptEntry {
    pub iteration: u8,
    pub speaker: String,
    pub output: String,
}

/// Build the final synthesis prompt from the full transcript: every step's
/// output, grouped by round, in speaking order.
pub fn build_synthesis_prompt(def: &ChainDefinition, transcript: &[TranscriptEntry]) -> String {
    let mut prompt = String::with_capacity(4096);

    prompt.push_str(
        "You are the meeting secretary. Synthesize the discussion below into a \
         concise report: key positions, points of agreement, open disagreements, \
         and recommended next steps.\n\n",
    );
    prompt.push_str("# Meeting\n\n");
    prompt.push_str(&def.name);
    prompt.push('\n');
    if !def.objective.trim().is_empty() {
        prompt.push_str("Objective: ");
        prompt.push_str(&def.objective);
        prompt.push('\n');
    }
    prompt.push('\n');

    let mut round = 0u8;
    for entry in transcript {
        if entry.iteration != round {
            round = entry.iteration;
            prompt.push_str(&format!("# Round {round}\n\n"));
        }
        prompt.push_str(&format!("## {}\n\n", entry.speaker));
        prompt.push_str(&entry.output);
        prompt.push_str("\n\n");
    }

    prompt
}
