// src/core/mood.rs — Mood derivation strategies
//
// Mapping step output to a mood label is heuristic by nature, so it sits
// behind a trait and is swapped at executor construction.

use chrono::Utc;

use super::types::{AgentActivity, Mood, MoodState};

/// Derives a mood snapshot from the text an agent just produced.
pub trait MoodStrategy: Send + Sync {
    fn derive(&self, agent_id: &str, output: &str) -> MoodState;
}

/// Default strategy: keyword buckets pick the label, punctuation and hedging
/// density set the intensity. Deterministic for a given input.
#[derive(Default)]
pub struct LexicalMoodStrategy;

const CONFIDENT: &[&str] = &["clearly", "certainly", "definitely", "strongly", "confident"];
const CURIOUS: &[&str] = &["wonder", "curious", "what if", "explore", "interesting"];
const EXCITED: &[&str] = &["excited", "thrilled", "breakthrough", "remarkable", "huge"];
const SKEPTICAL: &[&str] = &["doubt", "skeptical", "unconvinced", "questionable", "however"];
const CONCERNED: &[&str] = &["risk", "concern", "worried", "danger", "careful"];
const FRUSTRATED: &[&str] = &["frustrat", "circular", "stuck", "again and again", "pointless"];

fn bucket_hits(text: &str, bucket: &[&str]) -> usize {
    bucket.iter().filter(|kw| text.contains(*kw)).count()
}

impl MoodStrategy for LexicalMoodStrategy {
    fn derive(&self, agent_id: &str, output: &str) -> MoodState {
        let text = output.to_lowercase();

        let scored = [
            (Mood::Frustrated, bucket_hits(&text, FRUSTRATED)),
            (Mood::Concerned, bucket_hits(&text, CONCERNED)),
            (Mood::Skeptical, bucket_hits(&text, SKEPTICAL)),
            (Mood::Excited, bucket_hits(&text, EXCITED)),
            (Mood::Curious, bucket_hits(&text, CURIOUS)),
            (Mood::Confident, bucket_hits(&text, CONFIDENT)),
        ];
        let (mood, hits) = scored
            .iter()
            .max_by_key(|(_, hits)| *hits)
            .copied()
            .unwrap_or((Mood::Neutral, 0));
        let mood = if hits == 0 { Mood::Neutral } else { mood };

        // Exclamation marks push intensity up; heavy hedging pulls it down.
        let exclamations = text.matches('!').count() as f32;
        let hedges = bucket_hits(&text, &["maybe", "perhaps", "might", "possibly"]) as f32;
        let intensity = (0.3 + hits as f32 * 0.2 + exclamations * 0.1 - hedges * 0.1)
            .clamp(0.0, 1.0);

        MoodState {
            agent_id: agent_id.to_string(),
            mood,
            intensity,
            status: AgentActivity::Spoke,
            updated_at: Utc::now(),
        }
    }
}
