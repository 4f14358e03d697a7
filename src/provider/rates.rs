// src/provider/rates.rs — USD rates per 1K tokens

use std::collections::HashMap;

use crate::core::cost::CostUsd;
use crate::provider::KnownProvider;

/// Built-in blended rate per 1K tokens, in micro-USD. Unknown providers are
/// billed at the openai rate so spend is never silently undercounted.
/// Config `[providers.rates_per_1k]` overrides these.
fn builtin_micro_per_1k(provider: &str) -> u64 {
    match KnownProvider::from_id(provider) {
        Some(KnownProvider::OpenAi) => 10_000, // $0.01 / 1K
        Some(KnownProvider::Claude) => 12_000,
        Some(KnownProvider::Gemini) => 5_000,
        // Local models are free
        Some(KnownProvider::Ollama) => 0,
        None => 10_000,
    }
}

/// Rate table resolved from config overrides plus built-in defaults.
#[derive(Debug, Clone, Default)]
pub struct RateTable {
    overrides: HashMap<String, u64>,
}

impl RateTable {
    /// `overrides` maps provider id to USD per 1K tokens.
    pub fn new(overrides: &HashMap<String, f64>) -> Self {
        let overrides = overrides
            .iter()
            .map(|(k, v)| (k.clone(), (v * 1_000_000.0).round().max(0.0) as u64))
            .collect();
        Self { overrides }
    }

    /// Rate per 1K tokens for a provider, as fixed-point micro-USD.
    pub fn rate_per_1k(&self, provider: &str) -> CostUsd {
        let micro = self
            .overrides
            .get(provider)
            .copied()
            .unwrap_or_else(|| builtin_micro_per_1k(provider));
        CostUsd::from_micro(micro)
    }
}
