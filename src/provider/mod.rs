// src/provider/mod.rs — Provider gateway layer

pub mod openai_compat;
pub mod rates;
pub mod retry;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::infra::errors::RoundtableError;

/// The single call contract the executor consumes. One interface covers every
/// provider; the executor never inspects provider-specific details.
#[async_trait]
pub trait ProviderGateway: Send + Sync {
    async fn call(
        &self,
        provider: &str,
        prompt: &str,
        max_tokens: Option<u32>,
    ) -> Result<ProviderReply, RoundtableError>;
}

/// Result of one completed provider call.
#[derive(Debug, Clone)]
pub struct ProviderReply {
    pub content: String,
    pub tokens_used: u32,
    pub latency: Duration,
}

/// Known provider identifiers. Free-form strings are still accepted by the
/// gateway; this enum exists for the built-in rate table and display names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KnownProvider {
    OpenAi,
    Claude,
    Gemini,
    Ollama,
}

impl KnownProvider {
    pub fn from_id(id: &str) -> Option<Self> {
        match id {
            "openai" => Some(Self::OpenAi),
            "claude" | "anthropic" => Some(Self::Claude),
            "gemini" | "google" => Some(Self::Gemini),
            "ollama" => Some(Self::Ollama),
            _ => None,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::OpenAi => "OpenAI",
            Self::Claude => "Claude",
            Self::Gemini => "Gemini",
            Self::Ollama => "Ollama",
        }
    }
}
