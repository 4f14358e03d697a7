// src/provider/openai_compat.rs — OpenAI-compatible HTTP gateway
//
// One adapter covers every provider that speaks the /chat/completions shape
// (OpenAI itself, plus proxies exposing Claude, Gemini, and local models).
// Endpoint and credentials are resolved per provider id from config.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::{Duration, Instant};

use super::{ProviderGateway, ProviderReply};
use crate::infra::errors::RoundtableError;

#[derive(Debug)]
struct Endpoint {
    base_url: String,
    api_key: String,
    model: String,
}

/// HTTP gateway for OpenAI-compatible chat APIs.
pub struct OpenAiCompatGateway {
    client: reqwest::Client,
    endpoints: HashMap<String, Endpoint>,
    call_timeout: Duration,
}

impl OpenAiCompatGateway {
    /// `endpoints` maps provider id to `base_url` (e.g. "https://api.openai.com/v1").
    /// API keys come from `<PROVIDER>_API_KEY` environment variables; the model
    /// name may be appended to the base URL after a `#`.
    pub fn new(endpoints: &HashMap<String, String>, call_timeout: Duration) -> Self {
        let endpoints = endpoints
            .iter()
            .map(|(id, url)| {
                let (base_url, model) = match url.split_once('#') {
                    Some((u, m)) => (u.to_string(), m.to_string()),
                    None => (url.clone(), "gpt-4o-mini".to_string()),
                };
                let key_var = format!("{}_API_KEY", id.to_uppercase());
                let api_key = std::env::var(&key_var).unwrap_or_default();
                (
                    id.clone(),
                    Endpoint {
                        base_url,
                        api_key,
                        model,
                    },
                )
            })
            .collect();
        Self {
            client: reqwest::Client::new(),
            endpoints,
            call_timeout,
        }
    }

    fn endpoint(&self, provider: &str) -> Result<&Endpoint, RoundtableError> {
        self.endpoints
            .get(provider)
            .ok_or_else(|| RoundtableError::Provider {
                provider: provider.into(),
                message: format!("no endpoint configured for '{provider}'"),
                transient: false,
            })
    }
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: String,
}

#[derive(Deserialize, Default)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

#[async_trait]
impl ProviderGateway for OpenAiCompatGateway {
    async fn call(
        &self,
        provider: &str,
        prompt: &str,
        max_tokens: Option<u32>,
    ) -> Result<ProviderReply, RoundtableError> {
        let ep = self.endpoint(provider)?;
        let url = format!("{}/chat/completions", ep.base_url);
        let body = serde_json::json!({
            "model": ep.model,
            "messages": [{"role": "user", "content": prompt}],
            "max_tokens": max_tokens,
        });

        let started = Instant::now();
        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", ep.api_key))
            .header(
                "User-Agent",
                format!("roundtable/{}", env!("CARGO_PKG_VERSION")),
            )
            .timeout(self.call_timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    RoundtableError::ProviderTimeout {
                        provider: provider.into(),
                        timeout_secs: self.call_timeout.as_secs(),
                    }
                } else {
                    RoundtableError::Provider {
                        provider: provider.into(),
                        message: format!("request failed: {e}"),
                        transient: true,
                    }
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            // 5xx and 429 are worth retrying; 4xx means the request itself is bad
            let transient = status.is_server_error() || status.as_u16() == 429;
            return Err(RoundtableError::Provider {
                provider: provider.into(),
                message: format!("HTTP {status}: {text}"),
                transient,
            });
        }

        let parsed: ChatCompletionResponse =
            response.json().await.map_err(|e| RoundtableError::Provider {
                provider: provider.into(),
                message: format!("malformed response: {e}"),
                transient: false,
            })?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .unwrap_or_default();
        let usage = parsed.usage.unwrap_or_default();

        Ok(ProviderReply {
            content,
            tokens_used: usage.prompt_tokens + usage.completion_tokens,
            latency: started.elapsed(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_missing_provider() {
        let gw = OpenAiCompatGateway::new(&HashMap::new(), Duration::from_secs(60));
        let err = gw.endpoint("openai").unwrap_err();
        assert!(!err.is_transient());
    }

    #[test]
    fn test_endpoint_model_suffix() {
        let mut eps = HashMap::new();
        eps.insert(
            "openai".to_string(),
            "https://api.openai.com/v1#gpt-4.1-mini".to_string(),
        );
        let gw = OpenAiCompatGateway::new(&eps, Duration::from_secs(60));
        let ep = gw.endpoint("openai").unwrap();
        assert_eq!(ep.base_url, "https://api.openai.com/v1");
        assert_eq!(ep.model, "gpt-4.1-mini");
    }

    #[test]
    fn test_usage_parses_with_missing_fields() {
        let parsed: ChatCompletionResponse = serde_json::from_str(
            r#"{"choices":[{"message":{"content":"hi"}}]}"#,
        )
        .unwrap();
        assert!(parsed.usage.is_none());
        assert_eq!(parsed.choices[0].message.content, "hi");
    }
}
