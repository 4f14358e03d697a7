// src/provider/retry.rs — Retry with backoff for provider gateways
//
// Wraps any ProviderGateway with automatic retry on transient failures.
// Retries: timeouts, 5xx-equivalent errors. Does NOT retry: bad credentials,
// content-policy rejections, malformed requests.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::{ProviderGateway, ProviderReply};
use crate::infra::errors::RoundtableError;

/// Retry behavior: fixed per-attempt delays rather than an unbounded
/// exponential curve, so a failing step resolves within seconds.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff: Vec<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            backoff: vec![Duration::from_secs(1), Duration::from_secs(3)],
        }
    }
}

impl RetryPolicy {
    pub fn from_ms(max_retries: u32, backoff_ms: &[u64]) -> Self {
        Self {
            max_retries,
            backoff: backoff_ms.iter().map(|ms| Duration::from_millis(*ms)).collect(),
        }
    }

    /// Delay before retry `attempt` (0-indexed). Falls back to the last
    /// configured delay when attempts outnumber configured slots.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.backoff
            .get(attempt as usize)
            .or_else(|| self.backoff.last())
            .copied()
            .unwrap_or(Duration::from_secs(1))
    }
}

/// Bounds each individual attempt. Sits inside the retry wrapper so the
/// per-call timeout stays independent of the inter-retry backoff.
pub struct TimeoutGateway {
    inner: Arc<dyn ProviderGateway>,
    timeout: Duration,
}

impl TimeoutGateway {
    pub fn new(inner: Arc<dyn ProviderGateway>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }
}

#[async_trait]
impl ProviderGateway for TimeoutGateway {
    async fn call(
        &self,
        provider: &str,
        prompt: &str,
        max_tokens: Option<u32>,
    ) -> Result<ProviderReply, RoundtableError> {
        match tokio::time::timeout(self.timeout, self.inner.call(provider, prompt, max_tokens))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(RoundtableError::ProviderTimeout {
                provider: provider.into(),
                timeout_secs: self.timeout.as_secs(),
            }),
        }
    }
}

/// A gateway wrapper that retries transient failures.
pub struct RetryGateway {
    inner: Arc<dyn ProviderGateway>,
    policy: RetryPolicy,
}

impl RetryGateway {
    pub fn new(inner: Arc<dyn ProviderGateway>) -> Self {
        Self {
            inner,
            policy: RetryPolicy::default(),
        }
    }

    pub fn with_policy(inner: Arc<dyn ProviderGateway>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl ProviderGateway for RetryGateway {
    async fn call(
        &self,
        provider: &str,
        prompt: &str,
        max_tokens: Option<u32>,
    ) -> Result<ProviderReply, RoundtableError> {
        let mut attempt = 0u32;
        loop {
            match self.inner.call(provider, prompt, max_tokens).await {
                Ok(reply) => return Ok(reply),
                Err(e) => {
                    if !e.is_transient() || attempt >= self.policy.max_retries {
                        return Err(e);
                    }
                    let delay = self.policy.delay_for_attempt(attempt);
                    tracing::warn!(
                        provider,
                        attempt = attempt + 1,
                        max_retries = self.policy.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        "Retrying after transient error: {}",
                        e
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FlakyGateway {
        calls: AtomicU32,
        fail_first: u32,
        transient: bool,
    }

    #[async_trait]
    impl ProviderGateway for FlakyGateway {
        async fn call(
            &self,
            provider: &str,
            _prompt: &str,
            _max_tokens: Option<u32>,
        ) -> Result<ProviderReply, RoundtableError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_first {
                Err(RoundtableError::Provider {
                    provider: provider.into(),
                    message: "boom".into(),
                    transient: self.transient,
                })
            } else {
                Ok(ProviderReply {
                    content: "ok".into(),
                    tokens_used: 10,
                    latency: Duration::from_millis(5),
                })
            }
        }
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy::from_ms(2, &[1, 1])
    }

    #[tokio::test]
    async fn test_transient_failure_then_success() {
        let inner = Arc::new(FlakyGateway {
            calls: AtomicU32::new(0),
            fail_first: 1,
            transient: true,
        });
        let gw = RetryGateway::with_policy(inner.clone(), fast_policy());
        let reply = gw.call("openai", "hi", None).await.unwrap();
        assert_eq!(reply.content, "ok");
        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_retries_exhausted() {
        let inner = Arc::new(FlakyGateway {
            calls: AtomicU32::new(0),
            fail_first: 10,
            transient: true,
        });
        let gw = RetryGateway::with_policy(inner.clone(), fast_policy());
        let err = gw.call("openai", "hi", None).await.unwrap_err();
        assert!(err.is_transient());
        // 1 initial attempt + 2 retries
        assert_eq!(inner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_failure_no_retry() {
        let inner = Arc::new(FlakyGateway {
            calls: AtomicU32::new(0),
            fail_first: 10,
            transient: false,
        });
        let gw = RetryGateway::with_policy(inner.clone(), fast_policy());
        let err = gw.call("openai", "hi", None).await.unwrap_err();
        assert!(!err.is_transient());
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
    }

    struct SlowGateway;

    #[async_trait]
    impl ProviderGateway for SlowGateway {
        async fn call(
            &self,
            _provider: &str,
            _prompt: &str,
            _max_tokens: Option<u32>,
        ) -> Result<ProviderReply, RoundtableError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(ProviderReply {
                content: "late".into(),
                tokens_used: 1,
                latency: Duration::from_secs(5),
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_gateway_bounds_attempt() {
        let gw = TimeoutGateway::new(Arc::new(SlowGateway), Duration::from_millis(100));
        let err = gw.call("openai", "hi", None).await.unwrap_err();
        assert!(matches!(err, RoundtableError::ProviderTimeout { .. }));
        assert!(err.is_transient());
    }

    #[test]
    fn test_delay_for_attempt() {
        let p = RetryPolicy::default();
        assert_eq!(p.delay_for_attempt(0), Duration::from_secs(1));
        assert_eq!(p.delay_for_attempt(1), Duration::from_secs(3));
        // Beyond configured slots, reuse the last delay
        assert_eq!(p.delay_for_attempt(5), Duration::from_secs(3));
    }
}
