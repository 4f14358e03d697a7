// src/infra/errors.rs — Error types for Roundtable

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RoundtableError {
    // Chain definition rejected before a run starts
    #[error("Invalid chain definition: {0}")]
    Validation(String),

    // Provider errors; `transient` decides whether the retry wrapper engages
    #[error("Provider '{provider}' error: {message}")]
    Provider {
        provider: String,
        message: String,
        transient: bool,
    },

    #[error("Provider '{provider}' timed out after {timeout_secs}s")]
    ProviderTimeout { provider: String, timeout_secs: u64 },

    #[error("Run '{0}' not found")]
    RunNotFound(String),

    #[error("Run '{run_id}' is already {status}")]
    RunTerminal { run_id: String, status: String },

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl RoundtableError {
    /// Transient failures are worth retrying; everything else fails the step at once.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            RoundtableError::Provider {
                transient: true,
                ..
            } | RoundtableError::ProviderTimeout { .. }
        )
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        RoundtableError::Validation(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_provider_error() {
        let e = RoundtableError::Provider {
            provider: "openai".into(),
            message: "HTTP 503".into(),
            transient: true,
        };
        assert!(e.is_transient());
    }

    #[test]
    fn test_permanent_provider_error() {
        let e = RoundtableError::Provider {
            provider: "openai".into(),
            message: "invalid api key".into(),
            transient: false,
        };
        assert!(!e.is_transient());
    }

    #[test]
    fn test_timeout_is_transient() {
        let e = RoundtableError::ProviderTimeout {
            provider: "claude".into(),
            timeout_secs: 60,
        };
        assert!(e.is_transient());
    }

    #[test]
    fn test_validation_not_transient() {
        assert!(!RoundtableError::validation("empty chain").is_transient());
    }
}
