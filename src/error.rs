//! Error types for dra-core.

use thiserror::Error;

/// Result type alias using dra-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while driving a research session.
///
/// Variants map onto the recovery taxonomy: transient errors are retried
/// inside adapters, permanent and contract errors surface to the step
/// executor, and fatal errors abort the run.
#[derive(Error, Debug)]
pub enum Error {
    /// Transient external failure (network, rate limit, 5xx). Retryable.
    #[error("transient {service} error: {message}")]
    Transient {
        service: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Permanent external failure (4xx, auth, quota). Not retried.
    #[error("permanent {service} error: {message}")]
    Permanent { service: String, message: String },

    /// The LLM produced output violating the structured contract
    /// (disallowed action variant, schema mismatch).
    #[error("contract violation: {0}")]
    ContractViolation(String),

    /// Reader was handed content it cannot extract text from.
    #[error("unsupported content type: {0}")]
    UnsupportedContent(String),

    /// Timeout during an external call.
    #[error("operation timed out after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// Token budget exhausted and beast mode produced no answer.
    #[error("budget exhausted: {0}")]
    BudgetExhausted(String),

    /// Serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Initialization failure or invariant violation. Aborts the run.
    #[error("fatal: {0}")]
    Fatal(String),
}

impl Error {
    /// Create a transient external error.
    pub fn transient(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transient {
            service: service.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Create a transient external error with source.
    pub fn transient_with_source(
        service: impl Into<String>,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Transient {
            service: service.into(),
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a permanent external error.
    pub fn permanent(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Permanent {
            service: service.into(),
            message: message.into(),
        }
    }

    /// Create a contract violation error.
    pub fn contract(message: impl Into<String>) -> Self {
        Self::ContractViolation(message.into())
    }

    /// Create a timeout error.
    pub fn timeout(duration_ms: u64) -> Self {
        Self::Timeout { duration_ms }
    }

    /// Create a fatal error.
    pub fn fatal(message: impl Into<String>) -> Self {
        Self::Fatal(message.into())
    }

    /// Whether adapters may retry the failed call.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. } | Self::Timeout { .. })
    }

    /// Whether the error must abort the whole run.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal(_))
    }

    /// Short taxonomy tag for diagnostics and CLI output.
    pub fn taxonomy_tag(&self) -> &'static str {
        match self {
            Self::Transient { .. } => "transient",
            Self::Permanent { .. } => "permanent",
            Self::ContractViolation(_) => "contract-violation",
            Self::UnsupportedContent(_) => "unsupported-content",
            Self::Timeout { .. } => "timeout",
            Self::BudgetExhausted(_) => "budget-exhausted",
            Self::Serialization(_) => "contract-violation",
            Self::Config(_) => "config",
            Self::Fatal(_) => "fatal",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(Error::transient("search", "503").is_transient());
        assert!(Error::timeout(5_000).is_transient());
        assert!(!Error::permanent("search", "401").is_transient());
        assert!(!Error::contract("bad variant").is_transient());
    }

    #[test]
    fn test_fatal_classification() {
        assert!(Error::fatal("missing api key").is_fatal());
        assert!(!Error::transient("llm", "reset").is_fatal());
    }

    #[test]
    fn test_taxonomy_tags() {
        assert_eq!(Error::timeout(1).taxonomy_tag(), "timeout");
        assert_eq!(
            Error::BudgetExhausted("tokens".into()).taxonomy_tag(),
            "budget-exhausted"
        );
        assert_eq!(Error::contract("x").taxonomy_tag(), "contract-violation");
    }
}
