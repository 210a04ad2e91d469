//! Session configuration and startup environment.

use serde::{Deserialize, Serialize};

use crate::adapters::retry::RetryConfig;

/// Default token budget for a session.
pub const DEFAULT_TOKEN_BUDGET: u64 = 1_000_000;

/// Configuration for one research session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Total token ceiling for the session.
    pub token_budget: u64,
    /// Permit answering on step one without research.
    pub allow_direct_answer: bool,
    /// Permit the coding action.
    pub enable_coding: bool,
    /// Forced-answer attempts before the session fails.
    pub max_beast_attempts: u32,
    /// Multiplier on search result token accounting. Kept at 1.
    pub search_token_scaler: f64,
    /// Inclusive similarity threshold for query dedup.
    pub dedup_threshold: f32,
    /// Temperature for forced answers under beast mode.
    pub beast_temperature: f64,
    /// Retry/timeout policy for external calls.
    pub retry: RetryConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            token_budget: DEFAULT_TOKEN_BUDGET,
            allow_direct_answer: true,
            enable_coding: false,
            max_beast_attempts: 3,
            search_token_scaler: 1.0,
            dedup_threshold: crate::similarity::DEFAULT_DEDUP_THRESHOLD,
            beast_temperature: 0.9,
            retry: RetryConfig::default(),
        }
    }
}

impl SessionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token_budget(mut self, budget: u64) -> Self {
        self.token_budget = budget;
        self
    }

    pub fn with_direct_answer(mut self, allow: bool) -> Self {
        self.allow_direct_answer = allow;
        self
    }

    pub fn with_coding(mut self, enable: bool) -> Self {
        self.enable_coding = enable;
        self
    }

    pub fn with_max_beast_attempts(mut self, attempts: u32) -> Self {
        self.max_beast_attempts = attempts.max(1);
        self
    }

    pub fn with_dedup_threshold(mut self, threshold: f32) -> Self {
        self.dedup_threshold = threshold;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}

/// Environment settings read once at startup. Optional in library use;
/// never consulted during the step loop.
#[derive(Debug, Clone, Default)]
pub struct EnvSettings {
    pub llm_api_key: Option<String>,
    pub search_api_key: Option<String>,
    pub log_level: Option<String>,
}

impl EnvSettings {
    pub fn from_env() -> Self {
        Self {
            llm_api_key: std::env::var("DRA_LLM_API_KEY").ok(),
            search_api_key: std::env::var("DRA_SEARCH_API_KEY").ok(),
            log_level: std::env::var("DRA_LOG").ok(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.token_budget, 1_000_000);
        assert!(config.allow_direct_answer);
        assert!(!config.enable_coding);
        assert_eq!(config.max_beast_attempts, 3);
        assert_eq!(config.search_token_scaler, 1.0);
    }

    #[test]
    fn test_beast_attempts_floor() {
        let config = SessionConfig::new().with_max_beast_attempts(0);
        assert_eq!(config.max_beast_attempts, 1);
    }

    #[test]
    fn test_builder() {
        let config = SessionConfig::new()
            .with_token_budget(100_000)
            .with_coding(true);
        assert_eq!(config.token_budget, 100_000);
        assert!(config.enable_coding);
    }
}
