//! LLM contract: action decisions and structured judgments.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::agent::actions::{ActionPermissions, AgentAction};
use crate::budget::UsageRecord;
use crate::error::{Error, Result};

/// One request to the language model.
#[derive(Debug, Clone, Default)]
pub struct LlmRequest {
    pub system: Option<String>,
    pub user: String,
    pub model: Option<String>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
}

impl LlmRequest {
    pub fn new(user: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            ..Self::default()
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature.clamp(0.0, 1.0));
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// A structured JSON reply with its usage report.
#[derive(Debug, Clone)]
pub struct LlmReply {
    pub value: Value,
    pub usage: UsageRecord,
}

/// An action decision with its usage report.
#[derive(Debug, Clone)]
pub struct LlmDecision {
    pub action: AgentAction,
    /// Model reasoning surfaced as a Think event, if provided.
    pub thinking: Option<String>,
    pub usage: UsageRecord,
}

/// Language-model contract.
///
/// Implementations translate vendor schemas into these shapes. Responses
/// that do not fit must surface as [`Error::ContractViolation`], never as
/// a parse panic.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Produce exactly one action whose variant is permitted.
    ///
    /// The permitted set is part of the contract; the agent loop still
    /// re-validates the returned variant.
    async fn decide_action(
        &self,
        request: LlmRequest,
        allowed: &ActionPermissions,
    ) -> Result<LlmDecision>;

    /// Produce a structured judgment as a raw JSON value.
    async fn generate_value(&self, request: LlmRequest) -> Result<LlmReply>;
}

/// Deserialize a structured judgment into `T`.
///
/// Schema mismatches surface as [`Error::ContractViolation`].
pub async fn generate_structured<T: DeserializeOwned>(
    client: &dyn LlmClient,
    request: LlmRequest,
) -> Result<(T, UsageRecord)> {
    let reply = client.generate_value(request).await?;
    let parsed: T = serde_json::from_value(reply.value)
        .map_err(|e| Error::contract(format!("structured output mismatch: {e}")))?;
    Ok((parsed, reply.usage))
}
