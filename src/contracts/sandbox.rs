//! Code-sandbox contract.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Output of one sandboxed execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SandboxResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl SandboxResult {
    pub fn succeeded(&self) -> bool {
        self.exit_code == 0
    }
}

/// Sandbox contract. Implementations enforce wall-clock and memory limits.
#[async_trait]
pub trait Sandbox: Send + Sync {
    async fn execute(&self, code: &str) -> Result<SandboxResult>;
}
