//! Contracts for external collaborators.
//!
//! The core consumes web search, page reading, embeddings, LLM calls, and
//! the code sandbox exclusively through these traits. Vendor API schemas
//! stay outside the crate; implementations adapt them to these shapes.

pub mod embedding;
pub mod llm;
pub mod reader;
pub mod sandbox;
pub mod search;

pub use embedding::{EmbeddingBatch, EmbeddingClient};
pub use llm::{generate_structured, LlmClient, LlmDecision, LlmReply, LlmRequest};
pub use reader::{ReadContentType, ReadResult, ReaderClient};
pub use sandbox::{Sandbox, SandboxResult};
pub use search::{SearchClient, SearchResult, SerpQuery, Snippet};
