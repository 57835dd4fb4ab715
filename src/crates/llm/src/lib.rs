//! Completion backend implementations for triaged.
//!
//! This crate abstracts the text-completion service the enrichment
//! pipeline classifies bug reports with. A backend takes a system
//! prompt and a user prompt and returns the raw model output; the
//! caller owns all parsing and validation of that output.
//!
//! # Example
//!
//! ```rust,ignore
//! use llm::{CompletionBackend, LlmConfig, OllamaClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = LlmConfig::new("http://localhost:11434", "llama3.1");
//!     let client = OllamaClient::new(config)?;
//!
//!     let raw = client
//!         .complete("Answer with JSON only.", "Classify this report: ...")
//!         .await?;
//!     println!("{raw}");
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod ollama;

use async_trait::async_trait;

pub use config::LlmConfig;
pub use error::{LlmError, Result};
pub use ollama::OllamaClient;

/// A text-completion service.
///
/// Implementations are expected to be cheap to clone behind an `Arc`
/// and safe to call concurrently. The contract is deliberately
/// narrow: one system prompt, one user prompt, one raw text answer.
/// Non-determinism is allowed; schema conformance of the output is
/// the caller's problem.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Run a single completion and return the raw model output.
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String>;

    /// Whether the backend is reachable right now.
    async fn is_available(&self) -> bool;
}
