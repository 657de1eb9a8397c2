//! ModelService trait — the abstraction over the language model.
//!
//! The model is an opaque text-completion service: one prompt in, one text
//! out. No streaming, no structured tool-call wire format — the output
//! parser interprets whatever text comes back. Implementations live in
//! `murmur-providers`.

use async_trait::async_trait;

use crate::error::ModelError;

/// The core model-service trait.
///
/// The agent loop calls `complete()` without knowing which backend is being
/// used. A call may fail with a timeout or transport error; the loop treats
/// that as fatal for the current run (retry policy belongs to the caller).
#[async_trait]
pub trait ModelService: Send + Sync {
    /// A human-readable name for this backend (e.g., "openai_compat").
    fn name(&self) -> &str;

    /// Send a prompt and get the completion text.
    async fn complete(&self, prompt: &str) -> std::result::Result<String, ModelError>;
}
