//! CompletionProvider trait and LLM integration.
//!
//! Provides an abstraction layer over rig-core to decouple the
//! codebase from the specific LLM library. Providers return raw
//! response text; interpreting it is the reviewer's concern, so a
//! malformed response can degrade a single file instead of erroring
//! the whole run.

pub mod rig;

use async_trait::async_trait;
use thiserror::Error;

/// Errors from the completion provider.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("LLM API error: {0}")]
    ApiError(String),

    #[error("provider not configured: {0}")]
    NotConfigured(String),
}

/// Trait for LLM completion backends.
///
/// Implementations handle client construction and the provider-specific
/// request; the model used comes from provider configuration.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Send one prompt and return the raw response text.
    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<String, ProviderError>;
}
