//! rig-core integration for LLM completions.
//!
//! Uses rig-core's provider clients and Agent abstraction for multi-provider
//! support. Currently supports: Anthropic, OpenAI, Cohere, Gemini, Perplexity,
//! DeepSeek, xAI, Groq, and any OpenAI-compatible API.

use std::time::Duration;

use async_trait::async_trait;
use rig::client::CompletionClient;
use rig::completion::Prompt;
use rig::providers;

use crate::config::ProviderConfig;
use crate::models::{LlmReview, ProviderName};

use super::{CompletionProvider, ProviderError};

/// Maximum tokens per LLM completion response.
///
/// Set high enough to accommodate thinking models (e.g. Gemini 2.5 Pro)
/// that consume part of the budget for internal reasoning tokens.
const MAX_TOKENS: u64 = 65536;

/// Maximum number of retry attempts for transient API errors.
pub const MAX_RETRIES: u32 = 3;

/// Initial backoff delay between retries.
pub const INITIAL_BACKOFF: Duration = Duration::from_secs(5);

/// Maximum backoff delay between retries.
pub const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Build an agent from a rig-core client and prompt it.
///
/// Always sets `max_tokens` — all rig-core providers support it and without
/// it some (e.g. Gemini) default to a low limit that truncates responses.
/// The output schema nudges capable providers toward well-formed review
/// JSON; the prompt instructions cover the rest.
macro_rules! prompt_review {
    ($client:expr, $model:expr, $system:expr, $user:expr, $label:expr) => {{
        let agent = $client
            .agent($model)
            .preamble($system)
            .temperature(0.0)
            .max_tokens(MAX_TOKENS)
            .output_schema::<LlmReview>()
            .build();
        agent
            .prompt($user)
            .await
            .map_err(|e| ProviderError::ApiError(format!("{} API error: {e}", $label)))
    }};
}

/// Create a rig-core client using the `Client::new(api_key)` convention.
macro_rules! new_client {
    ($provider_mod:path, $api_key:expr, $label:expr) => {{
        <$provider_mod>::new($api_key).map_err(|e| {
            ProviderError::ApiError(format!("failed to create {} client: {e}", $label))
        })
    }};
}

/// rig-core based completion provider.
///
/// Wraps rig-core's multi-provider client system. The provider name
/// in config selects which rig-core provider to use.
pub struct RigProvider {
    config: ProviderConfig,
}

impl RigProvider {
    /// Create a new RigProvider with the given configuration.
    pub fn new(config: ProviderConfig) -> Result<Self, ProviderError> {
        if config.api_key.is_none() {
            return Err(ProviderError::NotConfigured(format!(
                "no API key found for provider '{}'. Set {} or the provider-specific env var.",
                config.name,
                crate::constants::ENV_API_KEY
            )));
        }
        Ok(Self { config })
    }

    /// Build an OpenAI-style client, optionally with a custom base URL.
    fn build_openai_client(
        &self,
        api_key: &str,
    ) -> Result<providers::openai::CompletionsClient, ProviderError> {
        let mut builder = providers::openai::CompletionsClient::builder().api_key(api_key);
        if let Some(ref base_url) = self.config.base_url {
            builder = builder.base_url(base_url);
        }
        let client: providers::openai::CompletionsClient = builder
            .build()
            .map_err(|e| ProviderError::ApiError(format!("failed to create OpenAI client: {e}")))?;
        Ok(client)
    }

    /// Require `base_url` for OpenAI-compatible providers.
    fn require_base_url(&self) -> Result<&str, ProviderError> {
        self.config.base_url.as_deref().ok_or_else(|| {
            ProviderError::NotConfigured(
                "openai-compatible provider requires base_url to be set".to_string(),
            )
        })
    }

    /// Get the API key or return an error.
    fn api_key(&self) -> Result<&str, ProviderError> {
        self.config
            .api_key
            .as_deref()
            .ok_or_else(|| ProviderError::NotConfigured("missing API key".to_string()))
    }
}

#[async_trait]
impl CompletionProvider for RigProvider {
    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<String, ProviderError> {
        let api_key = self.api_key()?;
        let model = self.config.model.as_str();

        match self.config.name {
            ProviderName::Anthropic => {
                let client: providers::anthropic::Client = providers::anthropic::Client::builder()
                    .api_key(api_key)
                    .build()
                    .map_err(|e| {
                        ProviderError::ApiError(format!("failed to create Anthropic client: {e}"))
                    })?;
                prompt_review!(client, model, system_prompt, user_prompt, "Anthropic")
            }
            ProviderName::OpenAI => {
                let client = self.build_openai_client(api_key)?;
                prompt_review!(client, model, system_prompt, user_prompt, "OpenAI")
            }
            ProviderName::Cohere => {
                let client = new_client!(providers::cohere::Client, api_key, "Cohere")?;
                prompt_review!(client, model, system_prompt, user_prompt, "Cohere")
            }
            ProviderName::Gemini => {
                let client = new_client!(providers::gemini::Client, api_key, "Gemini")?;
                prompt_review!(client, model, system_prompt, user_prompt, "Gemini")
            }
            ProviderName::Perplexity => {
                let client = new_client!(providers::perplexity::Client, api_key, "Perplexity")?;
                prompt_review!(client, model, system_prompt, user_prompt, "Perplexity")
            }
            ProviderName::DeepSeek => {
                let client = new_client!(providers::deepseek::Client, api_key, "DeepSeek")?;
                prompt_review!(client, model, system_prompt, user_prompt, "DeepSeek")
            }
            ProviderName::XAI => {
                let client = new_client!(providers::xai::Client, api_key, "xAI")?;
                prompt_review!(client, model, system_prompt, user_prompt, "xAI")
            }
            ProviderName::Groq => {
                let client = new_client!(providers::groq::Client, api_key, "Groq")?;
                prompt_review!(client, model, system_prompt, user_prompt, "Groq")
            }
            ProviderName::OpenAICompatible => {
                let base_url = self.require_base_url()?;
                let client: providers::openai::CompletionsClient =
                    providers::openai::CompletionsClient::builder()
                        .api_key(api_key)
                        .base_url(base_url)
                        .build()
                        .map_err(|e| {
                            ProviderError::ApiError(format!(
                                "failed to create OpenAI-compatible client: {e}"
                            ))
                        })?;
                prompt_review!(
                    client,
                    model,
                    system_prompt,
                    user_prompt,
                    "OpenAI-compatible"
                )
            }
        }
    }
}

/// Check whether a provider error is transient and worth retrying.
///
/// Matches HTTP status codes commonly used for rate limiting and
/// temporary unavailability: 429 (Too Many Requests), 503 (Service
/// Unavailable), 529 (Overloaded), and connection/timeout errors.
pub fn is_retryable(err: &ProviderError) -> bool {
    classify_error(err).is_some()
}

/// Classifies a provider error into a short, user-friendly message.
///
/// Returns `Some(message)` for transient/retryable errors, `None` otherwise.
pub fn classify_error(err: &ProviderError) -> Option<&'static str> {
    match err {
        ProviderError::ApiError(msg) => {
            let msg_lower = msg.to_lowercase();
            if msg_lower.contains("429")
                || msg_lower.contains("rate limit")
                || msg_lower.contains("too many requests")
            {
                Some("Rate limited by API")
            } else if msg_lower.contains("503")
                || msg_lower.contains("service unavailable")
                || msg_lower.contains("high demand")
            {
                Some("High model load")
            } else if msg_lower.contains("529") || msg_lower.contains("overloaded") {
                Some("API overloaded")
            } else if msg_lower.contains("502") {
                Some("API gateway error")
            } else if msg_lower.contains("timeout") || msg_lower.contains("timed out") {
                Some("Request timed out")
            } else if msg_lower.contains("connection") {
                Some("Connection error")
            } else if msg_lower.contains("temporarily") || msg_lower.contains("try again") {
                Some("Temporary API error")
            } else {
                None
            }
        }
        ProviderError::NotConfigured(_) => None,
    }
}

/// Compute the backoff duration for a retry attempt using exponential backoff.
pub fn retry_backoff(attempt: u32) -> Duration {
    let backoff = INITIAL_BACKOFF.saturating_mul(2u32.saturating_pow(attempt));
    backoff.min(MAX_BACKOFF)
}
