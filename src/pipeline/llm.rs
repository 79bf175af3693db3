//! Generative capability: send pages or a prompt to a model, get text back.
//!
//! [`GenerativeCapability`] is the seam the analysis helpers depend on, so
//! they can be exercised with a scripted fake. [`LlmCapability`] is the
//! production implementation over an `edgequake-llm` provider. All prompt
//! text lives in [`crate::prompts`].
//!
//! ## Retry Strategy
//!
//! HTTP 429 / 503 errors from LLM APIs are transient and frequent under
//! load. Each call is retried with exponential backoff
//! (`retry_backoff_ms * 2^attempt`) and bounded by a per-attempt timeout.
//! With 500 ms base and 3 retries the wait sequence is 500 ms → 1 s → 2 s.
//!
//! Failures surface as one [`CapabilityError`] that tells "no response"
//! apart from "a response with nothing in it".

use crate::config::PipelineConfig;
use crate::document::PageSequence;
use crate::error::CapabilityError;
use crate::prompts::DEFAULT_TEXT_SYSTEM_PROMPT;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use futures::future::BoxFuture;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, info, warn};

/// Default model when a provider is named without one.
pub const DEFAULT_MODEL: &str = "gpt-4.1-nano";

/// Longest wait between two attempts.
const MAX_BACKOFF_MS: u64 = 60_000;

/// A text-generating model, with or without vision.
pub trait GenerativeCapability: Send + Sync {
    /// Ask the model about an ordered page sequence.
    fn describe_pages<'a>(
        &'a self,
        pages: &'a PageSequence,
        instruction: &'a str,
    ) -> BoxFuture<'a, Result<String, CapabilityError>>;

    /// Plain text completion.
    fn complete<'a>(&'a self, prompt: &'a str) -> BoxFuture<'a, Result<String, CapabilityError>>;
}

/// [`GenerativeCapability`] over an `edgequake-llm` provider.
#[derive(Clone)]
pub struct LlmCapability {
    provider: Arc<dyn LLMProvider>,
    system_prompt: String,
    temperature: f32,
    max_tokens: usize,
    max_retries: u32,
    retry_backoff_ms: u64,
    timeout_secs: u64,
}

impl fmt::Debug for LlmCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmCapability")
            .field("provider", &"<dyn LLMProvider>")
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl LlmCapability {
    /// Wrap an existing provider, taking call settings from `config`.
    pub fn new(provider: Arc<dyn LLMProvider>, config: &PipelineConfig) -> Self {
        Self {
            provider,
            system_prompt: DEFAULT_TEXT_SYSTEM_PROMPT.to_string(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            max_retries: config.max_retries,
            retry_backoff_ms: config.retry_backoff_ms,
            timeout_secs: config.api_timeout_secs,
        }
    }

    /// Resolve a provider from `config` and the environment.
    pub fn from_config(config: &PipelineConfig) -> Result<Self, CapabilityError> {
        Ok(Self::new(resolve_provider(config)?, config))
    }

    /// Replace the system prompt used for text completions.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    async fn call(&self, messages: Vec<ChatMessage>, label: &str) -> Result<String, CapabilityError> {
        let start = Instant::now();
        let options = build_options(self.temperature, self.max_tokens);
        let attempts = self.max_retries + 1;
        let limit = Duration::from_secs(self.timeout_secs.max(1));

        let mut timeouts = 0u32;
        let mut last_was_empty = false;
        let mut last_err: Option<String> = None;

        for attempt in 0..attempts {
            if attempt > 0 {
                let backoff = backoff_ms(self.retry_backoff_ms, attempt);
                warn!(
                    "{}: retry {}/{} after {}ms",
                    label, attempt, self.max_retries, backoff
                );
                sleep(Duration::from_millis(backoff)).await;
            }

            match timeout(limit, self.provider.chat(&messages, Some(&options))).await {
                Ok(Ok(response)) => {
                    debug!(
                        "{}: {} input tokens, {} output tokens, {:?}",
                        label,
                        response.prompt_tokens,
                        response.completion_tokens,
                        start.elapsed()
                    );
                    if response.content.trim().is_empty() {
                        warn!("{}: attempt {} returned empty content", label, attempt + 1);
                        last_was_empty = true;
                        continue;
                    }
                    return Ok(response.content);
                }
                Ok(Err(e)) => {
                    let msg = e.to_string();
                    warn!("{}: attempt {} failed: {}", label, attempt + 1, msg);
                    last_was_empty = false;
                    last_err = Some(msg);
                }
                Err(_) => {
                    warn!(
                        "{}: attempt {} timed out after {}s",
                        label,
                        attempt + 1,
                        self.timeout_secs
                    );
                    timeouts += 1;
                    last_was_empty = false;
                    last_err = Some(format!("timed out after {}s", self.timeout_secs));
                }
            }
        }

        if last_was_empty {
            Err(CapabilityError::EmptyContent)
        } else if timeouts == attempts {
            Err(CapabilityError::Timeout {
                secs: self.timeout_secs,
            })
        } else {
            Err(CapabilityError::NoResponse {
                attempts,
                detail: last_err.unwrap_or_else(|| "Unknown error".to_string()),
            })
        }
    }
}

impl GenerativeCapability for LlmCapability {
    fn describe_pages<'a>(
        &'a self,
        pages: &'a PageSequence,
        instruction: &'a str,
    ) -> BoxFuture<'a, Result<String, CapabilityError>> {
        Box::pin(async move {
            info!(
                "Sending {} page(s), {} bytes, to the vision model",
                pages.len(),
                pages.total_bytes()
            );
            let messages = vec![
                ChatMessage::system(instruction),
                ChatMessage::user_with_images("", pages.to_image_data()),
            ];
            self.call(messages, "vision").await
        })
    }

    fn complete<'a>(&'a self, prompt: &'a str) -> BoxFuture<'a, Result<String, CapabilityError>> {
        Box::pin(async move {
            let messages = vec![
                ChatMessage::system(self.system_prompt.as_str()),
                ChatMessage::user(prompt),
            ];
            self.call(messages, "text").await
        })
    }
}

/// Delay before retry `attempt` (1-based): `base * 2^(attempt-1)`, capped.
fn backoff_ms(base: u64, attempt: u32) -> u64 {
    let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
    base.saturating_mul(factor).min(MAX_BACKOFF_MS)
}

fn build_options(temperature: f32, max_tokens: usize) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(temperature),
        max_tokens: Some(max_tokens),
        ..Default::default()
    }
}

/// Instantiate a named provider with the given model.
fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, CapabilityError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        CapabilityError::NotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the LLM provider, from most-specific to least-specific.
///
/// 1. **Pre-built provider** (`config.provider`)
/// 2. **Named provider** (`config.provider_name` + `config.model`)
/// 3. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`)
/// 4. **OpenAI key** (`OPENAI_API_KEY`) when present
/// 5. **Full auto-detection** (`ProviderFactory::from_env`)
pub fn resolve_provider(config: &PipelineConfig) -> Result<Arc<dyn LLMProvider>, CapabilityError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
        return create_provider(name, model);
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_provider(&prov, &model);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
            return create_provider("openai", model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| CapabilityError::NotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}
