//! LLM collaborator: prompt (+ optional crop) → free-form text.
//!
//! [`CodeGenerator`] is the seam the synthesizer depends on. The default
//! [`ProviderCodeGenerator`] drives any `edgequake_llm` provider (Ollama by
//! default, OpenAI, Anthropic, Gemini, …) and retries transient failures with
//! exponential backoff (`retry_backoff_ms * 2^attempt`).
//!
//! When no provider can be resolved the conversion still runs with an
//! [`UnavailableGenerator`], so every code region degrades to a placeholder
//! instead of the request failing.

use crate::config::ConversionConfig;
use crate::error::{CollaboratorError, ImageCoderError};
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider, ProviderFactory};
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tracing::{debug, warn};

const COLLABORATOR: &str = "llm";

/// Model used when a provider is named without one.
pub const DEFAULT_MODEL: &str = "llama3.2";

#[async_trait]
pub trait CodeGenerator: Send + Sync {
    /// Complete `prompt`, optionally showing the model the region crop.
    async fn complete(&self, prompt: &str, image: Option<ImageData>) -> Result<String, CollaboratorError>;
}

/// [`CodeGenerator`] backed by an `edgequake_llm` provider.
pub struct ProviderCodeGenerator {
    provider: Arc<dyn LLMProvider>,
    options: CompletionOptions,
    max_retries: u32,
    retry_backoff_ms: u64,
}

impl ProviderCodeGenerator {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &ConversionConfig) -> Self {
        Self {
            provider,
            options: build_options(config),
            max_retries: config.max_retries,
            retry_backoff_ms: config.retry_backoff_ms,
        }
    }
}

#[async_trait]
impl CodeGenerator for ProviderCodeGenerator {
    async fn complete(&self, prompt: &str, image: Option<ImageData>) -> Result<String, CollaboratorError> {
        // The prompt already embeds the base instruction.
        let messages = vec![ChatMessage::user_with_images(prompt, image.into_iter().collect())];

        let mut last_err: Option<String> = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let backoff = self.retry_backoff_ms * 2u64.pow(attempt - 1);
                warn!("LLM retry {}/{} after {}ms", attempt, self.max_retries, backoff);
                sleep(Duration::from_millis(backoff)).await;
            }

            match self.provider.chat(&messages, Some(&self.options)).await {
                Ok(response) => {
                    debug!(
                        "LLM: {} input tokens, {} output tokens",
                        response.prompt_tokens, response.completion_tokens
                    );
                    return Ok(response.content);
                }
                Err(e) => {
                    let err_msg = format!("{}", e);
                    warn!("LLM attempt {} failed — {}", attempt + 1, err_msg);
                    last_err = Some(err_msg);
                }
            }
        }

        Err(CollaboratorError::failed(
            COLLABORATOR,
            format!(
                "{} attempts: {}",
                self.max_retries + 1,
                last_err.unwrap_or_else(|| "Unknown error".to_string())
            ),
        ))
    }
}

/// Stand-in used when no provider could be configured.
pub struct UnavailableGenerator {
    pub reason: String,
}

#[async_trait]
impl CodeGenerator for UnavailableGenerator {
    async fn complete(&self, _prompt: &str, _image: Option<ImageData>) -> Result<String, CollaboratorError> {
        Err(CollaboratorError::unavailable(COLLABORATOR, self.reason.clone()))
    }
}

fn build_options(config: &ConversionConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}

fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, ImageCoderError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        ImageCoderError::CollaboratorUnavailable {
            collaborator: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the LLM provider, from most-specific to least-specific:
///
/// 1. pre-built `config.provider`;
/// 2. `config.provider_name` with `config.model` (default [`DEFAULT_MODEL`]);
/// 3. `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL` when both are set;
/// 4. `ProviderFactory::from_env` auto-detection.
pub fn resolve_provider(config: &ConversionConfig) -> Result<Arc<dyn LLMProvider>, ImageCoderError> {
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

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| ImageCoderError::CollaboratorUnavailable {
            collaborator: "llm".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Run Ollama locally, set OPENAI_API_KEY / ANTHROPIC_API_KEY, or pass --provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}

/// Build the default generator for `config`, degrading to
/// [`UnavailableGenerator`] when no provider resolves.
pub fn default_generator(config: &ConversionConfig) -> Arc<dyn CodeGenerator> {
    match resolve_provider(config) {
        Ok(provider) => Arc::new(ProviderCodeGenerator::new(provider, config)),
        Err(e) => {
            warn!("{e}; code regions will be placeholders");
            Arc::new(UnavailableGenerator { reason: e.to_string() })
        }
    }
}
