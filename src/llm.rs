//! LLM provider abstraction
//!
//! The turn dispatcher only sees [`LlmService`]; which provider answers is
//! decided once, at startup, from the configured model identifier.

mod error;
mod openai;
#[cfg(test)]
pub mod testing;
mod types;

pub use error::{LlmError, LlmErrorKind};
pub use openai::OpenAIService;
pub use types::*;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Common interface for LLM providers
#[async_trait]
pub trait LlmService: Send + Sync {
    /// Make a completion request
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError>;

    /// Get the model ID
    fn model_id(&self) -> &str;
}

/// Provider half of a `provider:model` identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    OpenAI,
}

/// Parse `openai:gpt-4.1` (or a bare `gpt-4.1`) into provider and model name
pub fn parse_model_id(model: &str) -> Result<(Provider, &str), LlmError> {
    let (provider, name) = match model.split_once(':') {
        Some((provider, name)) => (provider, name),
        None => ("openai", model),
    };

    if name.trim().is_empty() {
        return Err(LlmError::invalid_request(format!(
            "Model identifier '{model}' has no model name"
        )));
    }

    match provider {
        "openai" => Ok((Provider::OpenAI, name)),
        other => Err(LlmError::invalid_request(format!(
            "Unsupported model provider '{other}'"
        ))),
    }
}

/// Configuration for the model client
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub model: String,
    pub openai_api_key: Option<String>,
    pub openai_base_url: Option<String>,
    pub request_timeout: Duration,
}

/// Build the configured provider, wrapped in [`LoggingService`]
pub fn build_service(config: &LlmConfig) -> Result<Arc<dyn LlmService>, LlmError> {
    let (provider, name) = parse_model_id(&config.model)?;

    let service: Arc<dyn LlmService> = match provider {
        Provider::OpenAI => {
            if config.openai_api_key.is_none() {
                tracing::warn!("OPENAI_API_KEY is not set; model requests will fail");
            }
            Arc::new(OpenAIService::new(
                config.openai_api_key.clone(),
                name,
                config.openai_base_url.as_deref(),
                config.request_timeout,
            )?)
        }
    };

    tracing::info!(model = %service.model_id(), ?provider, "Model client ready");
    Ok(Arc::new(LoggingService::new(service)))
}

/// Logging wrapper for LLM services
pub struct LoggingService {
    inner: Arc<dyn LlmService>,
    model_id: String,
}

impl LoggingService {
    pub fn new(inner: Arc<dyn LlmService>) -> Self {
        let model_id = inner.model_id().to_string();
        Self { inner, model_id }
    }
}

#[async_trait]
impl LlmService for LoggingService {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        let start = std::time::Instant::now();
        let result = self.inner.complete(request).await;
        let duration = start.elapsed();

        match &result {
            Ok(response) => {
                tracing::info!(
                    model = %self.model_id,
                    duration_ms = %duration.as_millis(),
                    input_tokens = response.usage.input_tokens,
                    output_tokens = response.usage.output_tokens,
                    tool_calls = response.tool_uses().len(),
                    end_turn = response.end_turn,
                    "LLM request completed"
                );
            }
            Err(e) => {
                tracing::error!(
                    model = %self.model_id,
                    duration_ms = %duration.as_millis(),
                    error = %e.message,
                    kind = e.kind.code(),
                    "LLM request failed"
                );
            }
        }

        result
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}
