/*!
 * Backend implementations for different translation services.
 *
 * This module contains client implementations for various LLM providers:
 * - OpenAI: OpenAI API integration (also used for LM Studio's compatible server)
 * - Anthropic: Anthropic API integration
 * - Ollama: Local LLM server
 * - Mock: scripted backend for tests and offline runs
 */

use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use log::error;

use crate::app_config::{Config, TranslationProvider};
use crate::errors::ProviderError;
use crate::translation::glossary::GlossaryEntry;
use crate::translation::prompts::PromptTemplate;

pub mod anthropic;
pub mod mock;
pub mod ollama;
pub mod openai;

/// One unit of work for a backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendRequest {
    /// Masked text, or several entries framed with `<<ENTRY_n>>` markers
    pub text: String,
    pub source_language: String,
    pub target_language: String,
    /// Glossary terms that occur in the text
    pub glossary: Vec<GlossaryEntry>,
    /// Number of framed entries in `text`, zero for a single unit
    pub entries: usize,
}

/// What a backend sends back
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendResponse {
    pub text: String,
    /// Model that produced the text
    pub model: String,
}

/// Common trait for all translation backends
///
/// Implementations perform exactly one request per call; timeouts,
/// retries and pacing are applied by the translation client.
#[async_trait]
pub trait TranslationBackend: Send + Sync + Debug {
    /// Translate the request text
    async fn translate(&self, request: &BackendRequest) -> Result<BackendResponse, ProviderError>;

    /// Provider and model, recorded with every cached translation
    fn tag(&self) -> String;
}

/// Build the backend selected in the configuration
pub fn create_backend(config: &Config) -> Result<Arc<dyn TranslationBackend>> {
    let provider = config.translation.provider.clone();
    let settings = config
        .translation
        .get_provider_config(&provider)
        .ok_or_else(|| anyhow!("No configuration for provider {}", provider.display_name()))?;
    let timeout = Duration::from_secs(settings.timeout_secs);
    let template = PromptTemplate::new(&config.translation.common.system_prompt);
    let temperature = config.translation.common.temperature;

    let backend: Arc<dyn TranslationBackend> = match provider {
        TranslationProvider::OpenAI | TranslationProvider::LMStudio => Arc::new(openai::OpenAI::new(
            provider.clone(),
            config.translation.get_api_key(),
            config.translation.get_endpoint(),
            config.translation.get_model(),
            temperature,
            template,
            timeout,
        )),
        TranslationProvider::Anthropic => Arc::new(anthropic::Anthropic::new(
            config.translation.get_api_key().unwrap_or_default(),
            config.translation.get_endpoint(),
            config.translation.get_model(),
            temperature,
            template,
            timeout,
        )),
        TranslationProvider::Ollama => Arc::new(ollama::Ollama::new(
            config.translation.get_endpoint(),
            config.translation.get_model(),
            temperature,
            template,
            timeout,
        )),
    };
    Ok(backend)
}

/// HTTP client with the request timeout applied
pub(crate) fn http_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_default()
}

/// Classify a transport-level failure
pub(crate) fn send_error(provider: &str, err: reqwest::Error, timeout: Duration) -> ProviderError {
    if err.is_timeout() {
        ProviderError::Timeout(timeout)
    } else if err.is_builder() {
        ProviderError::RequestFailed(format!("{}: {}", provider, err))
    } else {
        ProviderError::ConnectionError(format!("Failed to send request to {}: {}", provider, err))
    }
}

/// Turn a non-success HTTP answer into a provider error
pub(crate) async fn status_error(provider: &str, response: reqwest::Response) -> ProviderError {
    let status = response.status();
    let error_text = response
        .text()
        .await
        .unwrap_or_else(|_| "Failed to get error response text".to_string());
    error!("{} API error ({}): {}", provider, status, error_text);
    ProviderError::from_status(status.as_u16(), error_text)
}

/// Join a base URL and a path without doubling slashes
pub(crate) fn join_url(endpoint: &str, default: &str, path: &str) -> String {
    let base = if endpoint.trim().is_empty() {
        default
    } else {
        endpoint.trim()
    };
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}
