use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};

use crate::app_config::TranslationProvider;
use crate::errors::ProviderError;
use crate::providers::{self, BackendRequest, BackendResponse, TranslationBackend};
use crate::translation::prompts::{self, PromptTemplate};

const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1";

/// Client for the OpenAI chat completions API and compatible servers (LM Studio)
pub struct OpenAI {
    /// HTTP client for API requests
    client: Client,
    /// OpenAI or LM Studio
    provider: TranslationProvider,
    /// Bearer token; local servers run without one
    api_key: Option<String>,
    /// Base URL, `/chat/completions` is appended
    endpoint: String,
    model: String,
    temperature: f32,
    template: PromptTemplate,
    timeout: Duration,
}

impl std::fmt::Debug for OpenAI {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAI")
            .field("provider", &self.provider)
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .finish()
    }
}

/// Chat completion request
#[derive(Debug, Serialize)]
pub struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

/// Message in a chat conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// system, user or assistant
    pub role: String,
    pub content: String,
}

/// Chat completion response
#[derive(Debug, Deserialize)]
pub struct ChatCompletionResponse {
    #[serde(default)]
    pub model: Option<String>,
    pub choices: Vec<ChatChoice>,
}

/// One completion choice
#[derive(Debug, Deserialize)]
pub struct ChatChoice {
    pub message: ChatMessage,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

impl OpenAI {
    /// Create a new client
    pub fn new(
        provider: TranslationProvider,
        api_key: Option<String>,
        endpoint: impl Into<String>,
        model: impl Into<String>,
        temperature: f32,
        template: PromptTemplate,
        timeout: Duration,
    ) -> Self {
        Self {
            client: providers::http_client(timeout),
            provider,
            api_key: api_key.filter(|key| !key.is_empty()),
            endpoint: endpoint.into(),
            model: model.into(),
            temperature,
            template,
            timeout,
        }
    }

    /// Build the chat request for a backend request
    pub fn build_request(&self, request: &BackendRequest) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: self
                        .template
                        .render(&request.source_language, &request.target_language),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: prompts::user_prompt(request),
                },
            ],
            temperature: self.temperature,
            max_tokens: None,
        }
    }

    /// Text of the first choice
    pub fn extract_text(response: &ChatCompletionResponse) -> Result<String, ProviderError> {
        let choice = response
            .choices
            .first()
            .ok_or_else(|| ProviderError::ParseError("Response contained no choices".to_string()))?;
        if choice.finish_reason.as_deref() == Some("content_filter") {
            return Err(ProviderError::ContentRejected(
                "Completion stopped by the content filter".to_string(),
            ));
        }
        if choice.finish_reason.as_deref() == Some("length") {
            warn!("Completion truncated at the token limit");
        }
        Ok(choice.message.content.clone())
    }

    fn name(&self) -> &str {
        self.provider.display_name()
    }
}

#[async_trait]
impl TranslationBackend for OpenAI {
    async fn translate(&self, request: &BackendRequest) -> Result<BackendResponse, ProviderError> {
        let url = providers::join_url(&self.endpoint, DEFAULT_ENDPOINT, "chat/completions");
        let body = self.build_request(request);
        debug!("{} request to {} ({} chars)", self.name(), url, request.text.len());

        let mut builder = self
            .client
            .post(&url)
            .header(header::CONTENT_TYPE, "application/json")
            .json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| providers::send_error(self.name(), e, self.timeout))?;
        if !response.status().is_success() {
            return Err(providers::status_error(self.name(), response).await);
        }

        let completion = response.json::<ChatCompletionResponse>().await.map_err(|e| {
            ProviderError::ParseError(format!("Failed to parse {} response: {}", self.name(), e))
        })?;
        let text = Self::extract_text(&completion)?;

        Ok(BackendResponse {
            text,
            model: completion.model.unwrap_or_else(|| self.model.clone()),
        })
    }

    fn tag(&self) -> String {
        format!("{}/{}", self.provider.to_lowercase_string(), self.model)
    }
}
