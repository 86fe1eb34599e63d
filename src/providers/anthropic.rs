use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::errors::ProviderError;
use crate::providers::{self, BackendRequest, BackendResponse, TranslationBackend};
use crate::translation::prompts::{self, PromptTemplate};

const DEFAULT_ENDPOINT: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 4096;

/// Anthropic client for interacting with Anthropic API
pub struct Anthropic {
    /// HTTP client for API requests
    client: Client,
    /// API key for authentication
    api_key: String,
    /// API endpoint URL (optional, defaults to public API)
    endpoint: String,
    model: String,
    temperature: f32,
    template: PromptTemplate,
    timeout: Duration,
}

impl std::fmt::Debug for Anthropic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Anthropic")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .finish()
    }
}

/// Anthropic message request
#[derive(Debug, Serialize)]
pub struct AnthropicRequest {
    /// The model to use
    model: String,

    /// The messages for the conversation
    messages: Vec<AnthropicMessage>,

    /// System prompt to guide the AI
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,

    /// Temperature for generation
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,

    /// Maximum number of tokens to generate
    max_tokens: u32,
}

/// Anthropic message format
#[derive(Debug, Serialize, Deserialize)]
pub struct AnthropicMessage {
    /// Role of the message sender (user, assistant)
    pub role: String,

    /// Content of the message
    pub content: String,
}

/// Anthropic response
#[derive(Debug, Deserialize)]
pub struct AnthropicResponse {
    /// The content of the response
    pub content: Vec<AnthropicContent>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub stop_reason: Option<String>,
}

/// Individual content block in an Anthropic response
#[derive(Debug, Deserialize)]
pub struct AnthropicContent {
    /// The type of content
    #[serde(rename = "type")]
    pub content_type: String,

    /// The actual text content
    #[serde(default)]
    pub text: String,
}

impl AnthropicRequest {
    /// Create a new Anthropic request
    pub fn new(model: impl Into<String>, max_tokens: u32) -> Self {
        Self {
            model: model.into(),
            messages: Vec::new(),
            system: None,
            temperature: None,
            max_tokens,
        }
    }

    /// Add a message to the request
    pub fn add_message(mut self, role: impl Into<String>, content: impl Into<String>) -> Self {
        self.messages.push(AnthropicMessage {
            role: role.into(),
            content: content.into(),
        });
        self
    }

    /// Set the system prompt
    pub fn system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Set the temperature
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

impl Anthropic {
    /// Create a new Anthropic client
    pub fn new(
        api_key: impl Into<String>,
        endpoint: impl Into<String>,
        model: impl Into<String>,
        temperature: f32,
        template: PromptTemplate,
        timeout: Duration,
    ) -> Self {
        Self {
            client: providers::http_client(timeout),
            api_key: api_key.into(),
            endpoint: endpoint.into(),
            model: model.into(),
            temperature,
            template,
            timeout,
        }
    }

    /// Build the messages request for a backend request
    pub fn build_request(&self, request: &BackendRequest) -> AnthropicRequest {
        AnthropicRequest::new(&self.model, MAX_TOKENS)
            .system(
                self.template
                    .render(&request.source_language, &request.target_language),
            )
            .temperature(self.temperature)
            .add_message("user", prompts::user_prompt(request))
    }

    /// Extract text from Anthropic response
    pub fn extract_text_from_response(response: &AnthropicResponse) -> Result<String, ProviderError> {
        if response.stop_reason.as_deref() == Some("refusal") {
            return Err(ProviderError::ContentRejected(
                "Model refused to translate the text".to_string(),
            ));
        }
        let text: String = response
            .content
            .iter()
            .filter(|c| c.content_type == "text")
            .map(|c| c.text.as_str())
            .collect();
        Ok(text)
    }
}

#[async_trait]
impl TranslationBackend for Anthropic {
    async fn translate(&self, request: &BackendRequest) -> Result<BackendResponse, ProviderError> {
        let api_url = providers::join_url(&self.endpoint, DEFAULT_ENDPOINT, "v1/messages");
        debug!("Anthropic request to {} ({} chars)", api_url, request.text.len());

        let response = self
            .client
            .post(&api_url)
            .header("Content-Type", "application/json")
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&self.build_request(request))
            .send()
            .await
            .map_err(|e| providers::send_error("Anthropic", e, self.timeout))?;

        if !response.status().is_success() {
            return Err(providers::status_error("Anthropic", response).await);
        }

        let anthropic_response = response.json::<AnthropicResponse>().await.map_err(|e| {
            ProviderError::ParseError(format!("Failed to parse Anthropic API response: {}", e))
        })?;
        let text = Self::extract_text_from_response(&anthropic_response)?;

        Ok(BackendResponse {
            text,
            model: anthropic_response.model.unwrap_or_else(|| self.model.clone()),
        })
    }

    fn tag(&self) -> String {
        format!("anthropic/{}", self.model)
    }
}
