use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::errors::ProviderError;
use crate::providers::{self, BackendRequest, BackendResponse, TranslationBackend};
use crate::translation::prompts::{self, PromptTemplate};

const DEFAULT_ENDPOINT: &str = "http://localhost:11434";

/// Ollama client for interacting with Ollama API
pub struct Ollama {
    /// Base URL of the Ollama API
    base_url: String,
    /// HTTP client for making requests
    client: Client,
    model: String,
    temperature: f32,
    template: PromptTemplate,
    timeout: Duration,
}

impl std::fmt::Debug for Ollama {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ollama")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish()
    }
}

/// Generation options for the Ollama API
#[derive(Debug, Serialize, Deserialize)]
pub struct GenerationOptions {
    /// Temperature for generation (default: 0.8)
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    /// Maximum number of tokens to generate
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

/// Chat message object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role of the message sender (system, user, assistant, or tool)
    pub role: String,
    /// Content of the message
    pub content: String,
}

/// Chat request for the Ollama API
#[derive(Debug, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Model name to use for generation
    model: String,
    /// Messages of the conversation
    messages: Vec<ChatMessage>,
    /// Additional model parameters
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<GenerationOptions>,
    /// Whether to stream the response
    stream: bool,
}

/// Chat response from the Ollama API
#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    /// Model name
    pub model: String,
    /// Response message
    pub message: ChatMessage,
    /// Whether the generation is complete
    #[serde(default)]
    pub done: bool,
}

impl Ollama {
    /// Create a new Ollama client
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        temperature: f32,
        template: PromptTemplate,
        timeout: Duration,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            client: providers::http_client(timeout),
            model: model.into(),
            temperature,
            template,
            timeout,
        }
    }

    /// Build a non-streaming chat request
    pub fn build_request(&self, request: &BackendRequest) -> ChatRequest {
        ChatRequest {
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
            options: Some(GenerationOptions {
                temperature: Some(self.temperature),
                num_predict: None,
            }),
            stream: false,
        }
    }
}

#[async_trait]
impl TranslationBackend for Ollama {
    async fn translate(&self, request: &BackendRequest) -> Result<BackendResponse, ProviderError> {
        let url = providers::join_url(&self.base_url, DEFAULT_ENDPOINT, "api/chat");
        debug!("Ollama request to {} ({} chars)", url, request.text.len());

        let response = self
            .client
            .post(&url)
            .json(&self.build_request(request))
            .send()
            .await
            .map_err(|e| providers::send_error("Ollama", e, self.timeout))?;

        if !response.status().is_success() {
            return Err(providers::status_error("Ollama", response).await);
        }

        let chat = response.json::<ChatResponse>().await.map_err(|e| {
            ProviderError::ParseError(format!("Failed to parse Ollama response: {}", e))
        })?;
        if !chat.done {
            return Err(ProviderError::ParseError(
                "Ollama returned an incomplete response".to_string(),
            ));
        }

        Ok(BackendResponse {
            text: chat.message.content,
            model: chat.model,
        })
    }

    fn tag(&self) -> String {
        format!("ollama/{}", self.model)
    }
}
