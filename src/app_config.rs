/*!
 * Application configuration.
 *
 * The configuration is a JSON file (`conf.json` by default). A default
 * file is written when none exists; every field has a serde default so
 * partial files load. Command-line flags override individual values.
 */

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use log::info;
use serde::{Deserialize, Serialize};

use crate::language_utils;
use crate::pipeline::discovery::MAX_INPUT_BYTES;
use crate::translation::retry::RetryPolicy;

/// Represents the application configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    /// Source language code (ISO)
    #[serde(default = "default_source_language")]
    pub source_language: String,

    /// Target language code (ISO)
    #[serde(default = "default_target_language")]
    pub target_language: String,

    /// Translation config
    #[serde(default)]
    pub translation: TranslationConfig,

    /// Document pipeline config
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Translation provider type
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TranslationProvider {
    #[default]
    OpenAI,
    Anthropic,
    Ollama,
    /// LM Studio (OpenAI-compatible local server)
    LMStudio,
}

impl TranslationProvider {
    /// Capitalized provider name
    pub fn display_name(&self) -> &str {
        match self {
            Self::OpenAI => "OpenAI",
            Self::Anthropic => "Anthropic",
            Self::Ollama => "Ollama",
            Self::LMStudio => "LM Studio",
        }
    }

    /// Lowercase provider identifier
    pub fn to_lowercase_string(&self) -> String {
        match self {
            Self::OpenAI => "openai".to_string(),
            Self::Anthropic => "anthropic".to_string(),
            Self::Ollama => "ollama".to_string(),
            Self::LMStudio => "lmstudio".to_string(),
        }
    }

    /// Environment variable consulted when the config has no API key
    pub fn api_key_env(&self) -> Option<&'static str> {
        match self {
            Self::OpenAI => Some("OPENAI_API_KEY"),
            Self::Anthropic => Some("ANTHROPIC_API_KEY"),
            Self::LMStudio => Some("LMSTUDIO_API_KEY"),
            Self::Ollama => None,
        }
    }

    /// Whether requests are rejected without an API key
    pub fn requires_api_key(&self) -> bool {
        matches!(self, Self::OpenAI | Self::Anthropic)
    }
}

impl std::fmt::Display for TranslationProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_lowercase_string())
    }
}

impl std::str::FromStr for TranslationProvider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAI),
            "anthropic" => Ok(Self::Anthropic),
            "ollama" => Ok(Self::Ollama),
            "lmstudio" => Ok(Self::LMStudio),
            _ => Err(anyhow!("Invalid provider type: {}", s)),
        }
    }
}

/// Per-provider connection settings
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ProviderConfig {
    /// Provider type identifier
    #[serde(rename = "type")]
    pub provider_type: String,

    /// Model name
    #[serde(default)]
    pub model: String,

    /// API key; falls back to the provider's environment variable
    #[serde(default)]
    pub api_key: String,

    /// Service URL
    #[serde(default)]
    pub endpoint: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Rate limit (requests per minute)
    #[serde(default)]
    pub rate_limit: Option<u32>,

    /// Price per million tokens, for the dry-run cost estimate
    #[serde(default)]
    pub price_per_million_tokens: Option<f64>,
}

impl ProviderConfig {
    /// Provider config with defaults
    pub fn new(provider_type: TranslationProvider) -> Self {
        Self {
            provider_type: provider_type.to_lowercase_string(),
            model: default_model(&provider_type),
            api_key: String::new(),
            endpoint: default_endpoint(&provider_type),
            timeout_secs: default_timeout_secs(),
            rate_limit: default_rate_limit(&provider_type),
            price_per_million_tokens: None,
        }
    }
}

/// Translation service configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TranslationConfig {
    /// Translation provider to use
    #[serde(default)]
    pub provider: TranslationProvider,

    /// Available translation providers
    #[serde(default = "default_available_providers")]
    pub available_providers: Vec<ProviderConfig>,

    /// Common translation settings
    #[serde(default)]
    pub common: TranslationCommonConfig,
}

/// Common translation settings applicable to all providers
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TranslationCommonConfig {
    /// System prompt template for translation
    /// Placeholders: {source_language}, {target_language}
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    /// Minimum delay in milliseconds between consecutive requests
    #[serde(default = "default_rate_limit_delay_ms")]
    pub rate_limit_delay_ms: u64,

    /// Retries after the first failed attempt
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,

    /// First retry delay in milliseconds, doubled on each retry
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Upper bound for a single retry delay in milliseconds
    #[serde(default = "default_max_retry_delay_ms")]
    pub max_retry_delay_ms: u64,

    /// Temperature parameter for text generation (0.0 to 1.0)
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl Default for TranslationCommonConfig {
    fn default() -> Self {
        Self {
            system_prompt: default_system_prompt(),
            rate_limit_delay_ms: default_rate_limit_delay_ms(),
            retry_count: default_retry_count(),
            retry_backoff_ms: default_retry_backoff_ms(),
            max_retry_delay_ms: default_max_retry_delay_ms(),
            temperature: default_temperature(),
        }
    }
}

/// Document discovery, batching and output settings
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PipelineConfig {
    /// Maximum units per backend request
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Documents processed at the same time
    #[serde(default = "default_concurrent_documents")]
    pub concurrent_documents: usize,

    /// Extension of input documents, without the dot
    #[serde(default = "default_file_extension")]
    pub file_extension: String,

    /// Output subtree under the output directory; `{lang}` is replaced
    #[serde(default = "default_output_layout")]
    pub output_layout: String,

    /// Language directory to write into when the game has no slot for the target language
    #[serde(default)]
    pub language_slot: Option<String>,

    /// SQLite cache file
    #[serde(default = "default_cache_path")]
    pub cache_path: PathBuf,

    /// CSV or JSON glossary
    #[serde(default)]
    pub glossary_path: Option<PathBuf>,

    /// Elements whose text is translated
    #[serde(default = "default_translatable_elements")]
    pub translatable_elements: Vec<String>,

    /// Inputs larger than this are reported as failed
    #[serde(default = "default_max_input_bytes")]
    pub max_input_bytes: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            concurrent_documents: default_concurrent_documents(),
            file_extension: default_file_extension(),
            output_layout: default_output_layout(),
            language_slot: None,
            cache_path: default_cache_path(),
            glossary_path: None,
            translatable_elements: default_translatable_elements(),
            max_input_bytes: default_max_input_bytes(),
        }
    }
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn to_level_filter(self) -> log::LevelFilter {
        match self {
            Self::Error => log::LevelFilter::Error,
            Self::Warn => log::LevelFilter::Warn,
            Self::Info => log::LevelFilter::Info,
            Self::Debug => log::LevelFilter::Debug,
            Self::Trace => log::LevelFilter::Trace,
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "error" => Ok(Self::Error),
            "warn" | "warning" => Ok(Self::Warn),
            "info" => Ok(Self::Info),
            "debug" => Ok(Self::Debug),
            "trace" => Ok(Self::Trace),
            _ => Err(anyhow!("Invalid log level: {}", s)),
        }
    }
}

fn default_source_language() -> String {
    "en".to_string()
}

fn default_target_language() -> String {
    "fa".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_rate_limit_delay_ms() -> u64 {
    2000
}

fn default_retry_count() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    2000
}

fn default_max_retry_delay_ms() -> u64 {
    60_000
}

fn default_temperature() -> f32 {
    0.3
}

fn default_batch_size() -> usize {
    15
}

fn default_concurrent_documents() -> usize {
    2
}

fn default_file_extension() -> String {
    "stringtable".to_string()
}

fn default_output_layout() -> String {
    "localized/{lang}/text".to_string()
}

fn default_cache_path() -> PathBuf {
    PathBuf::from("translation_cache.db")
}

fn default_translatable_elements() -> Vec<String> {
    vec!["DefaultText".to_string(), "FemaleText".to_string()]
}

fn default_max_input_bytes() -> u64 {
    MAX_INPUT_BYTES
}

fn default_system_prompt() -> String {
    crate::translation::prompts::PromptTemplate::GAME_LOCALIZER.to_string()
}

fn default_model(provider: &TranslationProvider) -> String {
    match provider {
        TranslationProvider::OpenAI => "gpt-4o-mini",
        TranslationProvider::Anthropic => "claude-3-5-haiku-latest",
        TranslationProvider::Ollama => "llama3.1",
        // Placeholder; users should set the model loaded in LM Studio
        TranslationProvider::LMStudio => "local-model",
    }
    .to_string()
}

fn default_endpoint(provider: &TranslationProvider) -> String {
    match provider {
        TranslationProvider::OpenAI => "https://api.openai.com/v1",
        TranslationProvider::Anthropic => "https://api.anthropic.com",
        TranslationProvider::Ollama => "http://localhost:11434",
        TranslationProvider::LMStudio => "http://localhost:1234/v1",
    }
    .to_string()
}

fn default_rate_limit(provider: &TranslationProvider) -> Option<u32> {
    match provider {
        TranslationProvider::OpenAI => Some(60),
        // Slightly below Anthropic's standard 50 requests per minute
        TranslationProvider::Anthropic => Some(45),
        TranslationProvider::Ollama | TranslationProvider::LMStudio => None,
    }
}

fn default_available_providers() -> Vec<ProviderConfig> {
    [
        TranslationProvider::OpenAI,
        TranslationProvider::Anthropic,
        TranslationProvider::Ollama,
        TranslationProvider::LMStudio,
    ]
    .into_iter()
    .map(ProviderConfig::new)
    .collect()
}

impl Config {
    /// Load a configuration file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Write the configuration as pretty JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))
    }

    /// Load the file, or write and return the defaults when it does not exist
    pub fn load_or_create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            return Self::from_file(path);
        }
        let config = Self::default();
        config.save(path)?;
        info!("Created default configuration at {}", path.display());
        Ok(config)
    }

    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<()> {
        self.validate_pipeline()?;

        let provider = &self.translation.provider;
        if provider.requires_api_key() && self.translation.get_api_key().is_none() {
            return Err(anyhow!(
                "Translation API key is required for {} provider (set it in the config or {})",
                provider.display_name(),
                provider.api_key_env().unwrap_or("the environment")
            ));
        }
        Ok(())
    }

    /// Everything `validate` checks except credentials
    pub fn validate_pipeline(&self) -> Result<()> {
        language_utils::validate_language_code(&self.source_language)
            .context("Invalid source language")?;
        language_utils::validate_language_code(&self.target_language)
            .context("Invalid target language")?;
        if language_utils::language_codes_match(&self.source_language, &self.target_language) {
            return Err(anyhow!(
                "Source and target language are both {}",
                self.target_language
            ));
        }

        let endpoint = self.translation.get_endpoint();
        url::Url::parse(&endpoint)
            .with_context(|| format!("Invalid endpoint URL: {}", endpoint))?;
        if self.translation.get_timeout().is_zero() {
            return Err(anyhow!("Request timeout must be greater than zero"));
        }
        if self.pipeline.batch_size == 0 {
            return Err(anyhow!("batch_size must be at least 1"));
        }
        if self.pipeline.concurrent_documents == 0 {
            return Err(anyhow!("concurrent_documents must be at least 1"));
        }
        if self.pipeline.file_extension.trim_start_matches('.').is_empty() {
            return Err(anyhow!("file_extension must not be empty"));
        }
        if self.pipeline.translatable_elements.is_empty() {
            return Err(anyhow!("translatable_elements must name at least one element"));
        }
        if self.pipeline.max_input_bytes == 0 {
            return Err(anyhow!("max_input_bytes must be greater than zero"));
        }
        if let Some(price) = self.translation.get_price_per_million_tokens() {
            if !price.is_finite() || price < 0.0 {
                return Err(anyhow!("price_per_million_tokens must be a non-negative number"));
            }
        }

        Ok(())
    }

    /// Directory name used for the target language in the output tree
    pub fn output_language_slot(&self) -> &str {
        self.pipeline
            .language_slot
            .as_deref()
            .unwrap_or(&self.target_language)
    }

    /// Output subtree with the language slot filled in
    pub fn output_subdir(&self) -> PathBuf {
        PathBuf::from(
            self.pipeline
                .output_layout
                .replace("{lang}", self.output_language_slot()),
        )
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            source_language: default_source_language(),
            target_language: default_target_language(),
            translation: TranslationConfig::default(),
            pipeline: PipelineConfig::default(),
            log_level: LogLevel::default(),
        }
    }
}

impl TranslationConfig {
    /// Get the active provider configuration from the available_providers array
    pub fn get_active_provider_config(&self) -> Option<&ProviderConfig> {
        self.get_provider_config(&self.provider)
    }

    /// Get a specific provider configuration by type
    pub fn get_provider_config(&self, provider_type: &TranslationProvider) -> Option<&ProviderConfig> {
        let provider_str = provider_type.to_lowercase_string();
        self.available_providers
            .iter()
            .find(|p| p.provider_type == provider_str)
    }

    /// Get the model for the active provider
    pub fn get_model(&self) -> String {
        self.get_active_provider_config()
            .map(|p| p.model.clone())
            .filter(|model| !model.is_empty())
            .unwrap_or_else(|| default_model(&self.provider))
    }

    /// API key from the config, else from the provider's environment variable
    pub fn get_api_key(&self) -> Option<String> {
        if let Some(provider_config) = self.get_active_provider_config() {
            if !provider_config.api_key.is_empty() {
                return Some(provider_config.api_key.clone());
            }
        }
        self.provider
            .api_key_env()
            .and_then(|name| std::env::var(name).ok())
            .filter(|key| !key.trim().is_empty())
    }

    /// Get the endpoint for the active provider
    pub fn get_endpoint(&self) -> String {
        self.get_active_provider_config()
            .map(|p| p.endpoint.clone())
            .filter(|endpoint| !endpoint.is_empty())
            .unwrap_or_else(|| default_endpoint(&self.provider))
    }

    /// Per-request timeout for the active provider
    pub fn get_timeout(&self) -> Duration {
        let secs = self
            .get_active_provider_config()
            .map(|p| p.timeout_secs)
            .unwrap_or_else(default_timeout_secs);
        Duration::from_secs(secs)
    }

    /// Get the rate limit for the active provider
    pub fn get_rate_limit(&self) -> Option<u32> {
        match self.get_active_provider_config() {
            Some(provider_config) => provider_config.rate_limit,
            None => default_rate_limit(&self.provider),
        }
    }

    /// Price per million tokens of the active provider, when configured
    pub fn get_price_per_million_tokens(&self) -> Option<f64> {
        self.get_active_provider_config()
            .and_then(|p| p.price_per_million_tokens)
    }

    /// Minimum spacing between requests: the stricter of the fixed delay and the rate limit
    pub fn min_request_interval(&self) -> Duration {
        let fixed = Duration::from_millis(self.common.rate_limit_delay_ms);
        let per_minute = self
            .get_rate_limit()
            .filter(|rpm| *rpm > 0)
            .map(|rpm| Duration::from_secs(60) / rpm)
            .unwrap_or(Duration::ZERO);
        fixed.max(per_minute)
    }

    /// Retry settings for the translation client
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.common.retry_count,
            Duration::from_millis(self.common.retry_backoff_ms),
            Duration::from_millis(self.common.max_retry_delay_ms),
        )
    }
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            provider: TranslationProvider::default(),
            available_providers: default_available_providers(),
            common: TranslationCommonConfig::default(),
        }
    }
}
