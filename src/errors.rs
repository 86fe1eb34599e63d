/*!
 * Error types for the stringtable translator.
 *
 * Each stage of the pipeline owns an error enum. Unit-level failures
 * (`IntegrityError`, `ClientError`) are contained by the scheduler and
 * recorded against their document; only `PipelineError` aborts a run.
 */

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors raised while parsing or reassembling a document
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// The document is not a well-formed string table
    #[error("Unparseable document: {0}")]
    Unparseable(String),

    /// The number of translated units does not match the skeleton
    #[error("Expected {expected} translated units, got {actual}")]
    UnitCountMismatch {
        /// Slots in the skeleton
        expected: usize,
        /// Units supplied by the caller
        actual: usize,
    },
}

/// Errors raised when placeholder markers cannot be applied or restored
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IntegrityError {
    /// The source text already contains a character reserved for markers
    #[error("Source contains reserved character U+{codepoint:04X} at byte {position}")]
    ReservedCharacter { position: usize, codepoint: u32 },

    /// The unit holds more placeholders than there are markers
    #[error("Too many placeholders in one unit ({0})")]
    TooManyPlaceholders(usize),

    /// A marker was dropped by the backend
    #[error("Translation lost placeholder #{index} ({literal})")]
    MissingMarker { index: usize, literal: String },

    /// A marker appears more than once in the translation
    #[error("Translation repeats placeholder #{index} ({literal})")]
    DuplicateMarker { index: usize, literal: String },

    /// A reserved character with no matching substitution
    #[error("Translation contains unknown marker U+{codepoint:04X}")]
    UnknownMarker { codepoint: u32 },

    /// The restored text holds a placeholder the source did not have
    #[error("Translation added placeholder {literal}")]
    UnexpectedPlaceholder { literal: String },
}

/// How a backend failure should be handled by the retry loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The request did not answer in time
    Timeout,
    /// The backend asked us to slow down
    RateLimited,
    /// Connection drops, 5xx answers, unparseable bodies
    Transient,
    /// Retrying cannot help
    Terminal,
}

/// Errors that can occur when working with provider APIs
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    /// The request could not be built or was rejected as malformed
    #[error("API request failed: {0}")]
    RequestFailed(String),

    /// Error when parsing an API response fails
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Error returned by the API itself
    #[error("API responded with error: {status_code} - {message}")]
    ApiError {
        /// HTTP status code
        status_code: u16,
        /// Error message from the API
        message: String,
    },

    /// Error establishing or maintaining a connection
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Error related to rate limiting
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// Error with authentication
    #[error("Authentication error: {0}")]
    AuthenticationError(String),

    /// The backend refused to translate the content
    #[error("Content rejected: {0}")]
    ContentRejected(String),

    /// No answer within the request timeout
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
}

impl ProviderError {
    /// Classify the error for the retry loop
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::RateLimitExceeded(_) => ErrorKind::RateLimited,
            Self::ConnectionError(_) | Self::ParseError(_) => ErrorKind::Transient,
            Self::ApiError { status_code, .. } => match *status_code {
                429 => ErrorKind::RateLimited,
                408 => ErrorKind::Timeout,
                500..=599 => ErrorKind::Transient,
                _ => ErrorKind::Terminal,
            },
            Self::RequestFailed(_) | Self::AuthenticationError(_) | Self::ContentRejected(_) => {
                ErrorKind::Terminal
            }
        }
    }

    /// Map an HTTP error status onto the matching variant
    pub fn from_status(status_code: u16, message: String) -> Self {
        match status_code {
            401 | 403 => Self::AuthenticationError(message),
            429 => Self::RateLimitExceeded(message),
            _ => Self::ApiError { status_code, message },
        }
    }
}

/// Errors surfaced by the translation client after retries are applied
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClientError {
    /// Every allowed attempt failed with a retryable error
    #[error("Gave up after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: ProviderError },

    /// The backend returned an error that retrying cannot fix
    #[error("Terminal backend error: {0}")]
    Terminal(ProviderError),

    /// The batched response did not contain this entry
    #[error("Backend response omitted entry {0}")]
    MissingEntry(usize),

    /// A stop was requested before the request completed
    #[error("Request cancelled by stop signal")]
    Cancelled,
}

/// Errors from the persistent translation cache
#[derive(Error, Debug)]
pub enum CacheError {
    /// The cache store could not be opened, read or written
    #[error("Translation cache unavailable: {0}")]
    Unavailable(String),
}

impl From<anyhow::Error> for CacheError {
    fn from(error: anyhow::Error) -> Self {
        Self::Unavailable(format!("{:#}", error))
    }
}

/// Reason a single text unit could not be translated
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TranslationError {
    /// Placeholder masking or restoration failed
    #[error("Integrity error: {0}")]
    Integrity(#[from] IntegrityError),

    /// The backend did not deliver a translation
    #[error("Client error: {0}")]
    Client(#[from] ClientError),
}

/// Fatal errors that stop a whole run
#[derive(Error, Debug)]
pub enum PipelineError {
    /// The cache store failed
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// An output file could not be written
    #[error("Failed to write output {path}: {message}")]
    OutputWrite { path: PathBuf, message: String },

    /// The input tree could not be scanned
    #[error("Failed to scan input tree: {0}")]
    Discovery(String),
}
