/*!
 * Database entity models.
 *
 * These structures map directly to the cache table and provide
 * type-safe access to persisted data.
 */

use serde::{Deserialize, Serialize};

/// A row of the `translation_cache` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheRecord {
    /// Hex SHA-256 fingerprint of (source text, target language, glossary version)
    pub fingerprint: String,
    /// Normalized source text, kept for inspection
    pub source_text: String,
    /// Target language code
    pub target_language: String,
    /// Version of the glossary the translation was made with
    pub glossary_version: String,
    /// Translated text with placeholder markers still in place
    pub translated_text: String,
    /// Backend and model that produced the translation
    pub backend: String,
    /// Creation timestamp (RFC 3339)
    pub created_at: String,
    /// Number of cache hits
    pub hit_count: i64,
}

impl CacheRecord {
    /// Create a new cache record stamped with the current time
    pub fn new(
        fingerprint: String,
        source_text: String,
        target_language: String,
        glossary_version: String,
        translated_text: String,
        backend: String,
    ) -> Self {
        Self {
            fingerprint,
            source_text,
            target_language,
            glossary_version,
            translated_text,
            backend,
            created_at: chrono::Utc::now().to_rfc3339(),
            hit_count: 0,
        }
    }
}

/// What happened to an insert into the cache table
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The row is new
    Inserted,
    /// An identical translation was already stored
    Duplicate,
    /// A different translation was already stored; it is kept
    Conflict(CacheRecord),
}

/// Cache statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Total number of cache entries
    pub total_entries: i64,
    /// Total number of cache hits
    pub total_hits: i64,
    /// Entry counts per glossary version, largest first
    pub glossary_versions: Vec<(String, i64)>,
    /// Entry counts per target language, largest first
    pub target_languages: Vec<(String, i64)>,
}
