/*!
 * Content-addressed translation cache.
 *
 * A translation is stored under the fingerprint of
 * (normalized source text, target language, glossary version). Entries
 * are immutable once written, so every later lookup of the same string
 * returns the same translation, whichever worker or run produced it.
 */

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use log::{debug, warn};
use parking_lot::RwLock;
use sha2::{Digest, Sha256};

use crate::database::{CacheRecord, CacheStats, DatabaseConnection, InsertOutcome, Repository};
use crate::errors::CacheError;

/// SHA-256 over length-prefixed key fields, hex encoded
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn compute(source_text: &str, target_language: &str, glossary_version: &str) -> Self {
        let mut hasher = Sha256::new();
        for field in [source_text, target_language, glossary_version] {
            hasher.update((field.len() as u64).to_le_bytes());
            hasher.update(field.as_bytes());
        }
        Self(format!("{:x}", hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A fingerprint together with the fields it was computed from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKey {
    pub fingerprint: Fingerprint,
    pub source_text: String,
    pub target_language: String,
    pub glossary_version: String,
}

impl CacheKey {
    pub fn new(source_text: &str, target_language: &str, glossary_version: &str) -> Self {
        Self {
            fingerprint: Fingerprint::compute(source_text, target_language, glossary_version),
            source_text: source_text.to_string(),
            target_language: target_language.to_string(),
            glossary_version: glossary_version.to_string(),
        }
    }
}

/// A stored translation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// Translated text, placeholders still masked
    pub translated_text: String,
    /// Backend and model tag
    pub backend: String,
    /// When the entry was written (RFC 3339)
    pub created_at: String,
}

impl CacheEntry {
    pub fn new(translated_text: impl Into<String>, backend: impl Into<String>) -> Self {
        Self {
            translated_text: translated_text.into(),
            backend: backend.into(),
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

impl From<CacheRecord> for CacheEntry {
    fn from(record: CacheRecord) -> Self {
        Self {
            translated_text: record.translated_text,
            backend: record.backend,
            created_at: record.created_at,
        }
    }
}

/// Result of a `put`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PutOutcome {
    Inserted,
    /// The same translation was already stored
    Duplicate,
    /// Another translation was stored first and stays authoritative
    Conflict(CacheEntry),
}

/// Persistent translation cache with per-run hit counters
#[derive(Clone, Debug)]
pub struct TranslationCache {
    repository: Repository,

    /// Cache hit counter
    hits: Arc<RwLock<usize>>,

    /// Cache miss counter
    misses: Arc<RwLock<usize>>,
}

impl TranslationCache {
    pub fn new(repository: Repository) -> Self {
        Self {
            repository,
            hits: Arc::new(RwLock::new(0)),
            misses: Arc::new(RwLock::new(0)),
        }
    }

    /// Open the cache file, creating it if needed
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, CacheError> {
        let connection = DatabaseConnection::new(path)?;
        Ok(Self::new(Repository::new(connection)))
    }

    /// A throwaway cache that lives for the process only
    pub fn in_memory() -> Result<Self, CacheError> {
        Ok(Self::new(Repository::new_in_memory()?))
    }

    /// Look up a translation, counting the hit or miss
    pub async fn get(&self, fingerprint: &Fingerprint) -> Result<Option<CacheEntry>, CacheError> {
        let record = self.repository.get_cached_translation(fingerprint.as_str()).await?;

        match record {
            Some(record) => {
                *self.hits.write() += 1;
                debug!("Cache hit for {}", fingerprint);
                Ok(Some(record.into()))
            }
            None => {
                *self.misses.write() += 1;
                debug!("Cache miss for {}", fingerprint);
                Ok(None)
            }
        }
    }

    /// Check for an entry without counting anything
    pub async fn contains(&self, fingerprint: &Fingerprint) -> Result<bool, CacheError> {
        let record = self.repository.peek_cached_translation(fingerprint.as_str()).await?;
        Ok(record.is_some())
    }

    /// Store a confirmed translation. Never overwrites an existing entry.
    pub async fn put(&self, key: &CacheKey, entry: CacheEntry) -> Result<PutOutcome, CacheError> {
        let record = CacheRecord {
            fingerprint: key.fingerprint.as_str().to_string(),
            source_text: key.source_text.clone(),
            target_language: key.target_language.clone(),
            glossary_version: key.glossary_version.clone(),
            translated_text: entry.translated_text,
            backend: entry.backend,
            created_at: entry.created_at,
            hit_count: 0,
        };

        let outcome = match self.repository.insert_cache_record(&record).await? {
            InsertOutcome::Inserted => PutOutcome::Inserted,
            InsertOutcome::Duplicate => PutOutcome::Duplicate,
            InsertOutcome::Conflict(existing) => {
                warn!(
                    "Cache already holds a different translation for {}; keeping the stored one",
                    key.fingerprint
                );
                PutOutcome::Conflict(existing.into())
            }
        };
        Ok(outcome)
    }

    /// Hits, misses and hit rate for this process
    pub fn session_stats(&self) -> (usize, usize, f64) {
        let hits = *self.hits.read();
        let misses = *self.misses.read();
        let total = hits + misses;
        let hit_rate = if total > 0 {
            hits as f64 / total as f64
        } else {
            0.0
        };
        (hits, misses, hit_rate)
    }

    /// Totals over the whole store
    pub async fn stats(&self) -> Result<CacheStats, CacheError> {
        Ok(self.repository.get_cache_stats().await?)
    }

    /// Drop entries made with a glossary version that is no longer in use
    pub async fn purge_glossary_version(&self, glossary_version: &str) -> Result<i64, CacheError> {
        Ok(self.repository.delete_glossary_version(glossary_version).await?)
    }

    /// Location of the backing store
    pub fn location(&self) -> &Path {
        self.repository.connection().path()
    }
}
