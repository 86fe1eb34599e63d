/*!
 * Repository layer for database operations.
 *
 * This module provides a high-level API over the cache table,
 * abstracting away the SQL details and providing type-safe access.
 */

use anyhow::Result;
use log::debug;
use rusqlite::{params, Connection, OptionalExtension};

use super::connection::DatabaseConnection;
use super::models::{CacheRecord, CacheStats, InsertOutcome};

const SELECT_RECORD: &str = r#"
    SELECT fingerprint, source_text, target_language, glossary_version,
           translated_text, backend, created_at, hit_count
    FROM translation_cache
    WHERE fingerprint = ?1
"#;

/// Repository for database operations
#[derive(Clone, Debug)]
pub struct Repository {
    /// Database connection
    db: DatabaseConnection,
}

impl Repository {
    /// Create a new repository with the given database connection
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Create a repository with an in-memory database (for testing)
    pub fn new_in_memory() -> Result<Self> {
        let db = DatabaseConnection::new_in_memory()?;
        Ok(Self::new(db))
    }

    /// Underlying connection
    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    fn read_record(conn: &Connection, fingerprint: &str) -> Result<Option<CacheRecord>> {
        let record = conn
            .query_row(SELECT_RECORD, [fingerprint], |row| {
                Ok(CacheRecord {
                    fingerprint: row.get(0)?,
                    source_text: row.get(1)?,
                    target_language: row.get(2)?,
                    glossary_version: row.get(3)?,
                    translated_text: row.get(4)?,
                    backend: row.get(5)?,
                    created_at: row.get(6)?,
                    hit_count: row.get(7)?,
                })
            })
            .optional()?;
        Ok(record)
    }

    /// Look up a cached translation and count the hit
    pub async fn get_cached_translation(&self, fingerprint: &str) -> Result<Option<CacheRecord>> {
        let fingerprint = fingerprint.to_string();

        self.db
            .execute_async(move |conn| {
                let record = Self::read_record(conn, &fingerprint)?;
                if record.is_some() {
                    conn.execute(
                        "UPDATE translation_cache SET hit_count = hit_count + 1 WHERE fingerprint = ?1",
                        [&fingerprint],
                    )?;
                    debug!("Cache hit for {}", fingerprint);
                }
                Ok(record)
            })
            .await
    }

    /// Look up a cached translation without touching its hit counter
    pub async fn peek_cached_translation(&self, fingerprint: &str) -> Result<Option<CacheRecord>> {
        let fingerprint = fingerprint.to_string();

        self.db
            .execute_async(move |conn| Self::read_record(conn, &fingerprint))
            .await
    }

    /// Store a translation unless the fingerprint is already taken.
    ///
    /// Stored rows are immutable: a second insert with a different
    /// translation leaves the first one in place and returns it.
    pub async fn insert_cache_record(&self, record: &CacheRecord) -> Result<InsertOutcome> {
        let record = record.clone();

        self.db
            .transaction_async(move |tx| {
                let inserted = tx.execute(
                    r#"
                    INSERT INTO translation_cache (
                        fingerprint, source_text, target_language, glossary_version,
                        translated_text, backend, created_at, hit_count
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                    ON CONFLICT(fingerprint) DO NOTHING
                    "#,
                    params![
                        record.fingerprint,
                        record.source_text,
                        record.target_language,
                        record.glossary_version,
                        record.translated_text,
                        record.backend,
                        record.created_at,
                        record.hit_count,
                    ],
                )?;

                if inserted == 1 {
                    return Ok(InsertOutcome::Inserted);
                }

                let existing = Self::read_record(tx, &record.fingerprint)?.ok_or_else(|| {
                    anyhow::anyhow!("Cache row {} vanished during insert", record.fingerprint)
                })?;
                if existing.translated_text == record.translated_text {
                    Ok(InsertOutcome::Duplicate)
                } else {
                    Ok(InsertOutcome::Conflict(existing))
                }
            })
            .await
    }

    /// Get cache statistics
    pub async fn get_cache_stats(&self) -> Result<CacheStats> {
        self.db
            .execute_async(|conn| {
                let total_entries: i64 =
                    conn.query_row("SELECT COUNT(*) FROM translation_cache", [], |row| row.get(0))?;

                let total_hits: i64 = conn.query_row(
                    "SELECT COALESCE(SUM(hit_count), 0) FROM translation_cache",
                    [],
                    |row| row.get(0),
                )?;

                let glossary_versions = Self::group_counts(conn, "glossary_version")?;
                let target_languages = Self::group_counts(conn, "target_language")?;

                Ok(CacheStats {
                    total_entries,
                    total_hits,
                    glossary_versions,
                    target_languages,
                })
            })
            .await
    }

    fn group_counts(conn: &Connection, column: &'static str) -> Result<Vec<(String, i64)>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {column}, COUNT(*) AS n FROM translation_cache GROUP BY {column} ORDER BY n DESC, {column}"
        ))?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<rusqlite::Result<Vec<(String, i64)>>>()?;
        Ok(rows)
    }

    /// Remove every entry made with a given glossary version
    pub async fn delete_glossary_version(&self, glossary_version: &str) -> Result<i64> {
        let glossary_version = glossary_version.to_string();

        self.db
            .execute_async(move |conn| {
                let deleted = conn.execute(
                    "DELETE FROM translation_cache WHERE glossary_version = ?1",
                    [glossary_version],
                )?;
                Ok(deleted as i64)
            })
            .await
    }

    /// Clear the translation cache
    pub async fn clear_cache(&self) -> Result<i64> {
        self.db
            .execute_async(|conn| {
                let deleted = conn.execute("DELETE FROM translation_cache", [])?;
                Ok(deleted as i64)
            })
            .await
    }
}
