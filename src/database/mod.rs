/*!
 * Database module for the persistent translation cache.
 *
 * SQLite stores one row per fingerprint. Rows survive crashes (WAL
 * journal) and are shared by concurrent workers through a single
 * connection guarded by a mutex.
 */

pub mod connection;
pub mod models;
pub mod repository;
pub mod schema;

// Re-export main types
pub use connection::DatabaseConnection;
pub use models::{CacheRecord, CacheStats, InsertOutcome};
pub use repository::Repository;
