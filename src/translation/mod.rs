/*!
 * Translation of text units.
 *
 * - `placeholders`: masking of literals the backend must not touch
 * - `cache`: fingerprints and the persistent translation cache
 * - `glossary`: term mappings and per-text lookup
 * - `client`: retrying, rate-limited access to a backend
 * - `retry`, `rate_limit`, `shutdown`: pieces the client is built from
 * - `prompts`: prompt text for chat backends
 */

pub mod cache;
pub mod client;
pub mod glossary;
pub mod placeholders;
pub mod prompts;
pub mod rate_limit;
pub mod retry;
pub mod shutdown;

pub use self::cache::{CacheEntry, CacheKey, Fingerprint, TranslationCache};
pub use self::client::{RequestContext, TranslationClient};
pub use self::glossary::{Glossary, GlossaryEntry, GlossaryResolver};
pub use self::prompts::PromptTemplate;
pub use self::shutdown::StopSignal;
