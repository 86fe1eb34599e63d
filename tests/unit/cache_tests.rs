/*!
 * Tests for the persistent translation cache
 */

use anyhow::Result;
use tempfile::TempDir;

use stringtable_translator::translation::cache::PutOutcome;
use stringtable_translator::translation::{CacheEntry, CacheKey, Fingerprint, TranslationCache};

#[test]
fn test_fingerprint_withSameInputs_shouldBeStable() {
    let first = Fingerprint::compute("Hello, \u{1}!", "fa", "abc");
    let second = Fingerprint::compute("Hello, \u{1}!", "fa", "abc");
    assert_eq!(first, second);
    assert_ne!(first, Fingerprint::compute("Hello, \u{1}!", "de", "abc"));
}

#[tokio::test]
async fn test_put_thenGet_shouldReturnStoredEntry() -> Result<()> {
    let cache = TranslationCache::in_memory()?;
    let key = CacheKey::new("Hello, \u{1}!", "fa", "v1");

    assert_eq!(cache.get(&key.fingerprint).await?, None);
    assert_eq!(cache.put(&key, CacheEntry::new("سلام، \u{1}!", "mock/mock")).await?, PutOutcome::Inserted);

    let entry = cache.get(&key.fingerprint).await?.expect("entry stored");
    assert_eq!(entry.translated_text, "سلام، \u{1}!");
    assert_eq!(entry.backend, "mock/mock");

    let (hits, misses, _) = cache.session_stats();
    assert_eq!((hits, misses), (1, 1));
    Ok(())
}

#[tokio::test]
async fn test_put_withDifferentGlossaryVersion_shouldKeepEntriesApart() -> Result<()> {
    let cache = TranslationCache::in_memory()?;
    let old = CacheKey::new("Take the Sword", "fa", "v1");
    let new = CacheKey::new("Take the Sword", "fa", "v2");

    cache.put(&old, CacheEntry::new("old wording", "mock/mock")).await?;
    assert!(!cache.contains(&new.fingerprint).await?);

    cache.put(&new, CacheEntry::new("new wording", "mock/mock")).await?;
    assert_eq!(cache.purge_glossary_version("v1").await?, 1);
    assert!(!cache.contains(&old.fingerprint).await?);
    assert!(cache.contains(&new.fingerprint).await?);
    Ok(())
}

#[tokio::test]
async fn test_put_withSecondTranslation_shouldKeepFirst() -> Result<()> {
    let cache = TranslationCache::in_memory()?;
    let key = CacheKey::new("Yes", "fa", "v1");

    cache.put(&key, CacheEntry::new("بله", "a/one")).await?;
    assert_eq!(cache.put(&key, CacheEntry::new("بله", "b/two")).await?, PutOutcome::Duplicate);

    match cache.put(&key, CacheEntry::new("آری", "b/two")).await? {
        PutOutcome::Conflict(existing) => assert_eq!(existing.translated_text, "بله"),
        other => panic!("expected a conflict, got {:?}", other),
    }
    assert_eq!(cache.get(&key.fingerprint).await?.map(|e| e.translated_text), Some("بله".to_string()));
    Ok(())
}

#[tokio::test]
async fn test_open_afterReopen_shouldStillHoldEntries() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("cache/translation_cache.db");
    let key = CacheKey::new("Gold: \u{1}", "fa", "v1");

    {
        let cache = TranslationCache::open(&path)?;
        cache.put(&key, CacheEntry::new("طلا: \u{1}", "mock/mock")).await?;
    }

    let reopened = TranslationCache::open(&path)?;
    let entry = reopened.get(&key.fingerprint).await?.expect("entry survives reopen");
    assert_eq!(entry.translated_text, "طلا: \u{1}");

    let stats = reopened.stats().await?;
    assert_eq!(stats.total_entries, 1);
    assert_eq!(stats.target_languages, vec![("fa".to_string(), 1)]);
    Ok(())
}
