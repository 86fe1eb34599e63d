/*!
 * End-to-end runs over small trees with a scripted backend
 */

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;

use stringtable_translator::document::StringTableCodec;
use stringtable_translator::pipeline::DocumentState;
use stringtable_translator::providers::mock::MockBackend;
use stringtable_translator::translation::retry::RetryPolicy;
use stringtable_translator::translation::{CacheKey, TranslationCache};

use crate::common::{self, farsi_backend, scheduler, single_entry_table, Setup, TestTree, QUEST_001};

#[tokio::test]
async fn test_run_withQuestTable_shouldTranslateAroundPlaceholders() -> Result<()> {
    common::init_logging();
    let tree = TestTree::new()?;
    tree.add("quests/quest_001.table", QUEST_001)?;
    let backend = Arc::new(farsi_backend());

    let scheduler = scheduler(&tree, backend.clone(), TranslationCache::in_memory()?, Setup::default());
    let summary = scheduler.run().await?;

    assert!(summary.is_success(), "{}", summary);
    assert_eq!(summary.newly_completed, 1);
    assert_eq!(backend.call_count(), 1);
    let request = &backend.requests()[0];
    assert_eq!(request.entries, 2);
    assert!(request.text.contains("Hello, \u{1}!"));
    assert!(request.text.contains("Gold: \u{1}"));
    assert!(!request.text.contains("[Player]"));

    let written = tree.read_output("quests/quest_001.table")?;
    let units = StringTableCodec::default().extract(&written)?.sources();
    assert_eq!(units, vec!["سلام، [Player]!".to_string(), "Gold: %d".to_string()]);
    assert_eq!(
        written,
        QUEST_001.replace("<DefaultText>Hello, [Player]!", "<DefaultText>سلام، [Player]!")
    );

    let states: Vec<DocumentState> = scheduler.scan()?.into_iter().map(|r| r.state).collect();
    assert_eq!(states, vec![DocumentState::Complete]);
    Ok(())
}

#[tokio::test]
async fn test_run_withThreeTimeouts_shouldRetryThenCache() -> Result<()> {
    common::init_logging();
    let tree = TestTree::new()?;
    tree.add("npc.table", &single_entry_table(1, "Welcome back"))?;
    let backend = Arc::new(MockBackend::prefixing("FA:").slow_first(3, Duration::from_millis(200)));
    let cache = TranslationCache::in_memory()?;

    let setup = Setup {
        retry: RetryPolicy::new(3, Duration::from_millis(1), Duration::from_millis(1)),
        timeout: Duration::from_millis(50),
        ..Setup::default()
    };
    let summary = scheduler(&tree, backend.clone(), cache.clone(), setup).run().await?;

    assert_eq!(summary.complete, 1);
    assert_eq!(summary.backend_requests, 4);
    assert_eq!(backend.call_count(), 4);
    assert!(tree.read_output("npc.table")?.contains("<DefaultText>FA:Welcome back</DefaultText>"));

    let key = CacheKey::new("Welcome back", "fa", stringtable_translator::translation::GlossaryResolver::empty().version());
    let cached = cache.get(&key.fingerprint).await?.expect("translation cached");
    assert_eq!(cached.translated_text, "FA:Welcome back");
    Ok(())
}

#[tokio::test]
async fn test_run_withTimeoutsBeyondRetries_shouldFailDocument() -> Result<()> {
    let tree = TestTree::new()?;
    tree.add("npc.table", &single_entry_table(1, "Welcome back"))?;
    let backend = Arc::new(MockBackend::echo().slow_first(5, Duration::from_millis(200)));

    let setup = Setup {
        retry: RetryPolicy::new(2, Duration::from_millis(1), Duration::from_millis(1)),
        timeout: Duration::from_millis(20),
        ..Setup::default()
    };
    let summary = scheduler(&tree, backend.clone(), TranslationCache::in_memory()?, setup).run().await?;

    assert_eq!(summary.failed, 1);
    assert_eq!(backend.call_count(), 3);
    assert!(summary.failures[0].1.contains("Gave up after 3 attempts"));
    assert!(!tree.output_of("npc.table").exists());
    Ok(())
}

#[tokio::test]
async fn test_run_withLostPlaceholder_shouldNotCompleteDocument() -> Result<()> {
    common::init_logging();
    let tree = TestTree::new()?;
    tree.add("quest_001.table", QUEST_001)?;
    let backend = Arc::new(MockBackend::dropping_placeholders());
    let cache = TranslationCache::in_memory()?;

    let scheduler = scheduler(&tree, backend, cache.clone(), Setup::default());
    let summary = scheduler.run().await?;

    assert_eq!(summary.failed, 1);
    assert_eq!(summary.complete, 0);
    let (id, reason) = &summary.failures[0];
    assert_eq!(id.to_string_lossy(), "quest_001.table");
    assert!(reason.contains("entry 1"), "{}", reason);
    assert!(reason.contains("[Player]"), "{}", reason);
    assert!(!tree.output_of("quest_001.table").exists());

    // The broken reply must not be served from the cache later
    let key = CacheKey::new("Hello, \u{1}!", "fa", stringtable_translator::translation::GlossaryResolver::empty().version());
    assert!(!cache.contains(&key.fingerprint).await?);
    Ok(())
}

#[tokio::test]
async fn test_run_withTerminalError_shouldFailOnlyThatDocument() -> Result<()> {
    let tree = TestTree::new()?;
    tree.add("a.table", &single_entry_table(1, "Open the gate"))?;
    tree.add("b.table", &single_entry_table(1, "Forbidden words"))?;
    let backend = Arc::new(MockBackend::prefixing("FA:").fail_when(
        "Forbidden",
        stringtable_translator::errors::ProviderError::ContentRejected("policy".to_string()),
    ));

    let setup = Setup {
        concurrent_documents: 2,
        ..Setup::default()
    };
    let summary = scheduler(&tree, backend.clone(), TranslationCache::in_memory()?, setup).run().await?;

    assert_eq!(summary.complete, 1);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.failures[0].0.to_string_lossy(), "b.table");
    // Terminal errors are not retried
    assert_eq!(backend.call_count(), 2);
    assert!(tree.output_of("a.table").exists());
    assert!(!tree.output_of("b.table").exists());
    Ok(())
}

#[tokio::test]
async fn test_run_withUnparseableInput_shouldReportItAndContinue() -> Result<()> {
    let tree = TestTree::new()?;
    tree.add("broken.table", "<StringTableFile><Entries>")?;
    tree.add("good.table", &single_entry_table(4, "Farewell"))?;
    tree.add("ignored.txt", "not a table")?;
    let backend = Arc::new(MockBackend::prefixing("FA:"));

    let summary = scheduler(&tree, backend, TranslationCache::in_memory()?, Setup::default()).run().await?;

    assert_eq!(summary.total(), 2);
    assert_eq!(summary.complete, 1);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.failures[0].0.to_string_lossy(), "broken.table");
    assert!(!tree.output_of("ignored.txt").exists());
    Ok(())
}

#[tokio::test]
async fn test_run_withSharedTextAcrossDocuments_shouldAskOnce() -> Result<()> {
    let tree = TestTree::new()?;
    for name in ["a.table", "b.table", "c.table"] {
        tree.add(name, &single_entry_table(1, "Continue?"))?;
    }
    let backend = Arc::new(MockBackend::prefixing("FA:"));

    let summary = scheduler(&tree, backend.clone(), TranslationCache::in_memory()?, Setup::default()).run().await?;

    assert_eq!(summary.complete, 3);
    assert_eq!(backend.call_count(), 1);
    assert_eq!(summary.cache_hits, 2);
    Ok(())
}

#[tokio::test]
async fn test_run_withBackendAddingTag_shouldFailThenSettleOnceFixed() -> Result<()> {
    common::init_logging();
    let tree = TestTree::new()?;
    tree.add("door.table", &single_entry_table(1, "Open the door"))?;
    let cache = TranslationCache::open(tree.cache_path())?;

    let tagging = Arc::new(MockBackend::prefixing("[FA] "));
    let first = scheduler(&tree, tagging, cache.clone(), Setup::default()).run().await?;

    assert_eq!(first.failed, 1);
    assert!(first.failures[0].1.contains("added placeholder [FA]"), "{}", first.failures[0].1);
    assert!(!tree.output_of("door.table").exists());
    let key = CacheKey::new("Open the door", "fa", stringtable_translator::translation::GlossaryResolver::empty().version());
    assert!(!cache.contains(&key.fingerprint).await?);

    let second = scheduler(&tree, Arc::new(MockBackend::prefixing("FA:")), cache.clone(), Setup::default())
        .run()
        .await?;
    assert_eq!(second.newly_completed, 1);

    let backend = Arc::new(MockBackend::prefixing("[FA] "));
    let third = scheduler(&tree, backend.clone(), cache, Setup::default()).run().await?;
    assert_eq!(third.already_complete, 1);
    assert_eq!(third.newly_completed, 0);
    assert_eq!(backend.call_count(), 0);
    Ok(())
}

#[tokio::test]
async fn test_run_withPlaceholdersAtBothEnds_shouldSurviveEcho() -> Result<()> {
    let tree = TestTree::new()?;
    let text = "{z} Stats {a} {b} {c} {d} {e} {f} {g} {h} {i}";
    tree.add("stats.table", &single_entry_table(1, text))?;
    let backend = Arc::new(MockBackend::echo());

    let summary = scheduler(&tree, backend, TranslationCache::in_memory()?, Setup::default()).run().await?;

    assert!(summary.is_success(), "{}", summary);
    let written = tree.read_output("stats.table")?;
    assert_eq!(StringTableCodec::default().extract(&written)?.sources(), vec![text.to_string()]);
    Ok(())
}

#[tokio::test]
async fn test_run_withPrivateUseGlyph_shouldKeepIt() -> Result<()> {
    let tree = TestTree::new()?;
    let text = "Press \u{F0041} to jump";
    tree.add("hints.table", &single_entry_table(1, text))?;
    let backend = Arc::new(MockBackend::prefixing("FA:"));

    let summary = scheduler(&tree, backend, TranslationCache::in_memory()?, Setup::default()).run().await?;

    assert!(summary.is_success(), "{}", summary);
    let written = tree.read_output("hints.table")?;
    assert!(written.contains("<DefaultText>FA:Press \u{F0041} to jump</DefaultText>"));
    Ok(())
}

#[tokio::test]
async fn test_run_withOversizedInput_shouldFailItUnread() -> Result<()> {
    let tree = TestTree::new()?;
    tree.add("huge.table", QUEST_001)?;
    tree.add("small.table", "<StringTableFile/>")?;
    let backend = Arc::new(MockBackend::echo());

    let setup = Setup {
        max_input_bytes: 64,
        ..Setup::default()
    };
    let summary = scheduler(&tree, backend.clone(), TranslationCache::in_memory()?, setup).run().await?;

    assert_eq!(summary.failed, 1);
    assert_eq!(summary.complete, 1);
    assert_eq!(summary.failures[0].0.to_string_lossy(), "huge.table");
    assert!(summary.failures[0].1.contains("byte limit"), "{}", summary.failures[0].1);
    assert_eq!(backend.call_count(), 0);
    assert!(!tree.output_of("huge.table").exists());
    Ok(())
}
