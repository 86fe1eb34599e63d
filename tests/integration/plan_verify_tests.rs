/*!
 * Dry-run planning and output verification
 */

use anyhow::Result;
use std::fs;
use std::sync::Arc;

use stringtable_translator::providers::mock::MockBackend;
use stringtable_translator::translation::{Glossary, GlossaryEntry, GlossaryResolver, TranslationCache};

use crate::common::{farsi_backend, scheduler, single_entry_table, Setup, TestTree, QUEST_001};

#[tokio::test]
async fn test_plan_shouldCountUncachedTextsWithoutCalls() -> Result<()> {
    let tree = TestTree::new()?;
    tree.add("quest_001.table", QUEST_001)?;
    tree.add("menu/title.table", &single_entry_table(1, "New Game"))?;
    let backend = Arc::new(MockBackend::echo());

    let plan = scheduler(&tree, backend.clone(), TranslationCache::in_memory()?, Setup::default())
        .plan()
        .await?;

    assert_eq!(plan.pending, 2);
    assert_eq!(plan.documents.len(), 2);
    assert_eq!(plan.uncached_texts(), 3);
    assert!(plan.estimated_tokens() > 0);
    assert_eq!(backend.call_count(), 0);
    assert!(!tree.output.exists());
    Ok(())
}

#[tokio::test]
async fn test_plan_afterRun_shouldShowEverythingComplete() -> Result<()> {
    let tree = TestTree::new()?;
    tree.add("quest_001.table", QUEST_001)?;
    let cache = TranslationCache::in_memory()?;
    let scheduler = scheduler(&tree, Arc::new(farsi_backend()), cache, Setup::default());

    scheduler.run().await?;
    let plan = scheduler.plan().await?;

    assert_eq!(plan.complete, 1);
    assert_eq!(plan.pending, 0);
    assert_eq!(plan.uncached_texts(), 0);
    Ok(())
}

#[tokio::test]
async fn test_plan_withChangedGlossary_shouldTreatCacheAsCold() -> Result<()> {
    let tree = TestTree::new()?;
    tree.add("npc.table", &single_entry_table(1, "Take the Sword"))?;
    let cache = TranslationCache::open(tree.cache_path())?;

    let first = scheduler(&tree, Arc::new(MockBackend::prefixing("FA:")), cache.clone(), Setup::default());
    first.run().await?;
    fs::remove_file(tree.output_of("npc.table"))?;

    let glossary = GlossaryResolver::new(Glossary::new(vec![GlossaryEntry::new("Sword", "شمشیر")]))?;
    let plan = scheduler(
        &tree,
        Arc::new(MockBackend::echo()),
        cache,
        Setup {
            glossary,
            ..Setup::default()
        },
    )
    .plan()
    .await?;

    assert_eq!(plan.documents[0].cached, 0);
    assert_eq!(plan.documents[0].uncached, 1);
    Ok(())
}

#[tokio::test]
async fn test_verify_shouldFlagDriftedOutput() -> Result<()> {
    let tree = TestTree::new()?;
    tree.add("quest_001.table", QUEST_001)?;
    tree.add("npc.table", &single_entry_table(1, "Welcome back"))?;
    let scheduler = scheduler(&tree, Arc::new(farsi_backend()), TranslationCache::in_memory()?, Setup::default());
    scheduler.run().await?;

    let clean = scheduler.verify()?;
    assert_eq!(clean.checked, 2);
    assert_eq!(clean.valid, 2);
    assert!(clean.is_clean());

    // A hand edit that drops a placeholder
    let edited = tree
        .read_output("quest_001.table")?
        .replace("سلام، [Player]!", "سلام!");
    fs::write(tree.output_of("quest_001.table"), edited)?;

    let report = scheduler.verify()?;
    assert_eq!(report.valid, 1);
    assert_eq!(report.issues.len(), 1);
    assert_eq!(report.issues[0].0.to_string_lossy(), "quest_001.table");
    assert!(!report.is_clean());
    Ok(())
}
