/*!
 * Interrupted and repeated runs over the same tree
 */

use anyhow::Result;
use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use stringtable_translator::pipeline::{DocumentState, PendingReason};
use stringtable_translator::providers::mock::MockBackend;
use stringtable_translator::translation::{StopSignal, TranslationCache};

use crate::common::{self, scheduler, single_entry_table, Setup, TestTree};

const TEXTS: [(&str, &str); 5] = [
    ("a.table", "Alpha one"),
    ("b.table", "Beta two"),
    ("c.table", "Gamma three"),
    ("d.table", "Alpha one"),
    ("e.table", "Delta four"),
];

fn seed(tree: &TestTree) -> Result<()> {
    for (index, (name, text)) in TEXTS.iter().enumerate() {
        tree.add(name, &single_entry_table(index as u32 + 1, text))?;
    }
    Ok(())
}

/// Prefixes replies and pulls the stop signal while answering call `stop_at`
fn stopping_backend(stop: StopSignal, stop_at: usize) -> MockBackend {
    let calls = AtomicUsize::new(0);
    MockBackend::with_responder(move |request| {
        if calls.fetch_add(1, Ordering::SeqCst) + 1 == stop_at {
            stop.trigger();
        }
        Ok(format!("FA:{}", request.text))
    })
}

#[tokio::test]
async fn test_run_afterInterruption_shouldOnlyTranslateTheRest() -> Result<()> {
    common::init_logging();
    let tree = TestTree::new()?;
    seed(&tree)?;

    // First run stops while the second document is being translated
    let stop = StopSignal::new();
    let first_backend = Arc::new(stopping_backend(stop.clone(), 2));
    let first = scheduler(
        &tree,
        first_backend.clone(),
        TranslationCache::open(tree.cache_path())?,
        Setup {
            stop: stop.clone(),
            ..Setup::default()
        },
    );
    let summary = first.run().await?;

    assert_eq!(summary.newly_completed, 2);
    assert_eq!(summary.pending, 3);
    assert!(!summary.is_success());
    assert_eq!(first_backend.call_count(), 2);
    assert!(tree.output_of("a.table").exists());
    assert!(tree.output_of("b.table").exists());
    assert!(!tree.output_of("c.table").exists());

    let states: Vec<DocumentState> = first.scan()?.into_iter().map(|r| r.state).collect();
    assert_eq!(
        states.iter().filter(|s| **s == DocumentState::Pending(PendingReason::MissingOutput)).count(),
        3
    );
    drop(first);

    // Second run starts from the files on disk and the same cache
    let second_backend = Arc::new(MockBackend::prefixing("FA:"));
    let second = scheduler(
        &tree,
        second_backend.clone(),
        TranslationCache::open(tree.cache_path())?,
        Setup::default(),
    );
    let summary = second.run().await?;

    assert!(summary.is_success(), "{}", summary);
    assert_eq!(summary.already_complete, 2);
    assert_eq!(summary.newly_completed, 3);
    assert_eq!(summary.cache_hits, 1);
    assert_eq!(second_backend.call_count(), 2);

    let asked: Vec<String> = second_backend.requests().into_iter().map(|r| r.text).collect();
    assert_eq!(asked, vec!["Gamma three".to_string(), "Delta four".to_string()]);
    assert!(tree.read_output("d.table")?.contains("<DefaultText>FA:Alpha one</DefaultText>"));
    Ok(())
}

#[tokio::test]
async fn test_run_onCompletedTree_shouldNotContactBackend() -> Result<()> {
    let tree = TestTree::new()?;
    seed(&tree)?;

    let backend = Arc::new(MockBackend::prefixing("FA:"));
    let cache = TranslationCache::in_memory()?;
    scheduler(&tree, backend.clone(), cache.clone(), Setup::default()).run().await?;
    let calls = backend.call_count();
    let written = tree.read_output("a.table")?;

    let summary = scheduler(&tree, backend.clone(), cache, Setup::default()).run().await?;

    assert_eq!(summary.already_complete, 5);
    assert_eq!(summary.newly_completed, 0);
    assert_eq!(summary.backend_requests, 0);
    assert_eq!(backend.call_count(), calls);
    assert_eq!(tree.read_output("a.table")?, written);
    Ok(())
}

#[tokio::test]
async fn test_run_withDamagedOutput_shouldRebuildFromCache() -> Result<()> {
    let tree = TestTree::new()?;
    seed(&tree)?;

    let backend = Arc::new(MockBackend::prefixing("FA:"));
    let cache = TranslationCache::open(tree.cache_path())?;
    scheduler(&tree, backend.clone(), cache.clone(), Setup::default()).run().await?;
    let calls = backend.call_count();

    fs::write(tree.output_of("c.table"), "<StringTableFile><Entries>")?;
    fs::remove_file(tree.output_of("e.table"))?;

    let rerun = scheduler(&tree, backend.clone(), cache, Setup::default());
    let states: Vec<DocumentState> = rerun.scan()?.into_iter().map(|r| r.state).collect();
    assert!(matches!(states[2], DocumentState::Pending(PendingReason::InvalidOutput(_))));
    assert_eq!(states[4], DocumentState::Pending(PendingReason::MissingOutput));

    let summary = rerun.run().await?;
    assert_eq!(summary.newly_completed, 2);
    assert_eq!(summary.cache_hits, 2);
    assert_eq!(backend.call_count(), calls);
    assert!(tree.read_output("c.table")?.contains("FA:Gamma three"));
    Ok(())
}
