/*!
 * Common test utilities for the stringtable-translator test suite
 */

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tempfile::TempDir;

use stringtable_translator::document::StringTableCodec;
use stringtable_translator::pipeline::discovery::MAX_INPUT_BYTES;
use stringtable_translator::pipeline::{BatchScheduler, SchedulerSettings};
use stringtable_translator::providers::mock::MockBackend;
use stringtable_translator::translation::retry::RetryPolicy;
use stringtable_translator::translation::{
    GlossaryResolver, StopSignal, TranslationCache, TranslationClient,
};

/// The quest table used across the scenario tests
pub const QUEST_001: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<StringTableFile xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">
  <Name>game\quests\quest_001</Name>
  <NextEntryID>3</NextEntryID>
  <EntryCount>2</EntryCount>
  <Entries>
    <Entry>
      <ID>1</ID>
      <DefaultText>Hello, [Player]!</DefaultText>
      <FemaleText />
    </Entry>
    <Entry>
      <ID>2</ID>
      <DefaultText>Gold: %d</DefaultText>
      <FemaleText />
    </Entry>
  </Entries>
</StringTableFile>
"#;

/// Build a one-entry table around `text`
pub fn single_entry_table(id: u32, text: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<StringTableFile>\n  <Entries>\n    <Entry>\n      <ID>{}</ID>\n      <DefaultText>{}</DefaultText>\n    </Entry>\n  </Entries>\n</StringTableFile>\n",
        id, text
    )
}

/// Route crate logs to the test output
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Input and output trees in a temporary directory
pub struct TestTree {
    dir: TempDir,
    pub input: PathBuf,
    pub output: PathBuf,
}

impl TestTree {
    pub fn new() -> Result<Self> {
        let dir = TempDir::new()?;
        let input = dir.path().join("text");
        let output = dir.path().join("localized/fa/text");
        fs::create_dir_all(&input)?;
        Ok(Self { dir, input, output })
    }

    /// Add an input document at a path relative to the input root
    pub fn add(&self, relative: &str, content: &str) -> Result<PathBuf> {
        let path = self.input.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, content)?;
        Ok(path)
    }

    pub fn output_of(&self, relative: &str) -> PathBuf {
        self.output.join(relative)
    }

    pub fn read_output(&self, relative: &str) -> Result<String> {
        Ok(fs::read_to_string(self.output_of(relative))?)
    }

    /// Path for a cache file that survives between schedulers
    pub fn cache_path(&self) -> PathBuf {
        self.dir.path().join("translation_cache.db")
    }
}

/// Knobs for a scheduler under test
pub struct Setup {
    pub extension: String,
    pub batch_size: usize,
    pub concurrent_documents: usize,
    pub max_input_bytes: u64,
    pub retry: RetryPolicy,
    pub timeout: Duration,
    pub glossary: GlossaryResolver,
    pub stop: StopSignal,
}

impl Default for Setup {
    fn default() -> Self {
        Self {
            extension: "table".to_string(),
            batch_size: 15,
            concurrent_documents: 1,
            max_input_bytes: MAX_INPUT_BYTES,
            retry: RetryPolicy::new(3, Duration::from_millis(1), Duration::from_millis(5)),
            timeout: Duration::from_secs(5),
            glossary: GlossaryResolver::empty(),
            stop: StopSignal::new(),
        }
    }
}

/// Wire a scheduler over the tree with a mock backend
pub fn scheduler(tree: &TestTree, backend: Arc<MockBackend>, cache: TranslationCache, setup: Setup) -> BatchScheduler {
    let settings = SchedulerSettings {
        input_root: tree.input.clone(),
        output_root: tree.output.clone(),
        file_extension: setup.extension,
        batch_size: setup.batch_size,
        concurrent_documents: setup.concurrent_documents,
        max_input_bytes: setup.max_input_bytes,
        show_progress: false,
    };
    let client = TranslationClient::new(backend, "en", "fa")
        .with_policy(setup.retry)
        .with_timeout(setup.timeout)
        .with_stop_signal(setup.stop.clone());

    BatchScheduler::new(
        settings,
        StringTableCodec::default(),
        cache,
        setup.glossary,
        client,
    )
    .with_stop_signal(setup.stop)
}

/// Mock that translates the quest table's greeting into Farsi
pub fn farsi_backend() -> MockBackend {
    MockBackend::with_dictionary([("Hello,", "سلام،")])
}
