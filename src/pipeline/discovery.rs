/*!
 * Document discovery and completion state.
 *
 * Nothing about progress is stored separately: a document is complete
 * exactly when its output file exists and checks out against the input.
 * Every run re-derives the state of every document from the two trees.
 */

use std::fmt;
use std::path::{Path, PathBuf};

use crate::document::{ExtractedDocument, StringTableCodec};
use crate::errors::PipelineError;
use crate::file_utils::FileManager;
use crate::translation::placeholders;

/// An input document and where its translation goes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Path relative to the input root, the stable identifier
    pub id: PathBuf,
    pub input: PathBuf,
    pub output: PathBuf,
}

/// Why a document still needs work
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingReason {
    /// No output file yet
    MissingOutput,
    /// The output file exists but does not match the input
    InvalidOutput(String),
    /// A previous attempt in this run was stopped
    Interrupted,
}

impl fmt::Display for PendingReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingOutput => write!(f, "no output"),
            Self::InvalidOutput(reason) => write!(f, "invalid output: {}", reason),
            Self::Interrupted => write!(f, "interrupted"),
        }
    }
}

/// Completion state of a document
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentState {
    Pending(PendingReason),
    InProgress,
    Complete,
    Failed(String),
}

impl DocumentState {
    /// Whether moving to `next` is a legal step
    pub fn can_transition(&self, next: &DocumentState) -> bool {
        matches!(
            (self, next),
            (Self::Pending(_), Self::InProgress)
                | (Self::InProgress, Self::Complete)
                | (Self::InProgress, Self::Failed(_))
                | (Self::InProgress, Self::Pending(PendingReason::Interrupted))
        )
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Pending(_) => "pending",
            Self::InProgress => "in progress",
            Self::Complete => "complete",
            Self::Failed(_) => "failed",
        }
    }
}

/// A document with its current state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressRecord {
    pub document: Document,
    pub state: DocumentState,
}

impl ProgressRecord {
    pub fn new(document: Document, state: DocumentState) -> Self {
        Self { document, state }
    }

    /// Move to `next` if the state machine allows it
    pub fn advance(&mut self, next: DocumentState) -> bool {
        if !self.state.can_transition(&next) {
            log::warn!(
                "Ignoring {} -> {} for {}",
                self.state.label(),
                next.label(),
                self.document.id.display()
            );
            return false;
        }
        self.state = next;
        true
    }
}

/// List the documents under `input_root`, sorted by relative path
pub fn discover(input_root: &Path, output_root: &Path, extension: &str) -> Result<Vec<Document>, PipelineError> {
    let files = FileManager::find_files(input_root, extension)
        .map_err(|e| PipelineError::Discovery(format!("{:#}", e)))?;

    files
        .into_iter()
        .map(|input| {
            let output = FileManager::mirror_path(&input, input_root, output_root)
                .map_err(|e| PipelineError::Discovery(format!("{:#}", e)))?;
            let id = input
                .strip_prefix(input_root)
                .map(Path::to_path_buf)
                .unwrap_or_else(|_| input.clone());
            Ok(Document { id, input, output })
        })
        .collect()
}

/// Inputs above this size are failed without being parsed
pub const MAX_INPUT_BYTES: u64 = 50 * 1024 * 1024;

/// Derive the state of a document from the filesystem
pub fn classify(codec: &StringTableCodec, document: &Document, max_input_bytes: u64) -> DocumentState {
    let raw = FileManager::read_bytes_capped(&document.input, max_input_bytes).map_err(|e| format!("{:#}", e));
    let input = match raw {
        Ok(raw) => match codec.extract_bytes(&raw) {
            Ok(extracted) => extracted,
            Err(e) => return DocumentState::Failed(e.to_string()),
        },
        Err(e) => return DocumentState::Failed(e),
    };

    if !FileManager::file_exists(&document.output) {
        return DocumentState::Pending(PendingReason::MissingOutput);
    }
    match check_output(codec, &input, &document.output) {
        Ok(()) => DocumentState::Complete,
        Err(reason) => DocumentState::Pending(PendingReason::InvalidOutput(reason)),
    }
}

/// Check an output file against its extracted input.
///
/// The output must parse, carry the same units in the same order, hold no
/// marker characters and keep every placeholder of every unit.
pub fn check_output(codec: &StringTableCodec, input: &ExtractedDocument, output_path: &Path) -> Result<(), String> {
    let raw = FileManager::read_bytes(output_path).map_err(|e| format!("{:#}", e))?;
    let output = codec.extract_bytes(&raw).map_err(|e| e.to_string())?;

    if input.locators() != output.locators() {
        return Err(format!(
            "unit layout differs from input ({} units, expected {})",
            output.units.len(),
            input.units.len()
        ));
    }

    for (source, translated) in input.units.iter().zip(&output.units) {
        if let Some((position, c)) = placeholders::find_reserved(&translated.source) {
            return Err(format!(
                "{}: marker U+{:04X} left at byte {}",
                translated.locator, c as u32, position
            ));
        }
        if placeholders::placeholder_literals(&source.source)
            != placeholders::placeholder_literals(&translated.source)
        {
            return Err(format!("{}: placeholders differ from input", translated.locator));
        }
    }

    Ok(())
}
