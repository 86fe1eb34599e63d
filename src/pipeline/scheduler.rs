/*!
 * Drives documents from Pending to Complete.
 *
 * A run scans the input tree, derives each document's state from the
 * output tree and processes the pending ones on a bounded pool of
 * concurrent workers. Within a document, units are masked, deduplicated
 * by fingerprint, served from the cache where possible and sent to the
 * backend in bounded batches. A document's output is written only when
 * every unit resolved, through a temporary file that is renamed into
 * place, so an interrupted run never leaves a half-written document.
 */

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::stream::{self, StreamExt, TryStreamExt};
use log::{debug, error, info, warn};

use crate::app_config::Config;
use crate::document::{reassemble, ExtractedDocument, StringTableCodec};
use crate::errors::{ClientError, IntegrityError, PipelineError, TranslationError};
use crate::file_utils::FileManager;
use crate::pipeline::discovery::{self, Document, DocumentState, PendingReason, ProgressRecord};
use crate::pipeline::progress;
use crate::pipeline::report::{PlanReport, PlannedDocument, RunSummary, VerifyReport};
use crate::translation::cache::{CacheEntry, CacheKey, PutOutcome, TranslationCache};
use crate::translation::client::{RequestContext, TranslationClient};
use crate::translation::glossary::{GlossaryEntry, GlossaryResolver};
use crate::translation::placeholders::{self, Substitution};
use crate::translation::shutdown::StopSignal;

/// Where documents live and how much work runs at once
#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    pub input_root: PathBuf,
    /// Root of the translated tree, language slot included
    pub output_root: PathBuf,
    pub file_extension: String,
    /// Maximum units per backend request
    pub batch_size: usize,
    pub concurrent_documents: usize,
    /// Inputs above this size are failed unread
    pub max_input_bytes: u64,
    pub show_progress: bool,
}

impl SchedulerSettings {
    pub fn from_config(config: &Config, input_dir: &Path, output_dir: &Path) -> Self {
        Self {
            input_root: input_dir.to_path_buf(),
            output_root: output_dir.join(config.output_subdir()),
            file_extension: config.pipeline.file_extension.clone(),
            batch_size: config.pipeline.batch_size,
            concurrent_documents: config.pipeline.concurrent_documents,
            max_input_bytes: config.pipeline.max_input_bytes,
            show_progress: true,
        }
    }
}

/// Result of processing one pending document
#[derive(Debug, Clone, PartialEq, Eq)]
enum DocumentOutcome {
    Completed { cache_hits: usize },
    Failed(String),
    Interrupted,
}

/// One occurrence of a distinct text inside a document
#[derive(Debug, Clone)]
struct Member {
    index: usize,
    prefix: String,
    suffix: String,
    substitutions: Vec<Substitution>,
}

/// Units of a document sharing one fingerprint
#[derive(Debug, Clone)]
struct UnitGroup {
    key: CacheKey,
    /// Masked text sent to the backend
    masked: String,
    /// Unmasked text of the first member, for glossary lookup
    core: String,
    members: Vec<Member>,
}

/// A document split into settled units and groups still to translate
struct PreparedDocument {
    extracted: ExtractedDocument,
    resolved: Vec<Option<String>>,
    groups: Vec<UnitGroup>,
    /// Units that cannot be translated at all
    failures: Vec<(usize, String)>,
}

/// Pipeline driver for a whole input tree
pub struct BatchScheduler {
    settings: SchedulerSettings,
    codec: StringTableCodec,
    cache: TranslationCache,
    glossary: Arc<GlossaryResolver>,
    client: Arc<TranslationClient>,
    stop: StopSignal,
}

impl BatchScheduler {
    pub fn new(
        settings: SchedulerSettings,
        codec: StringTableCodec,
        cache: TranslationCache,
        glossary: GlossaryResolver,
        client: TranslationClient,
    ) -> Self {
        Self {
            settings,
            codec,
            cache,
            glossary: Arc::new(glossary),
            client: Arc::new(client),
            stop: StopSignal::new(),
        }
    }

    /// Stop starting documents and batches once `stop` fires.
    /// The client should be built with the same signal.
    pub fn with_stop_signal(mut self, stop: StopSignal) -> Self {
        self.stop = stop;
        self
    }

    pub fn settings(&self) -> &SchedulerSettings {
        &self.settings
    }

    pub fn cache(&self) -> &TranslationCache {
        &self.cache
    }

    /// Discover every document and derive its state
    pub fn scan(&self) -> Result<Vec<ProgressRecord>, PipelineError> {
        let documents = discovery::discover(
            &self.settings.input_root,
            &self.settings.output_root,
            &self.settings.file_extension,
        )?;
        Ok(documents
            .into_iter()
            .map(|document| {
                let state = discovery::classify(&self.codec, &document, self.settings.max_input_bytes);
                ProgressRecord::new(document, state)
            })
            .collect())
    }

    /// Translate every pending document
    pub async fn run(&self) -> Result<RunSummary, PipelineError> {
        let mut summary = RunSummary::default();
        let mut pending = Vec::new();

        for record in self.scan()? {
            match &record.state {
                DocumentState::Complete => {
                    debug!("{} is already complete", record.document.id.display());
                    summary.complete += 1;
                    summary.already_complete += 1;
                }
                DocumentState::Failed(reason) => {
                    error!("Cannot read {}: {}", record.document.id.display(), reason);
                    summary.record_failure(record.document.id.clone(), reason.clone());
                }
                DocumentState::Pending(reason) => {
                    debug!("{} is pending ({})", record.document.id.display(), reason);
                    pending.push(record);
                }
                DocumentState::InProgress => pending.push(record),
            }
        }

        info!(
            "{} documents to translate, {} already complete",
            pending.len(),
            summary.already_complete
        );

        let requests_before = self.client.request_count();
        let progress_bar = progress::document_bar(pending.len(), self.settings.show_progress);

        let result: Result<Vec<(ProgressRecord, usize)>, PipelineError> = stream::iter(pending)
            .map(|mut record| {
                let progress_bar = progress_bar.clone();
                async move {
                    record.advance(DocumentState::InProgress);
                    let outcome = self.process_document(&record.document).await?;
                    progress_bar.inc(1);

                    let hits = match outcome {
                        DocumentOutcome::Completed { cache_hits } => {
                            record.advance(DocumentState::Complete);
                            cache_hits
                        }
                        DocumentOutcome::Failed(reason) => {
                            record.advance(DocumentState::Failed(reason));
                            0
                        }
                        DocumentOutcome::Interrupted => {
                            record.advance(DocumentState::Pending(PendingReason::Interrupted));
                            0
                        }
                    };
                    Ok::<_, PipelineError>((record, hits))
                }
            })
            .buffer_unordered(self.settings.concurrent_documents.max(1))
            .try_collect()
            .await;
        progress_bar.finish_and_clear();

        let mut finished = result?;
        finished.sort_by(|(a, _), (b, _)| a.document.id.cmp(&b.document.id));

        for (record, hits) in finished {
            summary.cache_hits += hits;
            match record.state {
                DocumentState::Complete => {
                    summary.complete += 1;
                    summary.newly_completed += 1;
                }
                DocumentState::Failed(reason) => summary.record_failure(record.document.id, reason),
                DocumentState::Pending(_) | DocumentState::InProgress => summary.pending += 1,
            }
        }
        summary.failures.sort();
        summary.backend_requests = self.client.request_count() - requests_before;

        Ok(summary)
    }

    /// Report the work a run would do, without contacting the backend
    pub async fn plan(&self) -> Result<PlanReport, PipelineError> {
        let mut report = PlanReport::default();

        for record in self.scan()? {
            let id = record.document.id.clone();
            let mut planned = PlannedDocument {
                id,
                state: record.state.label().to_string(),
                detail: None,
                units: 0,
                cached: 0,
                uncached: 0,
                estimated_tokens: 0,
            };

            match record.state {
                DocumentState::Complete => report.complete += 1,
                DocumentState::Failed(reason) => {
                    report.failed += 1;
                    planned.detail = Some(reason);
                }
                DocumentState::Pending(reason) => {
                    report.pending += 1;
                    planned.detail = Some(reason.to_string());

                    let extracted = match self.load(&record.document) {
                        Ok(extracted) => extracted,
                        Err(reason) => {
                            planned.detail = Some(reason);
                            report.documents.push(planned);
                            continue;
                        }
                    };
                    let prepared = self.prepare(extracted);
                    if let Some((index, reason)) = first_failure(&prepared.failures) {
                        planned.detail = Some(format!(
                            "{}; will fail at {}: {}",
                            planned.detail.unwrap_or_default(),
                            prepared.extracted.units[index].locator,
                            reason
                        ));
                    }

                    let mut uncached_chars = 0;
                    for group in &prepared.groups {
                        planned.units += group.members.len();
                        if self.cache.contains(&group.key.fingerprint).await? {
                            planned.cached += 1;
                        } else {
                            planned.uncached += 1;
                            uncached_chars += group.masked.chars().count();
                        }
                    }
                    planned.estimated_tokens = uncached_chars.div_ceil(4);
                }
                DocumentState::InProgress => report.pending += 1,
            }
            report.documents.push(planned);
        }

        Ok(report)
    }

    /// Check every existing output against its input
    pub fn verify(&self) -> Result<VerifyReport, PipelineError> {
        let documents = discovery::discover(
            &self.settings.input_root,
            &self.settings.output_root,
            &self.settings.file_extension,
        )?;
        let mut report = VerifyReport::default();

        for document in documents {
            let input = match self.load(&document) {
                Ok(input) => input,
                Err(reason) => {
                    report.issues.push((document.id, format!("input: {}", reason)));
                    continue;
                }
            };
            if !FileManager::file_exists(&document.output) {
                report.missing += 1;
                continue;
            }

            report.checked += 1;
            match discovery::check_output(&self.codec, &input, &document.output) {
                Ok(()) => report.valid += 1,
                Err(issue) => {
                    warn!("{}: {}", document.id.display(), issue);
                    report.issues.push((document.id, issue));
                }
            }
        }

        Ok(report)
    }

    fn load(&self, document: &Document) -> Result<ExtractedDocument, String> {
        let raw = FileManager::read_bytes_capped(&document.input, self.settings.max_input_bytes)
            .map_err(|e| format!("{:#}", e))?;
        self.codec.extract_bytes(&raw).map_err(|e| e.to_string())
    }

    /// Mask every unit and group the ones that need a translation
    fn prepare(&self, extracted: ExtractedDocument) -> PreparedDocument {
        let target_language = self.client.target_language();
        let glossary_version = self.glossary.version();

        let mut resolved = vec![None; extracted.units.len()];
        let mut groups: Vec<UnitGroup> = Vec::new();
        let mut group_of: HashMap<String, usize> = HashMap::new();
        let mut failures = Vec::new();

        for (index, unit) in extracted.units.iter().enumerate() {
            if !unit.is_translatable() {
                resolved[index] = Some(unit.source.clone());
                continue;
            }

            let (prefix, core, suffix) = placeholders::split_whitespace_bounds(&unit.source);
            let masked = match placeholders::mask(core) {
                Ok(masked) => masked,
                Err(e) => {
                    failures.push((index, TranslationError::from(e).to_string()));
                    continue;
                }
            };
            if !placeholders::needs_translation(&masked) {
                resolved[index] = Some(unit.source.clone());
                continue;
            }

            let member = Member {
                index,
                prefix: prefix.to_string(),
                suffix: suffix.to_string(),
                substitutions: masked.substitutions,
            };
            let key = CacheKey::new(&masked.text, target_language, glossary_version);
            match group_of.get(key.fingerprint.as_str()) {
                Some(&group) => groups[group].members.push(member),
                None => {
                    group_of.insert(key.fingerprint.as_str().to_string(), groups.len());
                    groups.push(UnitGroup {
                        key,
                        masked: masked.text,
                        core: core.to_string(),
                        members: vec![member],
                    });
                }
            }
        }

        PreparedDocument {
            extracted,
            resolved,
            groups,
            failures,
        }
    }

    async fn process_document(&self, document: &Document) -> Result<DocumentOutcome, PipelineError> {
        if self.stop.is_triggered() {
            return Ok(DocumentOutcome::Interrupted);
        }
        info!("Translating {}", document.id.display());

        let extracted = match self.load(document) {
            Ok(extracted) => extracted,
            Err(reason) => return Ok(DocumentOutcome::Failed(reason)),
        };
        let PreparedDocument {
            extracted,
            mut resolved,
            groups,
            mut failures,
        } = self.prepare(extracted);

        let mut cache_hits = 0;
        let mut misses = Vec::new();
        for group in groups {
            match self.cache.get(&group.key.fingerprint).await? {
                Some(entry) => match resolve_group(&group, &entry.translated_text, &mut resolved) {
                    Ok(()) => cache_hits += group.members.len(),
                    Err(e) => {
                        warn!(
                            "Cached translation {} is unusable ({}), requesting a new one",
                            group.key.fingerprint, e
                        );
                        misses.push(group);
                    }
                },
                None => misses.push(group),
            }
        }
        debug!(
            "{}: {} units from cache, {} texts to translate",
            document.id.display(),
            cache_hits,
            misses.len()
        );

        let backend = self.client.backend_tag();
        for batch in misses.chunks(self.settings.batch_size.max(1)) {
            if self.stop.is_triggered() {
                return Ok(DocumentOutcome::Interrupted);
            }

            let texts: Vec<String> = batch.iter().map(|group| group.masked.clone()).collect();
            let context = RequestContext::new(self.glossary_context(batch));
            let results = self.client.translate_batch(&texts, &context).await;

            let mut interrupted = false;
            for (group, result) in batch.iter().zip(results) {
                match result {
                    Ok(translated) => {
                        self.accept(group, translated, &backend, &mut resolved, &mut failures)
                            .await?
                    }
                    Err(ClientError::Cancelled) => interrupted = true,
                    Err(e) => fail_group(group, TranslationError::from(e), &mut failures),
                }
            }
            if interrupted {
                info!("Stopped while translating {}", document.id.display());
                return Ok(DocumentOutcome::Interrupted);
            }
        }

        if let Some((index, reason)) = first_failure(&failures) {
            let reason = format!("{}: {}", extracted.units[index].locator, reason);
            error!("Failed {}: {}", document.id.display(), reason);
            return Ok(DocumentOutcome::Failed(reason));
        }

        let translations: Vec<String> = resolved
            .into_iter()
            .zip(&extracted.units)
            .map(|(translated, unit)| translated.unwrap_or_else(|| unit.source.clone()))
            .collect();
        let content = match reassemble(&extracted.skeleton, &translations) {
            Ok(content) => content,
            Err(e) => return Ok(DocumentOutcome::Failed(e.to_string())),
        };

        FileManager::write_atomic(&document.output, content.as_bytes()).map_err(|e| {
            PipelineError::OutputWrite {
                path: document.output.clone(),
                message: format!("{:#}", e),
            }
        })?;
        info!("Wrote {}", document.output.display());

        Ok(DocumentOutcome::Completed { cache_hits })
    }

    /// Use a fresh translation and record it in the cache
    async fn accept(
        &self,
        group: &UnitGroup,
        translated: String,
        backend: &str,
        resolved: &mut [Option<String>],
        failures: &mut Vec<(usize, String)>,
    ) -> Result<(), PipelineError> {
        if let Err(e) = resolve_group(group, &translated, resolved) {
            fail_group(group, TranslationError::from(e), failures);
            return Ok(());
        }

        if let PutOutcome::Conflict(existing) =
            self.cache.put(&group.key, CacheEntry::new(translated, backend)).await?
        {
            if resolve_group(group, &existing.translated_text, resolved).is_err() {
                debug!("Stored translation {} is unusable, keeping the new one", group.key.fingerprint);
            }
        }
        Ok(())
    }

    /// Glossary entries relevant to any text of the batch, without repeats
    fn glossary_context(&self, batch: &[UnitGroup]) -> Vec<GlossaryEntry> {
        let mut entries: Vec<GlossaryEntry> = Vec::new();
        for group in batch {
            for entry in self.glossary.relevant_entries(&group.core) {
                if !entries.iter().any(|known| known.source == entry.source) {
                    entries.push(entry);
                }
            }
        }
        entries
    }
}

/// Unmask a translation for every member of a group.
/// Nothing is written unless all members succeed.
fn resolve_group(group: &UnitGroup, translated: &str, resolved: &mut [Option<String>]) -> Result<(), IntegrityError> {
    let restored = group
        .members
        .iter()
        .map(|member| {
            placeholders::unmask(translated, &member.substitutions)
                .map(|text| format!("{}{}{}", member.prefix, text, member.suffix))
        })
        .collect::<Result<Vec<_>, _>>()?;

    for (member, text) in group.members.iter().zip(restored) {
        resolved[member.index] = Some(text);
    }
    Ok(())
}

fn fail_group(group: &UnitGroup, error: TranslationError, failures: &mut Vec<(usize, String)>) {
    warn!("Translation of {} failed: {}", group.key.fingerprint, error);
    for member in &group.members {
        failures.push((member.index, error.to_string()));
    }
}

fn first_failure(failures: &[(usize, String)]) -> Option<(usize, &str)> {
    failures
        .iter()
        .min_by_key(|(index, _)| *index)
        .map(|(index, reason)| (*index, reason.as_str()))
}
