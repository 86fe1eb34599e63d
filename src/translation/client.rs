/*!
 * Backend access with timeouts, retries and pacing.
 *
 * `TranslationClient` wraps a `TranslationBackend` and is the only place
 * the pipeline suspends on the network. Every attempt waits for a rate
 * limiter slot, runs under the request timeout and is classified; retryable
 * failures sleep according to the `RetryPolicy`, terminal ones return at
 * once. A stop signal aborts backoff sleeps but lets an in-flight request
 * finish or time out.
 *
 * Batches are sent as one framed payload:
 *
 * ```text
 * <<ENTRY_0>>
 * first text
 * <<ENTRY_1>>
 * second text
 * <<END>>
 * ```
 *
 * and split back by marker. Entries missing from the reply are retried
 * one by one.
 */

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::app_config::Config;
use crate::errors::{ClientError, ErrorKind, ProviderError};
use crate::providers::{BackendRequest, TranslationBackend};
use crate::translation::glossary::GlossaryEntry;
use crate::translation::rate_limit::RateLimiter;
use crate::translation::retry::RetryPolicy;
use crate::translation::shutdown::StopSignal;

static ENTRY_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"<<ENTRY_(\d+)>>").unwrap());

const END_MARKER: &str = "<<END>>";

/// Per-request context supplied by the pipeline
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    /// Glossary terms relevant to the texts being sent
    pub glossary: Vec<GlossaryEntry>,
}

impl RequestContext {
    pub fn new(glossary: Vec<GlossaryEntry>) -> Self {
        Self { glossary }
    }
}

/// Retrying, rate-limited front for a translation backend
#[derive(Debug)]
pub struct TranslationClient {
    backend: Arc<dyn TranslationBackend>,
    policy: RetryPolicy,
    timeout: Duration,
    limiter: Arc<RateLimiter>,
    stop: StopSignal,
    source_language: String,
    target_language: String,
    /// Retry entries missing from a batch reply on their own
    split_fallback: bool,
    requests: AtomicUsize,
}

impl TranslationClient {
    /// Client with the default retry policy, a 60s timeout and no pacing
    pub fn new(
        backend: Arc<dyn TranslationBackend>,
        source_language: impl Into<String>,
        target_language: impl Into<String>,
    ) -> Self {
        Self {
            backend,
            policy: RetryPolicy::default(),
            timeout: Duration::from_secs(60),
            limiter: Arc::new(RateLimiter::new(Duration::ZERO)),
            stop: StopSignal::new(),
            source_language: source_language.into(),
            target_language: target_language.into(),
            split_fallback: true,
            requests: AtomicUsize::new(0),
        }
    }

    /// Client configured from the application settings
    pub fn from_config(config: &Config, backend: Arc<dyn TranslationBackend>, stop: StopSignal) -> Self {
        Self::new(backend, &config.source_language, &config.target_language)
            .with_policy(config.translation.retry_policy())
            .with_timeout(config.translation.get_timeout())
            .with_limiter(Arc::new(RateLimiter::new(
                config.translation.min_request_interval(),
            )))
            .with_stop_signal(stop)
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.limiter = limiter;
        self
    }

    pub fn with_stop_signal(mut self, stop: StopSignal) -> Self {
        self.stop = stop;
        self
    }

    /// Disable one-by-one retries of entries missing from a batch reply
    pub fn without_split_fallback(mut self) -> Self {
        self.split_fallback = false;
        self
    }

    /// Provider/model recorded with cached translations
    pub fn backend_tag(&self) -> String {
        self.backend.tag()
    }

    /// Requests sent to the backend, including retries
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    pub fn target_language(&self) -> &str {
        &self.target_language
    }

    /// Translate one masked text
    pub async fn translate(&self, text: &str, context: &RequestContext) -> Result<String, ClientError> {
        let request = self.request(text.to_string(), context, 0);
        let reply = self.send(&request).await?;
        Ok(reply.trim().to_string())
    }

    /// Translate several masked texts in one request.
    ///
    /// Returns one result per input, in order. A failure of the batched
    /// request itself is reported against every entry.
    pub async fn translate_batch(
        &self,
        texts: &[String],
        context: &RequestContext,
    ) -> Vec<Result<String, ClientError>> {
        match texts.len() {
            0 => return Vec::new(),
            1 => return vec![self.translate(&texts[0], context).await],
            _ => {}
        }

        let request = self.request(frame_entries(texts), context, texts.len());
        let reply = match self.send(&request).await {
            Ok(reply) => reply,
            Err(e) => return vec![Err(e); texts.len()],
        };

        let parsed = parse_entries(&reply, texts.len());
        let mut results = Vec::with_capacity(texts.len());
        for (index, entry) in parsed.into_iter().enumerate() {
            let result = match entry {
                Some(text) => Ok(text),
                None if self.split_fallback => {
                    debug!("Entry {} missing from batch reply, retrying alone", index);
                    self.translate(&texts[index], context).await
                }
                None => Err(ClientError::MissingEntry(index)),
            };
            results.push(result);
        }
        results
    }

    fn request(&self, text: String, context: &RequestContext, entries: usize) -> BackendRequest {
        BackendRequest {
            text,
            source_language: self.source_language.clone(),
            target_language: self.target_language.clone(),
            glossary: context.glossary.clone(),
            entries,
        }
    }

    /// Send with timeout, classification and bounded retries
    async fn send(&self, request: &BackendRequest) -> Result<String, ClientError> {
        let mut attempt: u32 = 0;
        loop {
            if self.stop.is_triggered() {
                return Err(ClientError::Cancelled);
            }
            tokio::select! {
                _ = self.limiter.acquire() => {}
                _ = self.stop.wait() => return Err(ClientError::Cancelled),
            }

            self.requests.fetch_add(1, Ordering::SeqCst);
            let outcome = tokio::time::timeout(self.timeout, self.backend.translate(request)).await;
            let error = match outcome {
                Ok(Ok(response)) if !response.text.trim().is_empty() => return Ok(response.text),
                Ok(Ok(_)) => ProviderError::ParseError("Backend returned an empty translation".to_string()),
                Ok(Err(e)) => e,
                Err(_) => ProviderError::Timeout(self.timeout),
            };

            let kind = error.kind();
            let Some(delay) = self.policy.next_delay(attempt, kind) else {
                return Err(if kind == ErrorKind::Terminal {
                    ClientError::Terminal(error)
                } else {
                    ClientError::Exhausted {
                        attempts: attempt + 1,
                        last: error,
                    }
                });
            };

            warn!(
                "{} attempt {} failed ({}), retrying in {:?}",
                self.backend.tag(),
                attempt + 1,
                error,
                delay
            );
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = self.stop.wait() => return Err(ClientError::Cancelled),
            }
            attempt += 1;
        }
    }
}

/// Frame texts with entry markers
pub fn frame_entries(texts: &[String]) -> String {
    let mut combined = String::new();
    for (index, text) in texts.iter().enumerate() {
        combined.push_str(&format!("<<ENTRY_{}>>\n", index));
        combined.push_str(text);
        combined.push('\n');
    }
    combined.push_str(END_MARKER);
    combined
}

/// Split a framed reply into `expected` entries.
///
/// Entries that are absent, empty or out of range come back as `None`.
/// Without an end marker the reply was cut short, so its last entry is
/// not trusted.
pub fn parse_entries(reply: &str, expected: usize) -> Vec<Option<String>> {
    let end = reply.rfind(END_MARKER);
    let body = &reply[..end.unwrap_or(reply.len())];

    let markers: Vec<(usize, usize, usize)> = ENTRY_MARKER
        .captures_iter(body)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let index = caps[1].parse::<usize>().ok()?;
            Some((index, whole.start(), whole.end()))
        })
        .collect();

    let mut found: HashMap<usize, String> = HashMap::new();
    for (position, (index, _, content_start)) in markers.iter().enumerate() {
        let is_last = position + 1 == markers.len();
        if is_last && end.is_none() {
            continue;
        }
        let content_end = markers
            .get(position + 1)
            .map(|(_, start, _)| *start)
            .unwrap_or(body.len());
        let text = body[*content_start..content_end].trim();
        if *index < expected && !text.is_empty() {
            found.entry(*index).or_insert_with(|| text.to_string());
        }
    }

    (0..expected).map(|index| found.remove(&index)).collect()
}
