/*!
 * Scripted backend for tests and offline runs.
 *
 * `MockBackend` answers from a responder function and can be told to
 * fail, stall or mangle placeholders:
 * - `MockBackend::echo()` - returns the text unchanged
 * - `MockBackend::with_dictionary(..)` - phrase replacement per line
 * - `MockBackend::prefixing(..)` - prefixes every translated line
 * - `MockBackend::dropping_placeholders()` - strips every marker
 *
 * Batch framing lines (`<<ENTRY_n>>`, `<<END>>`) pass through untouched,
 * so every responder works for both single and batched requests.
 */

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::errors::ProviderError;
use crate::providers::{BackendRequest, BackendResponse, TranslationBackend};
use crate::translation::placeholders;

/// Produces the reply text for a request
pub type Responder = Arc<dyn Fn(&BackendRequest) -> Result<String, ProviderError> + Send + Sync>;

/// Mock backend for testing translation behavior
pub struct MockBackend {
    responder: Responder,
    /// Errors returned by the next calls, in order
    scripted_failures: Mutex<VecDeque<ProviderError>>,
    /// Requests whose text contains the needle fail with the error
    failing_needles: Vec<(String, ProviderError)>,
    /// Calls that still stall for `slow_delay`
    slow_calls: AtomicUsize,
    slow_delay: Duration,
    /// Added to every call
    delay: Duration,
    calls: AtomicUsize,
    requests: Mutex<Vec<BackendRequest>>,
}

impl std::fmt::Debug for MockBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockBackend")
            .field("calls", &self.call_count())
            .field("delay", &self.delay)
            .finish()
    }
}

fn is_frame_line(line: &str) -> bool {
    let line = line.trim();
    line == "<<END>>" || (line.starts_with("<<ENTRY_") && line.ends_with(">>"))
}

/// Apply `f` to every line that is not batch framing
fn map_lines(text: &str, f: impl Fn(&str) -> String) -> String {
    text.split('\n')
        .map(|line| if is_frame_line(line) { line.to_string() } else { f(line) })
        .collect::<Vec<_>>()
        .join("\n")
}

impl MockBackend {
    /// Mock answering with the given responder
    pub fn with_responder<F>(responder: F) -> Self
    where
        F: Fn(&BackendRequest) -> Result<String, ProviderError> + Send + Sync + 'static,
    {
        Self {
            responder: Arc::new(responder),
            scripted_failures: Mutex::new(VecDeque::new()),
            failing_needles: Vec::new(),
            slow_calls: AtomicUsize::new(0),
            slow_delay: Duration::ZERO,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Returns every text unchanged
    pub fn echo() -> Self {
        Self::with_responder(|request| Ok(request.text.clone()))
    }

    /// Replaces each phrase with its translation, leaving markers in place
    pub fn with_dictionary<I, S, T>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, T)>,
        S: Into<String>,
        T: Into<String>,
    {
        let pairs: Vec<(String, String)> = pairs
            .into_iter()
            .map(|(source, target)| (source.into(), target.into()))
            .collect();
        Self::with_responder(move |request| {
            Ok(map_lines(&request.text, |line| {
                pairs
                    .iter()
                    .fold(line.to_string(), |acc, (source, target)| acc.replace(source, target))
            }))
        })
    }

    /// Prefixes every non-empty line
    pub fn prefixing(prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        Self::with_responder(move |request| {
            Ok(map_lines(&request.text, |line| {
                if line.trim().is_empty() {
                    line.to_string()
                } else {
                    format!("{}{}", prefix, line)
                }
            }))
        })
    }

    /// Loses every placeholder marker, as a careless model would
    pub fn dropping_placeholders() -> Self {
        Self::with_responder(|request| {
            Ok(map_lines(&request.text, |line| {
                line.chars().filter(|c| !placeholders::is_reserved(*c)).collect()
            }))
        })
    }

    /// Fail the next `count` calls with `error`
    pub fn fail_next(self, count: usize, error: ProviderError) -> Self {
        self.scripted_failures
            .lock()
            .extend(std::iter::repeat(error).take(count));
        self
    }

    /// Fail every call whose text contains `needle`
    pub fn fail_when(mut self, needle: impl Into<String>, error: ProviderError) -> Self {
        self.failing_needles.push((needle.into(), error));
        self
    }

    /// Stall the first `count` calls for `delay` before answering
    pub fn slow_first(self, count: usize, delay: Duration) -> Self {
        self.slow_calls.store(count, Ordering::SeqCst);
        Self {
            slow_delay: delay,
            ..self
        }
    }

    /// Delay every call
    pub fn with_delay(self, delay: Duration) -> Self {
        Self { delay, ..self }
    }

    /// Number of calls received, including failed and abandoned ones
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every request received so far
    pub fn requests(&self) -> Vec<BackendRequest> {
        self.requests.lock().clone()
    }

    fn take_slow_call(&self) -> bool {
        self.slow_calls
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |remaining| remaining.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl TranslationBackend for MockBackend {
    async fn translate(&self, request: &BackendRequest) -> Result<BackendResponse, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(request.clone());

        if self.take_slow_call() {
            tokio::time::sleep(self.slow_delay).await;
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let scripted = self.scripted_failures.lock().pop_front();
        if let Some(error) = scripted {
            return Err(error);
        }
        if let Some((_, error)) = self
            .failing_needles
            .iter()
            .find(|(needle, _)| request.text.contains(needle.as_str()))
        {
            return Err(error.clone());
        }

        let text = (self.responder)(request)?;
        Ok(BackendResponse {
            text,
            model: "mock".to_string(),
        })
    }

    fn tag(&self) -> String {
        "mock/mock".to_string()
    }
}
