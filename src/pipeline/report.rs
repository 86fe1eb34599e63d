/*!
 * Summaries produced by `build`, `dry-run` and `verify`.
 */

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

/// Outcome of a `build` run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSummary {
    /// Documents complete at the end of the run
    pub complete: usize,
    pub failed: usize,
    /// Documents still waiting, including interrupted ones
    pub pending: usize,
    /// Documents that were complete before the run started
    pub already_complete: usize,
    /// Documents written by this run
    pub newly_completed: usize,
    /// Failed documents with the first failing unit's reason
    pub failures: Vec<(PathBuf, String)>,
    /// Units served from the cache
    pub cache_hits: usize,
    /// Requests sent to the backend, retries included
    pub backend_requests: usize,
}

impl RunSummary {
    /// Whether every document ended complete
    pub fn is_success(&self) -> bool {
        self.failed == 0 && self.pending == 0
    }

    pub fn total(&self) -> usize {
        self.complete + self.failed + self.pending
    }

    pub(crate) fn record_failure(&mut self, id: PathBuf, reason: String) {
        self.failed += 1;
        self.failures.push((id, reason));
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Documents: {} complete ({} new, {} already done), {} failed, {} pending",
            self.complete, self.newly_completed, self.already_complete, self.failed, self.pending
        )?;
        write!(
            f,
            "Cache hits: {}, backend requests: {}",
            self.cache_hits, self.backend_requests
        )?;
        for (id, reason) in &self.failures {
            write!(f, "\n  FAILED {}: {}", id.display(), reason)?;
        }
        Ok(())
    }
}

/// Work estimate for one document
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlannedDocument {
    pub id: PathBuf,
    /// `complete`, `pending` or `failed`
    pub state: String,
    /// Why the document is pending or failed
    pub detail: Option<String>,
    /// Units that would be translated
    pub units: usize,
    /// Distinct texts already in the cache
    pub cached: usize,
    /// Distinct texts that would be requested
    pub uncached: usize,
    /// Rough input token estimate for the uncached texts
    pub estimated_tokens: usize,
}

/// Outcome of a `dry-run`
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PlanReport {
    pub documents: Vec<PlannedDocument>,
    pub complete: usize,
    pub pending: usize,
    pub failed: usize,
    /// Price of the active provider, when configured
    pub price_per_million_tokens: Option<f64>,
}

impl PlanReport {
    pub fn with_price(mut self, price_per_million_tokens: Option<f64>) -> Self {
        self.price_per_million_tokens = price_per_million_tokens;
        self
    }

    /// Cost of the estimated tokens sent plus about as many received
    pub fn estimated_cost(&self) -> Option<f64> {
        self.price_per_million_tokens
            .map(|price| (self.estimated_tokens() * 2) as f64 / 1_000_000.0 * price)
    }

    pub fn uncached_texts(&self) -> usize {
        self.documents.iter().map(|d| d.uncached).sum()
    }

    pub fn estimated_tokens(&self) -> usize {
        self.documents.iter().map(|d| d.estimated_tokens).sum()
    }
}

impl fmt::Display for PlanReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for doc in self.documents.iter().filter(|d| d.state != "complete") {
            write!(f, "{:<9} {}", doc.state, doc.id.display())?;
            if doc.state == "pending" {
                write!(
                    f,
                    " ({} units, {} cached, {} to translate, ~{} tokens)",
                    doc.units, doc.cached, doc.uncached, doc.estimated_tokens
                )?;
            }
            if let Some(detail) = &doc.detail {
                write!(f, " [{}]", detail)?;
            }
            writeln!(f)?;
        }
        write!(
            f,
            "Documents: {} complete, {} pending, {} failed; {} texts to translate, ~{} tokens",
            self.complete,
            self.pending,
            self.failed,
            self.uncached_texts(),
            self.estimated_tokens()
        )?;
        if let Some(cost) = self.estimated_cost() {
            write!(f, ", ~${:.2}", cost)?;
        }
        Ok(())
    }
}

/// Outcome of a `verify`
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct VerifyReport {
    /// Outputs that were checked
    pub checked: usize,
    pub valid: usize,
    /// Inputs with no output yet
    pub missing: usize,
    /// Documents with a problem and what it is
    pub issues: Vec<(PathBuf, String)>,
}

impl VerifyReport {
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }
}

impl fmt::Display for VerifyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (id, issue) in &self.issues {
            writeln!(f, "INVALID {}: {}", id.display(), issue)?;
        }
        write!(
            f,
            "Checked {} outputs: {} valid, {} with issues, {} not yet translated",
            self.checked,
            self.valid,
            self.issues.len(),
            self.missing
        )
    }
}
