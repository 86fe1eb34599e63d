/*!
 * Terminology glossary.
 *
 * A glossary is an ordered list of source term to target term pairs,
 * loaded from CSV or JSON. Its version is a hash of its contents and is
 * part of every cache fingerprint, so editing the glossary invalidates
 * all translations made with the old one.
 */

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use log::{debug, info, warn};
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

const SOURCE_HEADERS: [&str; 5] = ["source", "term", "english", "en", "original"];
const TARGET_HEADERS: [&str; 5] = ["target", "translation", "farsi", "fa", "translated"];

/// A single term mapping
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlossaryEntry {
    #[serde(alias = "term")]
    pub source: String,
    #[serde(alias = "translation")]
    pub target: String,
}

impl GlossaryEntry {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }
}

/// Ordered term list
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Glossary {
    entries: Vec<GlossaryEntry>,
}

impl Glossary {
    /// Build a glossary, dropping blank and repeated source terms
    pub fn new(entries: Vec<GlossaryEntry>) -> Self {
        let mut kept: Vec<GlossaryEntry> = Vec::with_capacity(entries.len());
        for entry in entries {
            let entry = GlossaryEntry::new(entry.source.trim(), entry.target.trim());
            if entry.source.is_empty() || entry.target.is_empty() {
                continue;
            }
            if kept.iter().any(|k| k.source.eq_ignore_ascii_case(&entry.source)) {
                warn!("Glossary term '{}' listed twice; keeping the first", entry.source);
                continue;
            }
            kept.push(entry);
        }
        Self { entries: kept }
    }

    /// Load a CSV or JSON glossary, picked by file extension
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();

        let glossary = match extension.as_str() {
            "json" => Self::from_json(
                &std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read glossary: {}", path.display()))?,
            )?,
            _ => Self::from_csv_reader(
                std::fs::File::open(path)
                    .with_context(|| format!("Failed to open glossary: {}", path.display()))?,
            )?,
        };

        info!("Loaded {} glossary terms from {}", glossary.len(), path.display());
        Ok(glossary)
    }

    /// Load when a path is configured, an empty glossary otherwise
    pub fn load_optional<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// Parse CSV with a recognised header row, or two bare columns
    pub fn from_csv_reader<R: std::io::Read>(reader: R) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut rows = Vec::new();
        for record in reader.records() {
            rows.push(record.context("Malformed glossary CSV")?);
        }

        let mut columns = (0usize, 1usize);
        let mut skip = 0;
        if let Some(header) = rows.first() {
            let find = |names: &[&str]| {
                header
                    .iter()
                    .position(|cell| names.contains(&cell.to_lowercase().as_str()))
            };
            if let (Some(source), Some(target)) = (find(&SOURCE_HEADERS), find(&TARGET_HEADERS)) {
                columns = (source, target);
                skip = 1;
            }
        }

        let entries = rows
            .iter()
            .skip(skip)
            .filter_map(|row| Some(GlossaryEntry::new(row.get(columns.0)?, row.get(columns.1)?)))
            .collect();
        Ok(Self::new(entries))
    }

    /// Parse a JSON list of entries or an object map of term to translation
    pub fn from_json(raw: &str) -> Result<Self> {
        let value: serde_json::Value =
            serde_json::from_str(raw).context("Glossary is not valid JSON")?;

        let entries = match value {
            serde_json::Value::Array(_) => serde_json::from_value::<Vec<GlossaryEntry>>(value)
                .context("Glossary list entries need source and target fields")?,
            serde_json::Value::Object(map) => map
                .into_iter()
                .map(|(source, target)| match target {
                    serde_json::Value::String(target) => Ok(GlossaryEntry::new(source, target)),
                    other => Err(anyhow!("Glossary term '{}' maps to non-string {}", source, other)),
                })
                .collect::<Result<Vec<_>>>()?,
            other => return Err(anyhow!("Unsupported glossary JSON root: {}", other)),
        };
        Ok(Self::new(entries))
    }

    pub fn entries(&self) -> &[GlossaryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// First 16 hex characters of SHA-256 over the ordered entries
    pub fn version(&self) -> String {
        let mut hasher = Sha256::new();
        for entry in &self.entries {
            for field in [&entry.source, &entry.target] {
                hasher.update((field.len() as u64).to_le_bytes());
                hasher.update(field.as_bytes());
            }
        }
        let digest = format!("{:x}", hasher.finalize());
        digest[..16].to_string()
    }
}

/// Picks the glossary terms that matter for a given text
#[derive(Debug, Clone)]
pub struct GlossaryResolver {
    glossary: Glossary,
    version: String,
    patterns: Vec<Regex>,
    /// Entry indexes, longest term first, ties in file order
    by_length: Vec<usize>,
}

impl GlossaryResolver {
    pub fn new(glossary: Glossary) -> Result<Self> {
        let patterns = glossary
            .entries()
            .iter()
            .map(|entry| term_pattern(&entry.source))
            .collect::<Result<Vec<_>>>()?;

        let mut by_length: Vec<usize> = (0..glossary.len()).collect();
        by_length.sort_by_key(|&i| std::cmp::Reverse(glossary.entries()[i].source.chars().count()));

        Ok(Self {
            version: glossary.version(),
            glossary,
            patterns,
            by_length,
        })
    }

    pub fn empty() -> Self {
        Self {
            version: Glossary::default().version(),
            glossary: Glossary::default(),
            patterns: Vec::new(),
            by_length: Vec::new(),
        }
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn glossary(&self) -> &Glossary {
        &self.glossary
    }

    /// Entries whose term occurs in `text`, longest first.
    ///
    /// A term whose every occurrence sits inside a longer selected term
    /// ("Dragon" inside "Dragon Slayer") is left out.
    pub fn relevant_entries(&self, text: &str) -> Vec<GlossaryEntry> {
        let mut claimed: Vec<(usize, usize)> = Vec::new();
        let mut selected = Vec::new();

        for &index in &self.by_length {
            let free: Vec<(usize, usize)> = self.patterns[index]
                .find_iter(text)
                .map(|found| (found.start(), found.end()))
                .filter(|(start, end)| {
                    !claimed
                        .iter()
                        .any(|(claimed_start, claimed_end)| claimed_start <= start && end <= claimed_end)
                })
                .collect();

            if free.is_empty() {
                continue;
            }
            claimed.extend(free);
            selected.push(self.glossary.entries()[index].clone());
        }

        if !selected.is_empty() {
            debug!("{} glossary terms apply", selected.len());
        }
        selected
    }
}

/// Case-insensitive pattern, word-bounded where the term edge is a word character
fn term_pattern(term: &str) -> Result<Regex> {
    let is_word = |c: Option<char>| c.is_some_and(|c| c.is_alphanumeric() || c == '_');
    let prefix = if is_word(term.chars().next()) { r"\b" } else { "" };
    let suffix = if is_word(term.chars().last()) { r"\b" } else { "" };
    let pattern = format!("(?i){}{}{}", prefix, regex::escape(term), suffix);
    Regex::new(&pattern).with_context(|| format!("Invalid glossary term: {}", term))
}
