/*!
 * ISO 639 language code helpers.
 *
 * Configuration accepts ISO 639-1 (`fa`) and ISO 639-2 (`fas`, `per`)
 * codes. Codes are only interpreted here; the configured string is what
 * goes into cache keys and output paths.
 */

use anyhow::{anyhow, Result};
use isolang::Language;

/// ISO 639-2/B codes that differ from their 639-2/T form
const BIBLIOGRAPHIC_CODES: [(&str, &str); 18] = [
    ("alb", "sqi"),
    ("arm", "hye"),
    ("baq", "eus"),
    ("bur", "mya"),
    ("chi", "zho"),
    ("cze", "ces"),
    ("dut", "nld"),
    ("fre", "fra"),
    ("geo", "kat"),
    ("ger", "deu"),
    ("gre", "ell"),
    ("ice", "isl"),
    ("mac", "mkd"),
    ("may", "msa"),
    ("per", "fas"),
    ("rum", "ron"),
    ("slo", "slk"),
    ("wel", "cym"),
];

fn lookup(code: &str) -> Option<Language> {
    let code = code.trim().to_lowercase();
    match code.len() {
        2 => Language::from_639_1(&code),
        3 => {
            let terminology = BIBLIOGRAPHIC_CODES
                .iter()
                .find(|(bibliographic, _)| *bibliographic == code)
                .map(|(_, terminology)| *terminology)
                .unwrap_or(code.as_str());
            Language::from_639_3(terminology)
        }
        _ => None,
    }
}

/// Check that a code names a known language
pub fn validate_language_code(code: &str) -> Result<()> {
    lookup(code)
        .map(|_| ())
        .ok_or_else(|| anyhow!("Invalid language code: {}", code))
}

/// Normalize a language code to ISO 639-2/T (3-letter) format
pub fn normalize_to_part2t(code: &str) -> Result<String> {
    lookup(code)
        .map(|language| language.to_639_3().to_string())
        .ok_or_else(|| anyhow!("Cannot normalize invalid language code: {}", code))
}

/// Check if two language codes name the same language
pub fn language_codes_match(code1: &str, code2: &str) -> bool {
    match (lookup(code1), lookup(code2)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

/// English name of the language behind a code
pub fn get_language_name(code: &str) -> Result<String> {
    lookup(code)
        .map(|language| language.to_name().to_string())
        .ok_or_else(|| anyhow!("Failed to get language from code: {}", code))
}
