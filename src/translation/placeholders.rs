/*!
 * Placeholder masking.
 *
 * Literal spans the backend must not touch (`{PlayerName}`, `[color=gold]`,
 * `<b>`, `%d`, `\n`, ...) are swapped for single marker characters before a
 * unit leaves the process and swapped back afterwards.
 *
 * Markers are C0 control characters that XML 1.0 forbids in text (so
 * they can never occur in a parsed string table), followed by
 * Supplementary Private Use Area-A code points for units with many
 * placeholders. Only C0 markers are refused in a source; private use
 * markers are taken from code points the unit does not contain, so icon
 * glyphs in that plane pass through untouched.
 */

use once_cell::sync::Lazy;
use regex::Regex;

use crate::errors::IntegrityError;

/// One alternation, scanned left to right
static PLACEHOLDER_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"\{[^{}]+\}",
        r"|\[[^\[\]]+\]",
        r"|<[^<>]+>",
        r"|%(?:\d+\$)?[-+0#]*\d*(?:\.\d+)?[diouxXeEfgGcs]",
        r"|%%",
        r"|\\[nrt]",
    ))
    .unwrap()
});

/// C0 controls that no tokenizer or `trim` treats as whitespace
const C0_MARKERS: [char; 22] = [
    '\u{01}', '\u{02}', '\u{03}', '\u{04}', '\u{05}', '\u{06}', '\u{07}', '\u{08}', '\u{0E}',
    '\u{0F}', '\u{10}', '\u{11}', '\u{12}', '\u{13}', '\u{14}', '\u{15}', '\u{16}', '\u{17}',
    '\u{18}', '\u{19}', '\u{1A}', '\u{1B}',
];

const PRIVATE_USE_START: u32 = 0xF0000;
const PRIVATE_USE_END: u32 = 0xFFFFD;

/// A literal that was replaced by a marker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Substitution {
    pub marker: char,
    pub literal: String,
}

/// Text with its placeholders replaced by markers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaskedText {
    pub text: String,
    pub substitutions: Vec<Substitution>,
}

/// Markers available to a unit, in numbering order
fn markers_for(text: &str) -> impl Iterator<Item = char> + '_ {
    C0_MARKERS.iter().copied().chain(
        (PRIVATE_USE_START..=PRIVATE_USE_END)
            .filter_map(char::from_u32)
            .filter(move |c| !text.contains(*c)),
    )
}

/// Whether the character is a C0 marker, which no source or output may hold
pub fn is_reserved(c: char) -> bool {
    C0_MARKERS.contains(&c)
}

/// Position and code point of the first reserved character, if any
pub fn find_reserved(text: &str) -> Option<(usize, char)> {
    text.char_indices().find(|(_, c)| is_reserved(*c))
}

/// Replace every placeholder literal with a marker.
///
/// Numbering restarts at the first marker for every unit rather than
/// running across the document, so the same text masks the same way in
/// any file and shares one cache fingerprint.
pub fn mask(text: &str) -> Result<MaskedText, IntegrityError> {
    if let Some((position, c)) = find_reserved(text) {
        return Err(IntegrityError::ReservedCharacter {
            position,
            codepoint: c as u32,
        });
    }

    let mut masked = String::with_capacity(text.len());
    let mut substitutions = Vec::new();
    let mut markers = markers_for(text);
    let mut last = 0;

    for (index, found) in PLACEHOLDER_REGEX.find_iter(text).enumerate() {
        let marker = markers.next().ok_or(IntegrityError::TooManyPlaceholders(index + 1))?;
        masked.push_str(&text[last..found.start()]);
        masked.push(marker);
        substitutions.push(Substitution {
            marker,
            literal: found.as_str().to_string(),
        });
        last = found.end();
    }
    masked.push_str(&text[last..]);

    Ok(MaskedText {
        text: masked,
        substitutions,
    })
}

/// Restore the literals of a translated masked text.
///
/// Markers are resolved by identity, so the translation may reorder them,
/// but every marker must appear exactly once and the restored text must
/// hold exactly the placeholders of the source.
pub fn unmask(masked: &str, substitutions: &[Substitution]) -> Result<String, IntegrityError> {
    let mut seen = vec![false; substitutions.len()];
    let mut restored = String::with_capacity(masked.len());

    for c in masked.chars() {
        match substitutions.iter().position(|s| s.marker == c) {
            Some(index) => {
                if seen[index] {
                    return Err(IntegrityError::DuplicateMarker {
                        index: index + 1,
                        literal: substitutions[index].literal.clone(),
                    });
                }
                seen[index] = true;
                restored.push_str(&substitutions[index].literal);
            }
            None if is_reserved(c) => {
                return Err(IntegrityError::UnknownMarker { codepoint: c as u32 });
            }
            None => restored.push(c),
        }
    }

    if let Some(index) = seen.iter().position(|found| !found) {
        return Err(IntegrityError::MissingMarker {
            index: index + 1,
            literal: substitutions[index].literal.clone(),
        });
    }

    check_literals(&restored, substitutions)?;
    Ok(restored)
}

/// The placeholders found in `restored` must be the substituted ones
fn check_literals(restored: &str, substitutions: &[Substitution]) -> Result<(), IntegrityError> {
    let mut expected: Vec<&str> = substitutions.iter().map(|s| s.literal.as_str()).collect();

    for found in PLACEHOLDER_REGEX.find_iter(restored) {
        match expected.iter().position(|known| *known == found.as_str()) {
            Some(position) => {
                expected.swap_remove(position);
            }
            None => {
                return Err(IntegrityError::UnexpectedPlaceholder {
                    literal: found.as_str().to_string(),
                });
            }
        }
    }

    // Surrounding text merged with a literal into a different match
    if let Some(literal) = expected.first() {
        let index = substitutions
            .iter()
            .position(|s| s.literal == *literal)
            .unwrap_or_default();
        return Err(IntegrityError::MissingMarker {
            index: index + 1,
            literal: literal.to_string(),
        });
    }
    Ok(())
}

/// Whether a masked unit has anything left for a translator to work on
pub fn needs_translation(masked: &MaskedText) -> bool {
    masked.text.chars().any(char::is_alphabetic)
}

/// Placeholder literals of a text, sorted, for multiset comparison
pub fn placeholder_literals(text: &str) -> Vec<String> {
    let mut literals: Vec<String> = PLACEHOLDER_REGEX
        .find_iter(text)
        .map(|found| found.as_str().to_string())
        .collect();
    literals.sort();
    literals
}

/// Split a unit into leading whitespace, core text and trailing whitespace
pub fn split_whitespace_bounds(text: &str) -> (&str, &str, &str) {
    let core_start = text.len() - text.trim_start().len();
    let core_end = text.trim_end().len().max(core_start);
    (&text[..core_start], &text[core_start..core_end], &text[core_end..])
}
