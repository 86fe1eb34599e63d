/*!
 * Extraction and reassembly of `.stringtable` documents.
 *
 * The codec never re-serializes XML. It records the exact byte span of
 * every translatable text node, keeps everything around those spans as
 * literal skeleton segments, and on reassembly splices new text into the
 * slots. An unchanged unit re-emits its original bytes, so
 * `reassemble(extract(d), sources) == d` holds byte for byte.
 */

use std::collections::HashSet;

use log::debug;
use quick_xml::escape::partial_escape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::errors::CodecError;

use super::model::{ExtractedDocument, Segment, Skeleton, SlotTemplate, TextUnit, UnitKind, UnitLocator};

const ENTRY_ELEMENT: &str = "Entry";
const ID_ELEMENT: &str = "ID";
const CDATA_CLOSE: &[u8] = b"]]>";

/// Parser for string table documents
#[derive(Debug, Clone)]
pub struct StringTableCodec {
    roots: Vec<String>,
    translatable: HashSet<String>,
}

impl Default for StringTableCodec {
    fn default() -> Self {
        Self::new(Self::DEFAULT_ELEMENTS)
    }
}

impl StringTableCodec {
    /// Root elements a string table may use
    pub const DEFAULT_ROOTS: [&'static str; 2] = ["StringTableFile", "StringTable"];

    /// Elements whose text is translated
    pub const DEFAULT_ELEMENTS: [&'static str; 2] = ["DefaultText", "FemaleText"];

    /// Create a codec translating the given element names
    pub fn new<I, S>(elements: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            roots: Self::DEFAULT_ROOTS.iter().map(|root| root.to_string()).collect(),
            translatable: elements.into_iter().map(Into::into).collect(),
        }
    }

    /// Decode raw file bytes and extract them
    pub fn extract_bytes(&self, raw: &[u8]) -> Result<ExtractedDocument, CodecError> {
        let text = std::str::from_utf8(raw)
            .map_err(|e| CodecError::Unparseable(format!("invalid UTF-8: {}", e)))?;
        self.extract(text)
    }

    /// Split a document into its skeleton and its text units
    pub fn extract(&self, raw: &str) -> Result<ExtractedDocument, CodecError> {
        let mut reader = Reader::from_str(raw);
        reader.trim_text(false);
        reader.check_end_names(true);

        let bytes = raw.as_bytes();
        let mut skeleton = Skeleton::default();
        let mut units: Vec<TextUnit> = Vec::new();
        let mut stack: Vec<String> = Vec::new();
        let mut current_entry: Option<String> = None;
        let mut saw_root = false;
        // End of the skeleton bytes already copied
        let mut copied_until = 0usize;
        // End of the last markup event; a text node always starts here
        let mut markup_end = 0usize;

        loop {
            let event = reader.read_event().map_err(|e| {
                CodecError::Unparseable(format!("at byte {}: {}", reader.buffer_position(), e))
            })?;

            match event {
                Event::Start(start) => {
                    let name = element_name(&start)?;
                    self.open_element(&name, &stack, &mut saw_root)?;
                    if name == ENTRY_ELEMENT {
                        current_entry = entry_id_attribute(&start)?;
                    }
                    stack.push(name);
                }
                Event::Empty(start) => {
                    let name = element_name(&start)?;
                    self.open_element(&name, &stack, &mut saw_root)?;
                }
                Event::End(_) => {
                    if stack.pop().as_deref() == Some(ENTRY_ELEMENT) {
                        current_entry = None;
                    }
                }
                Event::Text(text) => {
                    let start = markup_end;
                    let Some(parent) = stack.last() else {
                        let outside = String::from_utf8_lossy(&text);
                        if !outside.trim_start_matches('\u{feff}').trim().is_empty() {
                            return Err(CodecError::Unparseable(format!(
                                "text outside the root element at byte {}",
                                start
                            )));
                        }
                        continue;
                    };

                    let end = start + text.len();
                    if bytes.get(start..end) != Some(&text[..]) {
                        return Err(CodecError::Unparseable(format!(
                            "cannot locate text node at byte {}",
                            start
                        )));
                    }

                    let decoded = text
                        .unescape()
                        .map_err(|e| CodecError::Unparseable(format!("at byte {}: {}", start, e)))?
                        .into_owned();

                    if parent == ID_ELEMENT && current_entry.is_none() && is_inside_entry(&stack) {
                        current_entry = Some(decoded.trim().to_string());
                    }

                    if self.translatable.contains(parent) {
                        skeleton.push_literal(&raw[copied_until..start]);
                        skeleton.push_slot(SlotTemplate {
                            source: decoded.clone(),
                            raw: raw[start..end].to_string(),
                            kind: UnitKind::Text,
                        });
                        copied_until = end;
                        units.push(TextUnit {
                            source: decoded,
                            kind: UnitKind::Text,
                            locator: UnitLocator {
                                entry_id: current_entry.clone(),
                                element: parent.clone(),
                                ordinal: units.len(),
                            },
                        });
                    }
                    continue;
                }
                Event::CData(cdata) => {
                    let after = reader.buffer_position();
                    let content_end = after.saturating_sub(CDATA_CLOSE.len());
                    let content_start = content_end.saturating_sub(cdata.len());
                    if bytes.get(content_end..after) != Some(CDATA_CLOSE)
                        || bytes.get(content_start..content_end) != Some(&cdata[..])
                    {
                        return Err(CodecError::Unparseable(format!(
                            "cannot locate CDATA section ending at byte {}",
                            after
                        )));
                    }

                    if let Some(parent) = stack.last().filter(|p| self.translatable.contains(*p)) {
                        let content = raw[content_start..content_end].to_string();
                        skeleton.push_literal(&raw[copied_until..content_start]);
                        skeleton.push_slot(SlotTemplate {
                            source: content.clone(),
                            raw: content.clone(),
                            kind: UnitKind::CData,
                        });
                        copied_until = content_end;
                        units.push(TextUnit {
                            source: content,
                            kind: UnitKind::CData,
                            locator: UnitLocator {
                                entry_id: current_entry.clone(),
                                element: parent.clone(),
                                ordinal: units.len(),
                            },
                        });
                    }
                }
                Event::Eof => break,
                _ => {}
            }

            markup_end = reader.buffer_position();
        }

        if let Some(open) = stack.last() {
            return Err(CodecError::Unparseable(format!(
                "document ends inside <{}>",
                open
            )));
        }
        if !saw_root {
            return Err(CodecError::Unparseable("document has no root element".to_string()));
        }

        skeleton.push_literal(&raw[copied_until..]);
        debug!("Extracted {} text units", units.len());

        Ok(ExtractedDocument { skeleton, units })
    }

    /// Check that a document parses as a string table
    pub fn validate_structure(&self, raw: &str) -> Result<(), CodecError> {
        self.extract(raw).map(|_| ())
    }

    fn open_element(&self, name: &str, stack: &[String], saw_root: &mut bool) -> Result<(), CodecError> {
        if !stack.is_empty() {
            return Ok(());
        }
        if *saw_root {
            return Err(CodecError::Unparseable(format!(
                "second root element <{}>",
                name
            )));
        }
        if !self.roots.iter().any(|root| root == name) {
            return Err(CodecError::Unparseable(format!(
                "unexpected root element <{}>, expected one of {}",
                name,
                self.roots.join(", ")
            )));
        }
        *saw_root = true;
        Ok(())
    }
}

/// Put translated text back into a skeleton
pub fn reassemble(skeleton: &Skeleton, translations: &[String]) -> Result<String, CodecError> {
    let expected = skeleton.slot_count();
    if expected != translations.len() {
        return Err(CodecError::UnitCountMismatch {
            expected,
            actual: translations.len(),
        });
    }

    let mut output = String::new();
    let mut next = translations.iter();
    for segment in skeleton.segments() {
        match segment {
            Segment::Literal(literal) => output.push_str(literal),
            Segment::Slot(slot) => {
                let Some(text) = next.next() else {
                    return Err(CodecError::UnitCountMismatch {
                        expected,
                        actual: translations.len(),
                    });
                };
                if *text == slot.source {
                    output.push_str(&slot.raw);
                    continue;
                }
                match slot.kind {
                    UnitKind::Text => output.push_str(&partial_escape(text)),
                    UnitKind::CData => output.push_str(&text.replace("]]>", "]]]]><![CDATA[>")),
                }
            }
        }
    }

    Ok(output)
}

fn element_name(start: &BytesStart<'_>) -> Result<String, CodecError> {
    std::str::from_utf8(start.name().as_ref())
        .map(str::to_string)
        .map_err(|e| CodecError::Unparseable(format!("invalid element name: {}", e)))
}

fn entry_id_attribute(start: &BytesStart<'_>) -> Result<Option<String>, CodecError> {
    for key in [ID_ELEMENT, "id"] {
        let attribute = start
            .try_get_attribute(key)
            .map_err(|e| CodecError::Unparseable(format!("bad attribute on <Entry>: {}", e)))?;
        if let Some(attribute) = attribute {
            let value = attribute
                .unescape_value()
                .map_err(|e| CodecError::Unparseable(format!("bad attribute on <Entry>: {}", e)))?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

fn is_inside_entry(stack: &[String]) -> bool {
    stack.len() >= 2 && stack[stack.len() - 2] == ENTRY_ELEMENT
}
