/*!
 * Data types produced by the string table codec.
 */

use std::fmt;

/// How the text of a unit is encoded in the document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitKind {
    /// Character data with entity escaping
    Text,
    /// A `<![CDATA[...]]>` section
    CData,
}

/// Where a unit lives in its document. Opaque to translation logic.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UnitLocator {
    /// Identifier of the enclosing `Entry`, if it has one
    pub entry_id: Option<String>,
    /// Name of the element holding the text (`DefaultText`, `FemaleText`, ...)
    pub element: String,
    /// Position of the unit within the document
    pub ordinal: usize,
}

impl fmt::Display for UnitLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.entry_id {
            Some(id) => write!(f, "entry {} <{}> (#{})", id, self.element, self.ordinal),
            None => write!(f, "<{}> (#{})", self.element, self.ordinal),
        }
    }
}

/// A piece of translatable text pulled out of a document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextUnit {
    /// Decoded text
    pub source: String,
    /// Encoding of the text in the original document
    pub kind: UnitKind,
    /// Position of the unit
    pub locator: UnitLocator,
}

impl TextUnit {
    /// Empty and whitespace-only units stay in the skeleton but are never sent out
    pub fn is_translatable(&self) -> bool {
        !self.source.trim().is_empty()
    }
}

/// The original bytes of a slot, used to re-emit unchanged units verbatim
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotTemplate {
    pub source: String,
    pub raw: String,
    pub kind: UnitKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Bytes copied through untouched
    Literal(String),
    /// A text unit, filled in on reassembly
    Slot(SlotTemplate),
}

/// Everything in a document that is not translatable text
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Skeleton {
    segments: Vec<Segment>,
}

impl Skeleton {
    pub(crate) fn push_literal(&mut self, literal: &str) {
        if literal.is_empty() {
            return;
        }
        match self.segments.last_mut() {
            Some(Segment::Literal(previous)) => previous.push_str(literal),
            _ => self.segments.push(Segment::Literal(literal.to_string())),
        }
    }

    pub(crate) fn push_slot(&mut self, slot: SlotTemplate) {
        self.segments.push(Segment::Slot(slot));
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Number of text units the skeleton expects on reassembly
    pub fn slot_count(&self) -> usize {
        self.segments
            .iter()
            .filter(|segment| matches!(segment, Segment::Slot(_)))
            .count()
    }
}

/// Result of extracting a document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedDocument {
    pub skeleton: Skeleton,
    pub units: Vec<TextUnit>,
}

impl ExtractedDocument {
    /// Locators of all units, in document order
    pub fn locators(&self) -> Vec<&UnitLocator> {
        self.units.iter().map(|unit| &unit.locator).collect()
    }

    /// The units' own source strings, in order
    pub fn sources(&self) -> Vec<String> {
        self.units.iter().map(|unit| unit.source.clone()).collect()
    }

    pub fn translatable_count(&self) -> usize {
        self.units.iter().filter(|unit| unit.is_translatable()).count()
    }
}
