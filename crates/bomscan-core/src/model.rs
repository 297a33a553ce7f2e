use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Final output: normalized tag -> cumulative quantity.
pub type ResultMap = BTreeMap<String, u32>;

/// A word of text with its position on the page.
///
/// Coordinates are PDF user space with the origin at the bottom-left, so a
/// larger `y` is higher up the page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionedToken {
    pub text: String,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub page: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Table,
    Direct,
    Isolated,
    Balloon,
    Proximity,
    Guided,
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceType::Table => write!(f, "table"),
            SourceType::Direct => write!(f, "direct"),
            SourceType::Isolated => write!(f, "isolated"),
            SourceType::Balloon => write!(f, "balloon"),
            SourceType::Proximity => write!(f, "proximity"),
            SourceType::Guided => write!(f, "guided"),
        }
    }
}

/// One candidate tag occurrence produced by a single extraction pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub tag: String,
    pub material: String,
    pub quantity: u32,
    pub page: usize,
    pub line_number: usize,
    pub confidence: f32,
    pub source_type: SourceType,
    /// 1-based table index in document order, 0 outside the table pass.
    pub table_number: usize,
}

/// An expected tag supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceRow {
    pub tag: String,
    pub quantity: u32,
    #[serde(default)]
    pub material: String,
}

/// How the candidate items were assembled for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Composition {
    /// Table, direct and isolated passes only.
    Primary,
    /// Primary passes plus proximity items for tags they missed.
    PrimaryWithProximity,
    /// Three-column layout detected; proximity items replace the primary ones.
    Proximity,
}

impl fmt::Display for Composition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Composition::Primary => write!(f, "primary"),
            Composition::PrimaryWithProximity => write!(f, "primary+proximity"),
            Composition::Proximity => write!(f, "proximity"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionOutcome {
    pub result: ResultMap,
    pub page_count: usize,
    pub items: Vec<Item>,
    pub composition: Composition,
    pub guided_fallback: bool,
}

impl ExtractionOutcome {
    /// The outcome of a document that could not be read at all.
    pub fn empty() -> Self {
        ExtractionOutcome {
            result: ResultMap::new(),
            page_count: 0,
            items: Vec::new(),
            composition: Composition::Primary,
            guided_fallback: false,
        }
    }

    pub fn total_quantity(&self) -> u64 {
        self.result.values().map(|&q| u64::from(q)).sum()
    }
}
