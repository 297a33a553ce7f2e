//! Geometry-first extraction.
//!
//! Ignores table structure entirely: every tag token is paired with the
//! nearest bare number on its row. Rows that carry both a primary tag and
//! an assembly tag (`TAG  TAG-A01  QTY`) put the quantity further away, so
//! they get a wider search radius.

use crate::config::ExtractionConfig;
use crate::model::{Item, PositionedToken, SourceType};
use crate::parsing::normalize::normalize_tag;
use crate::parsing::values::{is_short_number, parse_quantity};
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;

pub const PROXIMITY_CONFIDENCE: f32 = 0.95;

static PLAIN_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^[A-Z]{2,4}\d{3,4}[-_]\d{3,4}$").expect("valid plain tag regex")
});

static ASSEMBLY_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^[A-Z]{2,4}\d{3,4}[-_]\d{3,4}[-_]A\d{2,3}$")
        .expect("valid assembly tag regex")
});

/// Tag_Assy column entries that keep only one or two trailing digits.
static SHORT_ASSEMBLY_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^[A-Z]{2,4}\d{3,4}[-_]\d{1,2}$").expect("valid short assembly regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Tag,
    AssemblyTag,
    Quantity,
    Other,
}

pub fn classify_token(text: &str) -> TokenKind {
    if PLAIN_TAG.is_match(text) {
        TokenKind::Tag
    } else if ASSEMBLY_TAG.is_match(text) || SHORT_ASSEMBLY_TAG.is_match(text) {
        TokenKind::AssemblyTag
    } else if is_short_number(text) {
        TokenKind::Quantity
    } else {
        TokenKind::Other
    }
}

/// Proximity results for one page.
#[derive(Debug, Clone, Default)]
pub struct ProximityPage {
    pub items: Vec<Item>,
    /// Rows recognised as the tag / assembly tag / quantity layout.
    pub three_column_lines: usize,
}

/// Pair tag tokens with quantity tokens on each row of a page.
pub fn extract_page(tokens: &[PositionedToken], config: &ExtractionConfig) -> ProximityPage {
    let mut rows: BTreeMap<i64, Vec<&PositionedToken>> = BTreeMap::new();
    for token in tokens {
        let bucket = (token.y / config.y_tolerance).round() as i64;
        rows.entry(bucket).or_default().push(token);
    }

    let mut page = ProximityPage::default();

    // Highest bucket first, i.e. top of the page first
    for (line_idx, row) in rows.values().rev().enumerate() {
        let kinds: Vec<TokenKind> = row.iter().map(|t| classify_token(&t.text)).collect();
        let has_tag = kinds.contains(&TokenKind::Tag);
        let three_column = has_tag && kinds.contains(&TokenKind::AssemblyTag);
        if three_column {
            page.three_column_lines += 1;
        }

        let radius = if three_column {
            config.three_column_radius
        } else {
            config.proximity_radius
        };

        let quantities: Vec<&PositionedToken> = row
            .iter()
            .zip(&kinds)
            .filter(|(_, kind)| **kind == TokenKind::Quantity)
            .map(|(t, _)| *t)
            .collect();

        for (tag_token, _) in row
            .iter()
            .zip(&kinds)
            .filter(|(_, kind)| **kind == TokenKind::Tag)
        {
            let Some(quantity_token) = nearest_quantity(tag_token, &quantities, radius) else {
                continue;
            };
            let Some(quantity) = parse_quantity(&quantity_token.text, config.max_quantity) else {
                continue;
            };

            page.items.push(Item {
                tag: normalize_tag(&tag_token.text),
                material: String::new(),
                quantity,
                page: tag_token.page,
                line_number: line_idx + 1,
                confidence: PROXIMITY_CONFIDENCE,
                source_type: SourceType::Proximity,
                table_number: 0,
            });
        }
    }

    page
}

/// Closest quantity to the right within `radius`, else closest to the left.
fn nearest_quantity<'a>(
    tag: &PositionedToken,
    quantities: &[&'a PositionedToken],
    radius: f32,
) -> Option<&'a PositionedToken> {
    let closest = |candidates: Vec<(&'a PositionedToken, f32)>| {
        candidates
            .into_iter()
            .filter(|(_, distance)| *distance <= radius)
            .min_by(|(_, a), (_, b)| a.total_cmp(b))
            .map(|(t, _)| t)
    };

    let right = quantities
        .iter()
        .filter(|q| q.x > tag.x)
        .map(|q| (*q, q.x - tag.x))
        .collect();
    if let Some(found) = closest(right) {
        return Some(found);
    }

    let left = quantities
        .iter()
        .filter(|q| q.x < tag.x)
        .map(|q| (*q, tag.x - q.x))
        .collect();
    closest(left)
}
