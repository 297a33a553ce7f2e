//! Reference-guided rescan.
//!
//! When the generic passes found few of the expected tags, look for each
//! expected tag by name instead and read the quantity off the same line.

use super::ReferenceList;
use crate::config::ExtractionConfig;
use crate::layout::Line;
use crate::model::{Item, SourceType};
use crate::parsing::normalize::continues_identifier;
use crate::parsing::values::{is_short_number, parse_quantity};
use regex::Regex;

pub const GUIDED_CONFIDENCE: f32 = 0.9;

/// Case-insensitive pattern for one tag, `-` and `_` interchangeable.
fn tag_pattern(tag: &str) -> Option<Regex> {
    let body = tag
        .split('-')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join("[-_]");
    Regex::new(&format!("(?i){body}")).ok()
}

/// Whether `pattern` occurs in `text` as a whole identifier.
fn occurs_standalone(pattern: &Regex, text: &str) -> bool {
    pattern.find_iter(text).any(|m| {
        let preceded_by_alnum = matches!(
            text[..m.start()].chars().next_back(),
            Some(c) if c.is_alphanumeric()
        );
        !preceded_by_alnum && !continues_identifier(&text[m.end()..])
    })
}

/// The last whitespace-separated token of a line that is a bare 1-3 digit
/// number.
fn last_number(line: &Line, max_quantity: u32) -> Option<u32> {
    line.text()
        .split_whitespace()
        .rev()
        .filter(|word| is_short_number(word))
        .find_map(|word| parse_quantity(word, max_quantity))
}

/// Scan every page's lines for each reference tag.
///
/// `pages` holds the grouped lines of each page, in page order. A hit
/// without any number on its line yields nothing.
pub fn extract_guided(
    pages: &[Vec<Line>],
    reference: &ReferenceList,
    config: &ExtractionConfig,
) -> Vec<Item> {
    let mut items = Vec::new();

    for row in reference.iter() {
        let Some(pattern) = tag_pattern(&row.tag) else {
            tracing::debug!(tag = %row.tag, "could not build search pattern for reference tag");
            continue;
        };

        for lines in pages {
            for (idx, line) in lines.iter().enumerate() {
                if !occurs_standalone(&pattern, line.text()) {
                    continue;
                }
                let Some(quantity) = last_number(line, config.max_quantity) else {
                    continue;
                };
                items.push(Item {
                    tag: row.tag.clone(),
                    material: row.material.clone(),
                    quantity,
                    page: line.page(),
                    line_number: idx + 1,
                    confidence: GUIDED_CONFIDENCE,
                    source_type: SourceType::Guided,
                    table_number: 0,
                });
            }
        }
    }

    items
}
