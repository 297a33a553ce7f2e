//! Line scanners for tags the table pass did not claim.
//!
//! The direct scanner recovers rows of tables whose header went
//! unrecognised. The isolated scanner picks up tags anywhere else on the
//! sheet: next to a number, or alone in a balloon or title block.

use crate::config::ExtractionConfig;
use crate::layout::Line;
use crate::model::{Item, SourceType};
use crate::parsing::normalize::{find_tags, normalize_tag};
use crate::parsing::values::{parse_quantity, DEFAULT_QUANTITY};
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

pub const DIRECT_CONFIDENCE: f32 = 0.85;
pub const ADJACENT_CONFIDENCE: f32 = 0.7;
pub const BALLOON_CONFIDENCE: f32 = 0.5;

/// A whole line that is just `TAG QTY [MATERIAL]`.
static DIRECT_ROW: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^([A-Z]{2,4}\d{3,4}[-_]\d{3,4})\s+(\d+)(?:\s+(.+))?$")
        .expect("valid direct row regex")
});

/// A tag followed by a number.
static TAG_WITH_NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b([A-Z]{2,4}\d{3,4}[-_]\d{3,4})\s+(\d+)\b")
        .expect("valid adjacent number regex")
});

/// Recover `TAG QTY [MATERIAL]` lines outside recognised tables.
///
/// Tags already produced by the table pass on this page are skipped.
pub fn extract_direct(
    lines: &[Line],
    header_lines: &HashSet<usize>,
    table_seen: &HashSet<String>,
    config: &ExtractionConfig,
) -> Vec<Item> {
    let mut items = Vec::new();

    for (idx, line) in lines.iter().enumerate() {
        if header_lines.contains(&idx) {
            continue;
        }

        let Some(caps) = DIRECT_ROW.captures(line.text().trim()) else {
            continue;
        };
        let tag = normalize_tag(&caps[1]);
        if table_seen.contains(&tag) {
            continue;
        }
        let Some(quantity) = parse_quantity(&caps[2], config.max_quantity) else {
            continue;
        };

        items.push(Item {
            tag,
            material: caps
                .get(3)
                .map(|m| m.as_str().trim().to_string())
                .unwrap_or_default(),
            quantity,
            page: line.page(),
            line_number: idx + 1,
            confidence: DIRECT_CONFIDENCE,
            source_type: SourceType::Direct,
            table_number: 0,
        });
    }

    items
}

/// Pick up tags that appear outside any row structure.
///
/// First pass: a tag directly followed by a number. Second pass: a tag with
/// no number, counted once per page with the default quantity so a
/// reference list can correct it later. Tags in `claimed` are skipped by
/// both passes.
pub fn extract_isolated(
    lines: &[Line],
    header_lines: &HashSet<usize>,
    claimed: &HashSet<String>,
    config: &ExtractionConfig,
) -> Vec<Item> {
    let mut items = Vec::new();
    let mut adjacent_tags: HashSet<String> = HashSet::new();
    // Byte offsets of pass-one matches, per line index
    let mut covered: Vec<Vec<usize>> = vec![Vec::new(); lines.len()];

    for (idx, line) in lines.iter().enumerate() {
        if header_lines.contains(&idx) {
            continue;
        }
        let text = line.text();

        for caps in TAG_WITH_NUMBER.captures_iter(text) {
            let Some(tag_match) = caps.get(1) else {
                continue;
            };
            covered[idx].push(tag_match.start());

            let tag = normalize_tag(tag_match.as_str());
            if claimed.contains(&tag) {
                continue;
            }
            let Some(quantity) = parse_quantity(&caps[2], config.max_quantity) else {
                continue;
            };

            adjacent_tags.insert(tag.clone());
            items.push(Item {
                tag,
                material: String::new(),
                quantity,
                page: line.page(),
                line_number: idx + 1,
                confidence: ADJACENT_CONFIDENCE,
                source_type: SourceType::Isolated,
                table_number: 0,
            });
        }
    }

    let mut ballooned: HashSet<String> = HashSet::new();

    for (idx, line) in lines.iter().enumerate() {
        if header_lines.contains(&idx) {
            continue;
        }

        for found in find_tags(line.text()) {
            if covered[idx].contains(&found.start)
                || claimed.contains(&found.tag)
                || adjacent_tags.contains(&found.tag)
                || ballooned.contains(&found.tag)
            {
                continue;
            }

            ballooned.insert(found.tag.clone());
            items.push(Item {
                tag: found.tag,
                material: String::new(),
                quantity: DEFAULT_QUANTITY,
                page: line.page(),
                line_number: idx + 1,
                confidence: BALLOON_CONFIDENCE,
                source_type: SourceType::Balloon,
                table_number: 0,
            });
        }
    }

    items
}
