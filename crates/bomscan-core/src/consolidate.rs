//! Merge candidate items into per-tag totals and reconcile them against the
//! caller's reference list.

use crate::config::ExtractionConfig;
use crate::layout::{page_text, Line};
use crate::model::{Item, ResultMap};
use crate::parsing::normalize::normalize_tag;
use crate::reference::ReferenceList;
use crate::trace::{EventSink, ExtractionEvent};

/// Sum quantities of items sharing a tag.
pub fn sum_by_tag(items: &[Item]) -> ResultMap {
    let mut totals = ResultMap::new();
    for item in items {
        let total = totals.entry(item.tag.clone()).or_insert(0);
        *total = total.saturating_add(item.quantity);
    }
    totals
}

/// Repair and restrict `totals` using the reference list.
///
/// 1. A total of exactly 1 where the reference expects more is a balloon or
///    a defaulted row; it takes the reference quantity.
/// 2. Tags not in the reference are dropped.
/// 3. Reference tags still missing (or at 0) are looked up in the raw page
///    text and take the reference quantity on a hit. Skipped entirely when
///    more than `max_recovery_tags` are missing.
pub fn reconcile_with_reference(
    totals: ResultMap,
    reference: &ReferenceList,
    pages: &[Vec<Line>],
    config: &ExtractionConfig,
    sink: &mut dyn EventSink,
) -> ResultMap {
    let mut result = ResultMap::new();

    for (tag, total) in totals {
        let Some(expected) = reference.get(&tag) else {
            continue;
        };
        let quantity = if total == 1 && expected.quantity > 1 {
            sink.emit(ExtractionEvent::QuantityCorrected {
                tag: tag.clone(),
                from: total,
                to: expected.quantity,
            });
            expected.quantity
        } else {
            total
        };
        result.insert(tag, quantity);
    }

    let missing: Vec<&str> = reference
        .iter()
        .filter(|row| !matches!(result.get(&row.tag), Some(&q) if q > 0))
        .map(|row| row.tag.as_str())
        .collect();
    if missing.is_empty() {
        return result;
    }

    let triggered = missing.len() <= config.max_recovery_tags;
    sink.emit(ExtractionEvent::RecoveryDecision {
        missing: missing.len(),
        limit: config.max_recovery_tags,
        triggered,
    });
    if !triggered {
        return result;
    }

    let texts: Vec<(usize, String)> = pages
        .iter()
        .filter_map(|lines| {
            let page = lines.first()?.page();
            Some((page, normalize_tag(&page_text(lines))))
        })
        .collect();

    for tag in missing {
        let Some((page, _)) = texts.iter().find(|(_, text)| text.contains(tag)) else {
            continue;
        };
        let Some(expected) = reference.get(tag) else {
            continue;
        };
        sink.emit(ExtractionEvent::TagRecovered {
            tag: tag.to_string(),
            page: *page,
            quantity: expected.quantity,
        });
        result.insert(tag.to_string(), expected.quantity);
    }

    result
}
