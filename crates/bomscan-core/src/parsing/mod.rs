pub mod fallback;
pub mod header;
pub mod normalize;
pub mod values;

use crate::config::ExtractionConfig;
use crate::extraction::table::{find_table_regions, TableRegion, TABLE_TAG};
use crate::layout::Line;
use crate::model::{Item, SourceType};
use header::{is_table_header, ColumnLayout};
use normalize::normalize_tag;
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;
use values::{parse_quantity, DEFAULT_QUANTITY};

/// Digits right after the identifier.
static LEADING_QUANTITY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s+(\d+)").expect("valid quantity regex"));

/// What the table pass read from one data line.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedRow {
    pub tag: String,
    /// `None` when the row carried no quantity and the default applies.
    pub explicit_quantity: Option<u32>,
    pub material: String,
}

impl ParsedRow {
    pub fn quantity(&self) -> u32 {
        self.explicit_quantity.unwrap_or(DEFAULT_QUANTITY)
    }

    /// 0.5 for the tag, 0.3 for an explicit quantity (0.1 if defaulted),
    /// 0.2 for a material.
    pub fn confidence(&self) -> f32 {
        let mut confidence = 0.5;
        confidence += if self.explicit_quantity.is_some() {
            0.3
        } else {
            0.1
        };
        if !self.material.is_empty() {
            confidence += 0.2;
        }
        f32::min(confidence, 1.0)
    }
}

/// Parse a table data line into tag, quantity and material.
///
/// The quantity is the digit run right after the identifier. When there is
/// none, the token sitting under the header's quantity column is used if it
/// is a bare number.
pub fn parse_row(
    line: &Line,
    layout: &ColumnLayout,
    config: &ExtractionConfig,
) -> Option<ParsedRow> {
    let text = line.text();
    let tag_match = TABLE_TAG.find(text)?;
    let tag = normalize_tag(tag_match.as_str());
    let rest = &text[tag_match.end()..];

    if let Some(caps) = LEADING_QUANTITY.captures(rest) {
        let digits = caps.get(1)?;
        let quantity = parse_quantity(digits.as_str(), config.max_quantity);
        let material = clean_material(rest[digits.end()..].split_whitespace());
        return Some(ParsedRow {
            tag,
            explicit_quantity: quantity,
            material,
        });
    }

    let anchored = anchored_quantity(line, layout, config);
    let mut skipped = false;
    let words = rest.split_whitespace().filter(|w| {
        if !skipped && anchored.is_some_and(|(token, _)| token == *w) {
            skipped = true;
            return false;
        }
        true
    });
    let material = clean_material(words);

    Some(ParsedRow {
        tag,
        explicit_quantity: anchored.map(|(_, q)| q),
        material,
    })
}

/// The bare number closest to the header's quantity column, if any lies
/// within half the proximity radius of it.
fn anchored_quantity<'a>(
    line: &'a Line,
    layout: &ColumnLayout,
    config: &ExtractionConfig,
) -> Option<(&'a str, u32)> {
    let column_x = layout.quantity_x?;
    let max_offset = config.proximity_radius / 2.0;

    line.tokens()
        .iter()
        .filter(|t| (t.x - column_x).abs() <= max_offset)
        .filter_map(|t| parse_quantity(&t.text, config.max_quantity).map(|q| (t, q)))
        .min_by(|(a, _), (b, _)| {
            (a.x - column_x)
                .abs()
                .total_cmp(&(b.x - column_x).abs())
        })
        .map(|(t, q)| (t.text.as_str(), q))
}

/// Join descriptive words, dropping identifiers and digits.
fn clean_material<'a>(words: impl Iterator<Item = &'a str>) -> String {
    words
        .filter(|w| !TABLE_TAG.is_match(w))
        .map(|w| w.chars().filter(|c| !c.is_ascii_digit()).collect::<String>())
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Everything the primary strategies produced for one page.
#[derive(Debug, Clone, Default)]
pub struct PagePass {
    pub items: Vec<Item>,
    pub tables: Vec<TableRegion>,
}

/// Run the table pass, then the direct and isolated scanners, over one
/// page's lines.
///
/// `tables_before` is the number of tables found on earlier pages; tables
/// are numbered across the whole document.
pub fn extract_page(lines: &[Line], tables_before: usize, config: &ExtractionConfig) -> PagePass {
    let tables = find_table_regions(lines);
    let mut items = Vec::new();
    let mut table_seen: HashSet<String> = HashSet::new();

    for (i, region) in tables.iter().enumerate() {
        let layout = ColumnLayout::from_header(&lines[region.header_line]);
        for &idx in &region.data_lines {
            let line = &lines[idx];
            let Some(row) = parse_row(line, &layout, config) else {
                continue;
            };
            let confidence = row.confidence();
            if confidence < config.min_confidence {
                continue;
            }
            table_seen.insert(row.tag.clone());
            items.push(Item {
                quantity: row.quantity(),
                tag: row.tag,
                material: row.material,
                page: line.page(),
                line_number: idx + 1,
                confidence,
                source_type: SourceType::Table,
                table_number: tables_before + i + 1,
            });
        }
    }

    let header_lines: HashSet<usize> = lines
        .iter()
        .enumerate()
        .filter(|(_, l)| is_table_header(l.text()))
        .map(|(i, _)| i)
        .collect();

    let direct = fallback::extract_direct(lines, &header_lines, &table_seen, config);
    let mut claimed = table_seen;
    claimed.extend(direct.iter().map(|item| item.tag.clone()));
    items.extend(direct);
    items.extend(fallback::extract_isolated(
        lines,
        &header_lines,
        &claimed,
        config,
    ));

    PagePass { items, tables }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PositionedToken;

    fn line_at(words: &[(&str, f32)], y: f32) -> Line {
        let tokens = words
            .iter()
            .map(|(text, x)| PositionedToken {
                text: text.to_string(),
                x: *x,
                y,
                width: 40.0,
                height: 8.0,
                page: 1,
            })
            .collect();
        Line::new(tokens, y, 1)
    }

    fn default_layout() -> ColumnLayout {
        ColumnLayout {
            tag_x: Some(40.0),
            quantity_x: Some(200.0),
            material_x: Some(300.0),
        }
    }

    #[test]
    fn test_parse_row_tag_qty_material() {
        let line = line_at(&[("ABCD1234-5678", 40.0), ("6", 200.0), ("Steel", 300.0)], 500.0);
        let row = parse_row(&line, &default_layout(), &ExtractionConfig::default()).unwrap();
        assert_eq!(row.tag, "ABCD1234-5678");
        assert_eq!(row.explicit_quantity, Some(6));
        assert_eq!(row.material, "Steel");
        assert!((row.confidence() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_parse_row_zero_is_explicit() {
        let line = line_at(&[("XYZ9999-0001", 40.0), ("0", 90.0)], 500.0);
        let row = parse_row(&line, &default_layout(), &ExtractionConfig::default()).unwrap();
        assert_eq!(row.quantity(), 0);
        assert!((row.confidence() - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_parse_row_out_of_range_quantity() {
        let line = line_at(&[("ABCD1234-5678", 40.0), ("5000", 200.0)], 500.0);
        let row = parse_row(&line, &default_layout(), &ExtractionConfig::default()).unwrap();
        assert_eq!(row.quantity(), 1);
        assert_eq!(row.explicit_quantity, Some(1));
    }

    #[test]
    fn test_parse_row_quantity_from_column_anchor() {
        let line = line_at(
            &[("ABCD1234-5678", 40.0), ("Brass", 120.0), ("4", 205.0)],
            500.0,
        );
        let row = parse_row(&line, &default_layout(), &ExtractionConfig::default()).unwrap();
        assert_eq!(row.explicit_quantity, Some(4));
        assert_eq!(row.material, "Brass");
    }

    #[test]
    fn test_parse_row_defaulted_quantity() {
        let line = line_at(&[("ABCD1234-5678", 40.0), ("Brass", 120.0)], 500.0);
        let row = parse_row(&line, &default_layout(), &ExtractionConfig::default()).unwrap();
        assert_eq!(row.explicit_quantity, None);
        assert_eq!(row.quantity(), 1);
        assert!((row.confidence() - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_material_digits_stripped() {
        let line = line_at(
            &[("ABCD1234-5678", 40.0), ("2", 200.0), ("Steel", 300.0), ("S235", 340.0)],
            500.0,
        );
        let row = parse_row(&line, &default_layout(), &ExtractionConfig::default()).unwrap();
        assert_eq!(row.material, "Steel S");
    }

    #[test]
    fn test_extract_page_counts_each_table_row() {
        let lines = vec![
            line_at(&[("TAG", 40.0), ("QTY", 200.0), ("MATERIAL", 300.0)], 700.0),
            line_at(&[("ABCD1234-5678", 40.0), ("6", 200.0), ("Steel", 300.0)], 680.0),
            line_at(&[("ABCD1234-9999", 40.0), ("2", 200.0), ("Copper", 300.0)], 660.0),
        ];

        let pass = extract_page(&lines, 3, &ExtractionConfig::default());
        assert_eq!(pass.tables.len(), 1);
        assert_eq!(pass.items.len(), 2);
        assert!(pass.items.iter().all(|i| i.source_type == SourceType::Table));
        assert!(pass.items.iter().all(|i| i.table_number == 4));
        assert_eq!(pass.items[0].line_number, 2);
    }

    #[test]
    fn test_table_rows_below_configured_floor_skipped() {
        let lines = vec![
            line_at(&[("TAG", 40.0), ("QTY", 200.0), ("MATERIAL", 300.0)], 700.0),
            line_at(&[("ABCD1234-5678", 40.0), ("6", 200.0), ("Steel", 300.0)], 680.0),
            line_at(&[("ABCD1234-9999", 40.0), ("2", 200.0)], 660.0),
        ];
        let config = ExtractionConfig {
            min_confidence: 0.9,
            ..ExtractionConfig::default()
        };

        let pass = extract_page(&lines, 0, &config);
        let table_tags: Vec<&str> = pass
            .items
            .iter()
            .filter(|i| i.source_type == SourceType::Table)
            .map(|i| i.tag.as_str())
            .collect();
        assert_eq!(table_tags, vec!["ABCD1234-5678"]);
    }

    #[test]
    fn test_extract_page_direct_rows_without_header() {
        let lines = vec![line_at(
            &[("ABCD1234-5678", 40.0), ("6", 200.0), ("Steel", 300.0)],
            680.0,
        )];

        let pass = extract_page(&lines, 0, &ExtractionConfig::default());
        assert_eq!(pass.items.len(), 1);
        assert_eq!(pass.items[0].source_type, SourceType::Direct);
        assert_eq!(pass.items[0].quantity, 6);
    }
}
