//! Caller-supplied list of expected tags.

pub mod guided;

use crate::error::BomscanError;
use crate::model::{ReferenceRow, ResultMap};
use crate::parsing::header::{MATERIAL_KEYWORDS, QTY_KEYWORDS, TAG_KEYWORDS};
use crate::parsing::normalize::normalize_tag;
use calamine::{Data, Range, Reader, Xlsx};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::io::Cursor;
use std::path::Path;

/// Expected tags keyed by normalized tag.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReferenceList {
    rows: BTreeMap<String, ReferenceRow>,
}

impl ReferenceList {
    /// Build from raw rows. Tags are normalized and repeated tags are merged
    /// by summing their quantities.
    pub fn from_rows(rows: impl IntoIterator<Item = ReferenceRow>) -> Self {
        let mut merged: BTreeMap<String, ReferenceRow> = BTreeMap::new();
        for row in rows {
            let tag = normalize_tag(&row.tag);
            if tag.is_empty() {
                continue;
            }
            match merged.get_mut(&tag) {
                Some(existing) => {
                    existing.quantity = existing.quantity.saturating_add(row.quantity);
                    if existing.material.is_empty() {
                        existing.material = row.material;
                    }
                }
                None => {
                    merged.insert(
                        tag.clone(),
                        ReferenceRow {
                            tag,
                            quantity: row.quantity,
                            material: row.material,
                        },
                    );
                }
            }
        }
        ReferenceList { rows: merged }
    }

    pub fn get(&self, tag: &str) -> Option<&ReferenceRow> {
        self.rows.get(tag)
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.rows.contains_key(tag)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ReferenceRow> {
        self.rows.values()
    }

    /// Share of reference tags that appear in `result`. 0.0 for an empty list.
    pub fn match_ratio(&self, result: &ResultMap) -> f32 {
        if self.rows.is_empty() {
            return 0.0;
        }
        let matched = self.rows.keys().filter(|tag| result.contains_key(*tag)).count();
        matched as f32 / self.rows.len() as f32
    }
}

/// A JSON reference entry keyed by tag: either a bare quantity or an object.
#[derive(Deserialize)]
#[serde(untagged)]
enum KeyedEntry {
    Quantity(u32),
    Row {
        quantity: u32,
        #[serde(default)]
        material: String,
    },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ReferenceJson {
    Keyed(BTreeMap<String, KeyedEntry>),
    Rows(Vec<ReferenceRow>),
}

/// Load a reference list, choosing the format from the file extension.
///
/// `.json` holds either `{"TAG": 5}` / `{"TAG": {"quantity": 5, "material":
/// "Copper"}}` or an array of `{tag, quantity, material}` rows. `.xlsx` is a
/// bill-of-materials export whose first sheet has a header row naming the
/// tag and quantity columns.
pub fn load_reference(path: &Path) -> Result<ReferenceList, BomscanError> {
    let load_err = |reason: String| BomscanError::ReferenceLoad {
        path: path.to_path_buf(),
        reason,
    };

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    match extension.as_str() {
        "json" => {
            let content = std::fs::read_to_string(path).map_err(|e| load_err(e.to_string()))?;
            parse_reference_json(&content).map_err(|e| load_err(e.to_string()))
        }
        "xlsx" => {
            let bytes = std::fs::read(path).map_err(|e| load_err(e.to_string()))?;
            parse_reference_xlsx(&bytes).map_err(load_err)
        }
        other => Err(load_err(format!(
            "unsupported file type '{other}' (expected .json or .xlsx)"
        ))),
    }
}

/// Parse a JSON reference list.
pub fn parse_reference_json(json: &str) -> Result<ReferenceList, serde_json::Error> {
    let parsed: ReferenceJson = serde_json::from_str(json)?;
    let rows: Vec<ReferenceRow> = match parsed {
        ReferenceJson::Keyed(map) => map
            .into_iter()
            .map(|(tag, entry)| match entry {
                KeyedEntry::Quantity(quantity) => ReferenceRow {
                    tag,
                    quantity,
                    material: String::new(),
                },
                KeyedEntry::Row { quantity, material } => ReferenceRow {
                    tag,
                    quantity,
                    material,
                },
            })
            .collect(),
        ReferenceJson::Rows(rows) => rows,
    };
    Ok(ReferenceList::from_rows(rows))
}

/// Parse the first sheet of an XLSX bill-of-materials export.
pub fn parse_reference_xlsx(bytes: &[u8]) -> Result<ReferenceList, String> {
    let cursor = Cursor::new(bytes);
    let mut workbook: Xlsx<_> =
        calamine::open_workbook_from_rs(cursor).map_err(|e| format!("failed to open xlsx: {e}"))?;

    let sheet = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| "workbook has no sheets".to_string())?
        .map_err(|e| format!("failed to read first sheet: {e}"))?;

    rows_from_range(&sheet)
}

/// Column positions read from a sheet's header row.
struct SheetColumns {
    header_row: usize,
    tag: usize,
    quantity: usize,
    material: Option<usize>,
}

fn rows_from_range(sheet: &Range<Data>) -> Result<ReferenceList, String> {
    let rows: Vec<&[Data]> = sheet.rows().collect();
    let columns = find_columns(&rows)
        .ok_or_else(|| "no header row with tag and quantity columns".to_string())?;

    let mut parsed = Vec::new();
    for row in rows.iter().skip(columns.header_row + 1) {
        let Some(tag) = row.get(columns.tag).and_then(cell_as_string) else {
            continue;
        };
        let Some(quantity) = row.get(columns.quantity).and_then(cell_as_quantity) else {
            tracing::debug!(tag = %tag, "reference row without a usable quantity, skipped");
            continue;
        };
        let material = columns
            .material
            .and_then(|c| row.get(c))
            .and_then(cell_as_string)
            .unwrap_or_default();

        parsed.push(ReferenceRow {
            tag,
            quantity,
            material,
        });
    }

    if parsed.is_empty() {
        return Err("no reference rows found below the header".into());
    }
    Ok(ReferenceList::from_rows(parsed))
}

fn find_columns(rows: &[&[Data]]) -> Option<SheetColumns> {
    let matches = |cell: &Data, keywords: &[&str]| {
        cell_as_string(cell).is_some_and(|s| {
            let lower = s.to_lowercase();
            keywords.iter().any(|kw| lower.contains(kw))
        })
    };

    rows.iter().enumerate().find_map(|(header_row, row)| {
        let quantity = row
            .iter()
            .position(|c| matches(c, &QTY_KEYWORDS) || matches(c, &["quantity"]))?;
        let tag = row
            .iter()
            .enumerate()
            .position(|(i, c)| i != quantity && matches(c, &TAG_KEYWORDS))?;
        let material = row
            .iter()
            .enumerate()
            .position(|(i, c)| i != quantity && i != tag && matches(c, &MATERIAL_KEYWORDS));
        Some(SheetColumns {
            header_row,
            tag,
            quantity,
            material,
        })
    })
}

fn cell_as_string(cell: &Data) -> Option<String> {
    match cell {
        Data::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        Data::Empty => None,
        _ => Some(format!("{cell}")),
    }
}

fn cell_as_quantity(cell: &Data) -> Option<u32> {
    match cell {
        Data::Int(i) => u32::try_from(*i).ok(),
        Data::Float(f) if *f >= 0.0 && f.fract() == 0.0 && *f <= u32::MAX as f64 => {
            Some(*f as u32)
        }
        Data::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
