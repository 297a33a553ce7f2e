use crate::layout::Line;
use crate::parsing::header::is_table_header;
use regex::Regex;
use std::sync::LazyLock;

/// Strict tag shape expected inside parts tables.
pub(crate) static TABLE_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)[A-Z]{2,4}\d{4}[-_]\d{4}").expect("valid table tag regex")
});

/// A 1-3 digit number with whitespace (or the line edge) on both sides.
static STANDALONE_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|\s)\d{1,3}(?:\s|$)").expect("valid number regex"));

/// Detect if a line looks like a table data row.
pub fn is_data_row(line: &str) -> bool {
    TABLE_TAG.is_match(line) && STANDALONE_NUMBER.is_match(line)
}

/// A header line and the data lines that followed it on one page.
///
/// Indices point into the page's line list.
#[derive(Debug, Clone, PartialEq)]
pub struct TableRegion {
    pub page_number: usize,
    pub header_line: usize,
    pub data_lines: Vec<usize>,
}

impl TableRegion {
    /// Header plus data rows.
    pub fn row_count(&self) -> usize {
        self.data_lines.len() + 1
    }
}

/// Find the table region(s) within one page's lines.
///
/// A header opens a table, which then runs for as long as lines look like
/// data rows. The first other line closes it, and so does another header
/// (which opens the next table). Runs without a single data row are
/// dropped.
pub fn find_table_regions(lines: &[Line]) -> Vec<TableRegion> {
    let mut regions = Vec::new();
    let mut current: Option<TableRegion> = None;

    for (i, line) in lines.iter().enumerate() {
        if is_table_header(line.text()) {
            close_region(current.take(), &mut regions);
            current = Some(TableRegion {
                page_number: line.page(),
                header_line: i,
                data_lines: Vec::new(),
            });
            continue;
        }

        if let Some(region) = current.as_mut() {
            if is_data_row(line.text()) {
                region.data_lines.push(i);
            } else {
                close_region(current.take(), &mut regions);
            }
        }
    }

    close_region(current, &mut regions);
    regions
}

fn close_region(region: Option<TableRegion>, regions: &mut Vec<TableRegion>) {
    if let Some(region) = region {
        if region.row_count() >= 2 {
            regions.push(region);
        }
    }
}
