use bomscan_core::config::{load_config, ExtractionConfig};
use bomscan_core::error::BomscanError;
use bomscan_core::layout::group_lines;
use std::path::PathBuf;

use crate::Backend;

/// Dump grouped lines, mostly for tuning `y_tolerance` on a new drawing family.
pub fn run(
    pdf_file: PathBuf,
    page: Option<usize>,
    config: Option<PathBuf>,
    backend: Backend,
) -> Result<(), BomscanError> {
    let config = match &config {
        Some(path) => load_config(path)?,
        None => ExtractionConfig::default(),
    };

    let extractor = backend.extractor()?;
    let doc = extractor.open(&pdf_file)?;
    let page_count = doc.page_count();

    let pages: Vec<usize> = match page {
        Some(p) if p == 0 || p > page_count => {
            return Err(BomscanError::PageOutOfRange {
                page: p,
                page_count,
            })
        }
        Some(p) => vec![p],
        None => (1..=page_count).collect(),
    };

    for (i, page_number) in pages.into_iter().enumerate() {
        if i > 0 {
            println!();
        }
        println!("--- Page {page_number} ---");

        let tokens = match doc.page_tokens(page_number) {
            Ok(tokens) => tokens,
            Err(e) => {
                eprintln!("  page {page_number} skipped: {e}");
                continue;
            }
        };

        for line in group_lines(&tokens, config.y_tolerance) {
            println!("{:>8.1}  {}", line.y(), line.text());
        }
    }

    Ok(())
}
