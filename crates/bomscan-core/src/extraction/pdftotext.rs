use crate::error::BomscanError;
use crate::extraction::{LoadedDocument, PdfExtractor};
use crate::model::PositionedToken;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::path::Path;
use std::process::Command;

/// PDF extraction backend using pdftotext (from poppler-utils).
///
/// Uses `pdftotext -bbox`, which reports one box per word. Poppler's y axis
/// points down from the top of the page; tokens are flipped to PDF user
/// space so every backend shares the same orientation.
pub struct PdftotextExtractor;

impl PdftotextExtractor {
    pub fn new() -> Self {
        PdftotextExtractor
    }

    /// Check if pdftotext is available on the system.
    pub fn is_available() -> bool {
        Command::new("pdftotext")
            .arg("-v")
            .output()
            .map(|o| o.status.success() || !o.stderr.is_empty())
            .unwrap_or(false)
    }
}

impl Default for PdftotextExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl PdfExtractor for PdftotextExtractor {
    fn open(&self, path: &Path) -> Result<Box<dyn LoadedDocument>, BomscanError> {
        let output = Command::new("pdftotext")
            .arg("-bbox")
            .arg(path)
            .arg("-") // output to stdout
            .output()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    BomscanError::PdftotextNotFound
                } else {
                    BomscanError::Extraction(format!("pdftotext failed: {}", e))
                }
            })?;

        if !output.status.success() {
            let code = output.status.code().unwrap_or(-1);
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            return Err(BomscanError::PdftotextFailed { code, stderr });
        }

        let xml = String::from_utf8_lossy(&output.stdout);
        let pages = parse_bbox_xml(&xml)?;
        Ok(Box::new(BBoxDocument { pages }))
    }

    fn backend_name(&self) -> &str {
        "pdftotext"
    }
}

/// pdftotext runs over the whole file at once, so pages are kept in memory.
struct BBoxDocument {
    pages: Vec<Vec<PositionedToken>>,
}

impl LoadedDocument for BBoxDocument {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page_tokens(&self, page_number: usize) -> Result<Vec<PositionedToken>, BomscanError> {
        page_number
            .checked_sub(1)
            .and_then(|i| self.pages.get(i))
            .cloned()
            .ok_or(BomscanError::PageOutOfRange {
                page: page_number,
                page_count: self.pages.len(),
            })
    }
}

#[derive(Debug, Default)]
struct WordBox {
    x_min: f32,
    y_min: f32,
    x_max: f32,
    y_max: f32,
}

fn parse_bbox_xml(xml: &str) -> Result<Vec<Vec<PositionedToken>>, BomscanError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut pages: Vec<Vec<PositionedToken>> = Vec::new();
    let mut page_height = 0.0f32;
    let mut current_word: Option<WordBox> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.name().as_ref() {
                b"page" => {
                    page_height = attr_f32(&e, b"height").unwrap_or(0.0);
                    pages.push(Vec::new());
                }
                b"word" => {
                    current_word = Some(WordBox {
                        x_min: attr_f32(&e, b"xMin").unwrap_or(0.0),
                        y_min: attr_f32(&e, b"yMin").unwrap_or(0.0),
                        x_max: attr_f32(&e, b"xMax").unwrap_or(0.0),
                        y_max: attr_f32(&e, b"yMax").unwrap_or(0.0),
                    });
                }
                _ => {}
            },
            Ok(Event::Text(t)) => {
                let Some(word) = current_word.take() else {
                    continue;
                };
                let page_number = pages.len();
                let Some(page) = pages.last_mut() else {
                    continue;
                };
                let text = match t.unescape() {
                    Ok(s) => s.trim().to_string(),
                    Err(_) => String::from_utf8_lossy(&t).trim().to_string(),
                };
                if !text.is_empty() {
                    page.push(PositionedToken {
                        text,
                        x: word.x_min,
                        y: page_height - word.y_max,
                        width: word.x_max - word.x_min,
                        height: word.y_max - word.y_min,
                        page: page_number,
                    });
                }
            }
            Ok(Event::End(e)) if e.name().as_ref() == b"word" => current_word = None,
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(BomscanError::Extraction(format!(
                    "malformed pdftotext output at position {}: {}",
                    reader.buffer_position(),
                    e
                )))
            }
        }
    }

    Ok(pages)
}

fn attr_f32(tag: &BytesStart, name: &[u8]) -> Option<f32> {
    tag.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == name)
        .and_then(|a| a.unescape_value().ok())
        .and_then(|v| v.parse().ok())
}
