pub mod native;
pub mod pdftotext;
pub mod table;

use crate::error::BomscanError;
use crate::model::PositionedToken;
use std::path::Path;

/// Trait for PDF text extraction backends.
pub trait PdfExtractor: Send + Sync {
    /// Open a document. The returned handle owns everything read from the
    /// file and releases it when dropped.
    fn open(&self, path: &Path) -> Result<Box<dyn LoadedDocument>, BomscanError>;

    /// Name of this extraction backend (for diagnostics).
    fn backend_name(&self) -> &str;
}

/// An opened document that can be tokenized page by page.
pub trait LoadedDocument {
    fn page_count(&self) -> usize;

    /// Positioned, non-blank tokens of a 1-based page.
    ///
    /// An error here only concerns this page; callers keep going with the
    /// remaining ones.
    fn page_tokens(&self, page_number: usize) -> Result<Vec<PositionedToken>, BomscanError>;
}

/// Split a run of shown text into word tokens.
///
/// Glyph widths are not resolved, so each character advances by
/// `char_width`. Good enough to keep words of one text run in x order and
/// roughly where they were drawn.
pub(crate) fn split_words(
    text: &str,
    x: f32,
    y: f32,
    char_width: f32,
    height: f32,
    page: usize,
) -> Vec<PositionedToken> {
    let mut tokens = Vec::new();
    let mut start: Option<usize> = None;
    let chars: Vec<char> = text.chars().collect();

    for (i, c) in chars.iter().enumerate() {
        if c.is_whitespace() {
            if let Some(s) = start.take() {
                tokens.push(word_token(&chars[s..i], s, x, y, char_width, height, page));
            }
        } else if start.is_none() {
            start = Some(i);
        }
    }

    if let Some(s) = start {
        tokens.push(word_token(&chars[s..], s, x, y, char_width, height, page));
    }

    tokens
}

fn word_token(
    word: &[char],
    offset: usize,
    x: f32,
    y: f32,
    char_width: f32,
    height: f32,
    page: usize,
) -> PositionedToken {
    PositionedToken {
        text: word.iter().collect(),
        x: x + offset as f32 * char_width,
        y,
        width: word.len() as f32 * char_width,
        height,
        page,
    }
}
