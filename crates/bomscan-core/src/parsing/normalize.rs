use regex::Regex;
use std::sync::LazyLock;

/// Tag shape used by the line scanners and the proximity pass.
static TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b[A-Z]{2,4}\d{3,4}[-_]\d{3,4}").expect("valid tag regex"));

/// Normalize a tag to its canonical key.
///
/// Uppercases and turns underscores into hyphens, so `abc1234_5678` and
/// `ABC1234-5678` name the same part. Applying it twice changes nothing.
pub fn normalize_tag(raw: &str) -> String {
    raw.trim().to_uppercase().replace('_', "-")
}

/// A tag occurrence inside a line of text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagMatch {
    /// Normalized tag.
    pub tag: String,
    pub start: usize,
    pub end: usize,
}

/// Find standalone tag occurrences in `text`, left to right.
///
/// A match that continues into more alphanumerics, or into a `-A01` style
/// assembly suffix, is part of a longer code and is skipped.
pub fn find_tags(text: &str) -> Vec<TagMatch> {
    TAG.find_iter(text)
        .filter(|m| !continues_identifier(&text[m.end()..]))
        .map(|m| TagMatch {
            tag: normalize_tag(m.as_str()),
            start: m.start(),
            end: m.end(),
        })
        .collect()
}

/// True when `rest` (the text right after a match) extends the identifier.
pub(crate) fn continues_identifier(rest: &str) -> bool {
    let mut chars = rest.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphanumeric() => true,
        Some('-') | Some('_') => chars.next().is_some_and(|c| c.is_ascii_alphanumeric()),
        _ => false,
    }
}
