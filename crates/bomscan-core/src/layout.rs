use crate::model::PositionedToken;
use serde::Serialize;

/// Tokens that share one printed row.
#[derive(Debug, Clone, Serialize)]
pub struct Line {
    tokens: Vec<PositionedToken>,
    y: f32,
    page: usize,
    text: String,
}

impl Line {
    /// Build a line, ordering its tokens left to right.
    pub fn new(mut tokens: Vec<PositionedToken>, y: f32, page: usize) -> Self {
        tokens.sort_by(|a, b| a.x.total_cmp(&b.x));
        let text = tokens
            .iter()
            .map(|t| t.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        Line {
            tokens,
            y,
            page,
            text,
        }
    }

    pub fn tokens(&self) -> &[PositionedToken] {
        &self.tokens
    }

    pub fn y(&self) -> f32 {
        self.y
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

/// Group tokens into lines in reading order (top to bottom).
///
/// A token joins the open line while it sits within `y_tolerance` of the
/// line's first token, so a slow drift across a row cannot chain two rows
/// together. Tokens with a non-finite coordinate are dropped.
pub fn group_lines(tokens: &[PositionedToken], y_tolerance: f32) -> Vec<Line> {
    let mut sorted: Vec<&PositionedToken> = tokens
        .iter()
        .filter(|t| t.x.is_finite() && t.y.is_finite())
        .collect();
    if sorted.is_empty() {
        return Vec::new();
    }

    sorted.sort_by(|a, b| {
        a.page
            .cmp(&b.page)
            .then(b.y.total_cmp(&a.y))
            .then(a.x.total_cmp(&b.x))
    });

    let mut lines = Vec::new();
    let mut current: Vec<PositionedToken> = Vec::new();
    let mut line_y = 0.0f32;
    let mut line_page = 0usize;

    for token in sorted {
        let same_line = !current.is_empty()
            && token.page == line_page
            && (token.y - line_y).abs() <= y_tolerance;

        if !same_line {
            if !current.is_empty() {
                lines.push(Line::new(std::mem::take(&mut current), line_y, line_page));
            }
            line_y = token.y;
            line_page = token.page;
        }
        current.push(token.clone());
    }

    if !current.is_empty() {
        lines.push(Line::new(current, line_y, line_page));
    }

    lines
}

/// Page text as grouped lines joined by newlines.
pub fn page_text(lines: &[Line]) -> String {
    lines
        .iter()
        .map(|l| l.text())
        .collect::<Vec<_>>()
        .join("\n")
}
