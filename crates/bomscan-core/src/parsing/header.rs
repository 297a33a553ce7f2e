use crate::layout::Line;

pub(crate) const TAG_KEYWORDS: [&str; 4] = ["tag", "ref", "part", "no."];
pub(crate) const QTY_KEYWORDS: [&str; 6] = ["qty", "qte", "qtee", "qté", "quantité", "quantite"];
pub(crate) const MATERIAL_KEYWORDS: [&str; 5] = ["material", "matière", "matiere", "matl", "mat."];

/// Detect if a line looks like a parts-table header row.
///
/// Needs both an identifier keyword and a quantity keyword; either one
/// alone shows up too often in notes and title blocks.
pub fn is_table_header(line: &str) -> bool {
    let lower = line.to_lowercase();
    TAG_KEYWORDS.iter().any(|kw| lower.contains(kw))
        && QTY_KEYWORDS.iter().any(|kw| lower.contains(kw))
}

/// Where the header puts each column, as x positions of header tokens.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnLayout {
    pub tag_x: Option<f32>,
    pub quantity_x: Option<f32>,
    pub material_x: Option<f32>,
}

impl ColumnLayout {
    /// Read column anchors from the header's tokens.
    ///
    /// Without keywords, token 0 is the identifier column and token 1 the
    /// quantity column.
    pub fn from_header(header: &Line) -> Self {
        let tokens = header.tokens();
        let find = |keywords: &[&str]| {
            tokens
                .iter()
                .find(|t| {
                    let lower = t.text.to_lowercase();
                    keywords.iter().any(|kw| lower.contains(kw))
                })
                .map(|t| t.x)
        };

        let tag_x = find(&TAG_KEYWORDS).or_else(|| tokens.first().map(|t| t.x));
        let quantity_x = find(&QTY_KEYWORDS).or_else(|| tokens.get(1).map(|t| t.x));
        let material_x = find(&MATERIAL_KEYWORDS);

        ColumnLayout {
            tag_x,
            quantity_x,
            material_x,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PositionedToken;

    fn line(words: &[(&str, f32)]) -> Line {
        let tokens = words
            .iter()
            .map(|(text, x)| PositionedToken {
                text: text.to_string(),
                x: *x,
                y: 500.0,
                width: 20.0,
                height: 8.0,
                page: 1,
            })
            .collect();
        Line::new(tokens, 500.0, 1)
    }

    #[test]
    fn test_is_table_header() {
        assert!(is_table_header("TAG QTY MATERIAL"));
        assert!(is_table_header("Part No.   Quantité   Matière"));
        assert!(is_table_header("Repère  Ref  Qte"));
        assert!(!is_table_header("ABCD1234-5678  6  Steel"));
    }

    #[test]
    fn test_header_needs_both_keywords() {
        assert!(!is_table_header("Part list"));
        assert!(!is_table_header("Total qty shipped"));
    }

    #[test]
    fn test_column_layout_from_keywords() {
        let header = line(&[("MATERIAL", 300.0), ("TAG", 40.0), ("QTY", 200.0)]);
        let layout = ColumnLayout::from_header(&header);
        assert_eq!(layout.tag_x, Some(40.0));
        assert_eq!(layout.quantity_x, Some(200.0));
        assert_eq!(layout.material_x, Some(300.0));
    }

    #[test]
    fn test_column_layout_defaults_to_position() {
        let header = line(&[("Item", 40.0), ("Count", 200.0)]);
        let layout = ColumnLayout::from_header(&header);
        assert_eq!(layout.tag_x, Some(40.0));
        assert_eq!(layout.quantity_x, Some(200.0));
        assert_eq!(layout.material_x, None);
    }
}
