use crate::error::BomscanError;
use crate::extraction::{split_words, LoadedDocument, PdfExtractor};
use crate::model::PositionedToken;
use lopdf::content::Content;
use lopdf::{Dictionary, Document, Object, ObjectId};
use std::collections::BTreeMap;
use std::path::Path;

/// TJ adjustments below this (thousandths of an em) read as a word gap.
const TJ_SPACE_THRESHOLD: f32 = -200.0;

/// Pure-Rust extraction backend built on `lopdf`.
///
/// Interprets the text operators of each page content stream to recover
/// where every shown string starts, in page space. `cm` transforms and
/// Form XObjects are followed.
pub struct LopdfExtractor;

impl LopdfExtractor {
    pub fn new() -> Self {
        LopdfExtractor
    }
}

impl Default for LopdfExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl PdfExtractor for LopdfExtractor {
    fn open(&self, path: &Path) -> Result<Box<dyn LoadedDocument>, BomscanError> {
        let doc = Document::load(path).map_err(|e| BomscanError::Extraction(e.to_string()))?;
        let pages = doc.get_pages().into_values().collect();
        Ok(Box::new(LopdfDocument { doc, pages }))
    }

    fn backend_name(&self) -> &str {
        "lopdf"
    }
}

struct LopdfDocument {
    doc: Document,
    pages: Vec<ObjectId>,
}

impl LoadedDocument for LopdfDocument {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page_tokens(&self, page_number: usize) -> Result<Vec<PositionedToken>, BomscanError> {
        let page_id = page_number
            .checked_sub(1)
            .and_then(|i| self.pages.get(i))
            .copied()
            .ok_or(BomscanError::PageOutOfRange {
                page: page_number,
                page_count: self.pages.len(),
            })?;
        extract_page_tokens(&self.doc, page_id, page_number)
    }
}

/// Row-vector affine matrix `[a b c d e f]`, as content streams write it.
type Matrix = [f32; 6];

const IDENTITY: Matrix = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];

/// Forms drawn inside forms deeper than this are skipped.
const MAX_FORM_DEPTH: usize = 8;

/// Page tree levels searched for inherited resources.
const MAX_TREE_DEPTH: usize = 32;

/// `first` applied, then `second`.
fn concat(first: &Matrix, second: &Matrix) -> Matrix {
    let [a1, b1, c1, d1, e1, f1] = *first;
    let [a2, b2, c2, d2, e2, f2] = *second;
    [
        a1 * a2 + b1 * c2,
        a1 * b2 + b1 * d2,
        c1 * a2 + d1 * c2,
        c1 * b2 + d1 * d2,
        e1 * a2 + f1 * c2 + e2,
        e1 * b2 + f1 * d2 + f2,
    ]
}

fn matrix_from(operands: &[Object]) -> Option<Matrix> {
    if operands.len() < 6 {
        return None;
    }
    let mut m = IDENTITY;
    for (slot, operand) in m.iter_mut().zip(operands) {
        *slot = get_number(operand)?;
    }
    Some(m)
}

/// Graphics and text state carried between operators of one content stream.
#[derive(Clone)]
struct GraphicsState {
    ctm: Matrix,
    font: Vec<u8>,
    font_size: f32,
    leading: f32,
    text_matrix: Matrix,
    line_matrix: Matrix,
}

impl GraphicsState {
    fn new(ctm: Matrix) -> Self {
        GraphicsState {
            ctm,
            font: Vec::new(),
            font_size: 12.0,
            leading: 0.0,
            text_matrix: IDENTITY,
            line_matrix: IDENTITY,
        }
    }

    /// `Q`: the text object position is not part of the saved state.
    fn restore(&mut self, saved: GraphicsState) {
        self.ctm = saved.ctm;
        self.font = saved.font;
        self.font_size = saved.font_size;
        self.leading = saved.leading;
    }

    fn begin_text(&mut self) {
        self.text_matrix = IDENTITY;
        self.line_matrix = IDENTITY;
    }

    fn translate_line(&mut self, tx: f32, ty: f32) {
        let m = self.line_matrix;
        self.line_matrix[4] = tx * m[0] + ty * m[2] + m[4];
        self.line_matrix[5] = tx * m[1] + ty * m[3] + m[5];
        self.text_matrix = self.line_matrix;
    }

    fn next_line(&mut self) {
        let leading = if self.leading != 0.0 {
            self.leading
        } else {
            self.font_size * 1.2
        };
        self.translate_line(0.0, -leading);
    }

    /// Emit tokens for `text` at the current position, in page space, and
    /// advance past it.
    fn show(&mut self, text: &str, page: usize, out: &mut Vec<PositionedToken>) {
        let render = concat(&self.text_matrix, &self.ctm);
        let scale = (render[0] * render[0] + render[1] * render[1]).sqrt();
        let scale = if scale > 0.0 { scale } else { 1.0 };
        let size = self.font_size.abs() * scale;
        out.extend(split_words(text, render[4], render[5], size * 0.5, size, page));

        let advance = text.chars().count() as f32 * self.font_size.abs() * 0.5;
        self.text_matrix[4] += advance * self.text_matrix[0];
        self.text_matrix[5] += advance * self.text_matrix[1];
    }
}

fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> &'a Object {
    match obj {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(obj),
        _ => obj,
    }
}

fn sub_dict<'a>(doc: &'a Document, dict: &'a Dictionary, key: &[u8]) -> Option<&'a Dictionary> {
    dict.get(key)
        .ok()
        .and_then(|obj| resolve(doc, obj).as_dict().ok())
}

/// The page's resource dictionary, inherited from the page tree if needed.
fn page_resources(doc: &Document, page_id: ObjectId) -> Option<&Dictionary> {
    let mut node = doc.get_object(page_id).and_then(Object::as_dict).ok()?;
    for _ in 0..MAX_TREE_DEPTH {
        if let Some(resources) = sub_dict(doc, node, b"Resources") {
            return Some(resources);
        }
        let parent = node.get(b"Parent").and_then(Object::as_reference).ok()?;
        node = doc.get_object(parent).and_then(Object::as_dict).ok()?;
    }
    None
}

fn fonts_in<'a>(
    doc: &'a Document,
    resources: Option<&'a Dictionary>,
) -> BTreeMap<Vec<u8>, &'a Dictionary> {
    let Some(fonts) = resources.and_then(|r| sub_dict(doc, r, b"Font")) else {
        return BTreeMap::new();
    };
    fonts
        .iter()
        .filter_map(|(name, font)| {
            let font = resolve(doc, font).as_dict().ok()?;
            Some((name.clone(), font))
        })
        .collect()
}

/// Walks the content streams of one page, forms included.
struct PageScan<'a> {
    doc: &'a Document,
    page_number: usize,
    tokens: Vec<PositionedToken>,
}

impl<'a> PageScan<'a> {
    fn run(
        &mut self,
        content: &Content,
        resources: Option<&'a Dictionary>,
        fonts: &BTreeMap<Vec<u8>, &'a Dictionary>,
        mut state: GraphicsState,
        depth: usize,
    ) {
        let doc = self.doc;
        let mut saved: Vec<GraphicsState> = Vec::new();

        for op in &content.operations {
            let operands = &op.operands;
            match op.operator.as_str() {
                "q" => saved.push(state.clone()),
                "Q" => {
                    if let Some(previous) = saved.pop() {
                        state.restore(previous);
                    }
                }
                "cm" => {
                    if let Some(m) = matrix_from(operands) {
                        state.ctm = concat(&m, &state.ctm);
                    }
                }
                "Do" if !operands.is_empty() => {
                    if let Ok(name) = operands[0].as_name() {
                        self.draw_form(name, resources, fonts, &state, depth);
                    }
                }
                "BT" => state.begin_text(),
                "Tf" if operands.len() >= 2 => {
                    if let Ok(name) = operands[0].as_name() {
                        state.font = name.to_vec();
                    }
                    if let Some(size) = get_number(&operands[1]) {
                        state.font_size = size;
                    }
                }
                "TL" if !operands.is_empty() => {
                    state.leading = get_number(&operands[0]).unwrap_or(0.0);
                }
                "Td" | "TD" if operands.len() >= 2 => {
                    let tx = get_number(&operands[0]).unwrap_or(0.0);
                    let ty = get_number(&operands[1]).unwrap_or(0.0);
                    if op.operator == "TD" {
                        state.leading = -ty;
                    }
                    state.translate_line(tx, ty);
                }
                "Tm" => {
                    if let Some(m) = matrix_from(operands) {
                        state.text_matrix = m;
                        state.line_matrix = m;
                    }
                }
                "T*" => state.next_line(),
                "Tj" if !operands.is_empty() => {
                    if let Some(text) = decode_operand(&operands[0], doc, fonts, &state.font) {
                        state.show(&text, self.page_number, &mut self.tokens);
                    }
                }
                "'" if !operands.is_empty() => {
                    state.next_line();
                    if let Some(text) = decode_operand(&operands[0], doc, fonts, &state.font) {
                        state.show(&text, self.page_number, &mut self.tokens);
                    }
                }
                "\"" if operands.len() >= 3 => {
                    state.next_line();
                    if let Some(text) = decode_operand(&operands[2], doc, fonts, &state.font) {
                        state.show(&text, self.page_number, &mut self.tokens);
                    }
                }
                "TJ" if !operands.is_empty() => {
                    if let Ok(array) = operands[0].as_array() {
                        let mut combined = String::new();
                        for element in array {
                            match get_number(element) {
                                Some(adjust) if adjust < TJ_SPACE_THRESHOLD => combined.push(' '),
                                Some(_) => {}
                                None => {
                                    if let Some(text) =
                                        decode_operand(element, doc, fonts, &state.font)
                                    {
                                        combined.push_str(&text);
                                    }
                                }
                            }
                        }
                        state.show(&combined, self.page_number, &mut self.tokens);
                    }
                }
                _ => {}
            }
        }
    }

    /// `Do` on a Form XObject: run its content under `Matrix × CTM`, with its
    /// own resources when it has them.
    fn draw_form(
        &mut self,
        name: &[u8],
        resources: Option<&'a Dictionary>,
        fonts: &BTreeMap<Vec<u8>, &'a Dictionary>,
        state: &GraphicsState,
        depth: usize,
    ) {
        let doc = self.doc;
        let Some(stream) = resources
            .and_then(|r| sub_dict(doc, r, b"XObject"))
            .and_then(|xobjects| xobjects.get(name).ok())
            .and_then(|obj| resolve(doc, obj).as_stream().ok())
        else {
            return;
        };
        let is_form = stream
            .dict
            .get(b"Subtype")
            .and_then(Object::as_name)
            .is_ok_and(|subtype| subtype == b"Form");
        if !is_form {
            return;
        }
        if depth >= MAX_FORM_DEPTH {
            tracing::debug!(
                page = self.page_number,
                form = %String::from_utf8_lossy(name),
                "form nesting too deep, skipped"
            );
            return;
        }

        let data = stream
            .decompressed_content()
            .unwrap_or_else(|_| stream.content.clone());
        let content = match Content::decode(&data) {
            Ok(content) => content,
            Err(e) => {
                tracing::debug!(
                    page = self.page_number,
                    form = %String::from_utf8_lossy(name),
                    error = %e,
                    "unreadable form content, skipped"
                );
                return;
            }
        };

        let matrix = stream
            .dict
            .get(b"Matrix")
            .and_then(Object::as_array)
            .ok()
            .and_then(|m| matrix_from(m))
            .unwrap_or(IDENTITY);
        let mut form_state = state.clone();
        form_state.ctm = concat(&matrix, &state.ctm);

        match sub_dict(doc, &stream.dict, b"Resources") {
            Some(own) => {
                let own_fonts = fonts_in(doc, Some(own));
                self.run(&content, Some(own), &own_fonts, form_state, depth + 1);
            }
            None => self.run(&content, resources, fonts, form_state, depth + 1),
        }
    }
}

fn extract_page_tokens(
    doc: &Document,
    page_id: ObjectId,
    page_number: usize,
) -> Result<Vec<PositionedToken>, BomscanError> {
    let resources = page_resources(doc, page_id);
    let fonts = fonts_in(doc, resources);

    let content_data = doc
        .get_page_content(page_id)
        .map_err(|e| BomscanError::Extraction(format!("page {page_number}: {e}")))?;
    let content = Content::decode(&content_data)
        .map_err(|e| BomscanError::Extraction(format!("page {page_number}: {e}")))?;

    let mut scan = PageScan {
        doc,
        page_number,
        tokens: Vec::new(),
    };
    scan.run(&content, resources, &fonts, GraphicsState::new(IDENTITY), 0);
    Ok(scan.tokens)
}

fn get_number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}

/// Decode a string operand through the font encoding, falling back to
/// UTF-16BE (with BOM) and then Latin-1.
fn decode_operand(
    obj: &Object,
    doc: &Document,
    fonts: &BTreeMap<Vec<u8>, &Dictionary>,
    current_font: &[u8],
) -> Option<String> {
    let Object::String(bytes, _) = obj else {
        return None;
    };

    if let Some(font_dict) = fonts.get(current_font) {
        if let Ok(encoding) = font_dict.get_font_encoding(doc) {
            if let Ok(text) = Document::decode_text(&encoding, bytes) {
                return Some(text);
            }
        }
    }

    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let utf16: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|chunk| u16::from_be_bytes([chunk[0], chunk[1]]))
            .collect();
        return Some(String::from_utf16_lossy(&utf16));
    }

    Some(bytes.iter().map(|&b| b as char).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{dictionary, Stream};

    fn new_doc() -> (Document, ObjectId) {
        let mut doc = Document::with_version("1.5");
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        (doc, font_id)
    }

    fn add_page(
        doc: &mut Document,
        font_id: ObjectId,
        content: &str,
        xobjects: Dictionary,
    ) -> ObjectId {
        let pages_id = doc.new_object_id();
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.as_bytes().to_vec()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(842),
                Object::Integer(842),
            ],
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![Object::Reference(page_id)],
                "Count" => 1,
                "Resources" => dictionary! {
                    "Font" => dictionary! { "F1" => font_id },
                    "XObject" => xobjects,
                },
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        page_id
    }

    fn form(content: &str, matrix: [i64; 6], resources: Option<Dictionary>) -> Stream {
        let mut dict = dictionary! {
            "Type" => "XObject",
            "Subtype" => "Form",
            "BBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(842),
                Object::Integer(842),
            ],
            "Matrix" => matrix.iter().map(|&v| Object::Integer(v)).collect::<Vec<_>>(),
        };
        if let Some(resources) = resources {
            dict.set("Resources", resources);
        }
        Stream::new(dict, content.as_bytes().to_vec())
    }

    fn placed(tokens: &[PositionedToken]) -> Vec<(&str, f32, f32)> {
        tokens.iter().map(|t| (t.text.as_str(), t.x, t.y)).collect()
    }

    #[test]
    fn test_td_moves_relative_to_line_start() {
        let mut state = GraphicsState::new(IDENTITY);
        state.begin_text();
        state.translate_line(72.0, 700.0);
        state.translate_line(0.0, -14.0);
        assert_eq!(state.text_matrix[4], 72.0);
        assert_eq!(state.text_matrix[5], 686.0);
    }

    #[test]
    fn test_show_advances_text_position() {
        let mut state = GraphicsState::new(IDENTITY);
        state.font_size = 10.0;
        state.translate_line(100.0, 500.0);

        let mut tokens = Vec::new();
        state.show("TAG", 1, &mut tokens);
        state.show(" 12", 1, &mut tokens);

        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].text, "TAG");
        assert_eq!(tokens[0].x, 100.0);
        assert_eq!(tokens[1].text, "12");
        assert_eq!(tokens[1].x, 120.0);
    }

    #[test]
    fn test_next_line_uses_font_leading_by_default() {
        let mut state = GraphicsState::new(IDENTITY);
        state.font_size = 10.0;
        state.translate_line(0.0, 100.0);
        state.next_line();
        assert_eq!(state.text_matrix[5], 88.0);
    }

    #[test]
    fn test_concat_applies_first_matrix_first() {
        let scale = [0.5, 0.0, 0.0, 0.5, 0.0, 0.0];
        let shift = [1.0, 0.0, 0.0, 1.0, 10.0, 20.0];
        assert_eq!(concat(&shift, &scale), [0.5, 0.0, 0.0, 0.5, 5.0, 10.0]);
        assert_eq!(concat(&scale, &shift), [0.5, 0.0, 0.0, 0.5, 10.0, 20.0]);
    }

    #[test]
    fn test_text_operators_over_content_stream() {
        let (mut doc, font_id) = new_doc();
        let page_id = add_page(
            &mut doc,
            font_id,
            "BT /F1 10 Tf 14 TL 1 0 0 1 72 700 Tm (TAG) Tj T* [(AB) -300 (CD) -50 (E)] TJ \
             (next) ' 2 1 (more) \" ET",
            Dictionary::new(),
        );

        let tokens = extract_page_tokens(&doc, page_id, 3).unwrap();
        assert_eq!(
            placed(&tokens),
            vec![
                ("TAG", 72.0, 700.0),
                ("AB", 72.0, 686.0),
                ("CDE", 87.0, 686.0),
                ("next", 72.0, 672.0),
                ("more", 72.0, 658.0),
            ]
        );
        assert!(tokens.iter().all(|t| t.page == 3 && t.height == 10.0));
    }

    #[test]
    fn test_cm_maps_text_into_page_space() {
        let (mut doc, font_id) = new_doc();
        let page_id = add_page(
            &mut doc,
            font_id,
            "q 0.5 0 0 0.5 0 0 cm BT /F1 12 Tf 100 1400 Td (ABCD1234-5678) Tj ET Q \
             BT /F1 12 Tf 100 600 Td (6) Tj ET",
            Dictionary::new(),
        );

        let tokens = extract_page_tokens(&doc, page_id, 1).unwrap();
        assert_eq!(
            placed(&tokens),
            vec![("ABCD1234-5678", 50.0, 700.0), ("6", 100.0, 600.0)]
        );
        assert_eq!(tokens[0].height, 6.0);
        assert_eq!(tokens[0].width, 39.0);
    }

    #[test]
    fn test_nested_cm_concatenates() {
        let (mut doc, font_id) = new_doc();
        let page_id = add_page(
            &mut doc,
            font_id,
            "q 1 0 0 1 10 20 cm q 2 0 0 2 0 0 cm BT /F1 5 Tf 30 40 Td (X) Tj ET Q \
             BT /F1 5 Tf 30 40 Td (Y) Tj ET Q",
            Dictionary::new(),
        );

        let tokens = extract_page_tokens(&doc, page_id, 1).unwrap();
        assert_eq!(placed(&tokens), vec![("X", 70.0, 100.0), ("Y", 40.0, 60.0)]);
    }

    #[test]
    fn test_form_xobject_text_is_placed() {
        let (mut doc, font_id) = new_doc();
        let form_id = doc.add_object(form(
            "BT /F1 10 Tf 10 20 Td (EFGH1234-0001) Tj ET",
            [1, 0, 0, 1, 200, 0],
            Some(dictionary! { "Font" => dictionary! { "F1" => font_id } }),
        ));
        let page_id = add_page(
            &mut doc,
            font_id,
            "q 1 0 0 1 0 100 cm /Fm1 Do Q BT /F1 10 Tf 5 5 Td (after) Tj ET",
            dictionary! { "Fm1" => form_id },
        );

        let tokens = extract_page_tokens(&doc, page_id, 1).unwrap();
        assert_eq!(
            placed(&tokens),
            vec![("EFGH1234-0001", 210.0, 120.0), ("after", 5.0, 5.0)]
        );
    }

    #[test]
    fn test_self_referencing_form_terminates() {
        let (mut doc, font_id) = new_doc();
        let form_id = doc.new_object_id();
        let resources = dictionary! {
            "Font" => dictionary! { "F1" => font_id },
            "XObject" => dictionary! { "Me" => form_id },
        };
        doc.objects.insert(
            form_id,
            Object::Stream(form(
                "BT /F1 10 Tf 0 0 Td (loop) Tj ET /Me Do",
                [1, 0, 0, 1, 0, 1],
                Some(resources),
            )),
        );
        let page_id = add_page(&mut doc, font_id, "/Me Do", dictionary! { "Me" => form_id });

        let tokens = extract_page_tokens(&doc, page_id, 1).unwrap();
        assert_eq!(tokens.len(), MAX_FORM_DEPTH);
        assert!(tokens.iter().all(|t| t.text == "loop"));
    }

    #[test]
    fn test_image_xobject_ignored() {
        let (mut doc, font_id) = new_doc();
        let image_id = doc.add_object(Stream::new(
            dictionary! { "Type" => "XObject", "Subtype" => "Image" },
            vec![0u8; 4],
        ));
        let page_id = add_page(
            &mut doc,
            font_id,
            "/Im1 Do /Missing Do BT /F1 10 Tf 1 2 Td (ok) Tj ET",
            dictionary! { "Im1" => image_id },
        );

        let tokens = extract_page_tokens(&doc, page_id, 1).unwrap();
        assert_eq!(placed(&tokens), vec![("ok", 1.0, 2.0)]);
    }

    #[test]
    fn test_saved_document_reads_back() {
        let (mut doc, font_id) = new_doc();
        add_page(
            &mut doc,
            font_id,
            "BT /F1 10 Tf 40 700 Td (ABCD1234-5678 6 Steel) Tj ET",
            Dictionary::new(),
        );
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("drawing.pdf");
        doc.save(&path).unwrap();

        let loaded = LopdfExtractor::new().open(&path).unwrap();
        assert_eq!(loaded.page_count(), 1);
        let texts: Vec<String> = loaded
            .page_tokens(1)
            .unwrap()
            .into_iter()
            .map(|t| t.text)
            .collect();
        assert_eq!(texts, vec!["ABCD1234-5678", "6", "Steel"]);
        assert!(matches!(
            loaded.page_tokens(2),
            Err(BomscanError::PageOutOfRange { page: 2, page_count: 1 })
        ));
    }

    #[test]
    fn test_latin1_fallback_without_fonts() {
        let doc = Document::with_version("1.5");
        let fonts = BTreeMap::new();
        let obj = Object::string_literal("ABCD1234-5678");
        let text = decode_operand(&obj, &doc, &fonts, b"F1").unwrap();
        assert_eq!(text, "ABCD1234-5678");
    }

    #[test]
    fn test_open_missing_file_fails() {
        let result = LopdfExtractor::new().open(Path::new("/nonexistent/drawing.pdf"));
        assert!(result.is_err());
    }
}
