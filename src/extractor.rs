//! Positioned text extraction from page content streams using lopdf
//!
//! Every shown glyph becomes a [`Glyph`] with a bounding box in page user
//! space, so text can later be selected by region.

use crate::document::resolve;
use crate::fonts::FontDecoder;
use crate::geometry::{multiply, transform_point, Matrix, Point, Rect, IDENTITY};
use crate::PdfError;
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId};
use std::collections::HashMap;

/// Form XObjects nested deeper than this are not entered
const MAX_FORM_DEPTH: usize = 8;
/// Glyph box extent below and above the baseline, in em
const DESCENT: f32 = -0.2;
const ASCENT: f32 = 0.8;
/// Horizontal gap (in em) after which a space is inserted between glyphs
const SPACE_GAP: f32 = 0.2;

/// A shown glyph with its position
#[derive(Debug, Clone, PartialEq)]
pub struct Glyph {
    /// Unicode text of the glyph
    pub text: String,
    /// Bounding box in page user space
    pub bbox: Rect,
    /// Baseline y of the glyph origin
    pub baseline: f32,
    /// Rendered font size
    pub font_size: f32,
}

/// A line of glyphs in reading order
#[derive(Debug, Clone)]
pub struct TextLine<'a> {
    pub glyphs: Vec<&'a Glyph>,
    pub baseline: f32,
}

impl TextLine<'_> {
    /// Line text, with spaces synthesized across visible gaps
    pub fn text(&self) -> String {
        let mut out = String::new();
        let mut prev: Option<&Glyph> = None;
        for &glyph in &self.glyphs {
            if let Some(prev) = prev {
                let gap = glyph.bbox.x0 - prev.bbox.x1;
                let em = prev.font_size.max(glyph.font_size);
                let touches_space = prev.text.ends_with(char::is_whitespace)
                    || glyph.text.starts_with(char::is_whitespace);
                if gap > em * SPACE_GAP && !touches_space {
                    out.push(' ');
                }
            }
            out.push_str(&glyph.text);
            prev = Some(glyph);
        }
        out
    }
}

/// The text layer of one page
#[derive(Debug, Clone, Default)]
pub struct PageText {
    glyphs: Vec<Glyph>,
}

impl PageText {
    pub fn new(glyphs: Vec<Glyph>) -> Self {
        Self { glyphs }
    }

    pub fn glyphs(&self) -> &[Glyph] {
        &self.glyphs
    }

    /// Plain text of the glyphs whose box centre lies inside `clip`.
    /// Every line ends with `\n`.
    pub fn text_in(&self, clip: &Rect) -> String {
        render_lines(&group_into_lines(
            self.glyphs
                .iter()
                .filter(|g| clip.contains(g.bbox.center())),
        ))
    }

    /// Plain text of the whole page
    pub fn text(&self) -> String {
        render_lines(&group_into_lines(self.glyphs.iter()))
    }
}

fn render_lines(lines: &[TextLine<'_>]) -> String {
    let mut out = String::new();
    for line in lines {
        out.push_str(&line.text());
        out.push('\n');
    }
    out
}

/// Group glyphs into lines.
/// Preserves content stream order (which is usually reading order) and only
/// merges consecutive glyphs that share a baseline; each line is then sorted
/// left to right.
pub fn group_into_lines<'a>(glyphs: impl IntoIterator<Item = &'a Glyph>) -> Vec<TextLine<'a>> {
    let mut lines: Vec<TextLine<'a>> = Vec::new();

    for glyph in glyphs {
        // Only the most recent line is a merge candidate, to keep stream order
        let tolerance = (glyph.font_size * 0.5).max(1.0);
        let same_line = lines
            .last()
            .is_some_and(|line| (line.baseline - glyph.baseline).abs() < tolerance);

        match lines.last_mut() {
            Some(line) if same_line => line.glyphs.push(glyph),
            _ => lines.push(TextLine {
                glyphs: vec![glyph],
                baseline: glyph.baseline,
            }),
        }
    }

    for line in &mut lines {
        line.glyphs.sort_by(|a, b| {
            a.bbox
                .x0
                .partial_cmp(&b.bbox.x0)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
    }

    lines
}

/// Extract every glyph shown on a page, including glyphs drawn by Form XObjects
pub fn extract_page_glyphs(doc: &Document, page_id: ObjectId) -> Result<Vec<Glyph>, PdfError> {
    let content_data = doc
        .get_page_content(page_id)
        .map_err(|e| PdfError::Parse(e.to_string()))?;
    let content = Content::decode(&content_data).map_err(|e| PdfError::Parse(e.to_string()))?;

    let resources = page_resources(doc, page_id);
    let mut interpreter = Interpreter {
        doc,
        glyphs: Vec::new(),
    };
    interpreter.run(&content.operations, resources, GraphicsState::default(), 0);

    Ok(interpreter.glyphs)
}

/// Resolve `/Resources`, walking up the page tree for inherited entries
fn page_resources(doc: &Document, page_id: ObjectId) -> Option<&Dictionary> {
    let mut node = doc.get_dictionary(page_id).ok()?;
    for _ in 0..32 {
        if let Ok(res) = node.get(b"Resources") {
            return resolve(doc, res).as_dict().ok();
        }
        let parent = node.get(b"Parent").ok()?.as_reference().ok()?;
        node = doc.get_dictionary(parent).ok()?;
    }
    None
}

#[derive(Debug, Clone)]
struct GraphicsState {
    ctm: Matrix,
    font: Vec<u8>,
    font_size: f32,
    char_spacing: f32,
    word_spacing: f32,
    horizontal_scale: f32,
    leading: f32,
    rise: f32,
}

impl Default for GraphicsState {
    fn default() -> Self {
        Self {
            ctm: IDENTITY,
            font: Vec::new(),
            font_size: 12.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            horizontal_scale: 1.0,
            leading: 0.0,
            rise: 0.0,
        }
    }
}

struct Interpreter<'a> {
    doc: &'a Document,
    glyphs: Vec<Glyph>,
}

impl<'a> Interpreter<'a> {
    fn run(
        &mut self,
        operations: &[Operation],
        resources: Option<&'a Dictionary>,
        initial: GraphicsState,
        depth: usize,
    ) {
        let mut fonts: HashMap<Vec<u8>, FontDecoder> = HashMap::new();
        let mut state = initial;
        let mut stack: Vec<GraphicsState> = Vec::new();
        let mut text_matrix = IDENTITY;
        let mut line_matrix = IDENTITY;

        for op in operations {
            let operands = &op.operands;
            match op.operator.as_str() {
                "q" => stack.push(state.clone()),
                "Q" => {
                    if let Some(saved) = stack.pop() {
                        state = saved;
                    }
                }
                "cm" => {
                    if let Some(m) = matrix_operand(operands) {
                        state.ctm = multiply(&m, &state.ctm);
                    }
                }
                "BT" => {
                    text_matrix = IDENTITY;
                    line_matrix = IDENTITY;
                }
                "Tf" => {
                    if let Some(name) = operands.first().and_then(|o| o.as_name().ok()) {
                        state.font = name.to_vec();
                    }
                    if let Some(size) = operands.get(1).and_then(get_number) {
                        state.font_size = size;
                    }
                }
                "Tc" => set_number(operands, &mut state.char_spacing),
                "Tw" => set_number(operands, &mut state.word_spacing),
                "TL" => set_number(operands, &mut state.leading),
                "Ts" => set_number(operands, &mut state.rise),
                "Tz" => {
                    if let Some(scale) = operands.first().and_then(get_number) {
                        state.horizontal_scale = scale / 100.0;
                    }
                }
                "Td" | "TD" => {
                    let tx = operands.first().and_then(get_number).unwrap_or(0.0);
                    let ty = operands.get(1).and_then(get_number).unwrap_or(0.0);
                    if op.operator == "TD" {
                        state.leading = -ty;
                    }
                    line_matrix = multiply(&[1.0, 0.0, 0.0, 1.0, tx, ty], &line_matrix);
                    text_matrix = line_matrix;
                }
                "Tm" => {
                    if let Some(m) = matrix_operand(operands) {
                        text_matrix = m;
                        line_matrix = m;
                    }
                }
                "T*" => {
                    line_matrix = multiply(&[1.0, 0.0, 0.0, 1.0, 0.0, -state.leading], &line_matrix);
                    text_matrix = line_matrix;
                }
                "Tj" | "'" | "\"" => {
                    let string_index = match op.operator.as_str() {
                        "\"" => {
                            set_number(operands, &mut state.word_spacing);
                            if let Some(ac) = operands.get(1).and_then(get_number) {
                                state.char_spacing = ac;
                            }
                            2
                        }
                        _ => 0,
                    };
                    if op.operator != "Tj" {
                        line_matrix =
                            multiply(&[1.0, 0.0, 0.0, 1.0, 0.0, -state.leading], &line_matrix);
                        text_matrix = line_matrix;
                    }
                    if let Some(Object::String(bytes, _)) = operands.get(string_index) {
                        let font = font_for(&mut fonts, self.doc, resources, &state.font);
                        self.show(bytes, font, &state, &mut text_matrix);
                    }
                }
                "TJ" => {
                    let Some(array) = operands.first().and_then(|o| o.as_array().ok()) else {
                        continue;
                    };
                    let font = font_for(&mut fonts, self.doc, resources, &state.font);
                    for item in array {
                        match item {
                            Object::String(bytes, _) => {
                                self.show(bytes, font, &state, &mut text_matrix)
                            }
                            other => {
                                if let Some(adjust) = get_number(other) {
                                    let tx = -adjust / 1000.0
                                        * state.font_size
                                        * state.horizontal_scale;
                                    text_matrix =
                                        multiply(&[1.0, 0.0, 0.0, 1.0, tx, 0.0], &text_matrix);
                                }
                            }
                        }
                    }
                }
                "Do" => {
                    if let Some(name) = operands.first().and_then(|o| o.as_name().ok()) {
                        self.run_form(name, resources, &state, depth);
                    }
                }
                _ => {}
            }
        }
    }

    /// Execute a Form XObject referenced by name from the current resources
    fn run_form(
        &mut self,
        name: &[u8],
        resources: Option<&'a Dictionary>,
        state: &GraphicsState,
        depth: usize,
    ) {
        if depth >= MAX_FORM_DEPTH {
            log::debug!("form XObject nesting limit reached");
            return;
        }
        let doc = self.doc;
        let Some(stream) = resources
            .and_then(|r| r.get(b"XObject").ok())
            .and_then(|x| resolve(doc, x).as_dict().ok())
            .and_then(|x| x.get(name).ok())
            .and_then(|s| resolve(doc, s).as_stream().ok())
        else {
            return;
        };
        if !matches!(stream.dict.get(b"Subtype").and_then(Object::as_name), Ok(b"Form")) {
            return;
        }

        let data = stream
            .decompressed_content()
            .unwrap_or_else(|_| stream.content.clone());
        let content = match Content::decode(&data) {
            Ok(content) => content,
            Err(e) => {
                log::debug!(
                    "skipping form XObject {}: {}",
                    String::from_utf8_lossy(name),
                    e
                );
                return;
            }
        };

        let form_matrix = stream
            .dict
            .get(b"Matrix")
            .ok()
            .and_then(|m| resolve(doc, m).as_array().ok())
            .and_then(|m| matrix_operand(m))
            .unwrap_or(IDENTITY);
        let form_resources = stream
            .dict
            .get(b"Resources")
            .ok()
            .and_then(|r| resolve(doc, r).as_dict().ok())
            .or(resources);

        let mut inner = state.clone();
        inner.ctm = multiply(&form_matrix, &state.ctm);
        self.run(&content.operations, form_resources, inner, depth + 1);
    }

    /// Show a string: emit one glyph per character code and advance the text matrix
    fn show(
        &mut self,
        bytes: &[u8],
        font: &FontDecoder,
        state: &GraphicsState,
        text_matrix: &mut Matrix,
    ) {
        let fs = state.font_size;
        let th = state.horizontal_scale;

        for decoded in font.decode(bytes) {
            let w0 = decoded.width / 1000.0;
            let trm = multiply(
                &[fs * th, 0.0, 0.0, fs, 0.0, state.rise],
                &multiply(text_matrix, &state.ctm),
            );

            if !decoded.text.is_empty() {
                let corners: [Point; 4] = [
                    transform_point(&trm, 0.0, DESCENT),
                    transform_point(&trm, w0, DESCENT),
                    transform_point(&trm, 0.0, ASCENT),
                    transform_point(&trm, w0, ASCENT),
                ];
                if let Some(bbox) = Rect::bounding(&corners) {
                    self.glyphs.push(Glyph {
                        text: decoded.text,
                        bbox,
                        baseline: trm[5],
                        font_size: effective_font_size(fs, &multiply(text_matrix, &state.ctm)),
                    });
                }
            }

            let mut advance = w0 * fs + state.char_spacing;
            if decoded.is_word_space {
                advance += state.word_spacing;
            }
            *text_matrix = multiply(&[1.0, 0.0, 0.0, 1.0, advance * th, 0.0], text_matrix);
        }
    }
}

fn font_for<'f>(
    fonts: &'f mut HashMap<Vec<u8>, FontDecoder>,
    doc: &Document,
    resources: Option<&Dictionary>,
    name: &[u8],
) -> &'f FontDecoder {
    fonts
        .entry(name.to_vec())
        .or_insert_with(|| load_font(doc, resources, name))
}

fn load_font(doc: &Document, resources: Option<&Dictionary>, name: &[u8]) -> FontDecoder {
    let font = resources
        .and_then(|r| r.get(b"Font").ok())
        .and_then(|f| resolve(doc, f).as_dict().ok())
        .and_then(|f| f.get(name).ok())
        .and_then(|f| resolve(doc, f).as_dict().ok());

    match font {
        Some(font) => FontDecoder::new(doc, font),
        None => {
            log::debug!("font {} not found in resources", String::from_utf8_lossy(name));
            FontDecoder::fallback()
        }
    }
}

/// Helper to get f32 from Object
fn get_number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}

fn set_number(operands: &[Object], target: &mut f32) {
    if let Some(v) = operands.first().and_then(get_number) {
        *target = v;
    }
}

fn matrix_operand(operands: &[Object]) -> Option<Matrix> {
    if operands.len() < 6 {
        return None;
    }
    let mut m = IDENTITY;
    for (slot, operand) in m.iter_mut().zip(operands) {
        *slot = get_number(operand)?;
    }
    Some(m)
}

/// Compute effective font size from base size and text matrix
fn effective_font_size(base_size: f32, matrix: &Matrix) -> f32 {
    let scale_x = (matrix[0].powi(2) + matrix[1].powi(2)).sqrt();
    let scale_y = (matrix[2].powi(2) + matrix[3].powi(2)).sqrt();
    base_size * scale_x.max(scale_y)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{dictionary, Stream};

    fn glyph(text: &str, x: f32, baseline: f32) -> Glyph {
        Glyph {
            text: text.into(),
            bbox: Rect::new(x, baseline - 2.4, x + 6.0, baseline + 9.6),
            baseline,
            font_size: 12.0,
        }
    }

    fn helvetica(doc: &mut Document) -> ObjectId {
        doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        })
    }

    /// One-page document; `resources` builds the inherited page resources
    fn page_doc(
        content: &[u8],
        resources: impl FnOnce(&mut Document) -> Dictionary,
    ) -> (Document, ObjectId) {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let resources = resources(&mut doc);
        let content_id = doc.add_object(Stream::new(Dictionary::new(), content.to_vec()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![Object::from(page_id)],
                "Count" => 1i64,
                "MediaBox" => vec![Object::Integer(0), Object::Integer(0), Object::Integer(612), Object::Integer(792)],
                "Resources" => resources,
            }),
        );
        (doc, page_id)
    }

    fn single_page_doc(content: &[u8]) -> (Document, ObjectId) {
        page_doc(content, |doc| {
            let font_id = helvetica(doc);
            dictionary! { "Font" => dictionary! { "F1" => font_id } }
        })
    }

    #[test]
    fn test_group_into_lines_keeps_stream_order() {
        let glyphs = vec![
            glyph("b", 106.0, 700.0),
            glyph("a", 100.0, 700.0),
            glyph("c", 100.0, 680.0),
        ];
        let lines = group_into_lines(&glyphs);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].text(), "ab");
        assert_eq!(lines[1].text(), "c");
    }

    #[test]
    fn test_space_synthesized_for_gap() {
        let glyphs = vec![glyph("a", 100.0, 700.0), glyph("b", 120.0, 700.0)];
        assert_eq!(PageText::new(glyphs).text(), "a b\n");
    }

    #[test]
    fn test_text_in_clips_by_centre() {
        let text = PageText::new(vec![
            glyph("x", 100.0, 700.0),
            glyph("y", 106.0, 700.0),
            glyph("z", 100.0, 650.0),
        ]);
        let clip = Rect::new(99.0, 695.0, 108.0, 712.0);
        assert_eq!(text.text_in(&clip), "x\n");
        assert_eq!(text.text_in(&Rect::new(0.0, 0.0, 10.0, 10.0)), "");
    }

    #[test]
    fn test_extract_positions_from_content() {
        let (doc, page_id) =
            single_page_doc(b"BT /F1 12 Tf 72 700 Td (Hi) Tj 0 -20 Td (there) Tj ET");
        let glyphs = extract_page_glyphs(&doc, page_id).unwrap();
        assert_eq!(glyphs.len(), 7);
        assert_eq!(glyphs[0].text, "H");
        assert_eq!(glyphs[0].bbox.x0, 72.0);
        assert_eq!(glyphs[0].baseline, 700.0);
        // Helvetica without /Widths advances 500 units
        assert_eq!(glyphs[1].bbox.x0, 78.0);
        assert_eq!(glyphs[2].baseline, 680.0);
        assert_eq!(PageText::new(glyphs).text(), "Hi\nthere\n");
    }

    #[test]
    fn test_tj_adjustment_and_leading() {
        let (doc, page_id) = single_page_doc(
            b"BT /F1 10 Tf 14 TL 50 500 Td [(A) -1000 (B)] TJ T* (C) Tj ET",
        );
        let glyphs = extract_page_glyphs(&doc, page_id).unwrap();
        assert_eq!(glyphs.len(), 3);
        // 5pt advance plus 10pt adjustment
        assert_eq!(glyphs[1].bbox.x0, 65.0);
        assert_eq!(glyphs[2].baseline, 486.0);
        assert_eq!(glyphs[2].bbox.x0, 50.0);
    }

    #[test]
    fn test_ctm_applies_to_glyphs() {
        let (doc, page_id) = single_page_doc(b"q 2 0 0 2 10 10 cm BT /F1 12 Tf (A) Tj ET Q");
        let glyphs = extract_page_glyphs(&doc, page_id).unwrap();
        assert_eq!(glyphs[0].bbox.x0, 10.0);
        assert_eq!(glyphs[0].font_size, 24.0);
    }

    #[test]
    fn test_inherited_resources() {
        let (doc, page_id) = single_page_doc(b"");
        assert!(page_resources(&doc, page_id).is_some());
    }

    #[test]
    fn test_quote_operators_move_to_next_line() {
        let (doc, page_id) = single_page_doc(
            b"BT /F1 10 Tf 12 TL 50 500 Td (A) Tj (B) ' 3 1 (C D) \" ET",
        );
        let glyphs = extract_page_glyphs(&doc, page_id).unwrap();
        let texts: Vec<&str> = glyphs.iter().map(|g| g.text.as_str()).collect();
        assert_eq!(texts, vec!["A", "B", "C", " ", "D"]);
        assert_eq!(glyphs[1].baseline, 488.0);
        assert_eq!(glyphs[1].bbox.x0, 50.0);
        assert_eq!(glyphs[2].baseline, 476.0);
        // `"` sets word spacing 3 and character spacing 1
        assert_eq!(glyphs[3].bbox.x0, 56.0);
        assert_eq!(glyphs[4].bbox.x0, 65.0);
    }

    #[test]
    fn test_form_xobject_glyphs_positioned() {
        let (doc, page_id) = page_doc(b"q 1 0 0 1 0 100 cm /X1 Do Q", |doc| {
            let font_id = helvetica(doc);
            let form_id = doc.add_object(Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Form",
                    "BBox" => vec![Object::Integer(0), Object::Integer(0), Object::Integer(100), Object::Integer(100)],
                    "Matrix" => vec![
                        Object::Integer(1),
                        Object::Integer(0),
                        Object::Integer(0),
                        Object::Integer(1),
                        Object::Integer(100),
                        Object::Integer(200),
                    ],
                    "Resources" => dictionary! {
                        "Font" => dictionary! { "F2" => font_id },
                    },
                },
                b"BT /F2 10 Tf 5 5 Td (Fm) Tj ET".to_vec(),
            ));
            dictionary! { "XObject" => dictionary! { "X1" => form_id } }
        });

        let glyphs = extract_page_glyphs(&doc, page_id).unwrap();
        assert_eq!(glyphs.len(), 2);
        assert_eq!(glyphs[0].text, "F");
        // Text origin (5, 5) through the form matrix and the page CTM
        assert_eq!(glyphs[0].bbox.x0, 105.0);
        assert_eq!(glyphs[0].baseline, 305.0);
        assert_eq!(glyphs[1].bbox.x0, 110.0);
        assert_eq!(PageText::new(glyphs).text(), "Fm\n");
    }

    #[test]
    fn test_type0_font_with_to_unicode() {
        let cmap = b"/CIDInit /ProcSet findresource begin
begincmap
1 begincodespacerange
<0000> <FFFF>
endcodespacerange
2 beginbfchar
<0001> <0048>
<0002> <0069>
endbfchar
endcmap";
        let (doc, page_id) = page_doc(b"BT /F1 10 Tf 20 30 Td <00010002> Tj ET", |doc| {
            let cmap_id = doc.add_object(Stream::new(Dictionary::new(), cmap.to_vec()));
            let descendant = doc.add_object(dictionary! {
                "Type" => "Font",
                "Subtype" => "CIDFontType2",
                "BaseFont" => "NotoSans",
                "DW" => 1000i64,
            });
            let font_id = doc.add_object(dictionary! {
                "Type" => "Font",
                "Subtype" => "Type0",
                "BaseFont" => "NotoSans",
                "Encoding" => "Identity-H",
                "DescendantFonts" => vec![Object::Reference(descendant)],
                "ToUnicode" => cmap_id,
            });
            dictionary! { "Font" => dictionary! { "F1" => font_id } }
        });

        let glyphs = extract_page_glyphs(&doc, page_id).unwrap();
        let texts: Vec<&str> = glyphs.iter().map(|g| g.text.as_str()).collect();
        assert_eq!(texts, vec!["H", "i"]);
        assert_eq!(glyphs[0].bbox.x0, 20.0);
        // Two-byte codes with the 1000-unit default width
        assert_eq!(glyphs[1].bbox.x0, 30.0);
    }
}
