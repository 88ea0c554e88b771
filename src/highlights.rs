//! Highlight extraction: from highlight annotations to page-numbered records
//!
//! For each highlight annotation the quads are turned into bounding
//! rectangles, the page text under each rectangle is collected in quad
//! order, and the result is cleaned. Non-empty results become
//! [`HighlightRecord`]s numbered with the front-matter offset.

use crate::annotations::Annotation;
use crate::document::PdfDocument;
use crate::extractor::PageText;
use crate::PdfError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

/// Default number of front-matter pages before logical page 1
pub const DEFAULT_FRONT_MATTER: u32 = 16;

/// Options for highlight extraction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HighlightOptions {
    /// Pages preceding logical page 1 (cover, preface, table of contents)
    pub front_matter: u32,
}

impl Default for HighlightOptions {
    fn default() -> Self {
        Self {
            front_matter: DEFAULT_FRONT_MATTER,
        }
    }
}

/// One extracted highlight
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HighlightRecord {
    /// Logical page number shown to the reader
    #[serde(rename = "page")]
    pub display_page: u64,
    /// Cleaned highlighted text
    pub text: String,
}

/// Logical page number for a zero-based page index.
/// Computed in `u64` so any `u32` front-matter offset fits.
pub fn display_page(page_index: usize, front_matter: u32) -> u64 {
    page_index as u64 + 1 + u64::from(front_matter)
}

/// Drop C0 control characters other than tab, line feed and carriage return
pub fn strip_control_chars(text: &str) -> String {
    static CONTROL_RE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"[\x00-\x08\x0B\x0C\x0E-\x1F]").unwrap());

    CONTROL_RE.replace_all(text, "").into_owned()
}

/// Strip surrounding whitespace, then drop control characters
pub fn clean_text(text: &str) -> String {
    // Information separators U+001C..U+001F count as whitespace when trimming
    let trimmed =
        text.trim_matches(|c: char| c.is_whitespace() || ('\x1C'..='\x1F').contains(&c));
    strip_control_chars(trimmed)
}

/// Text covered by one highlight annotation.
///
/// Returns `None` when the annotation is malformed (vertex count not a
/// multiple of four) or when nothing but whitespace lies under it.
pub fn highlight_text(page: &PageText, annotation: &Annotation) -> Option<String> {
    let Some(quads) = annotation.quads() else {
        log::debug!(
            "skipping malformed {} annotation ({} vertices)",
            annotation.subtype,
            annotation.vertices.as_ref().map_or(0, Vec::len)
        );
        return None;
    };

    let raw: String = quads.iter().map(|q| page.text_in(&q.rect())).collect();
    let text = clean_text(&raw);
    (!text.is_empty()).then_some(text)
}

/// Extract every highlight in document order
pub fn extract_highlights(
    doc: &PdfDocument,
    options: &HighlightOptions,
) -> Result<Vec<HighlightRecord>, PdfError> {
    extract_highlights_with_progress(doc, options, |_, _| {})
}

/// Extract every highlight, reporting `(pages_done, page_count)` after each page
pub fn extract_highlights_with_progress<F>(
    doc: &PdfDocument,
    options: &HighlightOptions,
    mut on_page: F,
) -> Result<Vec<HighlightRecord>, PdfError>
where
    F: FnMut(usize, usize),
{
    let total = doc.page_count();
    let mut records = Vec::new();

    for page in doc.pages() {
        let annotations = page.annotations()?;
        let found = annotations.len();
        let highlights: Vec<Annotation> = annotations
            .into_iter()
            .filter(Annotation::is_highlight)
            .collect();
        if found > highlights.len() {
            log::debug!(
                "page {}: ignoring {} non-highlight annotations",
                page.index() + 1,
                found - highlights.len()
            );
        }

        // Pages without highlights never need their content stream interpreted
        if !highlights.is_empty() {
            let page_text = page.text()?;
            for annotation in &highlights {
                if let Some(text) = highlight_text(&page_text, annotation) {
                    records.push(HighlightRecord {
                        display_page: display_page(page.index(), options.front_matter),
                        text,
                    });
                }
            }
        }

        on_page(page.index() + 1, total);
    }

    log::info!("found {} highlights in {} pages", records.len(), total);
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotations::AnnotationKind;
    use crate::extractor::Glyph;
    use crate::geometry::{Point, Rect};

    fn line(text: &str, x: f32, baseline: f32) -> Vec<Glyph> {
        text.chars()
            .enumerate()
            .map(|(i, c)| {
                let x0 = x + i as f32 * 6.0;
                Glyph {
                    text: c.to_string(),
                    bbox: Rect::new(x0, baseline - 2.4, x0 + 6.0, baseline + 9.6),
                    baseline,
                    font_size: 12.0,
                }
            })
            .collect()
    }

    fn highlight(rects: &[Rect]) -> Annotation {
        let vertices = rects
            .iter()
            .flat_map(|r| {
                [
                    Point::new(r.x0, r.y1),
                    Point::new(r.x1, r.y1),
                    Point::new(r.x0, r.y0),
                    Point::new(r.x1, r.y0),
                ]
            })
            .collect();
        Annotation {
            kind: AnnotationKind::Highlight,
            subtype: "Highlight".into(),
            vertices: Some(vertices),
        }
    }

    #[test]
    fn test_display_page() {
        assert_eq!(display_page(0, 0), 1);
        assert_eq!(display_page(1, 16), 18);
        for f in [0u32, 1, 16, 250] {
            for p in [0usize, 3, 99] {
                assert_eq!(display_page(p, f), p as u64 + 1 + u64::from(f));
            }
        }
    }

    #[test]
    fn test_display_page_large_front_matter() {
        assert_eq!(display_page(0, u32::MAX), u64::from(u32::MAX) + 1);
        assert_eq!(display_page(5, u32::MAX), u64::from(u32::MAX) + 6);
    }

    #[test]
    fn test_default_options() {
        assert_eq!(HighlightOptions::default().front_matter, 16);
    }

    #[test]
    fn test_clean_text_strips_controls() {
        assert_eq!(clean_text("  \x01Hello\x07 World\x1F  "), "Hello World");
        assert_eq!(clean_text("a\tb\nc\rd"), "a\tb\nc\rd");
        assert_eq!(clean_text("\x0B\x0C"), "");
        assert_eq!(clean_text(" \n\t "), "");
        // Whitespace behind a leading control character survives the trim
        assert_eq!(clean_text("\x02 lead"), " lead");
    }

    #[test]
    fn test_strip_control_chars_idempotent() {
        let samples = [
            "plain",
            "  padded  ",
            "\x02 lead",
            "mid\x1Bdle\x00",
            "tail \x08",
            "\x1C\x1D sep \x1E\x1F",
        ];
        for s in samples {
            let once = strip_control_chars(s);
            assert_eq!(strip_control_chars(&once), once, "not idempotent for {:?}", s);
        }
    }

    #[test]
    fn test_multi_quad_concatenation() {
        let mut glyphs = line("first", 72.0, 700.0);
        glyphs.extend(line("second", 72.0, 686.0));
        let page = PageText::new(glyphs);

        let annot = highlight(&[
            Rect::new(70.0, 697.0, 110.0, 711.0),
            Rect::new(70.0, 683.0, 110.0, 696.0),
        ]);
        assert_eq!(highlight_text(&page, &annot), Some("first\nsecond".into()));
    }

    #[test]
    fn test_whitespace_only_highlight() {
        let page = PageText::new(line("   ", 72.0, 700.0));
        let annot = highlight(&[Rect::new(70.0, 697.0, 100.0, 711.0)]);
        assert_eq!(highlight_text(&page, &annot), None);
    }

    #[test]
    fn test_malformed_vertices_skipped() {
        let page = PageText::new(line("text", 72.0, 700.0));
        let mut annot = highlight(&[Rect::new(70.0, 697.0, 100.0, 711.0)]);
        if let Some(v) = annot.vertices.as_mut() {
            v.truncate(3);
            v.extend([Point::new(0.0, 0.0); 3]);
        }
        assert_eq!(annot.vertices.as_ref().map(Vec::len), Some(6));
        assert_eq!(highlight_text(&page, &annot), None);
    }
}
