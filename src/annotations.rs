//! Page annotation scanning
//!
//! Reads a page's `/Annots` array into [`Annotation`] values. Only the parts
//! needed to locate highlighted text are kept: the subtype and the quad
//! vertices.

use crate::document::resolve;
use crate::geometry::{Point, Quad};
use crate::PdfError;
use lopdf::{Document, Object, ObjectId};

/// Annotation subtype, numbered after the common annotation taxonomy
/// (Text = 0 ... Projection = 27)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnotationKind {
    Text,
    Link,
    FreeText,
    Line,
    Square,
    Circle,
    Polygon,
    PolyLine,
    Highlight,
    Underline,
    Squiggly,
    StrikeOut,
    Redact,
    Stamp,
    Caret,
    Ink,
    Popup,
    FileAttachment,
    Sound,
    Movie,
    RichMedia,
    Widget,
    Screen,
    PrinterMark,
    TrapNet,
    Watermark,
    ThreeD,
    Projection,
    Unknown,
}

impl AnnotationKind {
    const ALL: [AnnotationKind; 28] = [
        Self::Text,
        Self::Link,
        Self::FreeText,
        Self::Line,
        Self::Square,
        Self::Circle,
        Self::Polygon,
        Self::PolyLine,
        Self::Highlight,
        Self::Underline,
        Self::Squiggly,
        Self::StrikeOut,
        Self::Redact,
        Self::Stamp,
        Self::Caret,
        Self::Ink,
        Self::Popup,
        Self::FileAttachment,
        Self::Sound,
        Self::Movie,
        Self::RichMedia,
        Self::Widget,
        Self::Screen,
        Self::PrinterMark,
        Self::TrapNet,
        Self::Watermark,
        Self::ThreeD,
        Self::Projection,
    ];

    /// Map a `/Subtype` name to its kind
    pub fn from_subtype(name: &[u8]) -> Self {
        match name {
            b"Text" => Self::Text,
            b"Link" => Self::Link,
            b"FreeText" => Self::FreeText,
            b"Line" => Self::Line,
            b"Square" => Self::Square,
            b"Circle" => Self::Circle,
            b"Polygon" => Self::Polygon,
            b"PolyLine" => Self::PolyLine,
            b"Highlight" => Self::Highlight,
            b"Underline" => Self::Underline,
            b"Squiggly" => Self::Squiggly,
            b"StrikeOut" => Self::StrikeOut,
            b"Redact" => Self::Redact,
            b"Stamp" => Self::Stamp,
            b"Caret" => Self::Caret,
            b"Ink" => Self::Ink,
            b"Popup" => Self::Popup,
            b"FileAttachment" => Self::FileAttachment,
            b"Sound" => Self::Sound,
            b"Movie" => Self::Movie,
            b"RichMedia" => Self::RichMedia,
            b"Widget" => Self::Widget,
            b"Screen" => Self::Screen,
            b"PrinterMark" => Self::PrinterMark,
            b"TrapNet" => Self::TrapNet,
            b"Watermark" => Self::Watermark,
            b"3D" => Self::ThreeD,
            b"Projection" => Self::Projection,
            _ => Self::Unknown,
        }
    }

    /// Numeric type code; `None` for unknown subtypes
    pub fn type_code(self) -> Option<u8> {
        Self::ALL.iter().position(|k| *k == self).map(|p| p as u8)
    }

    /// Kind for a numeric type code
    pub fn from_type_code(code: u8) -> Self {
        Self::ALL
            .get(code as usize)
            .copied()
            .unwrap_or(Self::Unknown)
    }
}

/// One page annotation
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    pub kind: AnnotationKind,
    /// Raw `/Subtype` name
    pub subtype: String,
    /// Flat vertex list from `/QuadPoints`, four per quad.
    /// `None` when the entry is missing or has an odd number of coordinates.
    pub vertices: Option<Vec<Point>>,
}

impl Annotation {
    pub fn is_highlight(&self) -> bool {
        self.kind == AnnotationKind::Highlight
    }

    /// Group vertices into quads. `None` when the vertex list is missing or its
    /// length is not a multiple of four.
    pub fn quads(&self) -> Option<Vec<Quad>> {
        let vertices = self.vertices.as_ref()?;
        if vertices.len() % 4 != 0 {
            return None;
        }
        Some(
            vertices
                .chunks_exact(4)
                .map(|c| Quad {
                    points: [c[0], c[1], c[2], c[3]],
                })
                .collect(),
        )
    }
}

/// Read all annotations of a page in `/Annots` order
pub fn page_annotations(doc: &Document, page_id: ObjectId) -> Result<Vec<Annotation>, PdfError> {
    let page_dict = doc.get_dictionary(page_id)?;

    let annots = match page_dict.get(b"Annots") {
        Ok(obj) => resolve(doc, obj),
        Err(_) => return Ok(Vec::new()),
    };
    let Ok(annots) = annots.as_array() else {
        log::debug!("page {:?}: /Annots is not an array", page_id);
        return Ok(Vec::new());
    };

    let mut annotations = Vec::with_capacity(annots.len());
    for entry in annots {
        let Ok(dict) = resolve(doc, entry).as_dict() else {
            continue;
        };
        let subtype = match dict.get(b"Subtype") {
            Ok(Object::Name(name)) => name,
            _ => continue,
        };

        let vertices = dict
            .get(b"QuadPoints")
            .ok()
            .map(|obj| resolve(doc, obj))
            .and_then(|obj| obj.as_array().ok())
            .and_then(|arr| quad_points_to_vertices(doc, arr));

        annotations.push(Annotation {
            kind: AnnotationKind::from_subtype(subtype),
            subtype: String::from_utf8_lossy(subtype).into_owned(),
            vertices,
        });
    }

    Ok(annotations)
}

fn quad_points_to_vertices(doc: &Document, arr: &[Object]) -> Option<Vec<Point>> {
    let coords: Vec<f32> = arr
        .iter()
        .map(|obj| match resolve(doc, obj) {
            Object::Integer(i) => Some(*i as f32),
            Object::Real(r) => Some(*r),
            _ => None,
        })
        .collect::<Option<_>>()?;
    if coords.len() % 2 != 0 {
        return None;
    }
    Some(
        coords
            .chunks_exact(2)
            .map(|c| Point::new(c[0], c[1]))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_highlight_type_code() {
        assert_eq!(AnnotationKind::Highlight.type_code(), Some(8));
        assert_eq!(AnnotationKind::Text.type_code(), Some(0));
        assert_eq!(AnnotationKind::Projection.type_code(), Some(27));
        assert_eq!(AnnotationKind::Unknown.type_code(), None);
        assert_eq!(AnnotationKind::from_type_code(8), AnnotationKind::Highlight);
        assert_eq!(AnnotationKind::from_type_code(99), AnnotationKind::Unknown);
    }

    #[test]
    fn test_from_subtype() {
        assert_eq!(
            AnnotationKind::from_subtype(b"Highlight"),
            AnnotationKind::Highlight
        );
        assert_eq!(AnnotationKind::from_subtype(b"3D"), AnnotationKind::ThreeD);
        assert_eq!(
            AnnotationKind::from_subtype(b"Custom"),
            AnnotationKind::Unknown
        );
    }

    #[test]
    fn test_quads_require_multiple_of_four() {
        let point = Point::new(1.0, 2.0);
        let mut annot = Annotation {
            kind: AnnotationKind::Highlight,
            subtype: "Highlight".into(),
            vertices: Some(vec![point; 8]),
        };
        assert_eq!(annot.quads().map(|q| q.len()), Some(2));

        annot.vertices = Some(vec![point; 6]);
        assert!(annot.quads().is_none());

        annot.vertices = None;
        assert!(annot.quads().is_none());
    }

    #[test]
    fn test_odd_coordinate_count() {
        let doc = Document::with_version("1.5");
        let arr: Vec<Object> = (0..7).map(Object::Integer).collect();
        assert!(quad_points_to_vertices(&doc, &arr).is_none());

        let arr: Vec<Object> = (0..8).map(|i| Object::Real(i as f32)).collect();
        assert_eq!(quad_points_to_vertices(&doc, &arr).map(|v| v.len()), Some(4));
    }
}
