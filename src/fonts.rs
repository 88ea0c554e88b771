//! Font decoding: character codes to Unicode text and glyph advances

use crate::document::resolve;
use crate::tounicode::ToUnicodeCMap;
use lopdf::{Dictionary, Document, Object};
use std::collections::HashMap;

/// Advance used when a simple font has no width table
const DEFAULT_SIMPLE_WIDTH: f32 = 500.0;
/// `/DW` default for CID fonts
const DEFAULT_CID_WIDTH: f32 = 1000.0;

/// One decoded character code
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedGlyph {
    /// Unicode text for the code (may be several chars, e.g. ligatures)
    pub text: String,
    /// Advance width in glyph space (thousandths of text space)
    pub width: f32,
    /// Single-byte code 32, which receives word spacing
    pub is_word_space: bool,
}

#[derive(Debug, Clone)]
enum Widths {
    Simple { first_char: u32, widths: Vec<f32> },
    Cid {
        default: f32,
        widths: HashMap<u32, f32>,
        /// `c_first c_last w` entries, kept as ranges
        ranges: Vec<(u32, u32, f32)>,
    },
}

/// Decoder for one font resource
#[derive(Debug, Clone)]
pub struct FontDecoder {
    code_bytes: usize,
    composite: bool,
    cmap: Option<ToUnicodeCMap>,
    /// Simple fonts only: text for every single-byte code from the font encoding
    byte_table: Vec<Option<String>>,
    widths: Widths,
}

impl FontDecoder {
    /// Build a decoder from a font dictionary
    pub fn new(doc: &Document, font: &Dictionary) -> Self {
        let composite = matches!(
            font.get(b"Subtype").and_then(Object::as_name),
            Ok(b"Type0")
        );
        let cmap = ToUnicodeCMap::from_font(doc, font);

        let code_bytes = match &cmap {
            Some(cmap) if cmap.code_byte_length == 1 => 1,
            _ if composite => 2,
            _ => 1,
        };

        let byte_table = if composite {
            Vec::new()
        } else {
            simple_byte_table(doc, font)
        };

        let widths = if composite {
            cid_widths(doc, font)
        } else {
            simple_widths(doc, font)
        };

        Self {
            code_bytes,
            composite,
            cmap,
            byte_table,
            widths,
        }
    }

    /// Decoder used when the font resource cannot be resolved
    pub fn fallback() -> Self {
        Self {
            code_bytes: 1,
            composite: false,
            cmap: None,
            byte_table: Vec::new(),
            widths: Widths::Simple {
                first_char: 0,
                widths: Vec::new(),
            },
        }
    }

    pub fn is_composite(&self) -> bool {
        self.composite
    }

    /// Split a string operand into codes and decode each one
    pub fn decode(&self, bytes: &[u8]) -> Vec<DecodedGlyph> {
        bytes
            .chunks(self.code_bytes)
            .map(|chunk| {
                let code = chunk.iter().fold(0u32, |acc, &b| (acc << 8) | u32::from(b));
                DecodedGlyph {
                    text: self.code_to_text(code),
                    width: self.width(code),
                    is_word_space: self.code_bytes == 1 && code == 32,
                }
            })
            .collect()
    }

    fn code_to_text(&self, code: u32) -> String {
        if let Some(text) = self.cmap.as_ref().and_then(|c| c.lookup(code)) {
            return text;
        }
        if let Some(Some(text)) = self.byte_table.get(code as usize) {
            return text.clone();
        }
        // Latin-1 for single bytes, raw code point for CIDs
        char::from_u32(code).map(String::from).unwrap_or_default()
    }

    fn width(&self, code: u32) -> f32 {
        match &self.widths {
            Widths::Simple { first_char, widths } => code
                .checked_sub(*first_char)
                .and_then(|i| widths.get(i as usize))
                .copied()
                .filter(|w| *w > 0.0)
                .unwrap_or(DEFAULT_SIMPLE_WIDTH),
            Widths::Cid {
                default,
                widths,
                ranges,
            } => widths
                .get(&code)
                .copied()
                .or_else(|| {
                    ranges
                        .iter()
                        .find(|(first, last, _)| (*first..=*last).contains(&code))
                        .map(|(_, _, w)| *w)
                })
                .unwrap_or(*default),
        }
    }
}

fn number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}

fn simple_byte_table(doc: &Document, font: &Dictionary) -> Vec<Option<String>> {
    let Ok(encoding) = font.get_font_encoding(doc) else {
        return Vec::new();
    };
    (0u8..=255)
        .map(|b| {
            Document::decode_text(&encoding, &[b])
                .ok()
                .filter(|s| !s.is_empty())
        })
        .collect()
}

fn simple_widths(doc: &Document, font: &Dictionary) -> Widths {
    let first_char = font
        .get(b"FirstChar")
        .ok()
        .and_then(number)
        .map(|n| n as u32)
        .unwrap_or(0);
    let widths = font
        .get(b"Widths")
        .ok()
        .map(|obj| resolve(doc, obj))
        .and_then(|obj| obj.as_array().ok())
        .map(|arr| {
            arr.iter()
                .map(|w| number(resolve(doc, w)).unwrap_or(0.0))
                .collect()
        })
        .unwrap_or_default();
    Widths::Simple { first_char, widths }
}

fn cid_widths(doc: &Document, font: &Dictionary) -> Widths {
    let descendant = font
        .get(b"DescendantFonts")
        .ok()
        .map(|obj| resolve(doc, obj))
        .and_then(|obj| obj.as_array().ok())
        .and_then(|arr| arr.first())
        .map(|obj| resolve(doc, obj))
        .and_then(|obj| obj.as_dict().ok());

    let Some(descendant) = descendant else {
        return Widths::Cid {
            default: DEFAULT_CID_WIDTH,
            widths: HashMap::new(),
            ranges: Vec::new(),
        };
    };

    let default = descendant
        .get(b"DW")
        .ok()
        .and_then(number)
        .unwrap_or(DEFAULT_CID_WIDTH);

    let mut widths = HashMap::new();
    let mut ranges = Vec::new();
    if let Some(w) = descendant
        .get(b"W")
        .ok()
        .map(|obj| resolve(doc, obj))
        .and_then(|obj| obj.as_array().ok())
    {
        // Entries are `c [w1 w2 ...]` or `c_first c_last w`
        let mut i = 0;
        while i < w.len() {
            let Some(first) = number(resolve(doc, &w[i])).map(|n| n as u32) else {
                i += 1;
                continue;
            };
            match w.get(i + 1).map(|obj| resolve(doc, obj)) {
                Some(Object::Array(list)) => {
                    for (offset, width) in list.iter().enumerate() {
                        let code = u32::try_from(offset)
                            .ok()
                            .and_then(|offset| first.checked_add(offset));
                        if let (Some(code), Some(width)) = (code, number(resolve(doc, width))) {
                            widths.insert(code, width);
                        }
                    }
                    i += 2;
                }
                Some(last) => {
                    if let (Some(last), Some(width)) = (
                        number(last),
                        w.get(i + 2).and_then(|obj| number(resolve(doc, obj))),
                    ) {
                        let last = last as u32;
                        if last >= first {
                            ranges.push((first, last, width));
                        }
                    }
                    i += 3;
                }
                None => break,
            }
        }
    }

    Widths::Cid {
        default,
        widths,
        ranges,
    }
}
