//! ToUnicode CMap parsing for glyph decoding
//!
//! Fonts that draw text through custom or CID encodings ship a ToUnicode
//! CMap mapping character codes to Unicode. This module parses the subset
//! of the CMap language needed for that: `codespacerange`, `bfchar` and
//! `bfrange` (both the base and the array destination forms).

use lopdf::{Document, Object};
use std::collections::HashMap;

/// A parsed ToUnicode CMap mapping character codes to Unicode strings
#[derive(Debug, Default, Clone)]
pub struct ToUnicodeCMap {
    /// Direct code mappings
    pub char_map: HashMap<u32, String>,
    /// Range mappings `(start, end, base)`; `base` is the first destination string
    pub ranges: Vec<(u32, u32, String)>,
    /// Number of bytes per character code, from the codespace range
    pub code_byte_length: usize,
}

#[derive(Debug, PartialEq)]
enum Token {
    Hex(Vec<u8>),
    Open,
    Close,
    Word(String),
}

impl ToUnicodeCMap {
    /// Load the CMap referenced by a font dictionary's `/ToUnicode` entry
    pub fn from_font(doc: &Document, font: &lopdf::Dictionary) -> Option<Self> {
        let stream = match font.get(b"ToUnicode").ok()? {
            Object::Reference(id) => doc.get_object(*id).ok()?.as_stream().ok()?,
            Object::Stream(stream) => stream,
            _ => return None,
        };
        let content = stream
            .decompressed_content()
            .unwrap_or_else(|_| stream.content.clone());
        Self::parse(&content)
    }

    /// Parse a CMap program; `None` when it carries no mappings
    pub fn parse(content: &[u8]) -> Option<Self> {
        let tokens = tokenize(content);
        let mut cmap = ToUnicodeCMap {
            code_byte_length: 2,
            ..Default::default()
        };

        let mut i = 0;
        while i < tokens.len() {
            match &tokens[i] {
                Token::Word(w) if w == "begincodespacerange" => {
                    if let Some(Token::Hex(low)) = tokens.get(i + 1) {
                        if !low.is_empty() {
                            cmap.code_byte_length = low.len();
                        }
                    }
                    i = skip_to(&tokens, i, "endcodespacerange");
                }
                Token::Word(w) if w == "beginbfchar" => {
                    let end = skip_to(&tokens, i, "endbfchar");
                    for pair in tokens[i + 1..end].chunks(2) {
                        if let [Token::Hex(src), Token::Hex(dst)] = pair {
                            if let Some(code) = code_value(src) {
                                cmap.char_map.insert(code, utf16be_to_string(dst));
                            }
                        }
                    }
                    i = end;
                }
                Token::Word(w) if w == "beginbfrange" => {
                    let end = skip_to(&tokens, i, "endbfrange");
                    cmap.parse_bfrange(&tokens[i + 1..end]);
                    i = end;
                }
                _ => {}
            }
            i += 1;
        }

        if cmap.char_map.is_empty() && cmap.ranges.is_empty() {
            None
        } else {
            Some(cmap)
        }
    }

    fn parse_bfrange(&mut self, tokens: &[Token]) {
        let mut i = 0;
        while i + 2 < tokens.len() {
            let (Token::Hex(lo), Token::Hex(hi)) = (&tokens[i], &tokens[i + 1]) else {
                i += 1;
                continue;
            };
            let codes = code_value(lo).zip(code_value(hi));
            match &tokens[i + 2] {
                Token::Hex(base) => {
                    if let Some((start, end)) = codes {
                        self.ranges.push((start, end, utf16be_to_string(base)));
                    }
                    i += 3;
                }
                Token::Open => {
                    // Array form: one destination per code in the range
                    let mut next = codes.filter(|(start, end)| start <= end).map(|(s, _)| s);
                    let mut j = i + 3;
                    while j < tokens.len() && tokens[j] != Token::Close {
                        if let (Token::Hex(dst), Some(code)) = (&tokens[j], next) {
                            self.char_map.insert(code, utf16be_to_string(dst));
                            next = codes.and_then(|(_, end)| (code < end).then(|| code + 1));
                        }
                        j += 1;
                    }
                    i = j + 1;
                }
                _ => i += 3,
            }
        }
    }

    /// Look up a character code
    pub fn lookup(&self, code: u32) -> Option<String> {
        if let Some(s) = self.char_map.get(&code) {
            return Some(s.clone());
        }

        for (start, end, base) in &self.ranges {
            if (*start..=*end).contains(&code) {
                // The last UTF-16 unit of the base is incremented across the range
                let mut units: Vec<u16> = base.encode_utf16().collect();
                let last = units.pop()?;
                let bumped = u32::from(last) + (code - start);
                units.push(u16::try_from(bumped).ok()?);
                return String::from_utf16(&units).ok();
            }
        }

        None
    }
}

fn skip_to(tokens: &[Token], from: usize, keyword: &str) -> usize {
    tokens[from..]
        .iter()
        .position(|t| matches!(t, Token::Word(w) if w == keyword))
        .map(|p| from + p)
        .unwrap_or(tokens.len())
}

fn tokenize(content: &[u8]) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < content.len() {
        match content[i] {
            b'<' if content.get(i + 1) == Some(&b'<') => i += 2,
            b'>' => i += 1,
            b'<' => {
                let start = i + 1;
                let len = content[start..]
                    .iter()
                    .position(|&b| b == b'>')
                    .unwrap_or(content.len() - start);
                tokens.push(Token::Hex(decode_hex(&content[start..start + len])));
                i = start + len + 1;
            }
            b'[' => {
                tokens.push(Token::Open);
                i += 1;
            }
            b']' => {
                tokens.push(Token::Close);
                i += 1;
            }
            b'%' => {
                while i < content.len() && content[i] != b'\n' && content[i] != b'\r' {
                    i += 1;
                }
            }
            b if b.is_ascii_whitespace() => i += 1,
            _ => {
                let start = i;
                while i < content.len()
                    && !content[i].is_ascii_whitespace()
                    && !matches!(content[i], b'<' | b'>' | b'[' | b']' | b'%')
                {
                    i += 1;
                }
                tokens.push(Token::Word(
                    String::from_utf8_lossy(&content[start..i]).into_owned(),
                ));
            }
        }
    }
    tokens
}

fn decode_hex(digits: &[u8]) -> Vec<u8> {
    let nibbles: Vec<u8> = digits
        .iter()
        .filter_map(|&b| (b as char).to_digit(16).map(|d| d as u8))
        .collect();
    nibbles
        .chunks(2)
        .map(|pair| (pair[0] << 4) | pair.get(1).copied().unwrap_or(0))
        .collect()
}

/// Big-endian code value; `None` for codes wider than four bytes
fn code_value(bytes: &[u8]) -> Option<u32> {
    if bytes.len() > 4 {
        return None;
    }
    Some(bytes.iter().fold(0u32, |acc, &b| (acc << 8) | u32::from(b)))
}

fn utf16be_to_string(bytes: &[u8]) -> String {
    let units: Vec<u16> = bytes
        .chunks(2)
        .map(|c| u16::from_be_bytes([c[0], c.get(1).copied().unwrap_or(0)]))
        .collect();
    String::from_utf16_lossy(&units)
}
