// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Decoding of fonts already present in a document: glyph widths for
// positioning and text for extraction.

use std::collections::HashMap;

use lopdf::{Dictionary, Document, Object};

use super::cmap::ToUnicodeMap;
use super::{get, get_dict, name, number, resolve, stream_data};
use crate::fonts::{StandardFont, decode_win_ansi};

const FALLBACK_ASCENT: f32 = 0.8;
const FALLBACK_DESCENT: f32 = -0.2;

/// One decoded character code from a string operand.
#[derive(Debug, Clone, PartialEq)]
pub struct Glyph {
    /// Horizontal displacement at size 1, in text space units.
    pub width: f32,
    /// Single-byte code 32, which also receives word spacing (`Tw`).
    pub is_word_space: bool,
    /// Extracted text; empty when the code has no known Unicode value.
    pub text: String,
}

#[derive(Debug, Clone, PartialEq)]
enum Widths {
    Simple {
        first_char: u32,
        widths: Vec<f32>,
        missing_width: f32,
        standard: Option<StandardFont>,
    },
    Composite {
        default_width: f32,
        widths: HashMap<u32, f32>,
    },
}

/// What the engine needs to know about a page font.
#[derive(Debug, Clone, PartialEq)]
pub struct FontInfo {
    widths: Widths,
    to_unicode: Option<ToUnicodeMap>,
    ascent: f32,
    descent: f32,
}

impl Default for FontInfo {
    /// Helvetica metrics, used when `Tf` names a font the page does not define.
    fn default() -> Self {
        Self::standard(StandardFont::Helvetica)
    }
}

impl FontInfo {
    pub fn standard(font: StandardFont) -> Self {
        Self {
            widths: Widths::Simple {
                first_char: 0,
                widths: Vec::new(),
                missing_width: 0.5,
                standard: Some(font),
            },
            to_unicode: None,
            ascent: font.ascent(),
            descent: font.descent(),
        }
    }

    /// Read a font dictionary from `doc`.
    pub fn from_dict(doc: &Document, dict: &Dictionary) -> Self {
        let subtype = get(doc, dict, b"Subtype").and_then(name).unwrap_or_default();
        let base_font = get(doc, dict, b"BaseFont")
            .and_then(name)
            .map(|n| String::from_utf8_lossy(n).into_owned())
            .unwrap_or_default();
        let standard = StandardFont::from_base_font(&base_font);

        let to_unicode = match get(doc, dict, b"ToUnicode") {
            Some(Object::Stream(stream)) => stream_data(stream)
                .ok()
                .map(|data| ToUnicodeMap::parse(&data))
                .filter(|map| !map.is_empty()),
            _ => None,
        };

        let (widths, descriptor) = if subtype == b"Type0" {
            let descendant = match get(doc, dict, b"DescendantFonts") {
                Some(Object::Array(items)) => items.first().map(|obj| resolve(doc, obj)),
                _ => None,
            };
            match descendant {
                Some(Object::Dictionary(cid_font)) => (
                    composite_widths(doc, cid_font),
                    get_dict(doc, cid_font, b"FontDescriptor"),
                ),
                _ => (
                    Widths::Composite {
                        default_width: 1.0,
                        widths: HashMap::new(),
                    },
                    None,
                ),
            }
        } else {
            (
                simple_widths(doc, dict, standard),
                get_dict(doc, dict, b"FontDescriptor"),
            )
        };

        let (fallback_ascent, fallback_descent) = standard
            .map(|font| (font.ascent(), font.descent()))
            .unwrap_or((FALLBACK_ASCENT, FALLBACK_DESCENT));
        let ascent = descriptor
            .and_then(|d| get(doc, d, b"Ascent"))
            .and_then(number)
            .map(|a| a / 1000.0)
            .filter(|a| *a > 0.0)
            .unwrap_or(fallback_ascent);
        let descent = descriptor
            .and_then(|d| get(doc, d, b"Descent"))
            .and_then(number)
            .map(|d| -(d / 1000.0).abs())
            .filter(|d| *d < 0.0)
            .unwrap_or(fallback_descent);

        Self {
            widths,
            to_unicode,
            ascent,
            descent,
        }
    }

    pub fn ascent(&self) -> f32 {
        self.ascent
    }

    pub fn descent(&self) -> f32 {
        self.descent
    }

    pub fn is_composite(&self) -> bool {
        matches!(self.widths, Widths::Composite { .. })
    }

    /// Split a string operand into glyphs.
    ///
    /// Composite fonts are read as two-byte codes (`Identity-H`); a trailing
    /// odd byte is ignored.
    pub fn decode(&self, bytes: &[u8]) -> Vec<Glyph> {
        match &self.widths {
            Widths::Simple { .. } => bytes
                .iter()
                .map(|&byte| {
                    let code = u32::from(byte);
                    let text = match self.lookup_unicode(code) {
                        Some(text) => text.to_owned(),
                        None => decode_win_ansi(byte).map(String::from).unwrap_or_default(),
                    };
                    Glyph {
                        width: self.width(code),
                        is_word_space: byte == b' ',
                        text,
                    }
                })
                .collect(),
            Widths::Composite { .. } => bytes
                .chunks_exact(2)
                .map(|pair| {
                    let code = (u32::from(pair[0]) << 8) | u32::from(pair[1]);
                    Glyph {
                        width: self.width(code),
                        is_word_space: false,
                        text: self.lookup_unicode(code).unwrap_or_default().to_owned(),
                    }
                })
                .collect(),
        }
    }

    fn lookup_unicode(&self, code: u32) -> Option<&str> {
        self.to_unicode.as_ref().and_then(|map| map.lookup(code))
    }

    fn width(&self, code: u32) -> f32 {
        match &self.widths {
            Widths::Simple {
                first_char,
                widths,
                missing_width,
                standard,
            } => {
                if let Some(w) = code
                    .checked_sub(*first_char)
                    .and_then(|i| widths.get(i as usize))
                {
                    return *w;
                }
                match (standard, u8::try_from(code)) {
                    (Some(font), Ok(byte)) => f32::from(font.code_width(byte)) / 1000.0,
                    _ => *missing_width,
                }
            }
            Widths::Composite {
                default_width,
                widths,
            } => widths.get(&code).copied().unwrap_or(*default_width),
        }
    }
}

fn simple_widths(doc: &Document, dict: &Dictionary, standard: Option<StandardFont>) -> Widths {
    let first_char = get(doc, dict, b"FirstChar")
        .and_then(number)
        .map(|n| n.max(0.0) as u32)
        .unwrap_or(0);
    let widths: Vec<f32> = match get(doc, dict, b"Widths") {
        Some(Object::Array(items)) => items
            .iter()
            .map(|obj| number(resolve(doc, obj)).unwrap_or(0.0) / 1000.0)
            .collect(),
        _ => Vec::new(),
    };
    let missing_width = get_dict(doc, dict, b"FontDescriptor")
        .and_then(|d| get(doc, d, b"MissingWidth"))
        .and_then(number)
        .map(|w| w / 1000.0)
        .unwrap_or(if widths.is_empty() { 0.5 } else { 0.0 });

    Widths::Simple {
        first_char,
        widths,
        missing_width,
        standard,
    }
}

/// Parse `/DW` and `/W` from a CIDFont. `/W` mixes two forms:
/// `c [w1 w2 ...]` and `c_first c_last w`.
fn composite_widths(doc: &Document, cid_font: &Dictionary) -> Widths {
    let default_width = get(doc, cid_font, b"DW")
        .and_then(number)
        .map(|w| w / 1000.0)
        .unwrap_or(1.0);

    let mut widths = HashMap::new();
    if let Some(Object::Array(items)) = get(doc, cid_font, b"W") {
        let items: Vec<&Object> = items.iter().map(|obj| resolve(doc, obj)).collect();
        let mut i = 0;
        while i + 1 < items.len() {
            let Some(first) = number(items[i]) else {
                i += 1;
                continue;
            };
            let first = first.max(0.0) as u32;
            match items[i + 1] {
                Object::Array(run) => {
                    for (offset, w) in run.iter().enumerate() {
                        if let Some(w) = number(resolve(doc, w)) {
                            widths.insert(first + offset as u32, w / 1000.0);
                        }
                    }
                    i += 2;
                }
                last => {
                    let (Some(last), Some(w)) = (number(last), items.get(i + 2).and_then(|o| number(o)))
                    else {
                        break;
                    };
                    let last = last.max(0.0) as u32;
                    // Ranges beyond the two-byte code space are malformed.
                    for code in first..=last.min(first.saturating_add(0xFFFF)) {
                        widths.insert(code, w / 1000.0);
                    }
                    i += 3;
                }
            }
        }
    }

    Widths::Composite {
        default_width,
        widths,
    }
}
