// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Standard font metrics and WinAnsi encoding for inserted text.
//
// Inserted text always uses one of three non-embedded standard Type1 fonts,
// so widths come from the Adobe AFM tables below rather than from the file.

use docualign_core::error::{DocuAlignError, Result};
use docualign_core::types::FontName;
use lopdf::{Dictionary, Object};

/// Glyph widths (1/1000 em) for WinAnsi codes 0x20..=0x7E.
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556,
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556,
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556,
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584,
];

const TIMES_ROMAN_WIDTHS: [u16; 95] = [
    250, 333, 408, 500, 500, 833, 778, 180, 333, 333, 500, 564, 250, 333, 250, 278,
    500, 500, 500, 500, 500, 500, 500, 500, 500, 500, 278, 278, 564, 564, 564, 444,
    921, 722, 667, 667, 722, 611, 556, 722, 722, 333, 389, 722, 611, 889, 722, 722,
    556, 722, 667, 556, 611, 722, 722, 944, 722, 722, 611, 333, 278, 333, 469, 500,
    333, 444, 500, 444, 500, 444, 333, 500, 500, 278, 278, 500, 278, 778, 500, 500,
    500, 500, 333, 389, 278, 500, 500, 722, 500, 500, 444, 480, 200, 480, 541,
];

/// WinAnsi codes 0x80..=0x9F. `None` marks the five unassigned codes.
const WIN_ANSI_HIGH: [Option<char>; 32] = [
    Some('\u{20AC}'),
    None,
    Some('\u{201A}'),
    Some('\u{0192}'),
    Some('\u{201E}'),
    Some('\u{2026}'),
    Some('\u{2020}'),
    Some('\u{2021}'),
    Some('\u{02C6}'),
    Some('\u{2030}'),
    Some('\u{0160}'),
    Some('\u{2039}'),
    Some('\u{0152}'),
    None,
    Some('\u{017D}'),
    None,
    None,
    Some('\u{2018}'),
    Some('\u{2019}'),
    Some('\u{201C}'),
    Some('\u{201D}'),
    Some('\u{2022}'),
    Some('\u{2013}'),
    Some('\u{2014}'),
    Some('\u{02DC}'),
    Some('\u{2122}'),
    Some('\u{0161}'),
    Some('\u{203A}'),
    Some('\u{0153}'),
    None,
    Some('\u{017E}'),
    Some('\u{0178}'),
];

/// Replacement for characters WinAnsi cannot encode.
pub const REPLACEMENT_CHAR: char = '?';

/// One of the three standard fonts used for insertion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StandardFont {
    TimesRoman,
    Helvetica,
    Courier,
}

impl From<FontName> for StandardFont {
    fn from(name: FontName) -> Self {
        match name {
            FontName::Serif => Self::TimesRoman,
            FontName::Sans => Self::Helvetica,
            FontName::Mono => Self::Courier,
        }
    }
}

impl StandardFont {
    /// PostScript name written as `/BaseFont`.
    pub fn base_font(&self) -> &'static str {
        match self {
            Self::TimesRoman => "Times-Roman",
            Self::Helvetica => "Helvetica",
            Self::Courier => "Courier",
        }
    }

    /// Key under the page's `/Font` resources. Prefixed so it cannot collide
    /// with names already present in scanned documents.
    pub fn resource_name(&self) -> &'static str {
        match self {
            Self::TimesRoman => "DocuAlignSerif",
            Self::Helvetica => "DocuAlignSans",
            Self::Courier => "DocuAlignMono",
        }
    }

    /// Match a `/BaseFont` from an existing document to the closest standard
    /// metrics. Subset prefixes (`ABCDEF+`) are ignored.
    pub fn from_base_font(name: &str) -> Option<Self> {
        let name = match name.split_once('+') {
            Some((prefix, rest)) if prefix.len() == 6 => rest,
            _ => name,
        };
        let lower = name.to_ascii_lowercase();
        if lower.contains("courier") || lower.contains("mono") {
            Some(Self::Courier)
        } else if lower.contains("times") || (lower.contains("serif") && !lower.contains("sans")) {
            Some(Self::TimesRoman)
        } else if lower.contains("helvetica") || lower.contains("arial") || lower.contains("sans") {
            Some(Self::Helvetica)
        } else {
            None
        }
    }

    /// Ascender height at size 1.
    pub fn ascent(&self) -> f32 {
        match self {
            Self::TimesRoman => 0.683,
            Self::Helvetica => 0.718,
            Self::Courier => 0.629,
        }
    }

    /// Descender depth at size 1 (negative).
    pub fn descent(&self) -> f32 {
        match self {
            Self::TimesRoman => -0.217,
            Self::Helvetica => -0.207,
            Self::Courier => -0.157,
        }
    }

    fn average_width(&self) -> u16 {
        match self {
            Self::TimesRoman => 500,
            Self::Helvetica => 556,
            Self::Courier => 600,
        }
    }

    /// Width of a WinAnsi code in 1/1000 em.
    pub fn code_width(&self, code: u8) -> u16 {
        if let Self::Courier = self {
            return 600;
        }
        let table = match self {
            Self::TimesRoman => &TIMES_ROMAN_WIDTHS,
            _ => &HELVETICA_WIDTHS,
        };
        match code {
            0x20..=0x7E => table[(code - 0x20) as usize],
            0xA0 => table[0],
            _ => match decode_win_ansi(code).and_then(base_letter) {
                Some(base) => table[(base as u8 - 0x20) as usize],
                None => self.average_width(),
            },
        }
    }

    /// Advance of `ch` at size 1, as it will be rendered.
    pub fn char_width(&self, ch: char) -> f32 {
        f32::from(self.code_width(encode_char(ch))) / 1000.0
    }

    /// The `/Type1` font dictionary for this font.
    pub fn resource_dictionary(&self) -> Dictionary {
        let mut dict = Dictionary::new();
        dict.set("Type", Object::Name(b"Font".to_vec()));
        dict.set("Subtype", Object::Name(b"Type1".to_vec()));
        dict.set("BaseFont", Object::Name(self.base_font().as_bytes().to_vec()));
        dict.set("Encoding", Object::Name(b"WinAnsiEncoding".to_vec()));
        dict
    }
}

/// Resolve a font name from a request. Only serif, sans and mono are accepted.
pub fn resolve_font(name: &str) -> Result<StandardFont> {
    name.parse::<FontName>().map(StandardFont::from)
}

/// Rendered width of `text` in points.
pub fn text_width(text: &str, font: FontName, fontsize: f32) -> f32 {
    let font = StandardFont::from(font);
    text.chars().map(|ch| font.char_width(ch)).sum::<f32>() * fontsize
}

/// Map a WinAnsi byte to its character.
pub fn decode_win_ansi(code: u8) -> Option<char> {
    match code {
        0x00..=0x7F => Some(code as char),
        0x80..=0x9F => WIN_ANSI_HIGH[(code - 0x80) as usize],
        _ => Some(char::from(code)),
    }
}

/// WinAnsi code for `ch`. Whitespace outside WinAnsi becomes a space;
/// anything else becomes [`REPLACEMENT_CHAR`].
pub fn encode_char(ch: char) -> u8 {
    match ch as u32 {
        0x20..=0x7E | 0xA0..=0xFF => ch as u8,
        _ => {
            if let Some(pos) = WIN_ANSI_HIGH.iter().position(|c| *c == Some(ch)) {
                0x80 + pos as u8
            } else if ch.is_whitespace() {
                b' '
            } else {
                REPLACEMENT_CHAR as u8
            }
        }
    }
}

/// Encode `text` for a `Tj` operand.
pub fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars().map(encode_char).collect()
}

/// `text` as it will actually appear after WinAnsi encoding.
pub fn rendered_text(text: &str) -> String {
    text.chars()
        .map(|ch| decode_win_ansi(encode_char(ch)).unwrap_or(REPLACEMENT_CHAR))
        .collect()
}

fn base_letter(ch: char) -> Option<char> {
    let base = match ch {
        'À'..='Å' => 'A',
        'Ç' => 'C',
        'È'..='Ë' => 'E',
        'Ì'..='Ï' => 'I',
        'Ñ' => 'N',
        'Ò'..='Ö' | 'Ø' => 'O',
        'Ù'..='Ü' => 'U',
        'Ý' | 'Ÿ' => 'Y',
        'à'..='å' => 'a',
        'ç' => 'c',
        'è'..='ë' => 'e',
        'ì'..='ï' => 'i',
        'ñ' => 'n',
        'ò'..='ö' | 'ø' => 'o',
        'ù'..='ü' => 'u',
        'ý' | 'ÿ' => 'y',
        'Š' => 'S',
        'š' => 's',
        'Ž' => 'Z',
        'ž' => 'z',
        _ => return None,
    };
    Some(base)
}
