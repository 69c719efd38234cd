// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// `/ToUnicode` CMap parsing (`bfchar` and `bfrange` sections).
//
// Malformed entries are skipped rather than failing the font: a partially
// decodable text layer is still useful for block extraction.

use std::collections::HashMap;

/// Character code to Unicode mapping from a `/ToUnicode` stream.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToUnicodeMap {
    mappings: HashMap<u32, String>,
}

#[derive(Debug, PartialEq)]
enum Token<'a> {
    Hex(Vec<u8>),
    ArrayStart,
    ArrayEnd,
    Word(&'a str),
}

impl ToUnicodeMap {
    pub fn parse(data: &[u8]) -> Self {
        let text = String::from_utf8_lossy(data);
        let tokens = tokenize(&text);
        let mut mappings = HashMap::new();

        let mut i = 0;
        while i < tokens.len() {
            match tokens[i] {
                Token::Word("beginbfchar") => i = parse_bfchar(&tokens, i + 1, &mut mappings),
                Token::Word("beginbfrange") => i = parse_bfrange(&tokens, i + 1, &mut mappings),
                _ => i += 1,
            }
        }

        Self { mappings }
    }

    pub fn lookup(&self, code: u32) -> Option<&str> {
        self.mappings.get(&code).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }
}

// -- Sections ---------------------------------------------------------------

fn parse_bfchar(tokens: &[Token<'_>], mut i: usize, out: &mut HashMap<u32, String>) -> usize {
    while i + 1 < tokens.len() {
        match (&tokens[i], &tokens[i + 1]) {
            (Token::Hex(src), Token::Hex(dst)) => {
                out.insert(code_of(src), utf16_be(dst));
                i += 2;
            }
            (Token::Word("endbfchar"), _) => return i + 1,
            _ => i += 1,
        }
    }
    tokens.len()
}

fn parse_bfrange(tokens: &[Token<'_>], mut i: usize, out: &mut HashMap<u32, String>) -> usize {
    while i + 2 < tokens.len() {
        let (lo, hi) = match (&tokens[i], &tokens[i + 1]) {
            (Token::Word("endbfrange"), _) => return i + 1,
            (Token::Hex(lo), Token::Hex(hi)) => (code_of(lo), code_of(hi)),
            _ => {
                i += 1;
                continue;
            }
        };
        // Guard against absurd ranges in broken files.
        if hi < lo || hi - lo > 0xFFFF {
            i += 3;
            continue;
        }

        match &tokens[i + 2] {
            Token::Hex(dst) => {
                let mut units = utf16_units(dst);
                for code in lo..=hi {
                    out.insert(code, String::from_utf16_lossy(&units));
                    if let Some(last) = units.last_mut() {
                        *last = last.wrapping_add(1);
                    }
                }
                i += 3;
            }
            Token::ArrayStart => {
                let mut j = i + 3;
                let mut code = lo;
                while j < tokens.len() && tokens[j] != Token::ArrayEnd {
                    if let Token::Hex(dst) = &tokens[j] {
                        if code <= hi {
                            out.insert(code, utf16_be(dst));
                        }
                        code += 1;
                    }
                    j += 1;
                }
                i = j + 1;
            }
            _ => i += 3,
        }
    }
    tokens.len()
}

// -- Lexing -----------------------------------------------------------------

fn tokenize(text: &str) -> Vec<Token<'_>> {
    let bytes = text.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'%' => {
                while i < bytes.len() && bytes[i] != b'\n' && bytes[i] != b'\r' {
                    i += 1;
                }
            }
            b'<' if bytes.get(i + 1) == Some(&b'<') => i += 2,
            b'>' if bytes.get(i + 1) == Some(&b'>') => i += 2,
            b'<' => {
                let start = i + 1;
                let end = text[start..].find('>').map_or(bytes.len(), |p| start + p);
                tokens.push(Token::Hex(decode_hex(&text[start..end])));
                i = end + 1;
            }
            b'[' => {
                tokens.push(Token::ArrayStart);
                i += 1;
            }
            b']' => {
                tokens.push(Token::ArrayEnd);
                i += 1;
            }
            b if b.is_ascii_whitespace() => i += 1,
            _ => {
                let start = i;
                while i < bytes.len()
                    && !bytes[i].is_ascii_whitespace()
                    && !matches!(bytes[i], b'<' | b'>' | b'[' | b']' | b'%')
                {
                    i += 1;
                }
                if i == start {
                    i += 1;
                } else {
                    tokens.push(Token::Word(&text[start..i]));
                }
            }
        }
    }
    tokens
}

fn decode_hex(hex: &str) -> Vec<u8> {
    let digits: Vec<u8> = hex
        .bytes()
        .filter_map(|b| (b as char).to_digit(16).map(|d| d as u8))
        .collect();
    // An odd trailing digit is padded with 0.
    digits
        .chunks(2)
        .map(|pair| (pair[0] << 4) | pair.get(1).copied().unwrap_or(0))
        .collect()
}

fn code_of(bytes: &[u8]) -> u32 {
    bytes.iter().fold(0u32, |acc, b| (acc << 8) | u32::from(*b))
}

fn utf16_units(bytes: &[u8]) -> Vec<u16> {
    bytes
        .chunks(2)
        .map(|pair| match pair {
            [hi, lo] => u16::from_be_bytes([*hi, *lo]),
            [single] => u16::from(*single),
            _ => 0,
        })
        .collect()
}

fn utf16_be(bytes: &[u8]) -> String {
    String::from_utf16_lossy(&utf16_units(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &[u8] = br#"/CIDInit /ProcSet findresource begin
12 dict begin
begincmap
/CMapName /Adobe-Identity-UCS def
1 begincodespacerange
<0000> <FFFF>
endcodespacerange
2 beginbfchar
<0003> <0020>
<0011> <0048>
endbfchar
2 beginbfrange
<0044> <0046> <0061>
<0050> <0051> [<00660069> <00660066>]
endbfrange
endcmap
CMapName currentdict /CMap defineresource pop
end
end"#;

    #[test]
    fn parses_bfchar_and_bfrange() {
        let map = ToUnicodeMap::parse(SAMPLE);
        assert_eq!(map.lookup(0x03), Some(" "));
        assert_eq!(map.lookup(0x11), Some("H"));
        assert_eq!(map.lookup(0x44), Some("a"));
        assert_eq!(map.lookup(0x46), Some("c"));
        assert_eq!(map.lookup(0x50), Some("fi"));
        assert_eq!(map.lookup(0x51), Some("ff"));
        assert_eq!(map.lookup(0x47), None);
        assert_eq!(map.len(), 7);
    }

    #[test]
    fn entries_on_one_line_and_surrogates() {
        let map = ToUnicodeMap::parse(b"1 beginbfchar <01> <D835DC00> endbfchar");
        assert_eq!(map.lookup(1), Some("\u{1D400}"));
    }

    #[test]
    fn garbage_yields_empty_map() {
        let map = ToUnicodeMap::parse(b"not a cmap <<>> ]]");
        assert!(map.is_empty());
    }
}
