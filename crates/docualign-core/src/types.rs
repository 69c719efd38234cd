// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types: text blocks, edits, warnings, and document records.
//
// Field names and coordinate order on the serialised types are a wire
// contract with the editing client and must not change.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DocuAlignError;

/// Unique identifier for an uploaded document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentId(pub Uuid);

impl DocumentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for DocumentId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for DocumentId {
    type Err = DocuAlignError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| DocuAlignError::DocumentNotFound(s.to_owned()))
    }
}

/// Logical font selection for inserted text.
///
/// A closed set: anything else is rejected with
/// [`DocuAlignError::FontUnsupported`] rather than defaulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontName {
    Serif,
    Sans,
    Mono,
}

impl FontName {
    pub const ALL: [FontName; 3] = [FontName::Serif, FontName::Sans, FontName::Mono];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Serif => "serif",
            Self::Sans => "sans",
            Self::Mono => "mono",
        }
    }
}

impl FromStr for FontName {
    type Err = DocuAlignError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "serif" => Ok(Self::Serif),
            "sans" => Ok(Self::Sans),
            "mono" => Ok(Self::Mono),
            _ => Err(DocuAlignError::FontUnsupported(s.to_owned())),
        }
    }
}

impl std::fmt::Display for FontName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A region of recognised text on one page.
///
/// Coordinates are PDF points with the origin at the bottom-left of the page;
/// `(x0, y0)` is the lower-left corner and `(x1, y1)` the upper-right.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextBlock {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
    pub text: String,
    /// 1-indexed page number.
    pub page_num: u32,
}

impl TextBlock {
    /// Bounding box as `[x0, y0, x1, y1]`.
    pub fn bbox(&self) -> [f32; 4] {
        [self.x0, self.y0, self.x1, self.y1]
    }
}

/// One edit as received over the wire.
///
/// `fontname` is free text here; it only becomes a [`FontName`] once the
/// request is validated into a [`TextEdit`]. Font fields may be omitted when
/// the enclosing [`EditBatchRequest`] supplies batch-wide defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditRequest {
    pub page_num: u32,
    pub redact_coords: [f32; 4],
    pub insert_coords: [f32; 2],
    pub new_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fontname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fontsize: Option<f32>,
}

/// A batch of edits for one document, optionally carrying a font and size
/// shared by every edit that does not name its own.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EditBatchRequest {
    pub edits: Vec<EditRequest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fontname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fontsize: Option<f32>,
}

impl EditBatchRequest {
    /// Resolve batch defaults and font names into validated [`TextEdit`]s.
    ///
    /// Fails on the first edit whose font does not resolve or that has no
    /// font size from either level.
    pub fn into_edits(self) -> Result<Vec<TextEdit>, DocuAlignError> {
        let batch_font = self.fontname;
        let batch_size = self.fontsize;

        self.edits
            .into_iter()
            .enumerate()
            .map(|(index, edit)| {
                let fontname = edit
                    .fontname
                    .or_else(|| batch_font.clone())
                    .ok_or_else(|| DocuAlignError::InvalidEdit {
                        index,
                        reason: "no fontname given".into(),
                    })?;
                let fontsize =
                    edit.fontsize
                        .or(batch_size)
                        .ok_or_else(|| DocuAlignError::InvalidEdit {
                            index,
                            reason: "no fontsize given".into(),
                        })?;

                Ok(TextEdit {
                    page_num: edit.page_num,
                    redact_coords: edit.redact_coords,
                    insert_coords: edit.insert_coords,
                    new_text: edit.new_text,
                    fontname: fontname.parse()?,
                    fontsize,
                })
            })
            .collect()
    }
}

impl From<Vec<EditRequest>> for EditBatchRequest {
    fn from(edits: Vec<EditRequest>) -> Self {
        Self {
            edits,
            fontname: None,
            fontsize: None,
        }
    }
}

/// A single edit: erase `redact_coords`, then write `new_text` with its
/// baseline starting at `insert_coords`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextEdit {
    /// 1-indexed page number.
    pub page_num: u32,
    /// `[x0, y0, x1, y1]` in PDF points.
    pub redact_coords: [f32; 4],
    /// `[x, y]` baseline origin in PDF points.
    pub insert_coords: [f32; 2],
    pub new_text: String,
    pub fontname: FontName,
    /// Font size in points.
    pub fontsize: f32,
}

impl From<TextEdit> for EditRequest {
    fn from(edit: TextEdit) -> Self {
        Self {
            page_num: edit.page_num,
            redact_coords: edit.redact_coords,
            insert_coords: edit.insert_coords,
            new_text: edit.new_text,
            fontname: Some(edit.fontname.as_str().to_owned()),
            fontsize: Some(edit.fontsize),
        }
    }
}

/// Non-fatal conditions attached to an otherwise successful result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Warning {
    /// A page could not be recognised; it contributed no blocks.
    PartialExtraction { page_num: u32, reason: String },
    /// Inserted text ran past the right edge of the page and was clipped.
    Overflow {
        edit_index: usize,
        page_num: u32,
        required_width: f32,
        available_width: f32,
        rendered_text: String,
    },
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PartialExtraction { page_num, reason } => {
                write!(f, "page {page_num}: no text extracted ({reason})")
            }
            Self::Overflow {
                edit_index,
                page_num,
                required_width,
                available_width,
                rendered_text,
            } => write!(
                f,
                "edit #{edit_index} on page {page_num}: text needs {required_width:.1}pt \
                 but only {available_width:.1}pt fit; rendered \"{rendered_text}\""
            ),
        }
    }
}

/// Result of a block extraction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub blocks: Vec<TextBlock>,
    pub warnings: Vec<Warning>,
}

impl ExtractionResult {
    /// Block texts one per line in their current order, with a form feed
    /// wherever the page number changes.
    pub fn plain_text(&self) -> String {
        let mut text = String::new();
        let mut page = None;
        for block in &self.blocks {
            match page {
                Some(current) if current != block.page_num => text.push('\u{c}'),
                Some(_) => text.push('\n'),
                None => {}
            }
            page = Some(block.page_num);
            text.push_str(&block.text);
        }
        text
    }
}

/// Metadata about an uploaded document, keyed by [`DocumentId`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: DocumentId,
    pub original_filename: String,
    /// Opaque key into the byte store.
    pub stored_key: String,
    pub content_type: String,
    pub uploaded_at: DateTime<Utc>,
}

impl DocumentRecord {
    /// Create a record for a freshly stored document, stamped with the
    /// current time.
    pub fn new(
        original_filename: impl Into<String>,
        stored_key: impl Into<String>,
        content_type: impl Into<String>,
    ) -> Self {
        Self {
            id: DocumentId::new(),
            original_filename: original_filename.into(),
            stored_key: stored_key.into(),
            content_type: content_type.into(),
            uploaded_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn font_name_parses_closed_set_only() {
        assert_eq!("serif".parse::<FontName>().unwrap(), FontName::Serif);
        assert_eq!("sans".parse::<FontName>().unwrap(), FontName::Sans);
        assert_eq!("mono".parse::<FontName>().unwrap(), FontName::Mono);

        for loose in [" serif ", "SERIF", "Sans", "mono\n"] {
            assert!(
                matches!(loose.parse::<FontName>(), Err(DocuAlignError::FontUnsupported(_))),
                "{loose:?} must be rejected"
            );
        }
        // Parsing agrees with the wire format.
        assert!(serde_json::from_str::<FontName>(r#""Serif""#).is_err());

        match "Comic Sans".parse::<FontName>() {
            Err(DocuAlignError::FontUnsupported(name)) => assert_eq!(name, "Comic Sans"),
            other => panic!("expected FontUnsupported, got {other:?}"),
        }
    }

    #[test]
    fn text_block_wire_format() {
        let block = TextBlock {
            x0: 10.0,
            y0: 700.0,
            x1: 100.0,
            y1: 720.0,
            text: "Hello".into(),
            page_num: 1,
        };
        let json = serde_json::to_value(&block).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "x0": 10.0, "y0": 700.0, "x1": 100.0, "y1": 720.0,
                "text": "Hello", "page_num": 1
            })
        );
    }

    #[test]
    fn batch_defaults_fill_missing_font_fields() {
        let json = r#"{
            "edits": [
                {"page_num": 1, "redact_coords": [10, 700, 100, 720],
                 "insert_coords": [10, 700], "new_text": "Goodbye"},
                {"page_num": 2, "redact_coords": [0, 0, 5, 5],
                 "insert_coords": [0, 0], "new_text": "x",
                 "fontname": "mono", "fontsize": 8}
            ],
            "fontname": "serif",
            "fontsize": 10
        }"#;
        let batch: EditBatchRequest = serde_json::from_str(json).unwrap();
        let edits = batch.into_edits().unwrap();

        assert_eq!(edits[0].fontname, FontName::Serif);
        assert_eq!(edits[0].fontsize, 10.0);
        assert_eq!(edits[1].fontname, FontName::Mono);
        assert_eq!(edits[1].fontsize, 8.0);
    }

    #[test]
    fn batch_rejects_unknown_font() {
        let batch = EditBatchRequest {
            edits: vec![EditRequest {
                page_num: 1,
                redact_coords: [0.0, 0.0, 1.0, 1.0],
                insert_coords: [0.0, 0.0],
                new_text: "x".into(),
                fontname: Some("wingdings".into()),
                fontsize: Some(10.0),
            }],
            ..Default::default()
        };
        assert!(matches!(
            batch.into_edits(),
            Err(DocuAlignError::FontUnsupported(_))
        ));
    }

    #[test]
    fn batch_requires_a_font_size_somewhere() {
        let batch = EditBatchRequest {
            edits: vec![EditRequest {
                page_num: 1,
                redact_coords: [0.0, 0.0, 1.0, 1.0],
                insert_coords: [0.0, 0.0],
                new_text: "x".into(),
                fontname: Some("sans".into()),
                fontsize: None,
            }],
            ..Default::default()
        };
        assert!(matches!(
            batch.into_edits(),
            Err(DocuAlignError::InvalidEdit { index: 0, .. })
        ));
    }

    #[test]
    fn plain_text_breaks_pages_with_form_feeds() {
        let block = |text: &str, page_num| TextBlock {
            x0: 0.0,
            y0: 0.0,
            x1: 1.0,
            y1: 1.0,
            text: text.into(),
            page_num,
        };
        let result = ExtractionResult {
            blocks: vec![block("a", 1), block("b", 1), block("c", 3)],
            warnings: vec![],
        };
        assert_eq!(result.plain_text(), "a\nb\u{c}c");
        assert_eq!(ExtractionResult::default().plain_text(), "");
    }

    #[test]
    fn warnings_are_tagged_by_kind() {
        let warning = Warning::PartialExtraction {
            page_num: 3,
            reason: "unsupported image filter".into(),
        };
        let json = serde_json::to_value(&warning).unwrap();
        assert_eq!(json["kind"], "PartialExtraction");
        assert_eq!(json["page_num"], 3);
    }
}
