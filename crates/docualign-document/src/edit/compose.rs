// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page composition: every redaction for a page first, then every insertion,
// both in edit-list order.

use std::collections::{BTreeSet, HashMap};

use docualign_core::error::{DocuAlignError, Result};
use docualign_core::types::{TextEdit, Warning};
use lopdf::content::Operation;
use lopdf::{Object, StringFormat};
use tracing::{debug, warn};

use super::redact::RedactionEngine;
use crate::fonts::{self, StandardFont};
use crate::geometry::Rect;
use crate::pdf::font_decode::FontInfo;

/// Slack allowed when checking coordinates against the media box.
pub const PAGE_TOLERANCE: f32 = 0.5;

/// An edit together with its position in the submitted batch.
#[derive(Debug, Clone, Copy)]
pub struct IndexedEdit<'e> {
    pub index: usize,
    pub edit: &'e TextEdit,
}

/// New content for one page.
#[derive(Debug, Clone)]
pub struct ComposedPage {
    pub page_num: u32,
    pub operations: Vec<Operation>,
    /// Standard fonts the insertions refer to.
    pub fonts: BTreeSet<StandardFont>,
    pub warnings: Vec<Warning>,
}

/// Composes the edits for one page.
pub struct PageCompositor<'a> {
    page_num: u32,
    media_box: Rect,
    fonts: &'a HashMap<Vec<u8>, FontInfo>,
}

impl<'a> PageCompositor<'a> {
    pub fn new(page_num: u32, media_box: Rect, fonts: &'a HashMap<Vec<u8>, FontInfo>) -> Self {
        Self {
            page_num,
            media_box,
            fonts,
        }
    }

    /// Apply `edits` (already validated, all for this page) to `operations`.
    pub fn compose(&self, operations: &[Operation], edits: &[IndexedEdit<'_>]) -> ComposedPage {
        let rects: Vec<Rect> = edits
            .iter()
            .map(|e| Rect::from_coords(e.edit.redact_coords))
            .collect();
        let redacted = RedactionEngine::new(self.fonts).apply(operations, &rects);

        let mut out = redacted.operations;
        let mut used = BTreeSet::new();
        let mut warnings = Vec::new();

        for IndexedEdit { index, edit } in edits.iter().copied() {
            if edit.new_text.is_empty() {
                continue;
            }
            let font = StandardFont::from(edit.fontname);
            let [x, y] = edit.insert_coords;
            let (text, overflow) = self.fit(index, edit);
            if let Some(warning) = overflow {
                warn!(edit_index = index, page_num = self.page_num, "Inserted text clipped at page edge");
                warnings.push(warning);
            }
            if text.is_empty() {
                continue;
            }

            used.insert(font);
            out.extend([
                Operation::new("q", vec![]),
                Operation::new("g", vec![Object::Integer(0)]),
                Operation::new("BT", vec![]),
                Operation::new(
                    "Tf",
                    vec![
                        Object::Name(font.resource_name().as_bytes().to_vec()),
                        Object::Real(edit.fontsize),
                    ],
                ),
                Operation::new("Td", vec![Object::Real(x), Object::Real(y)]),
                Operation::new(
                    "Tj",
                    vec![Object::String(fonts::encode_win_ansi(&text), StringFormat::Literal)],
                ),
                Operation::new("ET", vec![]),
                Operation::new("Q", vec![]),
            ]);
        }

        debug!(
            page_num = self.page_num,
            edits = edits.len(),
            removed = redacted.removed.len(),
            "Composed page"
        );
        ComposedPage {
            page_num: self.page_num,
            operations: out,
            fonts: used,
            warnings,
        }
    }

    /// The text that fits between the insertion point and the right edge of
    /// the media box, and an `Overflow` warning if anything was cut.
    fn fit(&self, index: usize, edit: &TextEdit) -> (String, Option<Warning>) {
        let font = StandardFont::from(edit.fontname);
        let rendered = fonts::rendered_text(&edit.new_text);
        let required = fonts::text_width(&rendered, edit.fontname, edit.fontsize);
        let available = (self.media_box.x1 - edit.insert_coords[0]).max(0.0);

        if required <= available + 1e-3 {
            return (rendered, None);
        }

        let mut width = 0.0;
        let clipped: String = rendered
            .chars()
            .take_while(|ch| {
                width += font.char_width(*ch) * edit.fontsize;
                width <= available + 1e-3
            })
            .collect();

        let warning = Warning::Overflow {
            edit_index: index,
            page_num: self.page_num,
            required_width: required,
            available_width: available,
            rendered_text: clipped.clone(),
        };
        (clipped, Some(warning))
    }
}

/// Check one edit against the document before anything is changed.
///
/// `media_box` is the target page's media box; it is only consulted once the
/// page number is known to be in range.
pub fn validate_edit(
    index: usize,
    edit: &TextEdit,
    page_count: u32,
    media_box: impl FnOnce(u32) -> Result<Rect>,
) -> Result<()> {
    if edit.page_num == 0 || edit.page_num > page_count {
        return Err(DocuAlignError::PageOutOfRange {
            page_num: edit.page_num,
            page_count,
        });
    }

    let invalid = |reason: &str| DocuAlignError::InvalidEdit {
        index,
        reason: reason.to_owned(),
    };

    if !(edit.fontsize.is_finite() && edit.fontsize > 0.0) {
        return Err(invalid("fontsize must be a positive number"));
    }
    if edit
        .redact_coords
        .iter()
        .chain(edit.insert_coords.iter())
        .any(|v| !v.is_finite())
    {
        return Err(invalid("coordinates must be finite numbers"));
    }

    let [x0, y0, x1, y1] = edit.redact_coords;
    if !(x0 < x1 && y0 < y1) {
        return Err(invalid("redact_coords must satisfy x0 < x1 and y0 < y1"));
    }

    let page = media_box(edit.page_num)?;
    if !page.contains(&Rect::new(x0, y0, x1, y1), PAGE_TOLERANCE) {
        return Err(invalid("redact_coords extend beyond the page"));
    }
    let [x, y] = edit.insert_coords;
    if !page.contains_point(x, y, PAGE_TOLERANCE) {
        return Err(invalid("insert_coords lie outside the page"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use docualign_core::types::FontName;

    use super::*;
    use crate::content::interpret;
    use crate::pdf::reader::DEFAULT_MEDIA_BOX;

    fn edit(text: &str, redact: [f32; 4], insert: [f32; 2]) -> TextEdit {
        TextEdit {
            page_num: 1,
            redact_coords: redact,
            insert_coords: insert,
            new_text: text.into(),
            fontname: FontName::Serif,
            fontsize: 10.0,
        }
    }

    fn letter(_: u32) -> Result<Rect> {
        Ok(DEFAULT_MEDIA_BOX)
    }

    #[test]
    fn redactions_come_before_insertions() {
        let fonts = HashMap::new();
        let first = edit("One", [10.0, 10.0, 50.0, 20.0], [10.0, 10.0]);
        let second = edit("Two", [10.0, 30.0, 50.0, 40.0], [10.0, 30.0]);
        let edits = [
            IndexedEdit { index: 0, edit: &first },
            IndexedEdit { index: 1, edit: &second },
        ];
        let page = PageCompositor::new(1, DEFAULT_MEDIA_BOX, &fonts).compose(&[], &edits);

        let operators: Vec<&str> = page.operations.iter().map(|op| op.operator.as_str()).collect();
        let last_fill = operators.iter().rposition(|op| *op == "f").unwrap();
        let first_text = operators.iter().position(|op| *op == "Tj").unwrap();
        assert!(last_fill < first_text);

        let resolved = HashMap::from([(
            b"DocuAlignSerif".to_vec(),
            FontInfo::standard(StandardFont::TimesRoman),
        )]);
        let texts: Vec<String> = interpret(&page.operations, &resolved)
            .runs
            .into_iter()
            .map(|r| r.text)
            .collect();
        assert_eq!(texts, vec!["One", "Two"]);
        assert_eq!(page.fonts, BTreeSet::from([StandardFont::TimesRoman]));
        assert!(page.warnings.is_empty());
    }

    #[test]
    fn overflow_is_clipped_with_warning() {
        let fonts = HashMap::new();
        let long = "W".repeat(20); // 20 × 9.44pt at size 10
        let overlong = edit(&long, [500.0, 100.0, 600.0, 120.0], [520.0, 100.0]);
        let page = PageCompositor::new(1, DEFAULT_MEDIA_BOX, &fonts)
            .compose(&[], &[IndexedEdit { index: 3, edit: &overlong }]);

        match page.warnings.as_slice() {
            [Warning::Overflow {
                edit_index,
                available_width,
                rendered_text,
                ..
            }] => {
                assert_eq!(*edit_index, 3);
                assert!((available_width - 92.0).abs() < 1e-3);
                assert_eq!(rendered_text, &"W".repeat(9));
            }
            other => panic!("expected one overflow warning, got {other:?}"),
        }
    }

    #[test]
    fn empty_text_is_a_pure_redaction() {
        let fonts = HashMap::new();
        let erase = edit("", [10.0, 10.0, 50.0, 20.0], [10.0, 10.0]);
        let page = PageCompositor::new(1, DEFAULT_MEDIA_BOX, &fonts)
            .compose(&[], &[IndexedEdit { index: 0, edit: &erase }]);
        assert!(page.operations.iter().all(|op| op.operator != "Tj"));
        assert!(page.fonts.is_empty());
    }

    #[test]
    fn validation_rules() {
        let ok = edit("x", [10.0, 700.0, 100.0, 720.0], [10.0, 700.0]);
        assert!(validate_edit(0, &ok, 1, letter).is_ok());

        let off_page = TextEdit { page_num: 5, ..ok.clone() };
        assert!(matches!(
            validate_edit(0, &off_page, 2, letter),
            Err(DocuAlignError::PageOutOfRange { page_num: 5, page_count: 2 })
        ));

        let cases = [
            TextEdit { fontsize: 0.0, ..ok.clone() },
            TextEdit { fontsize: f32::NAN, ..ok.clone() },
            edit("x", [100.0, 700.0, 10.0, 720.0], [10.0, 700.0]),
            edit("x", [10.0, 700.0, 700.0, 720.0], [10.0, 700.0]),
            edit("x", [10.0, 700.0, 100.0, 720.0], [10.0, 900.0]),
            edit("x", [10.0, 700.0, f32::INFINITY, 720.0], [10.0, 700.0]),
        ];
        for (i, case) in cases.iter().enumerate() {
            assert!(
                matches!(validate_edit(7, case, 1, letter), Err(DocuAlignError::InvalidEdit { index: 7, .. })),
                "case {i} should be rejected"
            );
        }

        let edge = edit("x", [0.0, 0.0, 612.4, 792.0], [612.0, 0.0]);
        assert!(validate_edit(0, &edge, 1, letter).is_ok());
    }
}
