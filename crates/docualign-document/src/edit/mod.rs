// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Editing pipeline: plan, validate, redact, insert, rebuild.
//
// `apply_edits` is all-or-nothing. Every edit is validated and every touched
// page is composed before the document is modified, so any error leaves the
// caller with nothing but the error.

pub mod compose;
pub mod planner;
pub mod redact;

use std::collections::BTreeMap;

use docualign_core::error::{DocuAlignError, Result};
use docualign_core::types::{TextEdit, Warning};
use tracing::{info, instrument};

use crate::pdf::reader::PdfReader;
use crate::pdf::rebuild::PdfRebuilder;
use compose::{ComposedPage, IndexedEdit, PageCompositor, validate_edit};

/// A rebuilt PDF and the non-fatal warnings raised while building it.
#[derive(Debug, Clone, PartialEq)]
pub struct EditOutcome {
    pub pdf: Vec<u8>,
    /// Sorted by edit index.
    pub warnings: Vec<Warning>,
}

/// Apply `edits` to the PDF in `pdf_bytes` and return the new document.
#[instrument(skip_all, fields(bytes_len = pdf_bytes.len(), edits = edits.len()))]
pub fn apply_edits(pdf_bytes: &[u8], edits: &[TextEdit]) -> Result<EditOutcome> {
    let reader = PdfReader::from_bytes(pdf_bytes)?;
    let page_count = reader.page_count();

    for (index, edit) in edits.iter().enumerate() {
        validate_edit(index, edit, page_count, |page_num| {
            reader.page_info(page_num).map(|info| info.media_box)
        })?;
    }

    let mut by_page: BTreeMap<u32, Vec<IndexedEdit<'_>>> = BTreeMap::new();
    for (index, edit) in edits.iter().enumerate() {
        by_page
            .entry(edit.page_num)
            .or_default()
            .push(IndexedEdit { index, edit });
    }

    let composed = by_page
        .iter()
        .map(|(&page_num, page_edits)| -> Result<ComposedPage> {
            let info = reader.page_info(page_num)?;
            let operations = reader.page_operations(info.id).map_err(|reason| {
                DocuAlignError::RebuildFailure(format!("page {page_num}: {reason}"))
            })?;
            let fonts = reader.page_fonts(info.id);
            Ok(PageCompositor::new(page_num, info.media_box, &fonts).compose(&operations, page_edits))
        })
        .collect::<Result<Vec<ComposedPage>>>()?;

    let mut warnings = Vec::new();
    let mut rebuilder = PdfRebuilder::new(reader);
    for page in composed {
        rebuilder.replace_page_content(page.page_num, page.operations, &page.fonts)?;
        warnings.extend(page.warnings);
    }
    let pdf = rebuilder.finish()?;

    warnings.sort_by_key(|warning| match warning {
        Warning::Overflow { edit_index, .. } => *edit_index,
        Warning::PartialExtraction { .. } => usize::MAX,
    });

    info!(
        pages_edited = by_page.len(),
        warnings = warnings.len(),
        "Edits applied"
    );
    Ok(EditOutcome { pdf, warnings })
}

#[cfg(test)]
mod tests {
    use docualign_core::types::FontName;

    use super::*;
    use crate::extract::text_layer::TextLayerRecognizer;
    use crate::extract::{BlockExtractor, PageRecognizer};
    use crate::testing;

    fn edit(page_num: u32, redact: [f32; 4], insert: [f32; 2], text: &str) -> TextEdit {
        TextEdit {
            page_num,
            redact_coords: redact,
            insert_coords: insert,
            new_text: text.into(),
            fontname: FontName::Serif,
            fontsize: 10.0,
        }
    }

    fn texts(pdf: &[u8]) -> Vec<(u32, String)> {
        let reader = PdfReader::from_bytes(pdf).unwrap();
        let recognizer = TextLayerRecognizer;
        reader
            .snapshots(false)
            .unwrap()
            .iter()
            .flat_map(|snapshot| {
                recognizer
                    .recognize(snapshot)
                    .unwrap()
                    .into_iter()
                    .map(|b| (b.page_num, b.text))
            })
            .collect()
    }

    fn blocks_in(pdf: &[u8], page_num: u32, area: [f32; 4]) -> Vec<String> {
        let reader = PdfReader::from_bytes(pdf).unwrap();
        let snapshot = reader.snapshot(page_num, false).unwrap();
        let region = crate::geometry::Rect::from_coords(area);
        TextLayerRecognizer
            .recognize(&snapshot)
            .unwrap()
            .into_iter()
            .filter(|b| region.intersection_area(&crate::geometry::Rect::from_coords(b.bbox())) > 0.0)
            .map(|b| b.text)
            .collect()
    }

    #[test]
    fn replaces_hello_with_goodbye() {
        let pdf = testing::build_pdf(&[vec![("Hello", 10.0, 705.0, 12.0), ("Keep me", 10.0, 400.0, 12.0)]]);
        let outcome = apply_edits(
            &pdf,
            &[edit(1, [10.0, 700.0, 100.0, 720.0], [10.0, 700.0], "Goodbye")],
        )
        .unwrap();

        assert!(outcome.warnings.is_empty());
        assert_eq!(blocks_in(&outcome.pdf, 1, [10.0, 700.0, 100.0, 720.0]), vec!["Goodbye"]);
        assert_eq!(
            texts(&outcome.pdf),
            vec![(1, "Goodbye".to_string()), (1, "Keep me".to_string())]
        );

        // Baseline of the inserted text sits at the insertion point.
        let reader = PdfReader::from_bytes(&outcome.pdf).unwrap();
        let snapshot = reader.snapshot(1, false).unwrap();
        let page = crate::content::interpret(snapshot.content.as_ref().unwrap(), &snapshot.fonts);
        let goodbye = page.runs.iter().find(|r| r.text == "Goodbye").unwrap();
        assert_eq!(goodbye.origin, (10.0, 700.0));
    }

    #[test]
    fn page_out_of_range_fails_whole_batch() {
        let pdf = testing::build_pdf(&[vec![("One", 10.0, 700.0, 12.0)], vec![]]);
        let edits = [
            edit(1, [10.0, 690.0, 100.0, 720.0], [10.0, 700.0], "fine"),
            edit(5, [10.0, 690.0, 100.0, 720.0], [10.0, 700.0], "bad"),
        ];
        assert!(matches!(
            apply_edits(&pdf, &edits),
            Err(DocuAlignError::PageOutOfRange { page_num: 5, page_count: 2 })
        ));
    }

    #[test]
    fn overflow_is_reported_and_clipped() {
        let pdf = testing::build_pdf(&[vec![]]);
        let long = "overflowing text ".repeat(10);
        let outcome = apply_edits(
            &pdf,
            &[
                edit(1, [10.0, 10.0, 20.0, 20.0], [10.0, 10.0], "short"),
                edit(1, [500.0, 700.0, 600.0, 720.0], [500.0, 700.0], &long),
            ],
        )
        .unwrap();

        match outcome.warnings.as_slice() {
            [Warning::Overflow {
                edit_index: 1,
                rendered_text,
                ..
            }] => {
                assert!(!rendered_text.is_empty());
                assert!(long.starts_with(rendered_text.as_str()));
                assert!(rendered_text.len() < long.len());
            }
            other => panic!("expected one overflow warning, got {other:?}"),
        }
    }

    #[test]
    fn empty_batch_preserves_text_and_pages() {
        let pdf = testing::build_pdf(&[
            vec![("Alpha", 72.0, 700.0, 12.0)],
            vec![("Beta", 72.0, 700.0, 12.0), ("Gamma", 72.0, 650.0, 12.0)],
        ]);
        let outcome = apply_edits(&pdf, &[]).unwrap();
        assert_eq!(PdfReader::from_bytes(&outcome.pdf).unwrap().page_count(), 2);
        assert_eq!(texts(&outcome.pdf), texts(&pdf));
    }

    #[test]
    fn same_text_edit_is_a_visual_no_op() {
        let pdf = testing::build_pdf(&[vec![("Hello", 10.0, 705.0, 12.0)]]);
        let outcome = apply_edits(
            &pdf,
            &[edit(1, [10.0, 700.0, 100.0, 720.0], [10.0, 705.0], "Hello")],
        )
        .unwrap();
        assert_eq!(texts(&outcome.pdf), texts(&pdf));
    }

    #[test]
    fn output_is_deterministic() {
        let pdf = testing::build_pdf(&[vec![("Hello", 10.0, 705.0, 12.0)], vec![("World", 10.0, 705.0, 12.0)]]);
        let edits = [
            edit(2, [10.0, 700.0, 100.0, 720.0], [10.0, 700.0], "Earth"),
            edit(1, [10.0, 700.0, 100.0, 720.0], [10.0, 700.0], "Hi"),
        ];
        let first = apply_edits(&pdf, &edits).unwrap();
        let second = apply_edits(&pdf, &edits).unwrap();
        assert_eq!(first.pdf, second.pdf);
    }

    /// Operator positions of the white covers and of the inserted `Tj`s.
    fn covers_and_insertions(pdf: &[u8]) -> (Vec<usize>, Vec<(usize, String)>) {
        let reader = PdfReader::from_bytes(pdf).unwrap();
        let snapshot = reader.snapshot(1, false).unwrap();
        let operations = snapshot.content.unwrap();
        let covers = operations
            .iter()
            .enumerate()
            .filter(|(_, op)| op.operator == "f")
            .map(|(i, _)| i)
            .collect();
        let insertions = operations
            .iter()
            .enumerate()
            .filter(|(_, op)| op.operator == "Tj")
            .filter_map(|(i, op)| match op.operands.first() {
                Some(lopdf::Object::String(bytes, _)) => {
                    Some((i, String::from_utf8_lossy(bytes).into_owned()))
                }
                _ => None,
            })
            .collect();
        (covers, insertions)
    }

    #[test]
    fn overlapping_edits_follow_edit_order() {
        let pdf = testing::build_pdf(&[vec![("Hello", 10.0, 705.0, 12.0)]]);
        let first = edit(1, [10.0, 700.0, 100.0, 720.0], [10.0, 700.0], "First");
        let second = edit(1, [50.0, 695.0, 150.0, 715.0], [12.0, 702.0], "Second");

        let forward = apply_edits(&pdf, &[first.clone(), second.clone()]).unwrap();
        let (covers, insertions) = covers_and_insertions(&forward.pdf);
        assert_eq!(covers.len(), 2);
        let texts: Vec<&str> = insertions.iter().map(|(_, t)| t.as_str()).collect();
        assert_eq!(texts, vec!["First", "Second"]);
        let last_cover = *covers.iter().max().unwrap();
        assert!(insertions.iter().all(|(i, _)| *i > last_cover));

        let backward = apply_edits(&pdf, &[second.clone(), first.clone()]).unwrap();
        let (_, insertions) = covers_and_insertions(&backward.pdf);
        let texts: Vec<&str> = insertions.iter().map(|(_, t)| t.as_str()).collect();
        assert_eq!(texts, vec!["Second", "First"]);
        assert_ne!(forward.pdf, backward.pdf);

        let again = apply_edits(&pdf, &[second, first]).unwrap();
        assert_eq!(backward.pdf, again.pdf);
    }

    #[tokio::test]
    async fn redacted_text_is_gone_after_re_extraction() {
        let pdf = testing::build_pdf(&[vec![("Confidential", 100.0, 500.0, 14.0)]]);
        let outcome = apply_edits(
            &pdf,
            &[edit(1, [95.0, 490.0, 250.0, 520.0], [100.0, 500.0], "")],
        )
        .unwrap();

        let extractor = BlockExtractor::new(
            std::sync::Arc::new(TextLayerRecognizer),
            docualign_core::EngineConfig::default(),
        );
        let result = extractor.extract(&outcome.pdf).await.unwrap();
        assert!(result.blocks.iter().all(|b| !b.text.contains("Confidential")));
        assert!(!String::from_utf8_lossy(&outcome.pdf).contains("Confidential"));
    }
}
