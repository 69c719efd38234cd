// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scanned pages: find the page scan, and reconcile the lines recognised in
// it with what the page paints on top of it.
//
// Recognition only sees the scan's samples. Whatever the content stream
// draws after the scan (redaction covers, inserted text, a scanner's
// invisible text layer) hides or replaces the lines underneath.

use docualign_core::types::TextBlock;
use tracing::debug;

use super::sort_blocks;
use super::text_layer::group_lines;
use crate::content::PageContent;
use crate::edit::redact::{OVERLAP_THRESHOLD, covers};
use crate::geometry::{Matrix, Rect};
use crate::pdf::reader::{PageImage, PageSnapshot};

/// The image drawn as the page scan.
#[derive(Debug, Clone, Copy)]
pub struct ScanPlacement<'a> {
    pub image: &'a PageImage,
    /// Maps the unit square to page space.
    pub ctm: Matrix,
    /// Index of the `Do` operator.
    pub op_index: usize,
}

/// The image covering the most of the page, if the page draws any.
pub fn find_scan<'a>(page: &'a PageSnapshot, content: &PageContent) -> Option<ScanPlacement<'a>> {
    content
        .placements
        .iter()
        .filter_map(|placement| {
            let image = page.images.iter().find(|img| img.name == placement.name)?;
            let area = placement
                .ctm
                .transform_rect(&Rect::new(0.0, 0.0, 1.0, 1.0))
                .area();
            let scan = ScanPlacement {
                image,
                ctm: placement.ctm,
                op_index: placement.op_index,
            };
            Some((scan, area))
        })
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(scan, _)| scan)
}

/// Merge `recognized` lines (point space) with the content drawn after the
/// scan's `Do` at `scan_op`.
///
/// A recognised line is dropped when a rectangle filled after the scan
/// covers more than half of it, or when a text-layer line drawn after the
/// scan overlaps more than half of the smaller of the two. Text-layer lines
/// drawn after the scan are added.
pub fn overlay_blocks(
    page_num: u32,
    content: &PageContent,
    scan_op: usize,
    recognized: Vec<TextBlock>,
) -> Vec<TextBlock> {
    let painted: Vec<Rect> = content
        .fills
        .iter()
        .filter(|fill| fill.op_index > scan_op)
        .map(|fill| fill.rect)
        .collect();
    let drawn = group_lines(
        content.runs.iter().filter(|run| run.op_index > scan_op),
        page_num,
    );
    let drawn_rects: Vec<Rect> = drawn.iter().map(block_rect).collect();

    let read = recognized.len();
    let mut blocks: Vec<TextBlock> = recognized
        .into_iter()
        .filter(|block| {
            let rect = block_rect(block);
            !painted.iter().any(|cover| covers(cover, &rect))
                && !drawn_rects.iter().any(|text| mostly_overlap(text, &rect))
        })
        .collect();
    debug!(
        page_num,
        hidden = read - blocks.len(),
        drawn = drawn.len(),
        "Reconciled scan with page content"
    );

    blocks.extend(drawn);
    sort_blocks(&mut blocks);
    blocks
}

fn block_rect(block: &TextBlock) -> Rect {
    Rect::from_coords(block.bbox())
}

fn mostly_overlap(a: &Rect, b: &Rect) -> bool {
    let smaller = a.area().min(b.area());
    smaller > 0.0 && a.intersection_area(b) / smaller > OVERLAP_THRESHOLD
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use docualign_core::types::{FontName, TextEdit};
    use lopdf::content::Content;

    use super::*;
    use crate::content::interpret;
    use crate::edit::apply_edits;
    use crate::fonts::StandardFont;
    use crate::pdf::font_decode::FontInfo;
    use crate::pdf::reader::PdfReader;
    use crate::testing;

    fn line(text: &str, bbox: [f32; 4]) -> TextBlock {
        TextBlock {
            x0: bbox[0],
            y0: bbox[1],
            x1: bbox[2],
            y1: bbox[3],
            text: text.into(),
            page_num: 1,
        }
    }

    /// What a recogniser reads from the blank test scan if it said "Hello"
    /// near the top and "Keep" lower down.
    fn scan_lines() -> Vec<TextBlock> {
        vec![
            line("Hello", [10.0, 700.0, 100.0, 720.0]),
            line("Keep", [10.0, 400.0, 100.0, 420.0]),
        ]
    }

    fn reconcile(pdf: &[u8]) -> Vec<String> {
        let reader = PdfReader::from_bytes(pdf).unwrap();
        let snapshot = reader.snapshot(1, true).unwrap();
        let content = interpret(snapshot.content.as_ref().unwrap(), &snapshot.fonts);
        let scan = find_scan(&snapshot, &content).unwrap();
        overlay_blocks(1, &content, scan.op_index, scan_lines())
            .into_iter()
            .map(|b| b.text)
            .collect()
    }

    fn edit(text: &str) -> TextEdit {
        TextEdit {
            page_num: 1,
            redact_coords: [10.0, 700.0, 100.0, 720.0],
            insert_coords: [10.0, 700.0],
            new_text: text.into(),
            fontname: FontName::Serif,
            fontsize: 10.0,
        }
    }

    #[test]
    fn finds_the_largest_image() {
        let pdf = testing::build_image_pdf(4, 4, &[255; 16]);
        let reader = PdfReader::from_bytes(&pdf).unwrap();
        let snapshot = reader.snapshot(1, true).unwrap();
        let content = interpret(snapshot.content.as_ref().unwrap(), &snapshot.fonts);
        let scan = find_scan(&snapshot, &content).unwrap();
        assert_eq!(scan.image.name, b"Im0");
        assert_eq!(scan.ctm, Matrix::new(612.0, 0.0, 0.0, 792.0, 0.0, 0.0));

        let without_images = reader.snapshot(1, false).unwrap();
        assert!(find_scan(&without_images, &content).is_none());
    }

    #[test]
    fn untouched_scan_keeps_recognised_lines() {
        let pdf = testing::build_image_pdf(64, 64, &[255; 64 * 64]);
        assert_eq!(reconcile(&pdf), vec!["Hello", "Keep"]);
    }

    #[test]
    fn edited_scan_shows_the_new_text() {
        let pdf = testing::build_image_pdf(64, 64, &[255; 64 * 64]);
        let outcome = apply_edits(&pdf, &[edit("Goodbye")]).unwrap();
        assert_eq!(reconcile(&outcome.pdf), vec!["Goodbye", "Keep"]);
    }

    #[test]
    fn redacted_scan_line_is_gone() {
        let pdf = testing::build_image_pdf(64, 64, &[255; 64 * 64]);
        let outcome = apply_edits(&pdf, &[edit("")]).unwrap();
        assert_eq!(reconcile(&outcome.pdf), vec!["Keep"]);
    }

    #[test]
    fn same_text_edit_reads_back_once() {
        let pdf = testing::build_image_pdf(64, 64, &[255; 64 * 64]);
        let outcome = apply_edits(&pdf, &[edit("Hello")]).unwrap();
        assert_eq!(reconcile(&outcome.pdf), vec!["Hello", "Keep"]);
    }

    #[test]
    fn invisible_text_layer_replaces_recognised_line() {
        let fonts = HashMap::from([(b"F1".to_vec(), FontInfo::standard(StandardFont::Helvetica))]);
        let operations = Content::decode(
            b"BT /F1 12 Tf 10 500 Td (Under) Tj ET \
              q 612 0 0 792 0 0 cm /Im0 Do Q \
              BT 3 Tr /F1 12 Tf 10 705 Td (Hello) Tj ET",
        )
        .unwrap()
        .operations;
        let content = interpret(&operations, &fonts);
        let scan_op = content.placements[0].op_index;

        let recognized = vec![
            line("He1lo", [10.0, 702.0, 40.0, 716.0]),
            line("Keep", [10.0, 400.0, 100.0, 420.0]),
        ];
        let texts: Vec<String> = overlay_blocks(1, &content, scan_op, recognized)
            .into_iter()
            .map(|b| b.text)
            .collect();
        // Text drawn before the scan is hidden by it.
        assert_eq!(texts, vec!["Hello", "Keep"]);
    }
}
