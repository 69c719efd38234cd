// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Text-layer recogniser: reads the glyphs a page already draws and groups
// them into line blocks.

use docualign_core::error::{DocuAlignError, Result};
use docualign_core::types::TextBlock;

use super::{PageRecognizer, sort_blocks};
use crate::content::{TextRun, interpret};
use crate::geometry::Rect;
use crate::pdf::reader::PageSnapshot;

/// Runs on the same line whose baselines differ by at most this many font
/// sizes are merged.
const BASELINE_TOLERANCE: f32 = 0.5;
/// Largest horizontal gap, in font sizes, bridged within one block.
const MAX_GAP: f32 = 1.0;
/// Largest overlap, in font sizes, tolerated between consecutive runs.
const MAX_OVERLAP: f32 = 0.5;
/// Gaps wider than this many font sizes become a space.
const SPACE_GAP: f32 = 0.15;

/// Extracts blocks from the page's own text operators. Works for any PDF
/// with a text layer and needs no models.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextLayerRecognizer;

impl PageRecognizer for TextLayerRecognizer {
    fn name(&self) -> &'static str {
        "text-layer"
    }

    fn recognize(&self, page: &PageSnapshot) -> Result<Vec<TextBlock>> {
        let operations = page
            .content
            .as_ref()
            .map_err(|reason| DocuAlignError::Recognition(reason.clone()))?;
        let content = interpret(operations, &page.fonts);
        Ok(group_lines(&content.runs, page.page_num))
    }
}

/// Group consecutive runs into line blocks, sorted in reading order.
pub(crate) fn group_lines<'r>(runs: impl IntoIterator<Item = &'r TextRun>, page_num: u32) -> Vec<TextBlock> {
    let mut blocks = Vec::new();
    let mut line: Option<LineBuilder> = None;
    for run in runs.into_iter().filter(|r| !r.text.trim().is_empty()) {
        match line.as_mut() {
            Some(current) if current.accepts(run) => current.push(run),
            _ => {
                blocks.extend(line.take().and_then(|l| l.finish(page_num)));
                line = Some(LineBuilder::start(run));
            }
        }
    }
    blocks.extend(line.and_then(|l| l.finish(page_num)));

    sort_blocks(&mut blocks);
    blocks
}

struct LineBuilder {
    bbox: Rect,
    text: String,
    baseline: f32,
    size: f32,
    end_x: f32,
}

impl LineBuilder {
    fn start(run: &TextRun) -> Self {
        Self {
            bbox: run.bbox,
            text: run.text.clone(),
            baseline: run.origin.1,
            size: run.font_size.abs(),
            end_x: run.bbox.x1,
        }
    }

    fn accepts(&self, run: &TextRun) -> bool {
        let size = self.size.max(run.font_size.abs());
        let gap = run.bbox.x0 - self.end_x;
        (run.origin.1 - self.baseline).abs() <= BASELINE_TOLERANCE * size
            && gap > -MAX_OVERLAP * size
            && gap < MAX_GAP * size
    }

    fn push(&mut self, run: &TextRun) {
        let size = self.size.max(run.font_size.abs());
        let gap = run.bbox.x0 - self.end_x;
        if gap > SPACE_GAP * size && !self.text.ends_with(' ') && !run.text.starts_with(' ') {
            self.text.push(' ');
        }
        self.text.push_str(&run.text);
        self.bbox = self.bbox.union(&run.bbox);
        self.size = size;
        self.end_x = self.end_x.max(run.bbox.x1);
    }

    fn finish(self, page_num: u32) -> Option<TextBlock> {
        let text = self.text.trim();
        if text.is_empty() {
            return None;
        }
        Some(TextBlock {
            x0: self.bbox.x0,
            y0: self.bbox.y0,
            x1: self.bbox.x1,
            y1: self.bbox.y1,
            text: text.to_owned(),
            page_num,
        })
    }
}
