// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Edit planning: diff extracted blocks against the user's edited text.

use std::collections::{BTreeMap, HashSet};

use docualign_core::types::{FontName, TextBlock, TextEdit};
use tracing::debug;

/// Turns edited block texts into a batch of [`TextEdit`]s sharing one font
/// and size.
#[derive(Debug, Clone, Copy)]
pub struct EditPlanner {
    fontname: FontName,
    fontsize: f32,
}

impl EditPlanner {
    pub fn new(fontname: FontName, fontsize: f32) -> Self {
        Self { fontname, fontsize }
    }

    /// One edit per block whose entry in `edited` differs from its text, in
    /// block order. Indices missing from `edited` are unchanged.
    ///
    /// When several changed blocks on one page have the same box, only the
    /// last of them produces an edit.
    pub fn plan(&self, blocks: &[TextBlock], edited: &BTreeMap<usize, String>) -> Vec<TextEdit> {
        let changed: Vec<(&TextBlock, &String)> = blocks
            .iter()
            .enumerate()
            .filter_map(|(index, block)| match edited.get(&index) {
                Some(text) if *text != block.text => Some((block, text)),
                _ => None,
            })
            .collect();

        // Walk backwards so the last block per (page, box) wins, then restore
        // block order.
        let mut seen = HashSet::new();
        let mut edits: Vec<TextEdit> = changed
            .iter()
            .rev()
            .filter(|(block, _)| seen.insert(block_key(block)))
            .map(|(block, text)| TextEdit {
                page_num: block.page_num,
                redact_coords: block.bbox(),
                insert_coords: [block.x0, block.y0],
                new_text: (*text).clone(),
                fontname: self.fontname,
                fontsize: self.fontsize,
            })
            .collect();
        edits.reverse();

        debug!(blocks = blocks.len(), changed = changed.len(), edits = edits.len(), "Planned edits");
        edits
    }
}

fn block_key(block: &TextBlock) -> (u32, [u32; 4]) {
    (block.page_num, block.bbox().map(f32::to_bits))
}
