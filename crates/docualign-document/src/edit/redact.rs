// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Redaction: remove text operators under a rectangle and paint it white.
//
// A text operator is removed when more than half of its box lies inside a
// redact rectangle. Its glyphs are replaced by a glyph-free `TJ` with the
// same advance, so later text on the line keeps its position.

use std::collections::{BTreeSet, HashMap};

use lopdf::Object;
use lopdf::content::Operation;
use tracing::debug;

use crate::content::TextRun;
use crate::geometry::Rect;
use crate::pdf::font_decode::FontInfo;

/// Fraction of a text box that must fall inside a redact rectangle.
pub const OVERLAP_THRESHOLD: f32 = 0.5;

/// A redacted operation list.
#[derive(Debug, Clone)]
pub struct Redacted {
    pub operations: Vec<Operation>,
    /// Indices (into the original list) of removed text operators.
    pub removed: Vec<usize>,
}

/// Applies a page's redact rectangles to its content.
pub struct RedactionEngine<'a> {
    fonts: &'a HashMap<Vec<u8>, FontInfo>,
}

impl<'a> RedactionEngine<'a> {
    pub fn new(fonts: &'a HashMap<Vec<u8>, FontInfo>) -> Self {
        Self { fonts }
    }

    /// Rewrite `operations`: text under any of `rects` is removed, the
    /// original operators are isolated in `q … Q`, and one white rectangle
    /// per entry of `rects` is painted on top, in order.
    pub fn apply(&self, operations: &[Operation], rects: &[Rect]) -> Redacted {
        let page = crate::content::interpret(operations, self.fonts);
        let doomed: HashMap<usize, &TextRun> = page
            .runs
            .iter()
            .filter(|run| rects.iter().any(|rect| covers(rect, &run.bbox)))
            .map(|run| (run.op_index, run))
            .collect();

        let underflow = (-page.min_depth).max(0) as usize;
        let closing = (1 + underflow as i32 + page.final_depth).max(0) as usize;

        let mut out = Vec::with_capacity(operations.len() + 2 + underflow + rects.len() * 5);
        out.extend((0..=underflow).map(|_| Operation::new("q", vec![])));
        for (index, op) in operations.iter().enumerate() {
            match doomed.get(&index) {
                Some(run) => out.extend(replacement(op, run)),
                None => out.push(op.clone()),
            }
        }
        out.extend((0..closing).map(|_| Operation::new("Q", vec![])));
        for rect in rects {
            out.extend(cover(rect));
        }

        let removed: BTreeSet<usize> = doomed.keys().copied().collect();
        debug!(removed = removed.len(), rects = rects.len(), "Redacted page content");
        Redacted {
            operations: out,
            removed: removed.into_iter().collect(),
        }
    }
}

/// Whether `rect` covers more than [`OVERLAP_THRESHOLD`] of `bbox`.
/// Zero-area boxes are never covered.
pub fn covers(rect: &Rect, bbox: &Rect) -> bool {
    let area = bbox.area();
    area > 0.0 && rect.intersection_area(bbox) / area > OVERLAP_THRESHOLD
}

/// Operators that keep the text state effects of `op` without drawing glyphs.
fn replacement(op: &Operation, run: &TextRun) -> Vec<Operation> {
    let mut ops = Vec::new();
    if op.operator == "\"" {
        if let [aw, ac, ..] = op.operands.as_slice() {
            ops.push(Operation::new("Tw", vec![aw.clone()]));
            ops.push(Operation::new("Tc", vec![ac.clone()]));
        }
    }
    if op.operator == "'" || op.operator == "\"" {
        ops.push(Operation::new("T*", vec![]));
    }

    let shift = -run.advance * 1000.0 / run.em_scale;
    if run.em_scale != 0.0 && shift.is_finite() {
        ops.push(Operation::new(
            "TJ",
            vec![Object::Array(vec![Object::Real(shift)])],
        ));
    }
    ops
}

/// `q 1 g x y w h re f Q`
fn cover(rect: &Rect) -> [Operation; 5] {
    [
        Operation::new("q", vec![]),
        Operation::new("g", vec![Object::Integer(1)]),
        Operation::new(
            "re",
            vec![
                Object::Real(rect.x0),
                Object::Real(rect.y0),
                Object::Real(rect.width()),
                Object::Real(rect.height()),
            ],
        ),
        Operation::new("f", vec![]),
        Operation::new("Q", vec![]),
    ]
}
