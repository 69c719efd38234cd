// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Content-stream interpreter.
//
// Walks a page's operators tracking the graphics state (CTM, q/Q) and text
// state, and reports every text-showing operator with its page-space box,
// every XObject draw with its placement, and every filled rectangle.
// Nothing is rendered.

use std::collections::HashMap;

use lopdf::Object;
use lopdf::content::Operation;

use crate::geometry::{Matrix, Rect};
use crate::pdf::font_decode::FontInfo;
use crate::pdf::number;

/// TJ adjustments at or below this (thousandths of an em) read as a word gap.
const TJ_SPACE_THRESHOLD: f32 = -200.0;

/// One `Tj`, `TJ`, `'` or `"` operator.
#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    /// Index of the operator in the page's operation list.
    pub op_index: usize,
    pub operator: String,
    /// Page-space box from font descent to ascent over the full advance.
    pub bbox: Rect,
    pub text: String,
    /// Horizontal displacement in text space, including `Tc`, `Tw` and TJ
    /// adjustments.
    pub advance: f32,
    /// `Tf` size times horizontal scaling: converts TJ thousandths to text
    /// space.
    pub em_scale: f32,
    /// Page-space start of the baseline.
    pub origin: (f32, f32),
    /// Font size as it appears on the page (after `Tm` and CTM scaling).
    pub font_size: f32,
}

/// A `Do` operator.
#[derive(Debug, Clone, PartialEq)]
pub struct XObjectPlacement {
    pub op_index: usize,
    pub name: Vec<u8>,
    /// CTM in effect: maps the unit square to page space.
    pub ctm: Matrix,
}

/// A rectangle (`re`) painted by a fill operator.
#[derive(Debug, Clone, PartialEq)]
pub struct FillArea {
    /// Index of the painting operator.
    pub op_index: usize,
    pub rect: Rect,
}

/// Result of walking one page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageContent {
    pub runs: Vec<TextRun>,
    pub placements: Vec<XObjectPlacement>,
    /// Filled rectangles, in painting order. Other path shapes are not
    /// tracked.
    pub fills: Vec<FillArea>,
    /// Lowest `q` nesting reached; negative when the stream has more `Q`
    /// than `q`.
    pub min_depth: i32,
    /// `q` nesting left open at the end of the stream.
    pub final_depth: i32,
}

#[derive(Debug, Clone)]
struct GraphicsState {
    ctm: Matrix,
    font: Option<Vec<u8>>,
    font_size: f32,
    char_spacing: f32,
    word_spacing: f32,
    horizontal_scaling: f32,
    leading: f32,
    rise: f32,
}

impl Default for GraphicsState {
    fn default() -> Self {
        Self {
            ctm: Matrix::IDENTITY,
            font: None,
            font_size: 0.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            horizontal_scaling: 1.0,
            leading: 0.0,
            rise: 0.0,
        }
    }
}

/// Interpreter over a decoded operation list.
pub struct ContentInterpreter<'a> {
    fonts: &'a HashMap<Vec<u8>, FontInfo>,
    fallback_font: FontInfo,
    state: GraphicsState,
    stack: Vec<GraphicsState>,
    text_matrix: Matrix,
    line_matrix: Matrix,
    /// Page-space rectangles of the path under construction.
    path: Vec<Rect>,
    depth: i32,
    out: PageContent,
}

impl<'a> ContentInterpreter<'a> {
    pub fn new(fonts: &'a HashMap<Vec<u8>, FontInfo>) -> Self {
        Self {
            fonts,
            fallback_font: FontInfo::default(),
            state: GraphicsState::default(),
            stack: Vec::new(),
            text_matrix: Matrix::IDENTITY,
            line_matrix: Matrix::IDENTITY,
            path: Vec::new(),
            depth: 0,
            out: PageContent::default(),
        }
    }

    /// Walk `operations` and collect text runs and XObject placements.
    pub fn run(mut self, operations: &[Operation]) -> PageContent {
        for (index, op) in operations.iter().enumerate() {
            self.step(index, op);
        }
        self.out.final_depth = self.depth;
        self.out
    }

    fn step(&mut self, index: usize, op: &Operation) {
        let nums: Vec<f32> = op.operands.iter().filter_map(number).collect();

        match op.operator.as_str() {
            // -- Graphics state --
            "q" => {
                self.stack.push(self.state.clone());
                self.depth += 1;
            }
            "Q" => {
                if let Some(saved) = self.stack.pop() {
                    self.state = saved;
                }
                self.depth -= 1;
                self.out.min_depth = self.out.min_depth.min(self.depth);
            }
            "cm" => {
                if let [a, b, c, d, e, f] = nums[..] {
                    self.state.ctm = Matrix::new(a, b, c, d, e, f).multiply(&self.state.ctm);
                }
            }

            // -- Paths --
            "re" => {
                if let [x, y, w, h] = nums[..] {
                    let rect = Rect::new(x, y, x + w, y + h);
                    self.path.push(self.state.ctm.transform_rect(&rect));
                }
            }
            "f" | "F" | "f*" | "B" | "B*" | "b" | "b*" => {
                self.out.fills.extend(
                    self.path
                        .drain(..)
                        .map(|rect| FillArea { op_index: index, rect }),
                );
            }
            "S" | "s" | "n" => self.path.clear(),

            "Do" => {
                if let Some(Object::Name(name)) = op.operands.first() {
                    self.out.placements.push(XObjectPlacement {
                        op_index: index,
                        name: name.clone(),
                        ctm: self.state.ctm,
                    });
                }
            }

            // -- Text state --
            "BT" => {
                self.text_matrix = Matrix::IDENTITY;
                self.line_matrix = Matrix::IDENTITY;
            }
            "Tf" => {
                if let (Some(Object::Name(name)), Some(size)) =
                    (op.operands.first(), op.operands.get(1).and_then(number))
                {
                    self.state.font = Some(name.clone());
                    self.state.font_size = size;
                }
            }
            "Tc" => set_first(&nums, &mut self.state.char_spacing),
            "Tw" => set_first(&nums, &mut self.state.word_spacing),
            "Tz" => {
                if let Some(scale) = nums.first() {
                    self.state.horizontal_scaling = scale / 100.0;
                }
            }
            "TL" => set_first(&nums, &mut self.state.leading),
            "Ts" => set_first(&nums, &mut self.state.rise),

            // -- Positioning --
            "Td" => {
                if let [tx, ty] = nums[..] {
                    self.move_line(tx, ty);
                }
            }
            "TD" => {
                if let [tx, ty] = nums[..] {
                    self.state.leading = -ty;
                    self.move_line(tx, ty);
                }
            }
            "Tm" => {
                if let [a, b, c, d, e, f] = nums[..] {
                    self.line_matrix = Matrix::new(a, b, c, d, e, f);
                    self.text_matrix = self.line_matrix;
                }
            }
            "T*" => self.next_line(),

            // -- Showing --
            "Tj" => {
                if let Some(Object::String(bytes, _)) = op.operands.first() {
                    self.show(index, op, &[ShowItem::Text(bytes)]);
                }
            }
            "'" => {
                self.next_line();
                if let Some(Object::String(bytes, _)) = op.operands.first() {
                    self.show(index, op, &[ShowItem::Text(bytes)]);
                }
            }
            "\"" => {
                if let (Some(aw), Some(ac)) = (
                    op.operands.first().and_then(number),
                    op.operands.get(1).and_then(number),
                ) {
                    self.state.word_spacing = aw;
                    self.state.char_spacing = ac;
                }
                self.next_line();
                if let Some(Object::String(bytes, _)) = op.operands.get(2) {
                    self.show(index, op, &[ShowItem::Text(bytes)]);
                }
            }
            "TJ" => {
                if let Some(Object::Array(items)) = op.operands.first() {
                    let items: Vec<ShowItem<'_>> = items
                        .iter()
                        .filter_map(|item| match item {
                            Object::String(bytes, _) => Some(ShowItem::Text(bytes)),
                            other => number(other).map(ShowItem::Adjust),
                        })
                        .collect();
                    self.show(index, op, &items);
                }
            }
            _ => {}
        }
    }

    fn move_line(&mut self, tx: f32, ty: f32) {
        self.line_matrix = Matrix::translate(tx, ty).multiply(&self.line_matrix);
        self.text_matrix = self.line_matrix;
    }

    fn next_line(&mut self) {
        let leading = self.state.leading;
        self.move_line(0.0, -leading);
    }

    fn show(&mut self, index: usize, op: &Operation, items: &[ShowItem<'_>]) {
        let font = self
            .state
            .font
            .as_ref()
            .and_then(|name| self.fonts.get(name))
            .unwrap_or(&self.fallback_font);
        let size = self.state.font_size;
        let th = self.state.horizontal_scaling;
        let start = self.text_matrix;

        let mut advance = 0.0;
        let mut text = String::new();
        for item in items {
            match item {
                ShowItem::Text(bytes) => {
                    for glyph in font.decode(bytes) {
                        let spacing = self.state.char_spacing
                            + if glyph.is_word_space {
                                self.state.word_spacing
                            } else {
                                0.0
                            };
                        advance += (glyph.width * size + spacing) * th;
                        text.push_str(&glyph.text);
                    }
                }
                ShowItem::Adjust(n) => {
                    advance -= n / 1000.0 * size * th;
                    if *n <= TJ_SPACE_THRESHOLD && !text.is_empty() && !text.ends_with(' ') {
                        text.push(' ');
                    }
                }
            }
        }

        let rise = self.state.rise;
        let to_page = start.multiply(&self.state.ctm);
        let text_space = Rect::new(
            0.0,
            font.descent() * size + rise,
            advance,
            font.ascent() * size + rise,
        );

        self.out.runs.push(TextRun {
            op_index: index,
            operator: op.operator.clone(),
            bbox: to_page.transform_rect(&text_space),
            text,
            advance,
            em_scale: size * th,
            origin: to_page.apply(0.0, rise),
            font_size: size * to_page.c.hypot(to_page.d),
        });

        self.text_matrix = Matrix::translate(advance, 0.0).multiply(&self.text_matrix);
    }
}

enum ShowItem<'b> {
    Text(&'b [u8]),
    Adjust(f32),
}

fn set_first(nums: &[f32], target: &mut f32) {
    if let Some(value) = nums.first() {
        *target = *value;
    }
}

/// Convenience wrapper: interpret `operations` with `fonts`.
pub fn interpret(operations: &[Operation], fonts: &HashMap<Vec<u8>, FontInfo>) -> PageContent {
    ContentInterpreter::new(fonts).run(operations)
}
