// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// docualign-document: the redaction-and-reinsertion engine.
//
// Extracts positioned text blocks from a PDF, plans edits from changed block
// text, and rewrites the edited pages so the old text is gone and the new text
// sits where it was.

pub mod content;
pub mod edit;
pub mod extract;
pub mod fonts;
pub mod geometry;
pub mod pdf;

#[cfg(test)]
mod testing;

use docualign_core::EngineConfig;
use docualign_core::error::Result;
use docualign_core::types::ExtractionResult;

pub use edit::planner::EditPlanner;
pub use edit::{EditOutcome, apply_edits};
pub use extract::text_layer::TextLayerRecognizer;
pub use extract::{BlockExtractor, PageRecognizer};
pub use pdf::reader::PdfReader;
pub use pdf::rebuild::PdfRebuilder;

#[cfg(feature = "ocr")]
pub use extract::ocr::{OcrConfig, OcrRecognizer};

/// Extract text blocks with the default engine configuration.
pub async fn extract_blocks(pdf_bytes: &[u8]) -> Result<ExtractionResult> {
    BlockExtractor::from_config(EngineConfig::default())?
        .extract(pdf_bytes)
        .await
}

/// Extract the document's text as plain text with the default engine
/// configuration.
pub async fn extract_text(pdf_bytes: &[u8]) -> Result<String> {
    BlockExtractor::from_config(EngineConfig::default())?
        .extract_text(pdf_bytes)
        .await
}
