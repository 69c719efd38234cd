// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for DocuAlign.

use std::time::Duration;

use thiserror::Error;

/// Top-level error type for all DocuAlign operations.
///
/// Non-fatal conditions (partial extraction, overflowing insertions) are never
/// reported through this type; they travel as [`crate::Warning`]s alongside a
/// successful result.
#[derive(Debug, Error)]
pub enum DocuAlignError {
    // -- Engine: extraction --
    #[error("invalid PDF document: {0}")]
    InvalidDocument(String),

    #[error("text extraction exceeded its deadline of {}s", .0.as_secs())]
    ExtractionTimeout(Duration),

    #[error("text recognition failed: {0}")]
    Recognition(String),

    #[error("extraction worker failed: {0}")]
    TaskFailed(String),

    // -- Engine: editing --
    #[error("edit targets page {page_num} but the document has {page_count} pages")]
    PageOutOfRange { page_num: u32, page_count: u32 },

    #[error("unsupported font '{0}' (expected serif, sans or mono)")]
    FontUnsupported(String),

    #[error("edit #{index} is invalid: {reason}")]
    InvalidEdit { index: usize, reason: String },

    #[error("could not rebuild PDF: {0}")]
    RebuildFailure(String),

    // -- Storage / persistence --
    #[error("stored object not found: {0}")]
    NotFound(String),

    #[error("document {0} not found")]
    DocumentNotFound(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, DocuAlignError>;
