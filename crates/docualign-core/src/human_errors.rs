// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Client-readable error messages.
//
// The engine only returns typed errors. The surrounding service turns them
// into a short message, a suggestion, and an HTTP-style status so that any
// front end can display them without knowing the taxonomy.

use crate::error::DocuAlignError;

/// Who has to act for the request to succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Trying again later may work (timeouts, busy storage).
    Transient,
    /// The user has to change the request (bad page, bad font, bad box).
    ActionRequired,
    /// The input itself is unusable.
    Permanent,
}

/// A human-readable error with a plain message and an actionable suggestion.
#[derive(Debug, Clone)]
pub struct ClientError {
    /// Short summary (shown as a heading).
    pub message: String,
    /// What the user should try (shown as body text).
    pub suggestion: String,
    /// Whether re-running the same request could succeed.
    pub retriable: bool,
    pub severity: Severity,
    /// HTTP status an API layer should answer with.
    pub status: u16,
}

impl ClientError {
    fn new(
        message: impl Into<String>,
        suggestion: impl Into<String>,
        severity: Severity,
        status: u16,
    ) -> Self {
        Self {
            message: message.into(),
            suggestion: suggestion.into(),
            retriable: severity == Severity::Transient,
            severity,
            status,
        }
    }
}

/// Convert a `DocuAlignError` into a `ClientError`.
pub fn describe_error(err: &DocuAlignError) -> ClientError {
    match err {
        // -- Extraction --
        DocuAlignError::InvalidDocument(_) => ClientError::new(
            "This file could not be read as a PDF.",
            "The file may be damaged or not a PDF at all. Try exporting it to PDF again and re-uploading.",
            Severity::Permanent,
            422,
        ),

        DocuAlignError::ExtractionTimeout(deadline) => ClientError::new(
            "Scanning the document took too long.",
            format!(
                "Large or high-resolution scans can take a while. Try again, or split the document. (Limit: {}s)",
                deadline.as_secs()
            ),
            Severity::Transient,
            504,
        ),

        DocuAlignError::Recognition(_) => ClientError::new(
            "Text recognition is not available right now.",
            "The text recognition models may be missing. Check the OCR model directory and try again.",
            Severity::Transient,
            500,
        ),

        DocuAlignError::TaskFailed(_) => ClientError::new(
            "Scanning the document failed unexpectedly.",
            "Try again. If this keeps happening, please report it.",
            Severity::Transient,
            500,
        ),

        // -- Editing --
        DocuAlignError::PageOutOfRange {
            page_num,
            page_count,
        } => ClientError::new(
            "An edit points at a page that does not exist.",
            format!("Page {page_num} was requested but the document has {page_count} pages. Reload the text blocks and try again."),
            Severity::ActionRequired,
            400,
        ),

        DocuAlignError::FontUnsupported(name) => ClientError::new(
            "That font is not available.",
            format!("'{name}' is not supported. Choose serif, sans or mono."),
            Severity::ActionRequired,
            400,
        ),

        DocuAlignError::InvalidEdit { index, reason } => ClientError::new(
            "One of the edits is not valid.",
            format!("Edit #{index}: {reason}. Nothing was changed."),
            Severity::ActionRequired,
            400,
        ),

        DocuAlignError::RebuildFailure(_) => ClientError::new(
            "The edited PDF could not be produced.",
            "Your original document is unchanged. The file may use a structure we cannot rewrite.",
            Severity::Permanent,
            500,
        ),

        // -- Storage --
        DocuAlignError::NotFound(_) => ClientError::new(
            "The stored file is missing.",
            "The document record exists but its file could not be found. Try uploading it again.",
            Severity::Permanent,
            404,
        ),

        DocuAlignError::DocumentNotFound(_) => ClientError::new(
            "Document not found.",
            "Check the document link, or upload the file again.",
            Severity::ActionRequired,
            404,
        ),

        DocuAlignError::Database(_) => ClientError::new(
            "The document database had a problem.",
            "Try again in a moment.",
            Severity::Transient,
            503,
        ),

        DocuAlignError::Io(io_err) => {
            if io_err.kind() == std::io::ErrorKind::PermissionDenied {
                ClientError::new(
                    "The server cannot access its document storage.",
                    "Storage permissions need fixing by an administrator.",
                    Severity::Permanent,
                    500,
                )
            } else {
                ClientError::new(
                    "There was a problem reading or writing a file.",
                    "Try again. If this keeps happening, storage may be full.",
                    Severity::Transient,
                    500,
                )
            }
        }

        DocuAlignError::Serialization(_) => ClientError::new(
            "The request could not be understood.",
            "Check that the edit list is well-formed JSON.",
            Severity::ActionRequired,
            400,
        ),

        DocuAlignError::Config(detail) => ClientError::new(
            "The server is misconfigured.",
            format!("An administrator needs to fix the configuration. ({detail})"),
            Severity::Permanent,
            500,
        ),
    }
}
