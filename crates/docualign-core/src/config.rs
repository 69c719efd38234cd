// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Engine configuration.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{DocuAlignError, Result};

/// How pages are read during extraction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecognizerMode {
    /// The document's own text operators only.
    Text,
    /// OCR of each page's scan. Pages without an image yield no blocks.
    Ocr,
    /// OCR when it is built in and models are available, reading pages
    /// without an image from their text layer; text layer otherwise.
    #[default]
    Auto,
}

impl RecognizerMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Ocr => "ocr",
            Self::Auto => "auto",
        }
    }
}

impl FromStr for RecognizerMode {
    type Err = DocuAlignError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "text" => Ok(Self::Text),
            "ocr" => Ok(Self::Ocr),
            "auto" => Ok(Self::Auto),
            _ => Err(DocuAlignError::Config(format!(
                "unknown recognizer `{s}` (expected text, ocr or auto)"
            ))),
        }
    }
}

impl std::fmt::Display for RecognizerMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tunables for the extraction engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum number of pages recognised concurrently.
    pub worker_pool_size: usize,
    /// Deadline for a whole extraction call, in seconds.
    pub extraction_deadline_secs: u64,
    /// Directory holding `text-detection.rten` and `text-recognition.rten`.
    /// `None` means the default OCR model cache.
    pub ocr_model_dir: Option<PathBuf>,
    pub recognizer: RecognizerMode,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            worker_pool_size: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            extraction_deadline_secs: 120,
            ocr_model_dir: None,
            recognizer: RecognizerMode::Auto,
        }
    }
}

impl EngineConfig {
    pub fn extraction_deadline(&self) -> Duration {
        Duration::from_secs(self.extraction_deadline_secs)
    }

    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.worker_pool_size == 0 {
            return Err(DocuAlignError::Config(
                "worker_pool_size must be at least 1".into(),
            ));
        }
        if self.extraction_deadline_secs == 0 {
            return Err(DocuAlignError::Config(
                "extraction_deadline_secs must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
