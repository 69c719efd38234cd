// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Block extraction: recognise every page on a bounded worker pool and
// return the text blocks in reading order.

#[cfg(feature = "ocr")]
pub mod ocr;
pub mod scan;
pub mod text_layer;

use std::sync::Arc;

use docualign_core::{EngineConfig, RecognizerMode};
use docualign_core::error::{DocuAlignError, Result};
use docualign_core::types::{ExtractionResult, TextBlock, Warning};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::{debug, info, instrument, warn};

use crate::geometry::Rect;
use crate::pdf::reader::{PageSnapshot, PdfReader};

/// Finds text blocks on one page.
///
/// Implementations are called from blocking worker threads with an owned
/// snapshot; they must not assume any particular thread.
pub trait PageRecognizer: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether snapshots must carry the page's image samples.
    fn wants_images(&self) -> bool {
        false
    }

    /// Blocks for `page`, in point space. An error marks the page as
    /// partially extracted; it never fails the whole document.
    fn recognize(&self, page: &PageSnapshot) -> Result<Vec<TextBlock>>;
}

/// Runs a [`PageRecognizer`] over every page of a document.
#[derive(Clone)]
pub struct BlockExtractor {
    recognizer: Arc<dyn PageRecognizer>,
    config: EngineConfig,
}

impl BlockExtractor {
    pub fn new(recognizer: Arc<dyn PageRecognizer>, config: EngineConfig) -> Self {
        Self { recognizer, config }
    }

    /// Extractor for `config.recognizer`. `Ocr` fails with `Config` when the
    /// `ocr` feature is not built in, and with `Recognition` when the models
    /// cannot be loaded.
    pub fn from_config(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let recognizer = default_recognizer(&config)?;
        info!(recognizer = recognizer.name(), "Block extractor ready");
        Ok(Self::new(recognizer, config))
    }

    pub fn recognizer_name(&self) -> &'static str {
        self.recognizer.name()
    }

    /// Extract text blocks from `pdf_bytes`, ordered by page, then top to
    /// bottom, then left to right.
    ///
    /// Fails with `ExtractionTimeout` if the configured deadline passes; any
    /// pages already recognised are discarded.
    #[instrument(skip_all, fields(bytes_len = pdf_bytes.len(), recognizer = self.recognizer.name()))]
    pub async fn extract(&self, pdf_bytes: &[u8]) -> Result<ExtractionResult> {
        self.config.validate()?;
        let deadline = self.config.extraction_deadline();

        match timeout(deadline, self.run(pdf_bytes.to_vec())).await {
            Ok(result) => result,
            Err(_) => {
                warn!(deadline_secs = deadline.as_secs(), "Extraction timed out");
                Err(DocuAlignError::ExtractionTimeout(deadline))
            }
        }
    }

    /// All recognised text as plain text: one line per block in reading
    /// order, pages separated by a form feed.
    pub async fn extract_text(&self, pdf_bytes: &[u8]) -> Result<String> {
        let result = self.extract(pdf_bytes).await?;
        for warning in &result.warnings {
            warn!(%warning, "Text extraction is incomplete");
        }
        Ok(result.plain_text())
    }

    async fn run(&self, bytes: Vec<u8>) -> Result<ExtractionResult> {
        let wants_images = self.recognizer.wants_images();
        let snapshots = tokio::task::spawn_blocking(move || {
            PdfReader::from_bytes(&bytes)?.snapshots(wants_images)
        })
        .await
        .map_err(|e| DocuAlignError::TaskFailed(format!("snapshot task: {}", e)))??;

        let page_count = snapshots.len();
        let permits = Arc::new(Semaphore::new(self.config.worker_pool_size));
        let mut tasks = JoinSet::new();

        for snapshot in snapshots {
            let permits = Arc::clone(&permits);
            let recognizer = Arc::clone(&self.recognizer);
            tasks.spawn(async move {
                let _permit = permits
                    .acquire_owned()
                    .await
                    .map_err(|e| DocuAlignError::TaskFailed(e.to_string()))?;
                let page_num = snapshot.page_num;
                let media_box = snapshot.media_box;
                let outcome = tokio::task::spawn_blocking(move || recognizer.recognize(&snapshot))
                    .await
                    .map_err(|e| DocuAlignError::TaskFailed(format!("page {}: {}", page_num, e)))?;
                Ok::<_, DocuAlignError>((page_num, media_box, outcome))
            });
        }

        let mut pages = Vec::with_capacity(page_count);
        while let Some(joined) = tasks.join_next().await {
            let page = joined.map_err(|e| DocuAlignError::TaskFailed(e.to_string()))??;
            pages.push(page);
        }
        pages.sort_by_key(|(page_num, _, _)| *page_num);

        let mut result = ExtractionResult::default();
        for (page_num, media_box, outcome) in pages {
            match outcome {
                Ok(blocks) => {
                    let before = result.blocks.len();
                    result.blocks.extend(
                        blocks
                            .into_iter()
                            .filter_map(|block| clamp_block(block, page_num, &media_box)),
                    );
                    debug!(page_num, blocks = result.blocks.len() - before, "Page recognised");
                }
                Err(err) => {
                    warn!(page_num, error = %err, "Page could not be recognised");
                    result.warnings.push(Warning::PartialExtraction {
                        page_num,
                        reason: err.to_string(),
                    });
                }
            }
        }
        sort_blocks(&mut result.blocks);

        info!(
            pages = page_count,
            blocks = result.blocks.len(),
            warnings = result.warnings.len(),
            "Extraction complete"
        );
        Ok(result)
    }
}

fn default_recognizer(config: &EngineConfig) -> Result<Arc<dyn PageRecognizer>> {
    match config.recognizer {
        RecognizerMode::Text => Ok(Arc::new(text_layer::TextLayerRecognizer)),
        RecognizerMode::Ocr => ocr_recognizer(config, false),
        RecognizerMode::Auto => {
            #[cfg(feature = "ocr")]
            if config.ocr_model_dir.is_some() || ocr::models_available() {
                return ocr_recognizer(config, true);
            }
            Ok(Arc::new(text_layer::TextLayerRecognizer))
        }
    }
}

#[cfg(feature = "ocr")]
fn ocr_recognizer(config: &EngineConfig, text_fallback: bool) -> Result<Arc<dyn PageRecognizer>> {
    let ocr_config = config
        .ocr_model_dir
        .as_ref()
        .map(ocr::OcrConfig::from_dir)
        .unwrap_or_default();
    let recognizer = ocr::OcrRecognizer::new(ocr_config)?.with_text_fallback(text_fallback);
    Ok(Arc::new(recognizer))
}

#[cfg(not(feature = "ocr"))]
fn ocr_recognizer(_config: &EngineConfig, _text_fallback: bool) -> Result<Arc<dyn PageRecognizer>> {
    Err(DocuAlignError::Config(
        "OCR recognition requested, but this build has no `ocr` feature".into(),
    ))
}

/// Clamp a block into the media box; blocks left with no area are dropped.
fn clamp_block(block: TextBlock, page_num: u32, media_box: &Rect) -> Option<TextBlock> {
    let rect = Rect::new(block.x0, block.y0, block.x1, block.y1).clamp_to(media_box);
    if rect.is_empty() || block.text.trim().is_empty() {
        return None;
    }
    Some(TextBlock {
        x0: rect.x0,
        y0: rect.y0,
        x1: rect.x1,
        y1: rect.y1,
        text: block.text,
        page_num,
    })
}

/// Page ascending, then top edge descending, then left edge ascending.
pub fn sort_blocks(blocks: &mut [TextBlock]) {
    blocks.sort_by(|a, b| {
        a.page_num
            .cmp(&b.page_num)
            .then(b.y1.total_cmp(&a.y1))
            .then(a.x0.total_cmp(&b.x0))
    });
}
