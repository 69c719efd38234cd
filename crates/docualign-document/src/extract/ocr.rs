// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// OCR recogniser for scanned pages, built on the `ocrs` engine with models
// executed by `rten`. Only compiled with the `ocr` feature.
//
// The engine needs two model files, `text-detection.rten` and
// `text-recognition.rten`. Running `ocrs-cli` once downloads them into
// `$XDG_CACHE_HOME/ocrs` (usually `~/.cache/ocrs`), which is where the
// default configuration looks.

use std::path::{Path, PathBuf};

use docualign_core::error::{DocuAlignError, Result};
use docualign_core::types::TextBlock;
use image::{DynamicImage, GrayImage, ImageFormat, RgbImage};
use ocrs::{ImageSource, OcrEngine, OcrEngineParams, TextItem};
use rten::Model;
use tracing::{debug, info, instrument, warn};

use super::PageRecognizer;
use super::scan::{find_scan, overlay_blocks};
use super::text_layer::TextLayerRecognizer;
use crate::content::interpret;
use crate::geometry::PixelFrame;
use crate::pdf::reader::{ImageEncoding, PageImage, PageSnapshot};

const DETECTION_MODEL_FILENAME: &str = "text-detection.rten";
const RECOGNITION_MODEL_FILENAME: &str = "text-recognition.rten";

fn default_model_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CACHE_HOME") {
        PathBuf::from(xdg).join("ocrs")
    } else if let Ok(home) = std::env::var("HOME") {
        PathBuf::from(home).join(".cache").join("ocrs")
    } else {
        PathBuf::from("ocrs-models")
    }
}

/// Where to find the detection and recognition models.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OcrConfig {
    pub detection_model_path: PathBuf,
    pub recognition_model_path: PathBuf,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self::from_dir(default_model_dir())
    }
}

impl OcrConfig {
    /// Both models from one directory, under their usual filenames.
    pub fn from_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            detection_model_path: dir.join(DETECTION_MODEL_FILENAME),
            recognition_model_path: dir.join(RECOGNITION_MODEL_FILENAME),
        }
    }

    pub fn validate(&self) -> Result<()> {
        for (kind, path) in [
            ("detection", &self.detection_model_path),
            ("recognition", &self.recognition_model_path),
        ] {
            if !path.exists() {
                return Err(DocuAlignError::Recognition(format!(
                    "{} model not found at {}; run `ocrs-cli` once to download models",
                    kind,
                    path.display()
                )));
            }
        }
        Ok(())
    }
}

/// True when both models are present in the default cache directory.
pub fn models_available() -> bool {
    OcrConfig::default().validate().is_ok()
}

/// Recognises text in the largest image drawn on each page, then lets
/// whatever the page draws over that image take precedence.
pub struct OcrRecognizer {
    engine: OcrEngine,
    text_fallback: bool,
}

impl OcrRecognizer {
    /// Load both models. This is the slow step; build one recogniser and
    /// share it.
    #[instrument(skip_all, fields(
        detection = %config.detection_model_path.display(),
        recognition = %config.recognition_model_path.display(),
    ))]
    pub fn new(config: OcrConfig) -> Result<Self> {
        config.validate()?;

        let load = |path: &Path, kind: &str| {
            info!(kind, "Loading OCR model");
            Model::load_file(path).map_err(|err| {
                DocuAlignError::Recognition(format!(
                    "failed to load {} model from {}: {}",
                    kind,
                    path.display(),
                    err
                ))
            })
        };
        let detection_model = load(&config.detection_model_path, "detection")?;
        let recognition_model = load(&config.recognition_model_path, "recognition")?;

        let engine = OcrEngine::new(OcrEngineParams {
            detection_model: Some(detection_model),
            recognition_model: Some(recognition_model),
            ..Default::default()
        })
        .map_err(|err| {
            DocuAlignError::Recognition(format!("failed to initialise OCR engine: {}", err))
        })?;

        info!("OCR engine initialised");
        Ok(Self {
            engine,
            text_fallback: false,
        })
    }

    /// Read pages without any image from their text layer instead of
    /// returning no blocks for them.
    pub fn with_text_fallback(mut self, enabled: bool) -> Self {
        self.text_fallback = enabled;
        self
    }

    /// Text lines in `image`, each with its bounding box in pixels
    /// `(left, top, right, bottom)`.
    #[instrument(skip_all, fields(width = image.width(), height = image.height()))]
    fn recognize_lines(&self, image: &DynamicImage) -> Result<Vec<(String, [f32; 4])>> {
        let rgb = image.to_rgb8();
        let (width, height) = rgb.dimensions();
        let source = ImageSource::from_bytes(rgb.as_raw(), (width, height)).map_err(|err| {
            DocuAlignError::Recognition(format!(
                "failed to create image source ({}x{}): {}",
                width, height, err
            ))
        })?;
        let input = self.engine.prepare_input(source).map_err(|err| {
            DocuAlignError::Recognition(format!("OCR preprocessing failed: {}", err))
        })?;

        let words = self.engine.detect_words(&input).map_err(|err| {
            DocuAlignError::Recognition(format!("word detection failed: {}", err))
        })?;
        let line_rects = self.engine.find_text_lines(&input, &words);
        debug!(words = words.len(), lines = line_rects.len(), "Text lines found");

        let lines = self
            .engine
            .recognize_text(&input, &line_rects)
            .map_err(|err| DocuAlignError::Recognition(format!("line recognition failed: {}", err)))?;

        Ok(lines
            .iter()
            .flatten()
            .filter_map(|line| {
                let text = line.to_string().trim().to_owned();
                if text.is_empty() {
                    return None;
                }
                let rect = line.bounding_rect();
                Some((
                    text,
                    [
                        rect.left() as f32,
                        rect.top() as f32,
                        rect.right() as f32,
                        rect.bottom() as f32,
                    ],
                ))
            })
            .collect())
    }
}

impl PageRecognizer for OcrRecognizer {
    fn name(&self) -> &'static str {
        if self.text_fallback { "auto" } else { "ocr" }
    }

    fn wants_images(&self) -> bool {
        true
    }

    fn recognize(&self, page: &PageSnapshot) -> Result<Vec<TextBlock>> {
        let operations = page
            .content
            .as_ref()
            .map_err(|reason| DocuAlignError::Recognition(reason.clone()))?;
        let content = interpret(operations, &page.fonts);

        let Some(scan) = find_scan(page, &content) else {
            debug!(page_num = page.page_num, "No raster image on page");
            return if self.text_fallback {
                TextLayerRecognizer.recognize(page)
            } else {
                Ok(Vec::new())
            };
        };
        let (image, ctm) = (scan.image, scan.ctm);

        let frame = PixelFrame::from_image_placement(&ctm, image.width, image.height)
            .unwrap_or_else(|| {
                let dpi = image.width as f32 / page.media_box.width().max(1.0) * 72.0;
                PixelFrame::from_dpi(dpi, page.media_box.height())
            });
        let decoded = decode_image(image)?;
        let lines = self.recognize_lines(&decoded)?;

        let blocks: Vec<TextBlock> = lines
            .into_iter()
            .map(|(text, [left, top, right, bottom])| {
                let rect = frame.rect(left, top, right, bottom);
                TextBlock {
                    x0: rect.x0,
                    y0: rect.y0,
                    x1: rect.x1,
                    y1: rect.y1,
                    text,
                    page_num: page.page_num,
                }
            })
            .collect();
        let blocks = overlay_blocks(page.page_num, &content, scan.op_index, blocks);
        info!(page_num = page.page_num, blocks = blocks.len(), "OCR page complete");
        Ok(blocks)
    }
}

/// Decode the sample formats scanners actually produce: JPEG, and raw 8-bit
/// gray or RGB, and 1-bit bilevel.
fn decode_image(image: &PageImage) -> Result<DynamicImage> {
    let unsupported = |what: String| {
        warn!(name = %String::from_utf8_lossy(&image.name), %what, "Unsupported page image");
        DocuAlignError::Recognition(format!("unsupported page image: {}", what))
    };
    let (w, h) = (image.width as usize, image.height as usize);

    match &image.encoding {
        ImageEncoding::Jpeg => image::load_from_memory_with_format(&image.data, ImageFormat::Jpeg)
            .map_err(|err| DocuAlignError::Recognition(format!("JPEG decode failed: {}", err))),
        ImageEncoding::Raw => match (image.components, image.bits_per_component) {
            (Some(1), 8) => image
                .data
                .get(..w * h)
                .and_then(|samples| GrayImage::from_raw(image.width, image.height, samples.to_vec()))
                .map(DynamicImage::ImageLuma8)
                .ok_or_else(|| unsupported("truncated gray samples".into())),
            (Some(3), 8) => image
                .data
                .get(..w * h * 3)
                .and_then(|samples| RgbImage::from_raw(image.width, image.height, samples.to_vec()))
                .map(DynamicImage::ImageRgb8)
                .ok_or_else(|| unsupported("truncated RGB samples".into())),
            (Some(1) | None, 1) => {
                let stride = w.div_ceil(8);
                if image.data.len() < stride * h {
                    return Err(unsupported("truncated bilevel samples".into()));
                }
                let gray = GrayImage::from_fn(image.width, image.height, |x, y| {
                    let byte = image.data[y as usize * stride + x as usize / 8];
                    let bit = (byte >> (7 - (x % 8))) & 1;
                    image::Luma([if bit == 1 { 255 } else { 0 }])
                });
                Ok(DynamicImage::ImageLuma8(gray))
            }
            (components, bits) => Err(unsupported(format!(
                "{:?} components at {} bits",
                components, bits
            ))),
        },
        ImageEncoding::Unsupported(filter) => Err(unsupported(format!("filter {}", filter))),
    }
}
