// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF reader: load a document with `lopdf`, resolve inherited page
// attributes, and capture owned per-page snapshots for extraction workers.

use std::collections::{BTreeMap, HashMap};

use docualign_core::error::{DocuAlignError, Result};
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId};
use tracing::{debug, info, instrument, warn};

use super::font_decode::FontInfo;
use super::{get, get_dict, name, number, resolve, stream_data};
use crate::geometry::Rect;

/// US Letter, used when no `/MediaBox` is found anywhere in the page tree.
pub const DEFAULT_MEDIA_BOX: Rect = Rect {
    x0: 0.0,
    y0: 0.0,
    x1: 612.0,
    y1: 792.0,
};

/// Bound on `/Parent` hops, in case the page tree loops.
const MAX_TREE_DEPTH: usize = 64;

/// Effective attributes of one page.
#[derive(Debug, Clone, PartialEq)]
pub struct PageInfo {
    /// 1-indexed.
    pub page_num: u32,
    pub id: ObjectId,
    pub media_box: Rect,
}

/// How an image XObject's samples are stored.
#[derive(Debug, Clone, PartialEq)]
pub enum ImageEncoding {
    /// `DCTDecode`: `data` is a complete JPEG file.
    Jpeg,
    /// Unfiltered or Flate-decoded samples, row by row.
    Raw,
    /// Anything else; `data` is empty.
    Unsupported(String),
}

/// An image XObject from the page's resources.
#[derive(Debug, Clone)]
pub struct PageImage {
    /// Resource name used by `Do`.
    pub name: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub bits_per_component: u8,
    /// Colour components per sample, when the colour space is one we can
    /// read directly.
    pub components: Option<u8>,
    pub encoding: ImageEncoding,
    pub data: Vec<u8>,
}

/// Everything a worker needs to recognise one page, fully owned.
#[derive(Debug, Clone)]
pub struct PageSnapshot {
    pub page_num: u32,
    pub media_box: Rect,
    /// Decoded content operators, or why they could not be decoded.
    pub content: std::result::Result<Vec<Operation>, String>,
    pub fonts: HashMap<Vec<u8>, FontInfo>,
    /// Only captured when a recognizer asks for images.
    pub images: Vec<PageImage>,
}

/// Reads an existing PDF.
pub struct PdfReader {
    document: Document,
    pages: BTreeMap<u32, ObjectId>,
}

impl PdfReader {
    // -- Construction ---------------------------------------------------------

    /// Load a PDF from memory. Fails with `InvalidDocument` if the bytes do
    /// not parse, are encrypted, or contain no pages.
    #[instrument(skip_all, fields(bytes_len = data.len()))]
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let document = Document::load_mem(data).map_err(|err| {
            DocuAlignError::InvalidDocument(format!("failed to load PDF from memory: {}", err))
        })?;

        if document.is_encrypted() {
            return Err(DocuAlignError::InvalidDocument(
                "encrypted PDFs are not supported".into(),
            ));
        }

        let pages = document.get_pages();
        if pages.is_empty() {
            return Err(DocuAlignError::InvalidDocument(
                "document has no resolvable pages".into(),
            ));
        }

        debug!(pages = pages.len(), "PDF loaded from bytes");
        Ok(Self { document, pages })
    }

    // -- Inspection -----------------------------------------------------------

    pub fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub(crate) fn document_mut(&mut self) -> &mut Document {
        &mut self.document
    }

    pub fn into_document(self) -> Document {
        self.document
    }

    pub fn page_info(&self, page_num: u32) -> Result<PageInfo> {
        let id = self.page_id(page_num)?;

        let media_box = match self.inherited(id, b"MediaBox").map(|obj| resolve(&self.document, obj)) {
            Some(Object::Array(items)) if items.len() == 4 => {
                let coords: Vec<f32> = items
                    .iter()
                    .filter_map(|obj| number(resolve(&self.document, obj)))
                    .collect();
                match coords.as_slice() {
                    [x0, y0, x1, y1] => Rect::new(*x0, *y0, *x1, *y1),
                    _ => DEFAULT_MEDIA_BOX,
                }
            }
            _ => DEFAULT_MEDIA_BOX,
        };
        let media_box = if media_box.is_empty() {
            warn!(page_num, "degenerate /MediaBox, assuming US Letter");
            DEFAULT_MEDIA_BOX
        } else {
            media_box
        };

        Ok(PageInfo {
            page_num,
            id,
            media_box,
        })
    }

    pub(crate) fn page_id(&self, page_num: u32) -> Result<ObjectId> {
        self.pages
            .get(&page_num)
            .copied()
            .ok_or(DocuAlignError::PageOutOfRange {
                page_num,
                page_count: self.page_count(),
            })
    }

    pub(crate) fn page_dict(&self, id: ObjectId) -> Result<&Dictionary> {
        self.document.get_dictionary(id).map_err(|err| {
            DocuAlignError::InvalidDocument(format!("page object {:?} is not a dictionary: {}", id, err))
        })
    }

    /// Look up a page attribute, walking `/Parent` links for inheritable
    /// keys. Returns the object as stored, references unresolved.
    pub(crate) fn inherited(&self, page_id: ObjectId, key: &[u8]) -> Option<&Object> {
        let mut dict = self.document.get_dictionary(page_id).ok()?;
        for _ in 0..MAX_TREE_DEPTH {
            if let Ok(obj) = dict.get(key) {
                return Some(obj);
            }
            dict = match dict.get(b"Parent").ok()? {
                Object::Reference(parent) => self.document.get_dictionary(*parent).ok()?,
                _ => return None,
            };
        }
        None
    }

    /// The page's effective `/Resources` dictionary.
    pub(crate) fn resources(&self, page_id: ObjectId) -> Option<&Dictionary> {
        match resolve(&self.document, self.inherited(page_id, b"Resources")?) {
            Object::Dictionary(dict) => Some(dict),
            _ => None,
        }
    }

    // -- Content --------------------------------------------------------------

    /// Concatenated, decoded bytes of all the page's content streams.
    pub fn content_bytes(&self, page_id: ObjectId) -> std::result::Result<Vec<u8>, String> {
        let page = self.page_dict(page_id).map_err(|err| err.to_string())?;
        let contents = match page.get(b"Contents") {
            Ok(obj) => resolve(&self.document, obj),
            Err(_) => return Ok(Vec::new()),
        };

        let streams: Vec<&Object> = match contents {
            Object::Array(items) => items.iter().map(|obj| resolve(&self.document, obj)).collect(),
            other => vec![other],
        };

        let mut bytes = Vec::new();
        for (index, obj) in streams.into_iter().enumerate() {
            match obj {
                Object::Stream(stream) => {
                    let data = stream_data(stream)
                        .map_err(|err| format!("content stream #{index} could not be decoded: {err}"))?;
                    if !bytes.is_empty() {
                        bytes.push(b'\n');
                    }
                    bytes.extend_from_slice(&data);
                }
                Object::Null => {}
                _ => return Err(format!("content entry #{index} is not a stream")),
            }
        }
        Ok(bytes)
    }

    /// Decoded content operators of a page.
    pub fn page_operations(&self, page_id: ObjectId) -> std::result::Result<Vec<Operation>, String> {
        let bytes = self.content_bytes(page_id)?;
        Content::decode(&bytes)
            .map(|content| content.operations)
            .map_err(|err| format!("content stream could not be parsed: {err}"))
    }

    /// Font decoders for every `/Font` resource of the page.
    pub fn page_fonts(&self, page_id: ObjectId) -> HashMap<Vec<u8>, FontInfo> {
        let Some(fonts) = self
            .resources(page_id)
            .and_then(|res| get_dict(&self.document, res, b"Font"))
        else {
            return HashMap::new();
        };

        fonts
            .iter()
            .filter_map(|(key, obj)| match resolve(&self.document, obj) {
                Object::Dictionary(dict) => {
                    Some((key.clone(), FontInfo::from_dict(&self.document, dict)))
                }
                _ => None,
            })
            .collect()
    }

    /// Image XObjects in the page's resources.
    pub fn page_images(&self, page_id: ObjectId) -> Vec<PageImage> {
        let Some(xobjects) = self
            .resources(page_id)
            .and_then(|res| get_dict(&self.document, res, b"XObject"))
        else {
            return Vec::new();
        };

        xobjects
            .iter()
            .filter_map(|(key, obj)| match resolve(&self.document, obj) {
                Object::Stream(stream) => self.read_image(key, stream),
                _ => None,
            })
            .collect()
    }

    fn read_image(&self, key: &[u8], stream: &lopdf::Stream) -> Option<PageImage> {
        let doc = &self.document;
        let dict = &stream.dict;
        if get(doc, dict, b"Subtype").and_then(name) != Some(b"Image".as_slice()) {
            return None;
        }

        let dimension = |k: &[u8]| {
            get(doc, dict, k)
                .and_then(number)
                .filter(|n| *n >= 1.0)
                .map(|n| n as u32)
        };
        let width = dimension(b"Width")?;
        let height = dimension(b"Height")?;

        let is_mask = matches!(get(doc, dict, b"ImageMask"), Some(Object::Boolean(true)));
        let bits_per_component = if is_mask {
            1
        } else {
            get(doc, dict, b"BitsPerComponent")
                .and_then(number)
                .map(|n| n as u8)
                .unwrap_or(8)
        };
        let components = if is_mask {
            Some(1)
        } else {
            get(doc, dict, b"ColorSpace").and_then(|cs| color_components(doc, cs))
        };

        let filters: Vec<Vec<u8>> = match get(doc, dict, b"Filter") {
            Some(Object::Name(filter)) => vec![filter.clone()],
            Some(Object::Array(items)) => items
                .iter()
                .filter_map(|obj| name(resolve(doc, obj)).map(<[u8]>::to_vec))
                .collect(),
            _ => Vec::new(),
        };

        let (encoding, data) = match filters.as_slice() {
            [] => (ImageEncoding::Raw, stream.content.clone()),
            [only] if only == b"DCTDecode" => (ImageEncoding::Jpeg, stream.content.clone()),
            all if all.iter().all(|f| f == b"FlateDecode") => match stream.decompressed_content() {
                Ok(data) => (ImageEncoding::Raw, data),
                Err(err) => (ImageEncoding::Unsupported(format!("FlateDecode failed: {err}")), Vec::new()),
            },
            other => {
                let names: Vec<String> = other
                    .iter()
                    .map(|f| String::from_utf8_lossy(f).into_owned())
                    .collect();
                (ImageEncoding::Unsupported(names.join("+")), Vec::new())
            }
        };

        Some(PageImage {
            name: key.to_vec(),
            width,
            height,
            bits_per_component,
            components,
            encoding,
            data,
        })
    }

    // -- Snapshots ------------------------------------------------------------

    /// Capture an owned snapshot of one page.
    pub fn snapshot(&self, page_num: u32, with_images: bool) -> Result<PageSnapshot> {
        let info = self.page_info(page_num)?;
        Ok(PageSnapshot {
            page_num,
            media_box: info.media_box,
            content: self.page_operations(info.id),
            fonts: self.page_fonts(info.id),
            images: if with_images {
                self.page_images(info.id)
            } else {
                Vec::new()
            },
        })
    }

    /// Snapshots of every page, in page order.
    #[instrument(skip(self))]
    pub fn snapshots(&self, with_images: bool) -> Result<Vec<PageSnapshot>> {
        let snapshots = self
            .pages
            .keys()
            .map(|&page_num| self.snapshot(page_num, with_images))
            .collect::<Result<Vec<_>>>()?;
        info!(pages = snapshots.len(), "Captured page snapshots");
        Ok(snapshots)
    }
}

fn color_components(doc: &Document, cs: &Object) -> Option<u8> {
    match cs {
        Object::Name(n) => match n.as_slice() {
            b"DeviceGray" | b"CalGray" | b"G" => Some(1),
            b"DeviceRGB" | b"CalRGB" | b"RGB" => Some(3),
            b"DeviceCMYK" | b"CMYK" => Some(4),
            _ => None,
        },
        Object::Array(items) => {
            let family = items.first().map(|obj| resolve(doc, obj)).and_then(name)?;
            match family {
                b"ICCBased" => match items.get(1).map(|obj| resolve(doc, obj)) {
                    Some(Object::Stream(profile)) => profile
                        .dict
                        .get(b"N")
                        .ok()
                        .and_then(number)
                        .map(|n| n as u8),
                    _ => None,
                },
                b"CalGray" => Some(1),
                b"CalRGB" => Some(3),
                _ => None,
            }
        }
        _ => None,
    }
}
