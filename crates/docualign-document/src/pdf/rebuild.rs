// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Whole-document rebuild: swap in new content for edited pages, regenerate
// the cross-reference structure, and check the result before handing out
// any bytes.

use std::collections::{BTreeSet, HashMap};

use docualign_core::error::{DocuAlignError, Result};
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use tracing::{debug, info, instrument};

use super::reader::PdfReader;
use super::resolve;
use crate::fonts::StandardFont;

/// Trailer keys that only describe the old file layout.
const STALE_TRAILER_KEYS: [&[u8]; 8] = [
    b"Prev",
    b"XRefStm",
    b"Type",
    b"W",
    b"Index",
    b"Filter",
    b"DecodeParms",
    b"Length",
];

/// Rewrites a loaded document page by page.
pub struct PdfRebuilder {
    reader: PdfReader,
    font_ids: HashMap<StandardFont, ObjectId>,
}

impl PdfRebuilder {
    pub fn new(reader: PdfReader) -> Self {
        Self {
            reader,
            font_ids: HashMap::new(),
        }
    }

    /// Replace the content of page `page_num` and make sure `fonts` are
    /// available in its resources.
    pub fn replace_page_content(
        &mut self,
        page_num: u32,
        operations: Vec<Operation>,
        fonts: &BTreeSet<StandardFont>,
    ) -> Result<()> {
        let page_id = self.reader.page_id(page_num)?;
        let bytes = Content { operations }.encode().map_err(|err| {
            DocuAlignError::RebuildFailure(format!(
                "could not encode content for page {}: {}",
                page_num, err
            ))
        })?;

        let resources = if fonts.is_empty() {
            None
        } else {
            Some(self.resources_with_fonts(page_id, fonts))
        };

        let doc = self.reader.document_mut();
        let stream_id = doc.add_object(Stream::new(Dictionary::new(), bytes));
        let page = doc.get_dictionary_mut(page_id).map_err(|err| {
            DocuAlignError::RebuildFailure(format!("page {} is not a dictionary: {}", page_num, err))
        })?;
        page.set("Contents", Object::Reference(stream_id));
        if let Some(resources) = resources {
            page.set("Resources", Object::Dictionary(resources));
        }

        debug!(page_num, ?stream_id, "Replaced page content");
        Ok(())
    }

    /// A page-local copy of the effective resources, with a `/Font` entry for
    /// each of `fonts` that is not already present.
    fn resources_with_fonts(&mut self, page_id: ObjectId, fonts: &BTreeSet<StandardFont>) -> Dictionary {
        let doc = self.reader.document();
        let mut resources = self.reader.resources(page_id).cloned().unwrap_or_default();
        let mut font_dict = match resources.get(b"Font").map(|obj| resolve(doc, obj)) {
            Ok(Object::Dictionary(dict)) => dict.clone(),
            _ => Dictionary::new(),
        };

        let missing: Vec<StandardFont> = fonts
            .iter()
            .copied()
            .filter(|font| !font_dict.has(font.resource_name().as_bytes()))
            .collect();
        for font in missing {
            let id = self.font_object(font);
            font_dict.set(font.resource_name(), Object::Reference(id));
        }

        resources.set("Font", Object::Dictionary(font_dict));
        resources
    }

    /// One shared font object per standard font per document.
    fn font_object(&mut self, font: StandardFont) -> ObjectId {
        if let Some(id) = self.font_ids.get(&font) {
            return *id;
        }
        let id = self
            .reader
            .document_mut()
            .add_object(Object::Dictionary(font.resource_dictionary()));
        self.font_ids.insert(font, id);
        id
    }

    /// Regenerate structure, validate, and serialise.
    #[instrument(skip_all)]
    pub fn finish(self) -> Result<Vec<u8>> {
        let expected_pages = self.reader.page_count();
        let mut doc = self.reader.into_document();

        for key in STALE_TRAILER_KEYS {
            doc.trailer.remove(key);
        }
        let containers: Vec<ObjectId> = doc
            .objects
            .iter()
            .filter(|(_, obj)| is_structural_stream(obj))
            .map(|(id, _)| *id)
            .collect();
        for id in &containers {
            doc.objects.remove(id);
        }
        let pruned = doc.prune_objects();
        debug!(containers = containers.len(), pruned = pruned.len(), "Regenerated object table");

        check_structure(&doc, expected_pages)?;

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).map_err(|err| {
            DocuAlignError::RebuildFailure(format!("failed to serialise PDF: {}", err))
        })?;

        let reloaded = Document::load_mem(&bytes).map_err(|err| {
            DocuAlignError::RebuildFailure(format!("rebuilt PDF does not load: {}", err))
        })?;
        let reloaded_pages = reloaded.get_pages().len() as u32;
        if reloaded_pages != expected_pages {
            return Err(DocuAlignError::RebuildFailure(format!(
                "rebuilt PDF has {} pages, expected {}",
                reloaded_pages, expected_pages
            )));
        }

        info!(bytes = bytes.len(), pages = expected_pages, "PDF rebuilt");
        Ok(bytes)
    }
}

fn is_structural_stream(obj: &Object) -> bool {
    match obj {
        Object::Stream(stream) => matches!(
            stream.dict.get(b"Type"),
            Ok(Object::Name(name)) if name == b"XRef" || name == b"ObjStm"
        ),
        _ => false,
    }
}

/// The catalog, page tree, page count and every page's content and resource
/// references must hold together.
fn check_structure(doc: &Document, expected_pages: u32) -> Result<()> {
    let fail = |reason: String| Err(DocuAlignError::RebuildFailure(reason));

    let catalog = match doc.trailer.get(b"Root").map(|obj| resolve(doc, obj)) {
        Ok(Object::Dictionary(dict)) => dict,
        _ => return fail("trailer has no document catalog".into()),
    };
    if !matches!(
        catalog.get(b"Pages").map(|obj| resolve(doc, obj)),
        Ok(Object::Dictionary(_))
    ) {
        return fail("catalog has no page tree".into());
    }

    let pages = doc.get_pages();
    if pages.len() as u32 != expected_pages {
        return fail(format!(
            "page tree lists {} pages, expected {}",
            pages.len(),
            expected_pages
        ));
    }

    for (page_num, page_id) in pages {
        let page = match doc.get_dictionary(page_id) {
            Ok(page) => page,
            Err(_) => return fail(format!("page {page_num} is missing")),
        };
        let contents_ok = match page.get(b"Contents") {
            Err(_) => true,
            Ok(Object::Reference(id)) => matches!(
                doc.get_object(*id),
                Ok(Object::Stream(_)) | Ok(Object::Array(_))
            ),
            Ok(Object::Array(items)) => items.iter().all(|item| match item {
                Object::Reference(id) => doc.get_object(*id).is_ok(),
                _ => true,
            }),
            Ok(_) => false,
        };
        if !contents_ok {
            return fail(format!("page {page_num} has a dangling /Contents"));
        }
        if let Ok(Object::Reference(id)) = page.get(b"Resources") {
            if doc.get_object(*id).is_err() {
                return fail(format!("page {page_num} has a dangling /Resources"));
            }
        }
    }
    Ok(())
}
