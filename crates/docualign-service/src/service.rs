// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The document service: upload, extract, edit, download.
//
// Store calls are synchronous and run on blocking threads. Nothing a call
// does is visible to other calls until it has fully succeeded, and a stored
// document is never overwritten: edits are saved as new documents.
//
// Bytes are shared between records with the same content, so saving bytes
// plus inserting a record, and removing a record plus collecting its bytes,
// run under one lock. Reads take no lock.

use std::path::Path;
use std::sync::Arc;

use docualign_core::error::{DocuAlignError, Result};
use docualign_core::types::{DocumentId, DocumentRecord, EditBatchRequest, ExtractionResult, Warning};
use docualign_document::{BlockExtractor, apply_edits};
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

use crate::bytes::{ByteStore, FsByteStore};
use crate::config::ServiceConfig;
use crate::metadata::{MetadataStore, SqliteMetadataStore};

const PDF_CONTENT_TYPE: &str = "application/pdf";
const FALLBACK_FILENAME: &str = "document.pdf";

/// The result of editing a stored document, ready to hand back as a
/// download.
#[derive(Debug, Clone, PartialEq)]
pub struct EditedDocument {
    /// `edited_<original filename>`.
    pub filename: String,
    pub pdf: Vec<u8>,
    pub warnings: Vec<Warning>,
}

/// Cheap to clone; all state is shared.
#[derive(Clone)]
pub struct DocumentService {
    bytes: Arc<dyn ByteStore>,
    metadata: Arc<dyn MetadataStore>,
    extractor: BlockExtractor,
    /// Held while a call writes or collects stored bytes.
    write_lock: Arc<Mutex<()>>,
}

impl DocumentService {
    pub fn new(bytes: Arc<dyn ByteStore>, metadata: Arc<dyn MetadataStore>, extractor: BlockExtractor) -> Self {
        Self {
            bytes,
            metadata,
            extractor,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// A service on disk under `config.data_dir`.
    #[instrument(skip_all, fields(data_dir = %config.data_dir.display()))]
    pub fn open(config: &ServiceConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.data_dir)?;
        let bytes = FsByteStore::open(config.blob_dir())?;
        let metadata = SqliteMetadataStore::open(config.metadata_path())?;
        let extractor = BlockExtractor::from_config(config.engine.clone())?;

        info!(recognizer = extractor.recognizer_name(), "document service ready");
        Ok(Self::new(Arc::new(bytes), Arc::new(metadata), extractor))
    }

    /// Store a new document and return its id.
    #[instrument(skip(self, bytes), fields(len = bytes.len()))]
    pub async fn upload(&self, filename: &str, content_type: &str, bytes: Vec<u8>) -> Result<DocumentId> {
        let filename = sanitize_filename(filename);
        let content_type = content_type.to_owned();
        let store = Arc::clone(&self.bytes);
        let metadata = Arc::clone(&self.metadata);
        // Moved into the blocking task so it is released only when the
        // stores are, even if this future is dropped.
        let guard = Arc::clone(&self.write_lock).lock_owned().await;

        let id = blocking(move || {
            let _guard = guard;
            let key = store.save(&bytes)?;
            let record = DocumentRecord::new(filename, key.clone(), content_type);
            if let Err(err) = metadata.insert(&record) {
                // Leave no orphaned bytes behind.
                if metadata.count_by_key(&key).unwrap_or(1) == 0 {
                    let _ = store.delete(&key);
                }
                return Err(err);
            }
            Ok(record.id)
        })
        .await?;

        info!(%id, "document uploaded");
        Ok(id)
    }

    pub async fn record(&self, id: &DocumentId) -> Result<DocumentRecord> {
        let metadata = Arc::clone(&self.metadata);
        let id = *id;
        blocking(move || find(metadata.as_ref(), &id)).await
    }

    /// Every stored document, newest first.
    pub async fn list(&self) -> Result<Vec<DocumentRecord>> {
        let metadata = Arc::clone(&self.metadata);
        blocking(move || metadata.list()).await
    }

    #[instrument(skip(self), fields(id = %id))]
    pub async fn download(&self, id: &DocumentId) -> Result<(DocumentRecord, Vec<u8>)> {
        let metadata = Arc::clone(&self.metadata);
        let store = Arc::clone(&self.bytes);
        let id = *id;
        blocking(move || {
            let record = find(metadata.as_ref(), &id)?;
            let bytes = store.load(&record.stored_key)?;
            Ok((record, bytes))
        })
        .await
    }

    #[instrument(skip(self), fields(id = %id))]
    pub async fn extract_blocks(&self, id: &DocumentId) -> Result<ExtractionResult> {
        let (_, bytes) = self.download(id).await?;
        self.extractor.extract(&bytes).await
    }

    /// The stored document's text, one line per block, pages split by form
    /// feeds.
    #[instrument(skip(self), fields(id = %id))]
    pub async fn extract_text(&self, id: &DocumentId) -> Result<String> {
        let (_, bytes) = self.download(id).await?;
        self.extractor.extract_text(&bytes).await
    }

    /// Apply `batch` to a stored document. The stored document is left as it
    /// was.
    #[instrument(skip(self, batch), fields(id = %id, edits = batch.edits.len()))]
    pub async fn edit(&self, id: &DocumentId, batch: EditBatchRequest) -> Result<EditedDocument> {
        let edits = batch.into_edits()?;
        let (record, bytes) = self.download(id).await?;

        let outcome = blocking(move || apply_edits(&bytes, &edits)).await?;
        for warning in &outcome.warnings {
            warn!(%warning, "edit warning");
        }

        Ok(EditedDocument {
            filename: format!("edited_{}", record.original_filename),
            pdf: outcome.pdf,
            warnings: outcome.warnings,
        })
    }

    /// Apply `batch` and store the result as a new document.
    pub async fn save_edit(&self, id: &DocumentId, batch: EditBatchRequest) -> Result<DocumentId> {
        let edited = self.edit(id, batch).await?;
        let new_id = self.upload(&edited.filename, PDF_CONTENT_TYPE, edited.pdf).await?;
        info!(source = %id, %new_id, "edited document saved");
        Ok(new_id)
    }

    /// Remove a document. Its bytes go too unless another record still
    /// refers to them.
    #[instrument(skip(self), fields(id = %id))]
    pub async fn delete(&self, id: &DocumentId) -> Result<()> {
        let metadata = Arc::clone(&self.metadata);
        let store = Arc::clone(&self.bytes);
        let id = *id;
        let guard = Arc::clone(&self.write_lock).lock_owned().await;
        blocking(move || {
            let _guard = guard;
            let record = find(metadata.as_ref(), &id)?;
            metadata.delete(&id)?;
            if metadata.count_by_key(&record.stored_key)? == 0 {
                store.delete(&record.stored_key)?;
            }
            Ok(())
        })
        .await?;

        info!("document deleted");
        Ok(())
    }
}

fn find(metadata: &dyn MetadataStore, id: &DocumentId) -> Result<DocumentRecord> {
    metadata
        .get(id)?
        .ok_or_else(|| DocuAlignError::DocumentNotFound(id.to_string()))
}

/// The last path component of `name`, or a fixed name if there is none.
fn sanitize_filename(name: &str) -> String {
    Path::new(name.trim())
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty())
        .unwrap_or(FALLBACK_FILENAME)
        .to_owned()
}

async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| DocuAlignError::TaskFailed(e.to_string()))?
}

#[cfg(test)]
mod tests {
    use docualign_core::EngineConfig;
    use docualign_core::types::EditRequest;
    use docualign_document::TextLayerRecognizer;
    use lopdf::content::{Content, Operation};
    use std::sync::PoisonError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use lopdf::{Document, Object, Stream, StringFormat, dictionary};

    use super::*;
    use crate::bytes::MemoryByteStore;

    /// Two Letter pages, each with one line of Helvetica.
    fn sample_pdf() -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let mut kids = Vec::new();
        for text in ["Hello", "Second page"] {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 12.into()]),
                    Operation::new("Td", vec![10.into(), 705.into()]),
                    Operation::new(
                        "Tj",
                        vec![Object::String(text.as_bytes().to_vec(), StringFormat::Literal)],
                    ),
                    Operation::new("ET", vec![]),
                ],
            };
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(Object::Reference(page_id));
        }
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => 2,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
                "Resources" => dictionary! { "Font" => dictionary! { "F1" => font_id } },
            }),
        );
        let catalog_id = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
        doc.trailer.set("Root", catalog_id);
        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        bytes
    }

    fn service() -> (DocumentService, Arc<MemoryByteStore>) {
        let bytes = Arc::new(MemoryByteStore::new());
        let metadata = Arc::new(SqliteMetadataStore::open_in_memory().unwrap());
        let extractor = BlockExtractor::new(Arc::new(TextLayerRecognizer), EngineConfig::default());
        (DocumentService::new(bytes.clone(), metadata, extractor), bytes)
    }

    fn batch(page_num: u32, text: &str) -> EditBatchRequest {
        EditBatchRequest {
            edits: vec![EditRequest {
                page_num,
                redact_coords: [10.0, 700.0, 100.0, 720.0],
                insert_coords: [10.0, 700.0],
                new_text: text.into(),
                fontname: None,
                fontsize: None,
            }],
            fontname: Some("serif".into()),
            fontsize: Some(10.0),
        }
    }

    #[tokio::test]
    async fn upload_download_and_extract() {
        let (service, _) = service();
        let pdf = sample_pdf();
        let id = service.upload("../uploads/scan.pdf", PDF_CONTENT_TYPE, pdf.clone()).await.unwrap();

        let (record, bytes) = service.download(&id).await.unwrap();
        assert_eq!(record.original_filename, "scan.pdf");
        assert_eq!(bytes, pdf);

        let result = service.extract_blocks(&id).await.unwrap();
        let texts: Vec<(u32, &str)> = result.blocks.iter().map(|b| (b.page_num, b.text.as_str())).collect();
        assert_eq!(texts, vec![(1, "Hello"), (2, "Second page")]);
        assert_eq!(service.extract_text(&id).await.unwrap(), "Hello\u{c}Second page");
    }

    #[tokio::test]
    async fn edit_names_output_and_keeps_source() {
        let (service, _) = service();
        let pdf = sample_pdf();
        let id = service.upload("scan.pdf", PDF_CONTENT_TYPE, pdf.clone()).await.unwrap();

        let edited = service.edit(&id, batch(1, "Goodbye")).await.unwrap();
        assert_eq!(edited.filename, "edited_scan.pdf");
        assert!(edited.warnings.is_empty());
        assert_ne!(edited.pdf, pdf);

        let (_, stored) = service.download(&id).await.unwrap();
        assert_eq!(stored, pdf);
    }

    #[tokio::test]
    async fn failed_edit_leaves_store_untouched() {
        let (service, store) = service();
        let pdf = sample_pdf();
        let id = service.upload("scan.pdf", PDF_CONTENT_TYPE, pdf.clone()).await.unwrap();

        assert!(matches!(
            service.save_edit(&id, batch(5, "nope")).await,
            Err(DocuAlignError::PageOutOfRange { page_num: 5, page_count: 2 })
        ));
        assert_eq!(store.len(), 1);
        assert_eq!(service.list().await.unwrap().len(), 1);
        assert_eq!(service.download(&id).await.unwrap().1, pdf);
    }

    #[tokio::test]
    async fn save_edit_creates_new_document() {
        let (service, _) = service();
        let id = service.upload("scan.pdf", PDF_CONTENT_TYPE, sample_pdf()).await.unwrap();

        let new_id = service.save_edit(&id, batch(1, "Goodbye")).await.unwrap();
        assert_ne!(new_id, id);
        let record = service.record(&new_id).await.unwrap();
        assert_eq!(record.original_filename, "edited_scan.pdf");
        assert_eq!(record.content_type, PDF_CONTENT_TYPE);

        let blocks = service.extract_blocks(&new_id).await.unwrap().blocks;
        assert_eq!(blocks[0].text, "Goodbye");
    }

    #[tokio::test]
    async fn unknown_font_is_rejected_before_loading() {
        let (service, _) = service();
        let id = service.upload("scan.pdf", PDF_CONTENT_TYPE, sample_pdf()).await.unwrap();
        let mut request = batch(1, "x");
        request.fontname = Some("fraktur".into());
        assert!(matches!(
            service.edit(&id, request).await,
            Err(DocuAlignError::FontUnsupported(_))
        ));
    }

    #[tokio::test]
    async fn unknown_id_is_document_not_found() {
        let (service, _) = service();
        let missing = DocumentId::new();
        assert!(matches!(
            service.download(&missing).await,
            Err(DocuAlignError::DocumentNotFound(_))
        ));
        assert!(matches!(
            service.delete(&missing).await,
            Err(DocuAlignError::DocumentNotFound(_))
        ));
    }

    #[tokio::test]
    async fn delete_keeps_bytes_shared_with_other_records() {
        let (service, store) = service();
        let pdf = sample_pdf();
        let first = service.upload("a.pdf", PDF_CONTENT_TYPE, pdf.clone()).await.unwrap();
        let second = service.upload("b.pdf", PDF_CONTENT_TYPE, pdf).await.unwrap();
        assert_eq!(store.len(), 1);

        service.delete(&first).await.unwrap();
        assert_eq!(store.len(), 1);
        assert!(service.download(&second).await.is_ok());

        service.delete(&second).await.unwrap();
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn open_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let config = ServiceConfig {
            data_dir: dir.path().join("data"),
            engine: EngineConfig {
                ocr_model_dir: Some(dir.path().join("no-models")),
                ..Default::default()
            },
        };
        // Without the `ocr` feature the model directory is ignored.
        if cfg!(feature = "ocr") {
            return;
        }
        let service = DocumentService::open(&config).unwrap();
        let id = service.upload("disk.pdf", PDF_CONTENT_TYPE, sample_pdf()).await.unwrap();
        assert!(config.metadata_path().exists());
        assert_eq!(service.record(&id).await.unwrap().original_filename, "disk.pdf");
    }

    /// Memory store whose `save` waits on `gate` after storing, so a test
    /// can hold an upload between saving bytes and inserting its record.
    struct GatedStore {
        inner: MemoryByteStore,
        gate: std::sync::Mutex<()>,
        saves: AtomicUsize,
    }

    impl ByteStore for GatedStore {
        fn save(&self, bytes: &[u8]) -> Result<String> {
            let key = self.inner.save(bytes)?;
            self.saves.fetch_add(1, Ordering::SeqCst);
            drop(self.gate.lock().unwrap_or_else(PoisonError::into_inner));
            Ok(key)
        }

        fn load(&self, key: &str) -> Result<Vec<u8>> {
            self.inner.load(key)
        }

        fn delete(&self, key: &str) -> Result<()> {
            self.inner.delete(key)
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn delete_during_upload_of_same_bytes_keeps_them() {
        let store = Arc::new(GatedStore {
            inner: MemoryByteStore::new(),
            gate: std::sync::Mutex::new(()),
            saves: AtomicUsize::new(0),
        });
        let metadata = Arc::new(SqliteMetadataStore::open_in_memory().unwrap());
        let extractor = BlockExtractor::new(Arc::new(TextLayerRecognizer), EngineConfig::default());
        let service = DocumentService::new(store.clone(), metadata, extractor);

        let pdf = sample_pdf();
        let existing = service.upload("a.pdf", PDF_CONTENT_TYPE, pdf.clone()).await.unwrap();

        let held = store.gate.lock().unwrap();
        let uploader = tokio::spawn({
            let service = service.clone();
            async move { service.upload("b.pdf", PDF_CONTENT_TYPE, pdf).await }
        });
        for _ in 0..200 {
            if store.saves.load(Ordering::SeqCst) == 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(store.saves.load(Ordering::SeqCst), 2);

        // The second upload has saved its bytes but not yet inserted its
        // record; deleting the only other record must not collect them.
        let deleter = tokio::spawn({
            let service = service.clone();
            async move { service.delete(&existing).await }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        drop(held);

        let uploaded = uploader.await.unwrap().unwrap();
        deleter.await.unwrap().unwrap();
        assert!(service.download(&uploaded).await.is_ok());
        assert_eq!(store.inner.len(), 1);
    }

    #[test]
    fn filenames_lose_directories() {
        assert_eq!(sanitize_filename("scan.pdf"), "scan.pdf");
        assert_eq!(sanitize_filename("/tmp/a/b.pdf"), "b.pdf");
        assert_eq!(sanitize_filename(".."), FALLBACK_FILENAME);
        assert_eq!(sanitize_filename(""), FALLBACK_FILENAME);
    }
}
