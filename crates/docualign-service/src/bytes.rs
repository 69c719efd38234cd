// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Raw byte storage for uploaded and edited documents.
//
// Keys are the SHA-256 of the stored bytes, so saving the same document twice
// yields the same key and one copy on disk.

use std::collections::HashMap;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use docualign_core::error::{DocuAlignError, Result};
use tracing::{debug, info, instrument, warn};

use crate::integrity::{hash_bytes, is_hash_key, verify_hash};

/// Opaque key/value storage for document bytes.
///
/// Calls are synchronous; async callers run them on a blocking thread.
pub trait ByteStore: Send + Sync {
    /// Store `bytes` and return the key to load them with.
    fn save(&self, bytes: &[u8]) -> Result<String>;

    /// Fails with [`DocuAlignError::NotFound`] when nothing is stored under
    /// `key`; other failures are reported as I/O errors.
    fn load(&self, key: &str) -> Result<Vec<u8>>;

    /// Remove `key`. Deleting a missing key is not an error.
    fn delete(&self, key: &str) -> Result<()>;
}

/// Documents as files under an explicit root directory.
#[derive(Debug, Clone)]
pub struct FsByteStore {
    root: PathBuf,
}

impl FsByteStore {
    /// Open a store rooted at `root`, creating the directory if needed.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        info!(root = %root.display(), "byte store opened");
        Ok(Self { root })
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        // Anything that is not a hash cannot name a stored file, and must not
        // be joined onto the root.
        if !is_hash_key(key) {
            return Err(DocuAlignError::NotFound(key.to_owned()));
        }
        Ok(self.root.join(key))
    }
}

impl ByteStore for FsByteStore {
    #[instrument(skip_all, fields(len = bytes.len()))]
    fn save(&self, bytes: &[u8]) -> Result<String> {
        let key = hash_bytes(bytes);
        let path = self.path_for(&key)?;
        if path.exists() {
            debug!(%key, "bytes already stored");
            return Ok(key);
        }

        // Write to a temporary file in the same directory, then rename it into
        // place so readers never see a partial document.
        let mut tmp = tempfile::NamedTempFile::new_in(&self.root)?;
        tmp.write_all(bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path).map_err(|e| DocuAlignError::Io(e.error))?;

        debug!(%key, "bytes stored");
        Ok(key)
    }

    #[instrument(skip(self))]
    fn load(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.path_for(key)?;
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(DocuAlignError::NotFound(key.to_owned()));
            }
            Err(err) => return Err(err.into()),
        };
        verify_hash(&bytes, key)?;
        Ok(bytes)
    }

    #[instrument(skip(self))]
    fn delete(&self, key: &str) -> Result<()> {
        let path = match self.path_for(key) {
            Ok(path) => path,
            Err(_) => {
                warn!("ignoring delete of malformed key");
                return Ok(());
            }
        };
        match std::fs::remove_file(&path) {
            Ok(()) => {
                debug!("bytes deleted");
                Ok(())
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

/// In-process store, for tests and one-shot tools.
#[derive(Debug, Default)]
pub struct MemoryByteStore {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryByteStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ByteStore for MemoryByteStore {
    fn save(&self, bytes: &[u8]) -> Result<String> {
        let key = hash_bytes(bytes);
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(key.clone())
            .or_insert_with(|| bytes.to_vec());
        Ok(key)
    }

    fn load(&self, key: &str) -> Result<Vec<u8>> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
            .ok_or_else(|| DocuAlignError::NotFound(key.to_owned()))
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exercise(store: &dyn ByteStore) {
        let key = store.save(b"%PDF-1.5 test").unwrap();
        assert_eq!(key, hash_bytes(b"%PDF-1.5 test"));
        assert_eq!(store.save(b"%PDF-1.5 test").unwrap(), key);
        assert_eq!(store.load(&key).unwrap(), b"%PDF-1.5 test");

        store.delete(&key).unwrap();
        store.delete(&key).unwrap();
        assert!(matches!(store.load(&key), Err(DocuAlignError::NotFound(_))));
    }

    #[test]
    fn fs_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsByteStore::open(dir.path().join("blobs")).unwrap();
        exercise(&store);
    }

    #[test]
    fn memory_store_round_trip() {
        let store = MemoryByteStore::new();
        exercise(&store);
        assert!(store.is_empty());
    }

    #[test]
    fn fs_store_rejects_path_like_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsByteStore::open(dir.path()).unwrap();
        assert!(matches!(
            store.load("../secrets"),
            Err(DocuAlignError::NotFound(_))
        ));
    }

    #[test]
    fn fs_store_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsByteStore::open(dir.path()).unwrap();
        let key = store.save(b"one").unwrap();
        let names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec![key]);
    }

    #[test]
    fn fs_store_detects_tampering() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsByteStore::open(dir.path()).unwrap();
        let key = store.save(b"original").unwrap();
        std::fs::write(dir.path().join(&key), b"tampered").unwrap();
        assert!(matches!(store.load(&key), Err(DocuAlignError::Io(_))));
    }
}
