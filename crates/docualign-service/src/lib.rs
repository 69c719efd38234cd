// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// docualign-service: byte and metadata stores, and the document service that
// ties them to the engine.

pub mod bytes;
pub mod config;
pub mod integrity;
pub mod metadata;
pub mod service;

pub use bytes::{ByteStore, FsByteStore, MemoryByteStore};
pub use config::ServiceConfig;
pub use metadata::{MetadataStore, SqliteMetadataStore};
pub use service::{DocumentService, EditedDocument};
