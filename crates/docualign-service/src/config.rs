// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Service configuration: where documents live and how the engine runs.

use std::path::{Path, PathBuf};

use docualign_core::EngineConfig;
use docualign_core::error::{DocuAlignError, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

const METADATA_DB: &str = "documents.db";
const BLOB_DIR: &str = "blobs";

/// `$XDG_DATA_HOME/docualign`, or `~/.local/share/docualign`.
pub fn default_data_dir() -> PathBuf {
    let base = if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
        PathBuf::from(xdg)
    } else if let Ok(home) = std::env::var("HOME") {
        PathBuf::from(home).join(".local").join("share")
    } else {
        PathBuf::from(".")
    };
    base.join("docualign")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub data_dir: PathBuf,
    pub engine: EngineConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            engine: EngineConfig::default(),
        }
    }
}

impl ServiceConfig {
    /// Read a JSON config file. A missing file gives the defaults; an
    /// unreadable or malformed one is an error.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no config file, using defaults");
                return Ok(Self::default());
            }
            Err(err) => return Err(err.into()),
        };
        let config: Self = serde_json::from_str(&text).map_err(|e| {
            DocuAlignError::Config(format!("{}: {}", path.display(), e))
        })?;
        config.engine.validate()?;
        info!(path = %path.display(), "config loaded");
        Ok(config)
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.data_dir.join(METADATA_DB)
    }

    pub fn blob_dir(&self) -> PathBuf {
        self.data_dir.join(BLOB_DIR)
    }
}
