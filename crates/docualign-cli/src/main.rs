// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// docualign: command-line front end for the DocuAlign engine and service.
//
// JSON results go to stdout; logs and errors go to stderr.

mod cli;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use docualign_core::{EngineConfig, RecognizerMode};
use docualign_core::error::{DocuAlignError, Result};
use docualign_core::human_errors::describe_error;
use docualign_core::types::{DocumentId, EditBatchRequest, EditRequest, FontName};
use docualign_document::{BlockExtractor, EditPlanner, apply_edits};
use docualign_service::{DocumentService, ServiceConfig};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use cli::{Cli, Commands, EngineArgs};

const PDF_CONTENT_TYPE: &str = "application/pdf";

/// `--edits` accepts either a whole batch or a bare list of edits.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum EditsFile {
    Batch(EditBatchRequest),
    List(Vec<EditRequest>),
}

impl From<EditsFile> for EditBatchRequest {
    fn from(file: EditsFile) -> Self {
        match file {
            EditsFile::Batch(batch) => batch,
            EditsFile::List(edits) => edits.into(),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let client = describe_error(&err);
            eprintln!("Error: {}", client.message);
            eprintln!("  {}", client.suggestion);
            debug!(error = %err, status = client.status, "command failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => ServiceConfig::load(path)?,
        None => ServiceConfig::default(),
    };

    match cli.command {
        Commands::Extract { file, engine } => {
            let pdf = read_file(&file)?;
            let result = extractor(&config.engine, &engine)?.extract(&pdf).await?;
            print_json(&result)
        }

        Commands::Text { file, engine } => {
            let pdf = read_file(&file)?;
            let text = extractor(&config.engine, &engine)?.extract_text(&pdf).await?;
            println!("{text}");
            Ok(())
        }

        Commands::Plan {
            file,
            changes,
            font,
            size,
            engine,
        } => {
            let fontname: FontName = font.parse()?;
            if !(size.is_finite() && size > 0.0) {
                return Err(DocuAlignError::Config("--size must be a positive number".into()));
            }
            let changes: BTreeMap<usize, String> =
                serde_json::from_str(&std::fs::read_to_string(&changes)?)?;

            let pdf = read_file(&file)?;
            let result = extractor(&config.engine, &engine)?.extract(&pdf).await?;
            for warning in &result.warnings {
                warn!(%warning, "extraction warning");
            }

            let edits = EditPlanner::new(fontname, size).plan(&result.blocks, &changes);
            info!(blocks = result.blocks.len(), edits = edits.len(), "edit batch planned");
            let batch: EditBatchRequest = edits
                .into_iter()
                .map(EditRequest::from)
                .collect::<Vec<_>>()
                .into();
            print_json(&batch)
        }

        Commands::Edit { file, edits, output } => {
            let batch: EditBatchRequest =
                serde_json::from_str::<EditsFile>(&std::fs::read_to_string(&edits)?)?.into();
            let edits = batch.into_edits()?;
            let pdf = read_file(&file)?;

            let outcome = tokio::task::spawn_blocking(move || apply_edits(&pdf, &edits))
                .await
                .map_err(|e| DocuAlignError::TaskFailed(e.to_string()))??;
            std::fs::write(&output, &outcome.pdf)?;
            info!(output = %output.display(), warnings = outcome.warnings.len(), "edited PDF written");
            print_json(&outcome.warnings)
        }

        Commands::Upload { file, data_dir } => {
            let service = open_service(config, data_dir)?;
            let filename = file
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            let id = service.upload(&filename, PDF_CONTENT_TYPE, read_file(&file)?).await?;
            println!("{id}");
            Ok(())
        }

        Commands::Show { id, data_dir, blocks } => {
            let id: DocumentId = id.parse()?;
            let service = open_service(config, data_dir)?;
            let record = service.record(&id).await?;
            if blocks {
                let extraction = service.extract_blocks(&id).await?;
                print_json(&serde_json::json!({ "record": record, "extraction": extraction }))
            } else {
                print_json(&record)
            }
        }
    }
}

fn extractor(base: &EngineConfig, args: &EngineArgs) -> Result<BlockExtractor> {
    BlockExtractor::from_config(engine_config(base, args))
}

fn engine_config(base: &EngineConfig, args: &EngineArgs) -> EngineConfig {
    let mut config = base.clone();
    if let Some(dir) = &args.ocr_models {
        if !cfg!(feature = "ocr") {
            warn!("--ocr-models has no effect: built without the `ocr` feature");
        }
        config.ocr_model_dir = Some(dir.clone());
    }
    if let Some(mode) = args.recognizer {
        config.recognizer = mode;
    }
    if let Some(workers) = args.workers {
        config.worker_pool_size = workers;
    }
    if let Some(secs) = args.deadline_secs {
        config.extraction_deadline_secs = secs;
    }
    config
}

fn open_service(mut config: ServiceConfig, data_dir: Option<PathBuf>) -> Result<DocumentService> {
    if let Some(dir) = data_dir {
        config.data_dir = dir;
    }
    DocumentService::open(&config)
}

fn read_file(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|err| {
        warn!(path = %path.display(), "could not read input file");
        DocuAlignError::Io(err)
    })
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
