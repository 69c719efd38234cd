// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Command-line arguments.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use docualign_core::RecognizerMode;

/// Extract, plan, and apply in-place text edits on PDFs.
#[derive(Debug, Parser)]
#[command(name = "docualign", about, version)]
pub struct Cli {
    /// JSON service config (data_dir, engine settings). Missing file means defaults.
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Engine overrides shared by the commands that extract.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct EngineArgs {
    /// text, ocr or auto (OCR on pages with a scan, text layer elsewhere)
    #[arg(long, value_name = "MODE")]
    pub recognizer: Option<RecognizerMode>,

    /// Directory holding the OCR models (needs the `ocr` feature)
    #[arg(long, value_name = "DIR")]
    pub ocr_models: Option<PathBuf>,

    /// Pages recognised at once
    #[arg(long)]
    pub workers: Option<usize>,

    /// Give up on extraction after this many seconds
    #[arg(long)]
    pub deadline_secs: Option<u64>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Print the text blocks of a PDF as JSON
    Extract {
        #[arg(value_name = "PDF")]
        file: PathBuf,

        #[command(flatten)]
        engine: EngineArgs,
    },

    /// Print the text of a PDF, one line per block, pages split by form feeds
    Text {
        #[arg(value_name = "PDF")]
        file: PathBuf,

        #[command(flatten)]
        engine: EngineArgs,
    },

    /// Turn edited block texts into an edit batch
    Plan {
        #[arg(value_name = "PDF")]
        file: PathBuf,

        /// JSON object mapping block index to its edited text
        #[arg(long, value_name = "FILE")]
        changes: PathBuf,

        /// serif, sans or mono
        #[arg(long)]
        font: String,

        /// Font size in points
        #[arg(long)]
        size: f32,

        #[command(flatten)]
        engine: EngineArgs,
    },

    /// Apply an edit batch and write the new PDF
    Edit {
        #[arg(value_name = "PDF")]
        file: PathBuf,

        /// Edit batch as printed by `plan`, or a bare array of edits
        #[arg(long, value_name = "FILE")]
        edits: PathBuf,

        /// Where to write the edited PDF
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,
    },

    /// Store a PDF and print its document id
    Upload {
        #[arg(value_name = "PDF")]
        file: PathBuf,

        /// Overrides the configured data directory
        #[arg(long, value_name = "DIR")]
        data_dir: Option<PathBuf>,
    },

    /// Print a stored document's record
    Show {
        #[arg(value_name = "ID")]
        id: String,

        /// Overrides the configured data directory
        #[arg(long, value_name = "DIR")]
        data_dir: Option<PathBuf>,

        /// Also extract and print the document's text blocks
        #[arg(long)]
        blocks: bool,
    },
}
