use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::types::{ItemId, Phrase, RunId};

/// Error type for run loading, classification, and report persistence failures.
#[derive(Debug, Error)]
pub enum ConsensusError {
    #[error("run '{run}' is unavailable: {reason}")]
    RunUnavailable { run: RunId, reason: String },
    #[error("file '{}' is missing required column '{column}'", .path.display())]
    MissingColumn { path: PathBuf, column: String },
    #[error("file '{}' has a malformed row at line {line}: {details}", .path.display())]
    MalformedRow {
        path: PathBuf,
        line: u64,
        details: String,
    },
    #[error("run '{run}' item '{id}': phrase '{phrase}' does not match any candidate")]
    ClassificationFault {
        run: RunId,
        id: ItemId,
        phrase: Phrase,
    },
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
