//! Ingestion errors.
//!
//! Two tiers: [`IngestError`] aborts the run, [`RecordError`] rejects one
//! record (or one flat row) and lets the rest of the collection proceed.

use std::path::PathBuf;

use thiserror::Error;

use crate::domain::TrajectoryError;

/// Fatal ingestion errors.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed trajectory '{id}': {reason}")]
    MalformedTrajectory { id: String, reason: String },
}

impl From<TrajectoryError> for IngestError {
    fn from(err: TrajectoryError) -> Self {
        match err {
            TrajectoryError::Empty { id } => IngestError::MalformedTrajectory {
                id,
                reason: "no resolvable steps".into(),
            },
        }
    }
}

/// Per-record failures. `line` is 1-based in the source file.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    #[error("line {line}: invalid JSON: {message}")]
    InvalidJson { line: usize, message: String },
    #[error("line {line}: record is not a JSON object")]
    NotAnObject { line: usize },
    #[error("line {line}: field '{field}' is not numeric: {value}")]
    NonNumeric {
        line: usize,
        field: &'static str,
        value: String,
    },
    #[error("line {line}: '{key}' is not an array")]
    StepsNotArray { line: usize, key: &'static str },
    #[error("line {line}: step {index} is not a JSON object")]
    StepNotObject { line: usize, index: usize },
    #[error("line {line}: no identifier, index or problem text to group by")]
    MissingIdentifier { line: usize },
}

impl RecordError {
    pub fn line(&self) -> usize {
        match self {
            RecordError::InvalidJson { line, .. }
            | RecordError::NotAnObject { line }
            | RecordError::NonNumeric { line, .. }
            | RecordError::StepsNotArray { line, .. }
            | RecordError::StepNotObject { line, .. }
            | RecordError::MissingIdentifier { line } => *line,
        }
    }
}
