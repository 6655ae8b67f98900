use std::io;

use thiserror::Error;

/// Failures reading the respondent roster.
#[derive(Debug, Error)]
pub enum RosterError {
    #[error("missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Failures loading a previously exported quota configuration.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("cannot read '{path}': {source}")]
    Unreadable {
        path: String,
        #[source]
        source: csv::Error,
    },
    #[error("'{path}' lacks columns: {}", .missing.join(", "))]
    MissingColumns { path: String, missing: Vec<String> },
    #[error("malformed row {row} in '{path}': {source}")]
    MalformedRow {
        path: String,
        row: usize,
        #[source]
        source: csv::Error,
    },
}

#[derive(Debug, Error)]
pub enum SampleError {
    #[error("no cases requested: every segment has zero desired")]
    NothingRequested,
    #[error("sampling produced no records for any segment")]
    EmptySample,
}

#[derive(Debug, Error)]
pub enum SplitError {
    #[error("number of parts must be at least 1")]
    NoParts,
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Sample(#[from] SampleError),
    #[error(transparent)]
    Split(#[from] SplitError),
}
