use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConverterError {
    #[error("Submission rejected: {0}")]
    Submit(#[from] SubmitError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Conversion error: {0}")]
    Convert(#[from] ConvertError),
}

/// Errors surfaced synchronously to the submitter. No job is created when any
/// of these occur.
#[derive(Error, Debug)]
pub enum SubmitError {
    #[error("Unsupported mapping: {kind} -> {target}")]
    UnsupportedMapping { kind: String, target: String },

    #[error("Unknown target format '{0}'")]
    InvalidTarget(String),

    #[error("Rate limit exceeded")]
    RateLimited,

    #[error("Source file not found: {0}")]
    SourceNotFound(String),

    #[error("Payload of {size} bytes exceeds the {max} byte limit")]
    PayloadTooLarge { size: usize, max: usize },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O failure on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Storage backend error: {0}")]
    Backend(String),

    #[error("Blob not found: {0}")]
    NotFound(String),
}

/// Failures of the pluggable converter. Inside a running job these always
/// resolve to a terminal `failed` event rather than propagating.
#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("No converter configured")]
    Unconfigured,

    #[error("Converter timed out after {0:?}")]
    Timeout(Duration),

    #[error("Converter produced no output")]
    NoOutput,

    #[error("Conversion failed: {0}")]
    Failed(String),
}

pub type Result<T> = std::result::Result<T, ConverterError>;
