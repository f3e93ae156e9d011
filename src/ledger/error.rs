use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unrecognized result log header in {path}: '{found}'")]
    SchemaMismatch { path: PathBuf, found: String },

    #[error("Result log task failed: {0}")]
    Task(String),
}

pub type Result<T> = std::result::Result<T, LedgerError>;
