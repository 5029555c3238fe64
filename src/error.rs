use thiserror::Error;

#[derive(Error, Debug)]
pub enum FlowError {
    #[error("Database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Object not found: {0}")]
    ObjectNotFound(String),

    #[error("Invalid object name: {0}")]
    InvalidObjectName(String),

    #[error("Checksum mismatch after copying {source_name} to {destination}")]
    ChecksumMismatch {
        source_name: String,
        destination: String,
    },

    #[error("Table not found: {0}")]
    TableNotFound(String),

    #[error("Invalid table name: {0}")]
    InvalidTableName(String),

    #[error("Load failed at line {line}: {message}")]
    Load { line: usize, message: String },

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, FlowError>;
