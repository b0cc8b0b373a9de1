use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid series: {0}")]
    InvalidSeries(String),

    #[error("No kernel registered for benchmark '{benchmark}' on backend '{backend}'")]
    UnknownKernel { benchmark: String, backend: String },

    #[error("Compatibility oracle failed while growing the set of '{event}': {reason}")]
    Oracle { event: String, reason: String },

    #[error("Duplicate row in table '{table}': {key}")]
    DuplicateRow { table: &'static str, key: String },

    #[error("Collaborator failed: {0}")]
    Collaborator(String),

    #[error("Malformed protocol line: {0}")]
    Protocol(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
