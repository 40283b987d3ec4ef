use thiserror::Error;

use crate::model::SowStatus;

/// Failures raised outside the calculator: files, templates and the record store.
#[derive(Debug, Error)]
pub enum SowError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    TomlDe(#[from] toml::de::Error),
    #[error("TOML write error: {0}")]
    TomlSer(#[from] toml::ser::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Template error: {0}")]
    Template(#[from] tera::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Flow '{flow}' failed with status {status}: {body}")]
    Remote {
        flow: String,
        status: u16,
        body: String,
    },
    #[error("Cannot move SOW from {from} to {to}")]
    InvalidTransition { from: SowStatus, to: SowStatus },
    #[error("SOW record not found: {0}")]
    NotFound(String),
    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, SowError>;
