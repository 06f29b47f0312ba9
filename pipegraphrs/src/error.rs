use thiserror::Error;

use crate::verify::ParentageMismatch;

pub type Result<T> = std::result::Result<T, PipegraphError>;

#[derive(Debug, Error)]
pub enum PipegraphError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("yaml parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("config error: {0}")]
    Config(String),
    #[error("validation error: {0}")]
    Validation(String),
    #[error("unknown schema {0}")]
    UnknownSchema(String),
    #[error("unknown table {0}")]
    UnknownTable(String),
    #[error("parentage mismatch: {0}")]
    Parentage(#[from] ParentageMismatch),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
