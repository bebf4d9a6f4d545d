use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DossierError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("File error: {path:?} - {message}")]
    FileError {
        path: PathBuf,
        message: String,
    },

    #[error("Scan engine unavailable during {stage}: {message}")]
    EngineUnavailable {
        stage: String,
        message: String,
    },

    #[error("Scan timeout: {stage} did not complete within {seconds} seconds")]
    ScanTimeout {
        stage: String,
        seconds: u64,
    },

    #[error("Report retrieval failed: {0}")]
    RetrievalFailure(String),

    #[error("External tool error: {tool} - {message}")]
    ExternalToolError {
        tool: String,
        message: String,
    },

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("PDF error: {0}")]
    PdfError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Prompt error: {0}")]
    PromptError(String),
}

impl DossierError {
    /// Shorthand for a `FileError` built from an I/O failure
    pub fn file(path: impl Into<PathBuf>, error: impl std::fmt::Display) -> Self {
        DossierError::FileError {
            path: path.into(),
            message: error.to_string(),
        }
    }
}

impl From<lopdf::Error> for DossierError {
    fn from(error: lopdf::Error) -> Self {
        DossierError::PdfError(error.to_string())
    }
}

impl From<serde_json::Error> for DossierError {
    fn from(error: serde_json::Error) -> Self {
        DossierError::SerializationError(error.to_string())
    }
}

impl From<dialoguer::Error> for DossierError {
    fn from(error: dialoguer::Error) -> Self {
        DossierError::PromptError(error.to_string())
    }
}

pub type DossierResult<T> = std::result::Result<T, DossierError>;
