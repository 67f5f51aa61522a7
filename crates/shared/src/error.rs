use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error taxonomy shared by the client core and every presenter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidInput,
    Unreachable,
    RequestRejected,
    MalformedResponse,
    UnknownClassification,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::InvalidInput => "invalid_input",
            ErrorKind::Unreachable => "unreachable",
            ErrorKind::RequestRejected => "request_rejected",
            ErrorKind::MalformedResponse => "malformed_response",
            ErrorKind::UnknownClassification => "unknown_classification",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("prediction service returned unknown roast classification {0}")]
    UnknownClassification(i64),
}

impl CatalogError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::UnknownClassification
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    pub kind: ErrorKind,
    pub message: String,
}

impl Failure {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl From<CatalogError> for Failure {
    fn from(value: CatalogError) -> Self {
        Self::new(value.kind(), value.to_string())
    }
}
