use std::path::PathBuf;

use shared::error::{ErrorKind, Failure};
use thiserror::Error;

use crate::session::SessionPhase;

/// Selection-time failures. All of them surface as [`ErrorKind::InvalidInput`].
#[derive(Debug, Error)]
pub enum AssetError {
    #[error("no file at {}", .path.display())]
    Missing { path: PathBuf },
    #[error("failed to read {}: {source}", .path.display())]
    Unreadable {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("{file_name} is empty")]
    Empty { file_name: String },
    #[error("{file_name} is not an image (media type: {})", .media_type.as_deref().unwrap_or("unknown"))]
    NotAnImage {
        file_name: String,
        media_type: Option<String>,
    },
}

impl AssetError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::InvalidInput
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PredictionError {
    #[error("prediction service unreachable: {reason}")]
    Unreachable { reason: String },
    #[error("prediction service rejected the request with HTTP {status}")]
    RequestRejected { status: u16 },
    #[error("prediction service returned a malformed response: {reason}")]
    MalformedResponse { reason: String },
}

impl PredictionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PredictionError::Unreachable { .. } => ErrorKind::Unreachable,
            PredictionError::RequestRejected { .. } => ErrorKind::RequestRejected,
            PredictionError::MalformedResponse { .. } => ErrorKind::MalformedResponse,
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            PredictionError::Unreachable { .. } => {
                "Could not connect to the analysis engine. Is the server running?".to_string()
            }
            PredictionError::RequestRejected { status } => {
                format!("The analysis engine rejected the image (HTTP {status}).")
            }
            PredictionError::MalformedResponse { .. } => {
                "The analysis engine returned a response that could not be read.".to_string()
            }
        }
    }
}

impl From<PredictionError> for Failure {
    fn from(value: PredictionError) -> Self {
        Failure::new(value.kind(), value.user_message())
    }
}

/// A command issued in a phase that does not accept it. The session is left
/// untouched.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("cannot {command} while the session is {phase}")]
pub struct CommandRejected {
    pub command: &'static str,
    pub phase: SessionPhase,
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("prediction service base URL is not configured (set ROASTCHECK_API_BASE_URL or api_base_url)")]
    MissingBaseUrl,
    #[error("invalid prediction service base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },
    #[error("request timeout must be greater than zero")]
    ZeroTimeout,
    #[error("failed to parse {file}: {source}")]
    Unparseable {
        file: &'static str,
        source: toml::de::Error,
    },
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}
