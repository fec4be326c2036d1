//! Error types for the labeling pipeline.

use arachne_server::ServerError;
use thiserror::Error;

/// Result type for labeling operations.
pub type LabelerResult<T> = Result<T, LabelerError>;

/// Errors that can occur while labeling a post.
#[derive(Error, Debug)]
pub enum LabelerError {
    /// An HTTP call to an external service failed.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The moderation service answered with something unusable.
    #[error("moderation error: {0}")]
    Moderation(String),

    /// Appending to a label log failed.
    #[error("label log error: {0}")]
    Log(#[from] ServerError),

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

impl LabelerError {
    /// Returns true if retrying the same call could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            LabelerError::Http(e) => e.is_timeout() || e.is_connect(),
            LabelerError::Log(e) => e.is_server_error(),
            _ => false,
        }
    }
}
