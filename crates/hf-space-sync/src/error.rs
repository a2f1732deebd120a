//! Error types for hf-space-sync

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while publishing to a Space
#[derive(Error, Debug)]
pub enum SpaceError {
    /// `repo_id` is not of the form `owner/name`
    #[error("invalid Space repo id: {0}")]
    InvalidRepoId(String),

    /// Hub rejected the token (or none was configured)
    #[error("Hub authentication failed ({status}): {body}")]
    Unauthorized { status: u16, body: String },

    /// Hub answered with an unexpected status
    #[error("Hub request to {url} failed ({status}): {body}")]
    Remote {
        url: String,
        status: u16,
        body: String,
    },

    /// Transport failure (DNS, TLS, timeout, ...)
    #[error("HTTP error: {0}")]
    Http(String),

    /// The weights file to publish does not exist
    #[error("weights file not found: {0}")]
    MissingWeights(PathBuf),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<reqwest::Error> for SpaceError {
    fn from(err: reqwest::Error) -> Self {
        SpaceError::Http(err.to_string())
    }
}
