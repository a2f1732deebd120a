//! Space publishing configuration

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::SpaceError;
use crate::Result;

/// Static files of the serving app, uploaded with every model.
pub const DEFAULT_STATIC_FILES: [&str; 4] = ["app.py", "requirements.txt", "Dockerfile", "README.md"];

/// Name the weights file gets inside the Space.
pub const WEIGHTS_FILE_NAME: &str = "production_model.weights.h5";

/// Hugging Face Space configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpaceConfig {
    /// Hub base URL
    pub endpoint: String,
    /// Space id, `owner/name`
    pub repo_id: String,
    /// Write token (required by the Hub for every mutating call)
    pub token: Option<String>,
    /// Space SDK used when the Space has to be created
    pub space_sdk: String,
    /// Local directory holding the serving app files
    pub static_dir: PathBuf,
    /// Files under `static_dir` to upload, relative paths
    pub static_files: Vec<String>,
    /// Per-request timeout
    pub timeout: Duration,
}

impl Default for SpaceConfig {
    fn default() -> Self {
        SpaceConfig {
            endpoint: std::env::var("HF_ENDPOINT")
                .unwrap_or_else(|_| "https://huggingface.co".to_string()),
            repo_id: std::env::var("FORGEGUARD_SPACE_REPO")
                .unwrap_or_else(|_| "forgeguard/forgery-detection".to_string()),
            token: std::env::var("HF_TOKEN").ok(),
            space_sdk: "docker".to_string(),
            static_dir: std::env::var("FORGEGUARD_SPACE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("serving/hf_space")),
            static_files: DEFAULT_STATIC_FILES.iter().map(|s| s.to_string()).collect(),
            timeout: Duration::from_secs(120),
        }
    }
}

impl SpaceConfig {
    /// Create a new config from environment variables
    pub fn from_env() -> Self {
        Self::default()
    }

    /// Create config for a specific Hub endpoint and Space
    pub fn new(endpoint: &str, repo_id: &str) -> Self {
        SpaceConfig {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            repo_id: repo_id.to_string(),
            token: None,
            ..Self::default()
        }
    }

    /// Set authentication token
    pub fn with_token(mut self, token: &str) -> Self {
        self.token = Some(token.to_string());
        self
    }

    /// Set the directory holding the serving app files
    pub fn with_static_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.static_dir = dir.into();
        self
    }

    /// Split `repo_id` into `(owner, name)`.
    pub fn owner_and_name(&self) -> Result<(&str, &str)> {
        match self.repo_id.split_once('/') {
            Some((owner, name))
                if !owner.is_empty() && !name.is_empty() && !name.contains('/') =>
            {
                Ok((owner, name))
            }
            _ => Err(SpaceError::InvalidRepoId(self.repo_id.clone())),
        }
    }

    /// Public page of the Space on the Hub.
    pub fn space_url(&self) -> String {
        format!("{}/spaces/{}", self.endpoint.trim_end_matches('/'), self.repo_id)
    }

    /// URL the running Space app is served from.
    pub fn app_url(&self) -> Result<String> {
        let (owner, name) = self.owner_and_name()?;
        Ok(format!(
            "https://{}-{}.hf.space",
            owner.to_lowercase(),
            name.to_lowercase().replace(['_', '.'], "-")
        ))
    }
}
