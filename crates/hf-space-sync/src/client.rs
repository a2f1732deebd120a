//! Hub HTTP client for Space publishing

use std::path::Path;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::config::{SpaceConfig, WEIGHTS_FILE_NAME};
use crate::error::SpaceError;
use crate::Result;

/// A file destined for the Space repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpaceFile {
    pub path_in_repo: String,
    pub content: Vec<u8>,
}

/// Commit created by the Hub.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitInfo {
    #[serde(rename = "commitUrl", default)]
    pub commit_url: Option<String>,
    #[serde(rename = "commitOid", default)]
    pub commit_oid: Option<String>,
}

/// Result of a full Space deployment.
#[derive(Debug, Clone)]
pub struct DeployedSpace {
    pub space_url: String,
    pub app_url: String,
    pub uploaded: Vec<String>,
    pub skipped: Vec<String>,
    pub commit: CommitInfo,
}

/// Hub client for a single Space
pub struct SpaceClient {
    config: SpaceConfig,
    http: reqwest::Client,
}

impl SpaceClient {
    /// Create a new Space client
    pub fn new(config: SpaceConfig) -> Result<Self> {
        config.owner_and_name()?;
        let http = reqwest::Client::builder()
            .user_agent(concat!("forgeguard-hf-space-sync/", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout)
            .build()?;
        Ok(SpaceClient { config, http })
    }

    /// Create client from environment variables
    pub fn from_env() -> Result<Self> {
        Self::new(SpaceConfig::from_env())
    }

    pub fn config(&self) -> &SpaceConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.endpoint.trim_end_matches('/'), path)
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn check(url: String, response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(SpaceError::Unauthorized {
                status: status.as_u16(),
                body,
            });
        }
        Err(SpaceError::Remote {
            url,
            status: status.as_u16(),
            body,
        })
    }

    /// Create the Space if it does not exist yet. An existing Space is fine.
    pub async fn ensure_space(&self) -> Result<()> {
        let (owner, name) = self.config.owner_and_name()?;
        let url = self.url("/api/repos/create");
        let body = json!({
            "type": "space",
            "name": name,
            "organization": owner,
            "sdk": self.config.space_sdk,
            "private": false,
        });

        let response = self
            .authorized(self.http.post(&url))
            .json(&body)
            .send()
            .await?;

        if response.status() == StatusCode::CONFLICT {
            debug!(repo = %self.config.repo_id, "Space already exists");
            return Ok(());
        }
        Self::check(url, response).await?;
        info!(repo = %self.config.repo_id, "Space created");
        Ok(())
    }

    /// Commit `files` to the Space's main branch in one commit.
    pub async fn commit_files(&self, files: &[SpaceFile], summary: &str) -> Result<CommitInfo> {
        let url = self.url(&format!("/api/spaces/{}/commit/main", self.config.repo_id));
        let body = ndjson_commit(files, summary)?;

        let response = self
            .authorized(self.http.post(&url))
            .header(reqwest::header::CONTENT_TYPE, "application/x-ndjson")
            .body(body)
            .send()
            .await?;
        let response = Self::check(url, response).await?;
        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Ok(CommitInfo {
                commit_url: None,
                commit_oid: None,
            });
        }
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Gather the static app files that exist; missing ones are reported back.
    pub async fn collect_static_files(&self) -> Result<(Vec<SpaceFile>, Vec<String>)> {
        let mut files = Vec::new();
        let mut skipped = Vec::new();
        for name in &self.config.static_files {
            let local = self.config.static_dir.join(name);
            match tokio::fs::read(&local).await {
                Ok(content) => files.push(SpaceFile {
                    path_in_repo: name.clone(),
                    content,
                }),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    warn!(file = %local.display(), "static Space file not found, skipping");
                    skipped.push(name.clone());
                }
                Err(e) => return Err(SpaceError::Io(e)),
            }
        }
        Ok((files, skipped))
    }

    /// Publish a weights file plus the static app files.
    ///
    /// Safe to repeat for the same weights: the Hub records an identical
    /// tree and the Space keeps serving the same model.
    ///
    /// Every file travels inline as base64 inside a single commit request.
    /// There is no preupload or LFS step, so the Hub may reject weights above
    /// its inline file size limit; such a failure surfaces as a sync error
    /// and leaves the local promotion in place.
    pub async fn deploy(&self, weights: &Path) -> Result<DeployedSpace> {
        let weights_content = match tokio::fs::read(weights).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SpaceError::MissingWeights(weights.to_path_buf()));
            }
            Err(e) => return Err(SpaceError::Io(e)),
        };

        info!(repo = %self.config.repo_id, "deploying to Hugging Face Space");
        self.ensure_space().await?;

        let (mut files, skipped) = self.collect_static_files().await?;
        files.push(SpaceFile {
            path_in_repo: WEIGHTS_FILE_NAME.to_string(),
            content: weights_content,
        });
        let uploaded: Vec<String> = files.iter().map(|f| f.path_in_repo.clone()).collect();

        let commit = self
            .commit_files(&files, "Update production model")
            .await?;

        let deployed = DeployedSpace {
            space_url: self.config.space_url(),
            app_url: self.config.app_url()?,
            uploaded,
            skipped,
            commit,
        };
        info!(
            space_url = %deployed.space_url,
            app_url = %deployed.app_url,
            files = deployed.uploaded.len(),
            "Space deployment complete"
        );
        Ok(deployed)
    }
}

/// Encode a Hub commit payload: one header line, then one line per file.
fn ndjson_commit(files: &[SpaceFile], summary: &str) -> Result<String> {
    let mut out = serde_json::to_string(&json!({
        "key": "header",
        "value": { "summary": summary, "description": "" },
    }))?;
    out.push('\n');
    for file in files {
        out.push_str(&serde_json::to_string(&json!({
            "key": "file",
            "value": {
                "path": file.path_in_repo,
                "content": BASE64.encode(&file.content),
                "encoding": "base64",
            },
        }))?);
        out.push('\n');
    }
    Ok(out)
}
