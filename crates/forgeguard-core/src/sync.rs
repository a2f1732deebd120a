//! Cloud sync seam.
//!
//! After a promotion commits locally, the new production artifact is pushed
//! to a remote hosting surface. That push is advisory: whatever goes wrong
//! here is reported as [`SyncError`] and never unwinds the local promotion.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use hf_space_sync::{SpaceClient, SpaceError};
use tracing::info;

use crate::export::WeightsExporter;

/// Why a sync attempt failed.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum SyncError {
    #[error("weights export failed: {0}")]
    Export(String),

    #[error("remote sync failed: {0}")]
    Remote(String),

    #[error("sync timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("cloud sync is not configured: {0}")]
    NotConfigured(String),
}

impl From<SpaceError> for SyncError {
    fn from(err: SpaceError) -> Self {
        match err {
            SpaceError::InvalidRepoId(id) => SyncError::NotConfigured(format!("repo id '{id}'")),
            other => SyncError::Remote(other.to_string()),
        }
    }
}

/// Pushes a production artifact to a remote hosting surface.
///
/// Implementations must tolerate being called again with the same artifact.
#[async_trait]
pub trait CloudSync: Send + Sync {
    /// Publish the artifact at `artifact` and return its public URL.
    async fn publish(&self, artifact: &Path) -> Result<String, SyncError>;
}

/// Sync that does nothing, for local-only runs.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSync;

#[async_trait]
impl CloudSync for NoopSync {
    async fn publish(&self, artifact: &Path) -> Result<String, SyncError> {
        Ok(format!("file://{}", artifact.display()))
    }
}

/// Stand-in used when sync was requested but could not be set up. Every
/// publish fails with [`SyncError::NotConfigured`], so the promotion still
/// commits and the report says why nothing was pushed.
#[derive(Debug, Clone)]
pub struct UnconfiguredSync {
    reason: String,
}

impl UnconfiguredSync {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl CloudSync for UnconfiguredSync {
    async fn publish(&self, _artifact: &Path) -> Result<String, SyncError> {
        Err(SyncError::NotConfigured(self.reason.clone()))
    }
}

/// Sync to a Hugging Face Space: export weights, then commit them together
/// with the serving app files.
pub struct SpaceSync<E> {
    client: SpaceClient,
    exporter: E,
    export_dir: PathBuf,
}

impl<E: WeightsExporter> SpaceSync<E> {
    /// `export_dir` receives the exported weights before upload.
    pub fn new(client: SpaceClient, exporter: E, export_dir: impl Into<PathBuf>) -> Self {
        Self {
            client,
            exporter,
            export_dir: export_dir.into(),
        }
    }
}

#[async_trait]
impl<E: WeightsExporter> CloudSync for SpaceSync<E> {
    async fn publish(&self, artifact: &Path) -> Result<String, SyncError> {
        tokio::fs::create_dir_all(&self.export_dir)
            .await
            .map_err(|e| SyncError::Export(e.to_string()))?;

        let weights = self.exporter.export(artifact, &self.export_dir).await?;
        info!(weights = %weights.display(), "weights exported for Space upload");

        let deployed = self.client.deploy(&weights).await?;
        Ok(deployed.app_url)
    }
}
