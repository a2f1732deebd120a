//! Filesystem implementation of [`ModelRegistry`].
//!
//! Layout under the registry root:
//!
//! ```text
//! objects/<aa>/<rest>          immutable model and weights blobs
//! releases/<version>.json      one immutable record per release
//! production.json              manifest naming the current release
//! registry.lock                advisory lock taken by writers
//! ```
//!
//! `production.json` is the only mutable file and it is replaced by rename,
//! so the production artifact and its metrics always change in one step.
//! Publishing writes blobs first, then the release record, then swaps the
//! manifest. A crash anywhere before the swap leaves the previous release
//! fully intact; the worst leftover is an unreferenced blob.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::artifact_store::ArtifactStore;
use crate::error::RegistryError;
use crate::lock::RegistryLock;
use crate::storage_traits::{ModelRegistry, ProductionEntry, PublishRequest, StorageResult};

/// File name of the production manifest.
pub const MANIFEST_FILE: &str = "production.json";
const RELEASES_DIR: &str = "releases";
const LOCK_FILE: &str = "registry.lock";
const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(30);

/// Production registry stored in a local directory.
#[derive(Debug, Clone)]
pub struct FsModelRegistry {
    root: PathBuf,
    artifacts: ArtifactStore,
    lock_timeout: Duration,
}

impl FsModelRegistry {
    /// Open (or initialise) a registry rooted at `root`.
    pub fn open(root: impl AsRef<Path>) -> StorageResult<Self> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(root.join(RELEASES_DIR))?;
        let artifacts = ArtifactStore::open(&root)?;
        Ok(Self {
            root,
            artifacts,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        })
    }

    /// How long a writer waits for the lock on `registry.lock` before giving up.
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.root.join(MANIFEST_FILE)
    }

    pub fn lock_path(&self) -> PathBuf {
        self.root.join(LOCK_FILE)
    }

    fn release_path(&self, version: u64) -> PathBuf {
        self.root
            .join(RELEASES_DIR)
            .join(format!("{version:010}.json"))
    }

    fn read_entry(path: &Path) -> StorageResult<Option<ProductionEntry>> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(RegistryError::Io(e)),
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| RegistryError::Corrupt {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })
    }

    /// Read the manifest and check that the blobs it names are present.
    fn read_manifest(&self) -> StorageResult<Option<ProductionEntry>> {
        let Some(entry) = Self::read_entry(&self.manifest_path())? else {
            return Ok(None);
        };
        self.ensure_blobs(&entry)?;
        Ok(Some(entry))
    }

    fn ensure_blobs(&self, entry: &ProductionEntry) -> StorageResult<()> {
        let refs = std::iter::once(&entry.model).chain(entry.weights.as_ref());
        for artifact in refs {
            if !self.artifacts.contains(artifact) {
                return Err(RegistryError::MissingArtifact {
                    digest: artifact.digest.to_string(),
                });
            }
        }
        Ok(())
    }

    fn write_json_atomic(&self, path: &Path, entry: &ProductionEntry) -> StorageResult<()> {
        let dir = path.parent().unwrap_or(&self.root);
        let mut tmp = NamedTempFile::new_in(dir)?;
        serde_json::to_writer_pretty(&mut tmp, entry)?;
        tmp.write_all(b"\n")?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| e.error)?;
        Ok(())
    }

    /// Record `entry` as a release, then make it current.
    fn commit(&self, entry: &ProductionEntry) -> StorageResult<()> {
        self.write_json_atomic(&self.release_path(entry.version), entry)?;
        self.write_json_atomic(&self.manifest_path(), entry)?;
        Ok(())
    }

}

#[async_trait]
impl ModelRegistry for FsModelRegistry {
    async fn read(&self) -> StorageResult<Option<ProductionEntry>> {
        self.read_manifest()
    }

    async fn publish(&self, request: PublishRequest) -> StorageResult<ProductionEntry> {
        if let Some((name, value)) = request.metrics.first_non_finite() {
            return Err(RegistryError::NonFiniteMetric {
                name: name.to_string(),
                value,
            });
        }

        let _lock = RegistryLock::acquire(self.lock_path(), self.lock_timeout).await?;

        let current = self.read_manifest()?;
        let actual = current.as_ref().map(|e| e.version);
        if actual != request.expected_version {
            debug!(
                expected = ?request.expected_version,
                actual = ?actual,
                "publish rejected: registry moved"
            );
            return Err(RegistryError::VersionConflict {
                expected: request.expected_version,
                actual,
            });
        }

        let model = self.artifacts.put(&request.model_bytes, &request.model_file_name)?;
        let weights = match &request.weights {
            Some((bytes, name)) => Some(self.artifacts.put(bytes, name)?),
            None => None,
        };

        let entry = ProductionEntry {
            version: actual.unwrap_or(0) + 1,
            model,
            weights,
            metrics: request.metrics,
            promoted_at: Utc::now(),
            promoted_by: request.promoted_by,
            source: request.source,
            run_id: request.run_id,
        };
        self.commit(&entry)?;

        info!(
            version = entry.version,
            model = %entry.model.digest.short(),
            root = %self.root.display(),
            "production manifest swapped"
        );
        Ok(entry)
    }

    async fn rollback(&self, promoted_by: &str) -> StorageResult<ProductionEntry> {
        let _lock = RegistryLock::acquire(self.lock_path(), self.lock_timeout).await?;

        let current = self
            .read_manifest()?
            .ok_or(RegistryError::NoPreviousRelease)?;
        if current.version < 2 {
            return Err(RegistryError::NoPreviousRelease);
        }

        let previous_path = self.release_path(current.version - 1);
        let previous =
            Self::read_entry(&previous_path)?.ok_or_else(|| RegistryError::Corrupt {
                path: previous_path.clone(),
                reason: "release record missing".to_string(),
            })?;
        self.ensure_blobs(&previous)?;

        let entry = ProductionEntry {
            version: current.version + 1,
            promoted_at: Utc::now(),
            promoted_by: promoted_by.to_string(),
            source: format!("rollback:v{}", previous.version),
            ..previous
        };
        self.commit(&entry)?;

        info!(
            version = entry.version,
            restored = %entry.source,
            "production rolled back"
        );
        Ok(entry)
    }

    async fn history(&self) -> StorageResult<Vec<ProductionEntry>> {
        let mut entries = Vec::new();
        for dirent in std::fs::read_dir(self.root.join(RELEASES_DIR))? {
            let path = dirent?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(entry) = Self::read_entry(&path)? {
                entries.push(entry);
            }
        }
        entries.sort_by(|a, b| b.version.cmp(&a.version));

        // Records written by an attempt that crashed before its manifest swap
        // are not releases.
        let current = Self::read_entry(&self.manifest_path())?.map(|e| e.version);
        entries.retain(|e| current.is_some_and(|v| e.version <= v));
        Ok(entries)
    }

    fn artifact_path(&self, entry: &ProductionEntry) -> PathBuf {
        self.artifacts.locate(&entry.model.digest)
    }

    async fn artifact_bytes(&self, entry: &ProductionEntry) -> StorageResult<Vec<u8>> {
        self.artifacts.load(&entry.model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics_record::MetricsRecord;

    fn request(model: &[u8], f1: f64, expected: Option<u64>) -> PublishRequest {
        PublishRequest {
            model_bytes: model.to_vec(),
            model_file_name: "candidate.keras".to_string(),
            weights: None,
            metrics: MetricsRecord::new().with("f1", f1).with("accuracy", 0.9),
            promoted_by: "test".to_string(),
            source: "candidate.keras".to_string(),
            run_id: "run-1".to_string(),
            expected_version: expected,
        }
    }

    #[tokio::test]
    async fn uncommitted_release_record_is_not_history() {
        let dir = tempfile::tempdir().unwrap();
        let registry = FsModelRegistry::open(dir.path()).unwrap();
        let first = registry.publish(request(b"m1", 0.8, None)).await.unwrap();

        // Simulate a writer that crashed after its release record but
        // before swapping the manifest.
        let orphan = ProductionEntry {
            version: 2,
            ..first.clone()
        };
        registry
            .write_json_atomic(&registry.release_path(2), &orphan)
            .unwrap();

        let history = registry.history().await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(registry.read().await.unwrap(), Some(first));
    }

    #[tokio::test]
    async fn manifest_with_missing_blob_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let registry = FsModelRegistry::open(dir.path()).unwrap();
        let entry = registry.publish(request(b"m1", 0.8, None)).await.unwrap();

        std::fs::remove_file(registry.artifact_path(&entry)).unwrap();

        let err = registry.read().await.unwrap_err();
        assert!(matches!(err, RegistryError::MissingArtifact { .. }));
    }

    #[tokio::test]
    async fn lock_is_released_after_conflict() {
        let dir = tempfile::tempdir().unwrap();
        let registry = FsModelRegistry::open(dir.path()).unwrap();
        registry.publish(request(b"m1", 0.8, None)).await.unwrap();

        let err = registry
            .publish(request(b"m2", 0.9, None))
            .await
            .unwrap_err();
        assert!(err.is_conflict());
        RegistryLock::acquire(registry.lock_path(), Duration::ZERO)
            .await
            .expect("lock free after a rejected publish");
    }
}
