//! In-memory fakes for testing
//!
//! Provides `MemoryModelRegistry`, which honours the same compare-and-swap
//! and append-only history contract as `FsModelRegistry` without touching
//! disk.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use crate::error::RegistryError;
use crate::storage_traits::*;

#[derive(Debug, Default)]
struct State {
    /// Releases, oldest first.
    releases: Vec<ProductionEntry>,
    blobs: HashMap<String, Vec<u8>>,
}

/// In-memory production registry.
#[derive(Debug, Default)]
pub struct MemoryModelRegistry {
    state: Mutex<State>,
}

impl MemoryModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of publish/rollback commits so far.
    pub fn release_count(&self) -> usize {
        self.state.lock().unwrap().releases.len()
    }
}

fn store(state: &mut State, bytes: &[u8], file_name: &str) -> ArtifactRef {
    let artifact = ArtifactRef::for_bytes(bytes, file_name);
    state
        .blobs
        .insert(artifact.digest.as_str().to_string(), bytes.to_vec());
    artifact
}

#[async_trait]
impl ModelRegistry for MemoryModelRegistry {
    async fn read(&self) -> StorageResult<Option<ProductionEntry>> {
        Ok(self.state.lock().unwrap().releases.last().cloned())
    }

    async fn publish(&self, request: PublishRequest) -> StorageResult<ProductionEntry> {
        if let Some((name, value)) = request.metrics.first_non_finite() {
            return Err(RegistryError::NonFiniteMetric {
                name: name.to_string(),
                value,
            });
        }

        let mut state = self.state.lock().unwrap();
        let actual = state.releases.last().map(|e| e.version);
        if actual != request.expected_version {
            return Err(RegistryError::VersionConflict {
                expected: request.expected_version,
                actual,
            });
        }

        let model = store(&mut state, &request.model_bytes, &request.model_file_name);
        let weights = request
            .weights
            .as_ref()
            .map(|(bytes, name)| store(&mut state, bytes, name));
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
        state.releases.push(entry.clone());
        Ok(entry)
    }

    async fn rollback(&self, promoted_by: &str) -> StorageResult<ProductionEntry> {
        let mut state = self.state.lock().unwrap();
        let len = state.releases.len();
        if len < 2 {
            return Err(RegistryError::NoPreviousRelease);
        }
        let previous = state.releases[len - 2].clone();
        let entry = ProductionEntry {
            version: state.releases[len - 1].version + 1,
            promoted_at: Utc::now(),
            promoted_by: promoted_by.to_string(),
            source: format!("rollback:v{}", previous.version),
            ..previous
        };
        state.releases.push(entry.clone());
        Ok(entry)
    }

    async fn history(&self) -> StorageResult<Vec<ProductionEntry>> {
        let state = self.state.lock().unwrap();
        Ok(state.releases.iter().rev().cloned().collect())
    }

    fn artifact_path(&self, entry: &ProductionEntry) -> PathBuf {
        PathBuf::from(format!("memory://{}", entry.model.digest))
    }

    async fn artifact_bytes(&self, entry: &ProductionEntry) -> StorageResult<Vec<u8>> {
        let state = self.state.lock().unwrap();
        state
            .blobs
            .get(entry.model.digest.as_str())
            .cloned()
            .ok_or_else(|| RegistryError::NotFound {
                digest: entry.model.digest.to_string(),
            })
    }
}
