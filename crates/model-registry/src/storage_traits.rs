//! Storage trait definitions for the production registry
//!
//! - `ContentDigest`: SHA-256 address of an immutable artifact blob
//! - `ProductionEntry`: one release (artifact + metrics), the unit that is
//!   read and written atomically
//! - `ModelRegistry`: compare-and-swap publishing over those entries
//!
//! All traits are async and backend-agnostic. An in-memory fake is provided
//! for testing via the `fakes` module.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::error::RegistryError;
use crate::metrics_record::MetricsRecord;

/// Result type for storage operations
pub type StorageResult<T> = std::result::Result<T, RegistryError>;

// ---------------------------------------------------------------------------
// ContentDigest
// ---------------------------------------------------------------------------

/// Content digest (SHA-256 hex string).
///
/// The inner field is private so the string is always lowercase hex produced
/// by `from_bytes` or validated via `TryFrom<String>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentDigest(String);

impl ContentDigest {
    /// Compute the SHA-256 digest of the given bytes.
    pub fn from_bytes(data: &[u8]) -> Self {
        use sha2::Digest;
        let mut hasher = Sha256::new();
        hasher.update(data);
        ContentDigest(hex::encode(hasher.finalize()))
    }

    /// Return the full hex string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short form (first 12 hex chars).
    pub fn short(&self) -> &str {
        &self.0[..12.min(self.0.len())]
    }
}

impl TryFrom<String> for ContentDigest {
    type Error = RegistryError;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        if s.len() != 64 || !s.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(RegistryError::InvalidDigest { digest: s });
        }
        Ok(ContentDigest(s.to_ascii_lowercase()))
    }
}

impl From<ContentDigest> for String {
    fn from(d: ContentDigest) -> Self {
        d.0
    }
}

impl std::fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Entries
// ---------------------------------------------------------------------------

/// Reference to a stored artifact blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRef {
    pub digest: ContentDigest,
    pub size_bytes: u64,
    /// File name the artifact had when it was submitted
    /// (e.g. `production_model.keras`).
    pub file_name: String,
}

impl ArtifactRef {
    pub fn for_bytes(data: &[u8], file_name: impl Into<String>) -> Self {
        Self {
            digest: ContentDigest::from_bytes(data),
            size_bytes: data.len() as u64,
            file_name: file_name.into(),
        }
    }
}

/// A production release: the model artifact and the metrics it was promoted on.
///
/// The two travel together; readers never observe one without the other.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductionEntry {
    /// Monotonic release number, starting at 1
    pub version: u64,
    pub model: ArtifactRef,
    /// Optional exported-weights sibling of the model
    pub weights: Option<ArtifactRef>,
    pub metrics: MetricsRecord,
    pub promoted_at: DateTime<Utc>,
    pub promoted_by: String,
    /// Candidate location the artifact was read from
    pub source: String,
    /// Promotion run that produced this entry
    pub run_id: String,
}

/// Everything needed to publish a new production release.
#[derive(Debug, Clone)]
pub struct PublishRequest {
    pub model_bytes: Vec<u8>,
    pub model_file_name: String,
    pub weights: Option<(Vec<u8>, String)>,
    pub metrics: MetricsRecord,
    pub promoted_by: String,
    pub source: String,
    pub run_id: String,
    /// Version the caller based its decision on. `None` asserts the
    /// registry is still empty.
    pub expected_version: Option<u64>,
}

// ---------------------------------------------------------------------------
// ModelRegistry
// ---------------------------------------------------------------------------

/// Production model registry.
///
/// Semantics:
/// - `read` returns `None` until the first release is published.
/// - `publish` is compare-and-swap on `expected_version`; a stale caller gets
///   `RegistryError::VersionConflict` and nothing is written.
/// - `rollback` re-publishes the previous release as a new version, keeping
///   history append-only.
/// - `history` returns releases newest first.
#[async_trait]
pub trait ModelRegistry: Send + Sync {
    /// Current production entry, if any.
    async fn read(&self) -> StorageResult<Option<ProductionEntry>>;

    /// Publish a new production entry.
    async fn publish(&self, request: PublishRequest) -> StorageResult<ProductionEntry>;

    /// Roll back to the release before the current one.
    async fn rollback(&self, promoted_by: &str) -> StorageResult<ProductionEntry>;

    /// Full release history (newest first).
    async fn history(&self) -> StorageResult<Vec<ProductionEntry>>;

    /// Resolve where the model blob of `entry` can be read from.
    fn artifact_path(&self, entry: &ProductionEntry) -> PathBuf;

    /// Read the model blob of `entry`.
    async fn artifact_bytes(&self, entry: &ProductionEntry) -> StorageResult<Vec<u8>>;
}

#[async_trait]
impl<T: ModelRegistry + ?Sized> ModelRegistry for std::sync::Arc<T> {
    async fn read(&self) -> StorageResult<Option<ProductionEntry>> {
        (**self).read().await
    }

    async fn publish(&self, request: PublishRequest) -> StorageResult<ProductionEntry> {
        (**self).publish(request).await
    }

    async fn rollback(&self, promoted_by: &str) -> StorageResult<ProductionEntry> {
        (**self).rollback(promoted_by).await
    }

    async fn history(&self) -> StorageResult<Vec<ProductionEntry>> {
        (**self).history().await
    }

    fn artifact_path(&self, entry: &ProductionEntry) -> PathBuf {
        (**self).artifact_path(entry)
    }

    async fn artifact_bytes(&self, entry: &ProductionEntry) -> StorageResult<Vec<u8>> {
        (**self).artifact_bytes(entry).await
    }
}
