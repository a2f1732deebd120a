//! Error types for model-registry

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur in the registry persistence layer
#[derive(Error, Debug)]
pub enum RegistryError {
    /// Underlying storage is unavailable or an I/O call failed
    #[error("registry storage error: {0}")]
    Io(#[from] std::io::Error),

    /// A persisted document exists but cannot be parsed
    #[error("registry document {path} is corrupt: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    /// The manifest references a blob that is not in the store
    #[error("production manifest references missing artifact {digest}")]
    MissingArtifact { digest: String },

    /// Blob lookup by digest failed
    #[error("blob not found: {digest}")]
    NotFound { digest: String },

    /// Digest string is not 64 hex chars
    #[error("invalid content digest: {digest}")]
    InvalidDigest { digest: String },

    /// Another writer changed the registry since it was read
    #[error("registry version conflict: expected {expected:?}, found {actual:?}")]
    VersionConflict {
        expected: Option<u64>,
        actual: Option<u64>,
    },

    /// The exclusive publish lock could not be acquired in time
    #[error("timed out waiting for registry lock at {path}")]
    LockTimeout { path: PathBuf },

    /// Metrics that could not be read back once written
    #[error("metric '{name}' is not a finite number: {value}")]
    NonFiniteMetric { name: String, value: f64 },

    /// Rollback requested without an earlier release
    #[error("no previous release to roll back to")]
    NoPreviousRelease,

    /// Serialization error while writing a document
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RegistryError {
    /// Whether a retry after re-reading the registry can succeed.
    pub fn is_conflict(&self) -> bool {
        matches!(self, RegistryError::VersionConflict { .. })
    }
}
