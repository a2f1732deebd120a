//! Domain-level error taxonomy for promotions.

use std::path::PathBuf;

use model_registry::RegistryError;

/// Errors that abort a promotion attempt.
///
/// Everything here is raised before or during the registry commit. Failures
/// after the commit (cloud sync) are reported through
/// [`SyncStatus`](crate::domain::SyncStatus) instead.
#[derive(Debug, thiserror::Error)]
pub enum PromoteError {
    #[error("candidate metrics are missing required metric '{0}'")]
    MissingMetric(String),

    #[error("candidate metric '{name}' is not a finite number: {value}")]
    InvalidMetric { name: String, value: f64 },

    #[error("candidate artifact {path} is unreadable: {source}")]
    CandidateUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("production registry is corrupt: {0}")]
    CorruptRegistry(String),

    #[error("registry kept changing underneath the promotion after {attempts} attempts")]
    Contended { attempts: u32 },

    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("invalid evaluation input: {0}")]
    InvalidEvaluation(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PromoteError {
    /// Configuration errors are the caller's to fix; nothing was written.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            PromoteError::MissingMetric(_)
                | PromoteError::InvalidMetric { .. }
                | PromoteError::CandidateUnreadable { .. }
        )
    }
}

/// Result type for promotion operations.
pub type Result<T> = std::result::Result<T, PromoteError>;
