//! Promotion runtime configuration.
//!
//! Values come from `FORGEGUARD_*` environment variables with defaults that
//! match the on-disk layout of the training pipeline (`models/registry`).

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Knobs for a promotion run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PromoteConfig {
    /// Root directory of the production registry.
    pub registry_root: PathBuf,
    /// Recorded as `promoted_by` on every release.
    pub promoted_by: String,
    /// Upper bound for the post-commit cloud sync.
    pub sync_timeout: Duration,
    /// How long a publisher waits for the registry lock.
    pub lock_timeout: Duration,
    /// Re-read/re-decide attempts when another run moves the registry.
    pub max_conflict_retries: u32,
}

impl Default for PromoteConfig {
    fn default() -> Self {
        Self {
            registry_root: PathBuf::from("models/registry"),
            promoted_by: "forgeguard".to_string(),
            sync_timeout: Duration::from_secs(600),
            lock_timeout: Duration::from_secs(30),
            max_conflict_retries: 3,
        }
    }
}

impl PromoteConfig {
    /// Defaults overridden by whichever `FORGEGUARD_*` variables are set.
    /// Unparseable numbers fall back to the default.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let number = |key: &str| lookup(key).and_then(|v| v.trim().parse::<u64>().ok());

        Self {
            registry_root: lookup("FORGEGUARD_REGISTRY")
                .map(PathBuf::from)
                .unwrap_or(defaults.registry_root),
            promoted_by: lookup("FORGEGUARD_PROMOTED_BY").unwrap_or(defaults.promoted_by),
            sync_timeout: number("FORGEGUARD_SYNC_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.sync_timeout),
            lock_timeout: number("FORGEGUARD_LOCK_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.lock_timeout),
            max_conflict_retries: number("FORGEGUARD_CONFLICT_RETRIES")
                .and_then(|n| u32::try_from(n).ok())
                .unwrap_or(defaults.max_conflict_retries),
        }
    }
}
