//! HF-Space-Sync: Hugging Face Space publishing for forgeguard
//!
//! Pushes the serving bundle of a promoted model (static app files plus the
//! exported weights) to a Hugging Face Space in a single commit.
//!
//! ## Layer 2 - Remote Hosting
//!
//! Focus: an idempotent publish that reports failure instead of hiding it.
//! Callers decide how fatal a failure is; this crate never retries on its own.

mod client;
mod config;
mod error;

pub use client::{CommitInfo, DeployedSpace, SpaceClient, SpaceFile};
pub use config::{SpaceConfig, DEFAULT_STATIC_FILES, WEIGHTS_FILE_NAME};
pub use error::SpaceError;

/// Result type for hf-space-sync operations
pub type Result<T> = std::result::Result<T, SpaceError>;
