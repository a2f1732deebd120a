//! Model-Registry: durable production-model state for forgeguard
//!
//! This crate owns every byte the promotion pipeline persists. It records
//! which trained model is currently in production together with the metrics
//! it was promoted on, and guarantees the two never drift apart.
//!
//! ## Layer 0 - Data/Persistence
//!
//! Focus: crash safety, compare-and-swap publishing, and an append-only
//! release trail.
//!
//! ## Key Components
//!
//! - `ModelRegistry`: backend-agnostic registry contract
//! - `FsModelRegistry`: manifest + content-addressed blobs on local disk
//! - `ArtifactStore`: immutable model and weights files keyed by SHA-256
//! - `MetricsRecord`: metric name to score mapping persisted beside each release

pub mod artifact_store;
mod error;
pub mod fakes;
pub mod fs_registry;
mod lock;
pub mod metrics_record;
pub mod storage_traits;

pub use artifact_store::ArtifactStore;
pub use error::RegistryError;
pub use fs_registry::{FsModelRegistry, MANIFEST_FILE};
pub use lock::RegistryLock;
pub use metrics_record::{MetricsRecord, ACCURACY, F1};
pub use storage_traits::{
    ArtifactRef, ContentDigest, ModelRegistry, ProductionEntry, PublishRequest, StorageResult,
};
