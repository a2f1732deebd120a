//! Forgeguard Core Library
//!
//! Decides whether a freshly trained forgery-detection model replaces the
//! production model, commits the promotion atomically, and mirrors the new
//! production model to a Hugging Face Space.

pub mod config;
pub mod decision;
pub mod domain;
pub mod evaluation;
pub mod export;
pub mod metrics;
pub mod obs;
pub mod promote;
pub mod sync;
pub mod telemetry;

pub use config::PromoteConfig;

pub use decision::{decide, validate_candidate_metrics};

pub use domain::{
    Decision, DeploymentOutcome, PromoteError, PromotionReport, PromotionStage, Result,
    SyncStatus,
};

pub use evaluation::{score_predictions, Confusion, PredictionSet, DEFAULT_THRESHOLD};

pub use export::{CommandExporter, PassthroughExporter, WeightsExporter};

pub use promote::{deploy_model_if_better, weights_sibling, Promoter, PRODUCTION_MODEL_FILE};

pub use telemetry::init_tracing;

pub use sync::{CloudSync, NoopSync, SpaceSync, SyncError, UnconfiguredSync};

pub use model_registry::{
    FsModelRegistry, MetricsRecord, ModelRegistry, ProductionEntry, RegistryError,
};

/// Forgeguard version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
