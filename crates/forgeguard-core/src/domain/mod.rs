//! Domain models for forgeguard.
//!
//! - `Decision`: what the decision engine concluded
//! - `DeploymentOutcome`: the terminal tag returned to callers
//! - `PromotionStage` / `SyncStatus` / `PromotionReport`: run bookkeeping
//! - `PromoteError`: everything that aborts a promotion

pub mod error;
pub mod outcome;

pub use error::{PromoteError, Result};
pub use outcome::{Decision, DeploymentOutcome, PromotionReport, PromotionStage, SyncStatus};
