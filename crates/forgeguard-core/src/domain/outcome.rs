//! Promotion decisions, stages and outcomes.

use std::fmt;

use model_registry::ProductionEntry;
use serde::{Deserialize, Serialize};

/// Verdict of the decision engine.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Deploy,
    Keep,
}

/// Terminal tag summarizing a promotion. Returned to the caller, never persisted.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeploymentOutcome {
    /// Registry was empty; the candidate became the first production model.
    DeployedFirstModel,
    /// Candidate beat the production model and replaced it.
    DeployedNewModel,
    /// Production model was kept.
    KeptOldModel,
}

impl DeploymentOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeploymentOutcome::DeployedFirstModel => "DEPLOYED_FIRST_MODEL",
            DeploymentOutcome::DeployedNewModel => "DEPLOYED_NEW_MODEL",
            DeploymentOutcome::KeptOldModel => "KEPT_OLD_MODEL",
        }
    }

    pub fn is_deployed(&self) -> bool {
        !matches!(self, DeploymentOutcome::KeptOldModel)
    }
}

impl fmt::Display for DeploymentOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stages of a promotion run.
///
/// `Start -> Decided -> (Published | Skipped) -> (Synced | SyncFailed)`.
/// `Skipped`, `Synced` and `SyncFailed` are terminal. A [`PromotionReport`]
/// always carries a terminal stage; `Start`, `Decided` and `Published` name
/// the intermediate steps, matching the `promotion.started`,
/// `promotion.decided` and `promotion.published` events, and never appear in
/// a report.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PromotionStage {
    Start,
    Decided,
    Published,
    Skipped,
    Synced,
    SyncFailed,
}

impl PromotionStage {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PromotionStage::Skipped | PromotionStage::Synced | PromotionStage::SyncFailed
        )
    }
}

/// Result of the post-commit cloud sync. Advisory only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SyncStatus {
    /// No new model was published, so nothing was synced.
    NotAttempted,
    Synced { url: String },
    Failed { error: String },
}

impl SyncStatus {
    /// Stage reached once the sync step is over.
    pub fn stage(&self) -> PromotionStage {
        match self {
            SyncStatus::NotAttempted => PromotionStage::Skipped,
            SyncStatus::Synced { .. } => PromotionStage::Synced,
            SyncStatus::Failed { .. } => PromotionStage::SyncFailed,
        }
    }
}

/// Everything a caller may want to know about one promotion run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PromotionReport {
    pub run_id: String,
    pub outcome: DeploymentOutcome,
    /// Terminal stage reached.
    pub stage: PromotionStage,
    /// Production entry after the run (the incumbent on `KEPT_OLD_MODEL`).
    pub entry: Option<ProductionEntry>,
    pub sync: SyncStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_tags_match_display_and_serde() {
        for outcome in [
            DeploymentOutcome::DeployedFirstModel,
            DeploymentOutcome::DeployedNewModel,
            DeploymentOutcome::KeptOldModel,
        ] {
            let json = serde_json::to_string(&outcome).expect("serialize");
            assert_eq!(json, format!("\"{}\"", outcome));
            let back: DeploymentOutcome = serde_json::from_str(&json).expect("deserialize");
            assert_eq!(back, outcome);
        }
    }

    #[test]
    fn test_only_kept_is_not_deployed() {
        assert!(DeploymentOutcome::DeployedFirstModel.is_deployed());
        assert!(DeploymentOutcome::DeployedNewModel.is_deployed());
        assert!(!DeploymentOutcome::KeptOldModel.is_deployed());
    }

    #[test]
    fn test_sync_status_terminal_stages() {
        assert_eq!(SyncStatus::NotAttempted.stage(), PromotionStage::Skipped);
        assert_eq!(
            SyncStatus::Failed {
                error: "boom".to_string()
            }
            .stage(),
            PromotionStage::SyncFailed
        );
        assert!(PromotionStage::Synced.is_terminal());
        assert!(!PromotionStage::Published.is_terminal());
        assert!(!PromotionStage::Decided.is_terminal());
        assert!(!PromotionStage::Start.is_terminal());
    }

    #[test]
    fn test_every_sync_status_reports_a_terminal_stage() {
        for status in [
            SyncStatus::NotAttempted,
            SyncStatus::Synced {
                url: "https://acme-forgery.hf.space".to_string(),
            },
            SyncStatus::Failed {
                error: "boom".to_string(),
            },
        ] {
            assert!(status.stage().is_terminal(), "{status:?}");
        }
    }

    #[test]
    fn test_sync_status_serde_is_tagged() {
        let status = SyncStatus::Synced {
            url: "https://acme-forgery.hf.space".to_string(),
        };
        let value = serde_json::to_value(&status).expect("serialize");
        assert_eq!(value["status"], "synced");
        assert_eq!(value["url"], "https://acme-forgery.hf.space");
    }
}
