//! Promotion orchestrator.
//!
//! Drives one candidate through
//! `START -> DECIDED -> (PUBLISHED | SKIPPED) -> (SYNCED | SYNC_FAILED)`:
//!
//! 1. Validate the candidate's metrics and read its artifact. Failures here
//!    abort before the registry is touched.
//! 2. Read the registry and ask [`decide`] for a verdict.
//! 3. On `Keep`, stop with `KEPT_OLD_MODEL`.
//! 4. On `Deploy`, publish with the registry version seen in step 2 as the
//!    compare-and-swap precondition. If another run got there first, go back
//!    to step 2 against the new production model.
//! 5. Push the committed artifact through [`CloudSync`]. Its result is
//!    recorded in the report and never changes the outcome.

use std::path::{Path, PathBuf};
use std::time::Instant;

use model_registry::{MetricsRecord, ModelRegistry, ProductionEntry, PublishRequest};
use tracing::Instrument;
use uuid::Uuid;

use crate::config::PromoteConfig;
use crate::decision::{decide, validate_candidate_metrics};
use crate::domain::{
    Decision, DeploymentOutcome, PromoteError, PromotionReport, PromotionStage, Result,
    SyncStatus,
};
use crate::metrics::PROMOTION_METRICS;
use crate::obs;
use crate::sync::{CloudSync, SyncError};

/// File name the production model carries when handed to cloud sync.
pub const PRODUCTION_MODEL_FILE: &str = "production_model.keras";

/// Candidate artifact read into memory.
struct Candidate {
    model: Vec<u8>,
    file_name: String,
    weights: Option<(Vec<u8>, String)>,
}

/// `<dir>/<stem>.weights.h5`, the exported-weights sibling of a model file.
pub fn weights_sibling(model: &Path) -> Option<PathBuf> {
    let stem = model.file_stem()?.to_str()?;
    Some(model.with_file_name(format!("{stem}.weights.h5")))
}

async fn read_candidate(path: &Path) -> Result<Candidate> {
    let unreadable = |source| PromoteError::CandidateUnreadable {
        path: path.to_path_buf(),
        source,
    };

    let metadata = tokio::fs::metadata(path).await.map_err(unreadable)?;
    if !metadata.is_file() {
        return Err(unreadable(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "not a regular file",
        )));
    }
    let model = tokio::fs::read(path).await.map_err(unreadable)?;

    let weights = match weights_sibling(path) {
        Some(sibling) if sibling.is_file() => {
            let bytes = tokio::fs::read(&sibling).await.map_err(|source| {
                PromoteError::CandidateUnreadable {
                    path: sibling.clone(),
                    source,
                }
            })?;
            let name = sibling
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            Some((bytes, name))
        }
        _ => None,
    };

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| PRODUCTION_MODEL_FILE.to_string());

    Ok(Candidate {
        model,
        file_name,
        weights,
    })
}

/// Decides on, publishes and syncs candidate models.
pub struct Promoter<R, S> {
    registry: R,
    sync: S,
    config: PromoteConfig,
}

impl<R, S> Promoter<R, S>
where
    R: ModelRegistry,
    S: CloudSync,
{
    pub fn new(registry: R, sync: S) -> Self {
        Self {
            registry,
            sync,
            config: PromoteConfig::default(),
        }
    }

    pub fn with_config(mut self, config: PromoteConfig) -> Self {
        self.config = config;
        self
    }

    pub fn registry(&self) -> &R {
        &self.registry
    }

    pub fn sync(&self) -> &S {
        &self.sync
    }

    pub fn config(&self) -> &PromoteConfig {
        &self.config
    }

    /// Promote `candidate_model_path` if its metrics beat production.
    ///
    /// Returns `Err` only for failures before or during the registry commit.
    /// A failed cloud sync is reported in [`PromotionReport::sync`].
    pub async fn deploy_model_if_better(
        &self,
        metrics: &MetricsRecord,
        candidate_model_path: &Path,
    ) -> Result<PromotionReport> {
        let run_id = Uuid::new_v4().to_string();
        self.run(run_id.clone(), metrics, candidate_model_path)
            .instrument(obs::promotion_span(&run_id))
            .await
    }

    async fn run(
        &self,
        run_id: String,
        metrics: &MetricsRecord,
        candidate_path: &Path,
    ) -> Result<PromotionReport> {
        // START
        validate_candidate_metrics(metrics)?;
        let candidate_f1 = metrics.f1().unwrap_or_default();
        obs::emit_promotion_started(&run_id, &candidate_path.display().to_string(), candidate_f1);
        let candidate = read_candidate(candidate_path).await?;

        let mut attempt: u32 = 0;
        loop {
            attempt += 1;

            // DECIDED
            let current = self.registry.read().await?;
            let production_metrics = current.as_ref().map(|e| &e.metrics);
            let decision = decide(metrics, production_metrics)?;
            obs::emit_promotion_decided(
                &run_id,
                decision,
                candidate_f1,
                production_metrics.and_then(MetricsRecord::f1),
            );

            if decision == Decision::Keep {
                // SKIPPED
                PROMOTION_METRICS.inc_kept();
                obs::emit_promotion_skipped(&run_id, current.as_ref().map(|e| e.version));
                return Ok(PromotionReport {
                    run_id,
                    outcome: DeploymentOutcome::KeptOldModel,
                    stage: PromotionStage::Skipped,
                    entry: current,
                    sync: SyncStatus::NotAttempted,
                });
            }

            let request = PublishRequest {
                model_bytes: candidate.model.clone(),
                model_file_name: candidate.file_name.clone(),
                weights: candidate.weights.clone(),
                metrics: metrics.clone(),
                promoted_by: self.config.promoted_by.clone(),
                source: candidate_path.display().to_string(),
                run_id: run_id.clone(),
                expected_version: current.as_ref().map(|e| e.version),
            };

            let entry = match self.registry.publish(request).await {
                Ok(entry) => entry,
                Err(e) if e.is_conflict() => {
                    PROMOTION_METRICS.inc_conflicts();
                    obs::emit_promotion_conflict(&run_id, attempt);
                    if attempt > self.config.max_conflict_retries {
                        return Err(PromoteError::Contended { attempts: attempt });
                    }
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            // PUBLISHED
            let outcome = if current.is_none() {
                DeploymentOutcome::DeployedFirstModel
            } else {
                DeploymentOutcome::DeployedNewModel
            };
            PROMOTION_METRICS.inc_deployed();
            obs::emit_promotion_published(&run_id, outcome, entry.version);

            // SYNCED | SYNC_FAILED
            let sync = self.sync_published(&run_id, &entry).await;
            return Ok(PromotionReport {
                run_id,
                outcome,
                stage: sync.stage(),
                entry: Some(entry),
                sync,
            });
        }
    }

    /// Best-effort push of a committed entry. Never fails the promotion.
    async fn sync_published(&self, run_id: &str, entry: &ProductionEntry) -> SyncStatus {
        let started = Instant::now();
        let result = match self.stage_for_sync(entry).await {
            Ok((_staging, path)) => {
                match tokio::time::timeout(self.config.sync_timeout, self.sync.publish(&path)).await
                {
                    Ok(result) => result,
                    Err(_) => Err(SyncError::Timeout(self.config.sync_timeout)),
                }
            }
            Err(e) => Err(e),
        };

        match result {
            Ok(url) => {
                obs::emit_sync_succeeded(run_id, &url, started.elapsed().as_millis() as u64);
                SyncStatus::Synced { url }
            }
            Err(e) => {
                PROMOTION_METRICS.inc_sync_failures();
                obs::emit_sync_failed(run_id, &e);
                SyncStatus::Failed {
                    error: e.to_string(),
                }
            }
        }
    }

    /// Copy the committed blob out under its production file name so export
    /// tools that key off the extension can load it.
    async fn stage_for_sync(
        &self,
        entry: &ProductionEntry,
    ) -> std::result::Result<(tempfile::TempDir, PathBuf), SyncError> {
        let staging = tempfile::tempdir().map_err(|e| SyncError::Export(e.to_string()))?;
        let bytes = self
            .registry
            .artifact_bytes(entry)
            .await
            .map_err(|e| SyncError::Export(e.to_string()))?;
        let path = staging.path().join(PRODUCTION_MODEL_FILE);
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| SyncError::Export(e.to_string()))?;
        Ok((staging, path))
    }
}

/// Promote a candidate and return only the outcome tag.
pub async fn deploy_model_if_better<R, S>(
    registry: R,
    sync: S,
    metrics: &MetricsRecord,
    candidate_model_path: &Path,
) -> Result<DeploymentOutcome>
where
    R: ModelRegistry,
    S: CloudSync,
{
    let report = Promoter::new(registry, sync)
        .deploy_model_if_better(metrics, candidate_model_path)
        .await?;
    Ok(report.outcome)
}
