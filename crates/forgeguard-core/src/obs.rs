//! Structured observability hooks for the promotion lifecycle.
//!
//! - A run-scoped tracing span, attached with `Instrument`
//! - One emission function per stage transition
//!
//! Events are emitted at `info!` (sync failure at `warn!`). Verbosity is
//! controlled through `FORGEGUARD_LOG`; see [`crate::telemetry`].

use tracing::{info, warn};

use crate::domain::{Decision, DeploymentOutcome};

/// Span for a promotion run, for use with `Instrument` across `.await`s.
pub fn promotion_span(run_id: &str) -> tracing::Span {
    tracing::info_span!("forgeguard.promotion", run_id = %run_id)
}

/// Emit event: promotion started for a candidate artifact.
pub fn emit_promotion_started(run_id: &str, candidate: &str, candidate_f1: f64) {
    info!(
        event = "promotion.started",
        run_id = %run_id,
        candidate = %candidate,
        candidate_f1 = candidate_f1,
    );
}

/// Emit event: decision taken.
pub fn emit_promotion_decided(
    run_id: &str,
    decision: Decision,
    candidate_f1: f64,
    production_f1: Option<f64>,
) {
    info!(
        event = "promotion.decided",
        run_id = %run_id,
        decision = ?decision,
        candidate_f1 = candidate_f1,
        production_f1 = ?production_f1,
    );
}

/// Emit event: candidate committed to the registry.
pub fn emit_promotion_published(run_id: &str, outcome: DeploymentOutcome, version: u64) {
    info!(
        event = "promotion.published",
        run_id = %run_id,
        outcome = %outcome,
        version = version,
    );
}

/// Emit event: candidate not promoted.
pub fn emit_promotion_skipped(run_id: &str, production_version: Option<u64>) {
    info!(
        event = "promotion.skipped",
        run_id = %run_id,
        outcome = %DeploymentOutcome::KeptOldModel,
        production_version = ?production_version,
    );
}

/// Emit event: registry moved during the run, decision is retried.
pub fn emit_promotion_conflict(run_id: &str, attempt: u32) {
    info!(event = "promotion.conflict", run_id = %run_id, attempt = attempt);
}

/// Emit event: remote sync succeeded.
pub fn emit_sync_succeeded(run_id: &str, url: &str, duration_ms: u64) {
    info!(
        event = "promotion.synced",
        run_id = %run_id,
        url = %url,
        duration_ms = duration_ms,
    );
}

/// Emit event: remote sync failed. The local promotion stands.
pub fn emit_sync_failed(run_id: &str, error: &dyn std::fmt::Display) {
    warn!(
        event = "promotion.sync_failed",
        run_id = %run_id,
        error = %error,
        "local deployment succeeded, but cloud sync failed"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::Instrument;
    use tracing_test::traced_test;

    #[tokio::test]
    #[traced_test]
    async fn test_events_inside_promotion_span_carry_run_id() {
        async { info!("inside run") }
            .instrument(promotion_span("run-42"))
            .await;
        assert!(logs_contain("forgeguard.promotion{run_id=run-42}"));
        assert!(logs_contain("inside run"));
    }
}
