//! Promotion decision engine.
//!
//! Compares a candidate's metrics with the production model's and decides
//! whether the candidate should replace it. Pure: no I/O, no clock, no
//! registry access, so every rule here is testable in isolation.
//!
//! Rules (in order):
//! 1. Candidate must carry a finite `f1` (and `accuracy`, see
//!    [`validate_candidate_metrics`]).
//! 2. No production model: deploy.
//! 3. Production metrics without a finite `f1` are corrupt: refuse to decide.
//! 4. Deploy only when `candidate.f1 > production.f1`. A tie keeps the
//!    incumbent.

use model_registry::{MetricsRecord, ACCURACY, F1};

use crate::domain::{Decision, PromoteError, Result};

fn finite_metric(metrics: &MetricsRecord, name: &str) -> Result<f64> {
    let value = metrics
        .get(name)
        .ok_or_else(|| PromoteError::MissingMetric(name.to_string()))?;
    if !value.is_finite() {
        return Err(PromoteError::InvalidMetric {
            name: name.to_string(),
            value,
        });
    }
    Ok(value)
}

/// Check that a Metric Source record carries every metric the pipeline needs.
///
/// Every other metric must be finite too: the whole record is persisted with
/// the release and JSON cannot carry NaN or infinities.
pub fn validate_candidate_metrics(candidate: &MetricsRecord) -> Result<()> {
    finite_metric(candidate, F1)?;
    finite_metric(candidate, ACCURACY)?;
    if let Some((name, value)) = candidate.first_non_finite() {
        return Err(PromoteError::InvalidMetric {
            name: name.to_string(),
            value,
        });
    }
    Ok(())
}

/// Decide between deploying the candidate and keeping production.
pub fn decide(candidate: &MetricsRecord, production: Option<&MetricsRecord>) -> Result<Decision> {
    let candidate_f1 = finite_metric(candidate, F1)?;

    let Some(production) = production else {
        return Ok(Decision::Deploy);
    };

    let production_f1 = production
        .f1()
        .filter(|v| v.is_finite())
        .ok_or_else(|| {
            PromoteError::CorruptRegistry("production metrics have no finite f1".to_string())
        })?;

    if candidate_f1 > production_f1 {
        Ok(Decision::Deploy)
    } else {
        Ok(Decision::Keep)
    }
}
