//! Metric Source: turns classifier output into a [`MetricsRecord`].
//!
//! The classifier itself runs elsewhere; it hands over per-image forgery
//! probabilities and the ground-truth labels (1 = forged, 0 = authentic).
//! Scores here treat label 1 as the positive class.

use std::path::Path;

use model_registry::{MetricsRecord, ACCURACY, F1};
use serde::{Deserialize, Serialize};

use crate::domain::{PromoteError, Result};

/// Probability above which an image counts as forged.
pub const DEFAULT_THRESHOLD: f64 = 0.5;

/// Classifier output for a held-out test set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PredictionSet {
    pub probabilities: Vec<f64>,
    pub labels: Vec<u8>,
}

impl PredictionSet {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Score with the given decision threshold.
    pub fn score(&self, threshold: f64) -> Result<MetricsRecord> {
        score_predictions(&self.probabilities, &self.labels, threshold)
    }
}

/// Binary confusion counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Confusion {
    pub tp: u64,
    pub fp: u64,
    pub tn: u64,
    pub fn_: u64,
}

impl Confusion {
    fn total(&self) -> u64 {
        self.tp + self.fp + self.tn + self.fn_
    }
}

fn ratio(num: u64, den: u64) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

/// Count outcomes of `probability > threshold` against `labels`.
pub fn confusion(probabilities: &[f64], labels: &[u8], threshold: f64) -> Result<Confusion> {
    if probabilities.len() != labels.len() {
        return Err(PromoteError::InvalidEvaluation(format!(
            "{} probabilities for {} labels",
            probabilities.len(),
            labels.len()
        )));
    }
    if probabilities.is_empty() {
        return Err(PromoteError::InvalidEvaluation("empty test set".to_string()));
    }

    let mut c = Confusion::default();
    for (&p, &label) in probabilities.iter().zip(labels) {
        if !p.is_finite() {
            return Err(PromoteError::InvalidEvaluation(format!(
                "non-finite probability {p}"
            )));
        }
        let predicted = p > threshold;
        match (predicted, label) {
            (true, 1) => c.tp += 1,
            (true, 0) => c.fp += 1,
            (false, 0) => c.tn += 1,
            (false, 1) => c.fn_ += 1,
            (_, other) => {
                return Err(PromoteError::InvalidEvaluation(format!(
                    "label {other} is not 0 or 1"
                )))
            }
        }
    }
    Ok(c)
}

/// Accuracy, precision, recall and F1 of thresholded predictions.
///
/// Undefined ratios (no predicted or no actual positives) score 0.0.
pub fn score_predictions(
    probabilities: &[f64],
    labels: &[u8],
    threshold: f64,
) -> Result<MetricsRecord> {
    let c = confusion(probabilities, labels, threshold)?;
    let precision = ratio(c.tp, c.tp + c.fp);
    let recall = ratio(c.tp, c.tp + c.fn_);
    let f1 = ratio(2 * c.tp, 2 * c.tp + c.fp + c.fn_);
    let accuracy = ratio(c.tp + c.tn, c.total());

    Ok(MetricsRecord::new()
        .with(ACCURACY, accuracy)
        .with(F1, f1)
        .with("precision", precision)
        .with("recall", recall))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perfect_classifier() {
        let m = score_predictions(&[0.9, 0.1, 0.8, 0.2], &[1, 0, 1, 0], DEFAULT_THRESHOLD).unwrap();
        assert_eq!(m.accuracy(), Some(1.0));
        assert_eq!(m.f1(), Some(1.0));
    }

    #[test]
    fn mixed_predictions() {
        // tp=2 fp=1 tn=1 fn=1
        let probs = [0.9, 0.7, 0.6, 0.3, 0.2];
        let labels = [1, 1, 0, 1, 0];
        let m = score_predictions(&probs, &labels, DEFAULT_THRESHOLD).unwrap();
        assert!((m.accuracy().unwrap() - 0.6).abs() < 1e-12);
        assert!((m.get("precision").unwrap() - 2.0 / 3.0).abs() < 1e-12);
        assert!((m.get("recall").unwrap() - 2.0 / 3.0).abs() < 1e-12);
        assert!((m.f1().unwrap() - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn threshold_is_exclusive() {
        let m = score_predictions(&[0.5], &[1], 0.5).unwrap();
        assert_eq!(m.f1(), Some(0.0));
        assert_eq!(m.accuracy(), Some(0.0));
    }

    #[test]
    fn no_positives_scores_zero_f1() {
        let m = score_predictions(&[0.1, 0.2], &[0, 0], DEFAULT_THRESHOLD).unwrap();
        assert_eq!(m.f1(), Some(0.0));
        assert_eq!(m.accuracy(), Some(1.0));
    }

    #[test]
    fn invalid_inputs_are_rejected() {
        assert!(score_predictions(&[0.1], &[0, 1], 0.5).is_err());
        assert!(score_predictions(&[], &[], 0.5).is_err());
        assert!(score_predictions(&[0.1], &[2], 0.5).is_err());
        assert!(score_predictions(&[f64::NAN], &[1], 0.5).is_err());
    }

    #[test]
    fn prediction_set_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preds.json");
        std::fs::write(&path, r#"{"probabilities": [0.9, 0.1], "labels": [1, 0]}"#).unwrap();

        let set = PredictionSet::from_json_file(&path).unwrap();
        assert_eq!(set.score(DEFAULT_THRESHOLD).unwrap().f1(), Some(1.0));
    }
}
