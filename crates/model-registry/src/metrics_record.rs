//! Evaluation metrics persisted alongside every production release.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::RegistryError;
use crate::storage_traits::StorageResult;

/// Metric name used as the promotion comparison key.
pub const F1: &str = "f1";

/// Metric name every evaluator is expected to report.
pub const ACCURACY: &str = "accuracy";

/// Mapping of metric name to score.
///
/// Serialized as a flat JSON object, e.g. `{"accuracy": 0.91, "f1": 0.81}`.
/// Keys are kept ordered so the on-disk form is stable across writes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetricsRecord(BTreeMap<String, f64>);

impl MetricsRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, value: f64) -> Self {
        self.0.insert(name.into(), value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: f64) {
        self.0.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.0.get(name).copied()
    }

    pub fn f1(&self) -> Option<f64> {
        self.get(F1)
    }

    pub fn accuracy(&self) -> Option<f64> {
        self.get(ACCURACY)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// First metric holding NaN or an infinity. JSON has no encoding for
    /// those, so a record containing one cannot be persisted.
    pub fn first_non_finite(&self) -> Option<(&str, f64)> {
        self.iter().find(|(_, v)| !v.is_finite())
    }

    /// Human-readable JSON form used for every persisted copy.
    pub fn to_json_pretty(&self) -> StorageResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Load a metrics document, e.g. the output of an evaluation run.
    ///
    /// Any non-numeric value makes the whole document invalid.
    pub fn from_json_file(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        serde_json::from_str(&raw).map_err(|e| RegistryError::Corrupt {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }
}

impl FromIterator<(String, f64)> for MetricsRecord {
    fn from_iter<T: IntoIterator<Item = (String, f64)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_round_trip_is_bit_exact() {
        let values = [
            0.1 + 0.2,
            0.812_345_678_901_234_5,
            1.0 / 3.0,
            f64::MIN_POSITIVE,
            0.999_999_999_999_999_9,
        ];
        for v in values {
            let record = MetricsRecord::new().with(F1, v).with(ACCURACY, 1.0 - v);
            let json = record.to_json_pretty().expect("serialize");
            let back: MetricsRecord = serde_json::from_str(&json).expect("deserialize");
            assert_eq!(back.f1().map(f64::to_bits), Some(v.to_bits()));
            assert_eq!(
                back.accuracy().map(f64::to_bits),
                Some((1.0 - v).to_bits())
            );
        }
    }

    #[test]
    fn serializes_as_flat_object() {
        let record = MetricsRecord::new().with(F1, 0.5).with(ACCURACY, 0.75);
        let value = serde_json::to_value(&record).expect("to_value");
        assert_eq!(value, serde_json::json!({ "accuracy": 0.75, "f1": 0.5 }));
    }

    #[test]
    fn first_non_finite_finds_secondary_metrics() {
        let clean = MetricsRecord::new().with(F1, 0.8).with(ACCURACY, 0.9);
        assert_eq!(clean.first_non_finite(), None);

        let record = clean.with("recall", f64::INFINITY);
        assert_eq!(record.first_non_finite(), Some(("recall", f64::INFINITY)));
    }

    #[test]
    fn non_numeric_metric_is_corrupt() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("metrics.json");
        std::fs::write(&path, r#"{"f1": "high"}"#).expect("write");

        let err = MetricsRecord::from_json_file(&path).unwrap_err();
        assert!(matches!(err, RegistryError::Corrupt { .. }));
    }

    #[test]
    fn missing_metric_reads_as_none() {
        let record = MetricsRecord::new().with(ACCURACY, 0.9);
        assert!(record.f1().is_none());
        assert_eq!(record.accuracy(), Some(0.9));
    }
}
