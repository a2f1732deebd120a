//! Contract tests for ModelRegistry.
//!
//! Every check runs against both the filesystem registry and the in-memory
//! fake; any conforming implementation must pass them.

use std::sync::Arc;
use std::time::Duration;

use model_registry::fakes::MemoryModelRegistry;
use model_registry::{
    ContentDigest, FsModelRegistry, MetricsRecord, ModelRegistry, PublishRequest, RegistryError,
    MANIFEST_FILE,
};

fn metrics(f1: f64, accuracy: f64) -> MetricsRecord {
    MetricsRecord::new().with("f1", f1).with("accuracy", accuracy)
}

fn request(model: &[u8], m: MetricsRecord, expected: Option<u64>) -> PublishRequest {
    PublishRequest {
        model_bytes: model.to_vec(),
        model_file_name: "candidate_model.keras".to_string(),
        weights: None,
        metrics: m,
        promoted_by: "ci".to_string(),
        source: "models/candidate_model.keras".to_string(),
        run_id: "run-test".to_string(),
        expected_version: expected,
    }
}

async fn check_empty_then_first_publish(registry: &dyn ModelRegistry) {
    assert!(registry.read().await.unwrap().is_none());
    assert!(registry.history().await.unwrap().is_empty());

    let m = metrics(0.812_345_678_901_234_5, 0.1 + 0.2);
    let entry = registry
        .publish(request(b"model-v1", m.clone(), None))
        .await
        .unwrap();
    assert_eq!(entry.version, 1);

    let current = registry.read().await.unwrap().expect("entry after publish");
    assert_eq!(current, entry);
    assert_eq!(
        current.metrics.f1().unwrap().to_bits(),
        m.f1().unwrap().to_bits()
    );
    assert_eq!(
        current.metrics.accuracy().unwrap().to_bits(),
        m.accuracy().unwrap().to_bits()
    );
    assert_eq!(registry.artifact_bytes(&current).await.unwrap(), b"model-v1");
}

async fn check_stale_publish_is_rejected(registry: &dyn ModelRegistry) {
    let first = registry
        .publish(request(b"model-v1", metrics(0.8, 0.9), None))
        .await
        .unwrap();

    let err = registry
        .publish(request(b"model-v2", metrics(0.9, 0.9), None))
        .await
        .unwrap_err();
    assert!(
        matches!(
            err,
            RegistryError::VersionConflict {
                expected: None,
                actual: Some(1)
            }
        ),
        "unexpected error: {err:?}"
    );
    assert_eq!(registry.read().await.unwrap(), Some(first));
}

async fn check_rollback_appends(registry: &dyn ModelRegistry) {
    let err = registry.rollback("ops").await.unwrap_err();
    assert!(matches!(err, RegistryError::NoPreviousRelease));

    registry
        .publish(request(b"model-v1", metrics(0.81, 0.9), None))
        .await
        .unwrap();
    let v2 = registry
        .publish(request(b"model-v2", metrics(0.85, 0.92), Some(1)))
        .await
        .unwrap();
    assert_eq!(v2.version, 2);

    let rolled = registry.rollback("ops").await.unwrap();
    assert_eq!(rolled.version, 3);
    assert_eq!(rolled.metrics.f1(), Some(0.81));
    assert_eq!(rolled.promoted_by, "ops");
    assert_eq!(registry.artifact_bytes(&rolled).await.unwrap(), b"model-v1");

    let history = registry.history().await.unwrap();
    let versions: Vec<u64> = history.iter().map(|e| e.version).collect();
    assert_eq!(versions, vec![3, 2, 1]);
}

async fn check_non_finite_metrics_are_refused(registry: &dyn ModelRegistry) {
    let m = metrics(0.81, 0.9).with("precision", f64::NAN);
    let err = registry.publish(request(b"model-nan", m, None)).await.unwrap_err();
    assert!(matches!(
        err,
        RegistryError::NonFiniteMetric { ref name, .. } if name == "precision"
    ));
    assert!(registry.read().await.unwrap().is_none());

    // The registry is still usable afterwards.
    let entry = registry
        .publish(request(b"model-ok", metrics(0.81, 0.9), None))
        .await
        .unwrap();
    assert_eq!(registry.read().await.unwrap(), Some(entry));
}

#[tokio::test]
async fn memory_empty_then_first_publish() {
    check_empty_then_first_publish(&MemoryModelRegistry::new()).await;
}

#[tokio::test]
async fn fs_empty_then_first_publish() {
    let dir = tempfile::tempdir().unwrap();
    check_empty_then_first_publish(&FsModelRegistry::open(dir.path()).unwrap()).await;
}

#[tokio::test]
async fn memory_stale_publish_is_rejected() {
    check_stale_publish_is_rejected(&MemoryModelRegistry::new()).await;
}

#[tokio::test]
async fn fs_stale_publish_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    check_stale_publish_is_rejected(&FsModelRegistry::open(dir.path()).unwrap()).await;
}

#[tokio::test]
async fn memory_rollback_appends() {
    check_rollback_appends(&MemoryModelRegistry::new()).await;
}

#[tokio::test]
async fn fs_rollback_appends() {
    let dir = tempfile::tempdir().unwrap();
    check_rollback_appends(&FsModelRegistry::open(dir.path()).unwrap()).await;
}

#[tokio::test]
async fn memory_non_finite_metrics_are_refused() {
    check_non_finite_metrics_are_refused(&MemoryModelRegistry::new()).await;
}

#[tokio::test]
async fn fs_non_finite_metrics_are_refused() {
    let dir = tempfile::tempdir().unwrap();
    let registry = FsModelRegistry::open(dir.path()).unwrap();
    check_non_finite_metrics_are_refused(&registry).await;

    // Nothing from the refused request reached disk.
    let stored = ContentDigest::from_bytes(b"model-nan");
    let hex = stored.as_str();
    assert!(!dir.path().join("objects").join(&hex[..2]).join(&hex[2..]).exists());
    assert_eq!(registry.history().await.unwrap().len(), 1);
}

// ===========================================================================
// Filesystem-only behaviour
// ===========================================================================

#[tokio::test]
async fn fs_state_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let entry = {
        let registry = FsModelRegistry::open(dir.path()).unwrap();
        registry
            .publish(request(b"model-v1", metrics(0.81, 0.9), None))
            .await
            .unwrap()
    };

    let reopened = FsModelRegistry::open(dir.path()).unwrap();
    assert_eq!(reopened.read().await.unwrap(), Some(entry.clone()));
    assert!(reopened.artifact_path(&entry).is_file());
}

#[tokio::test]
async fn fs_corrupt_manifest_is_fatal_and_not_overwritten() {
    let dir = tempfile::tempdir().unwrap();
    let registry = FsModelRegistry::open(dir.path()).unwrap();
    std::fs::write(dir.path().join(MANIFEST_FILE), "{ \"version\": 1, ").unwrap();

    let err = registry.read().await.unwrap_err();
    assert!(matches!(err, RegistryError::Corrupt { .. }));

    let err = registry
        .publish(request(b"model", metrics(0.9, 0.9), None))
        .await
        .unwrap_err();
    assert!(matches!(err, RegistryError::Corrupt { .. }));
    assert_eq!(
        std::fs::read_to_string(dir.path().join(MANIFEST_FILE)).unwrap(),
        "{ \"version\": 1, "
    );
}

#[tokio::test]
async fn fs_manifest_is_human_readable_json() {
    let dir = tempfile::tempdir().unwrap();
    let registry = FsModelRegistry::open(dir.path()).unwrap();
    registry
        .publish(request(b"model", metrics(0.81, 0.9), None))
        .await
        .unwrap();

    let raw = std::fs::read_to_string(dir.path().join(MANIFEST_FILE)).unwrap();
    let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(value["metrics"]["f1"], serde_json::json!(0.81));
    assert_eq!(value["version"], serde_json::json!(1));
    assert!(raw.contains('\n'));
}

#[tokio::test]
async fn fs_concurrent_first_publish_has_single_winner() {
    let dir = tempfile::tempdir().unwrap();
    let registry = Arc::new(FsModelRegistry::open(dir.path()).unwrap());

    let mut handles = Vec::new();
    for i in 0..4u8 {
        let registry = Arc::clone(&registry);
        handles.push(tokio::spawn(async move {
            let model = vec![i; 64];
            registry
                .publish(request(&model, metrics(0.5 + f64::from(i) / 10.0, 0.9), None))
                .await
        }));
    }

    let mut winners = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(entry) => {
                assert_eq!(entry.version, 1);
                winners += 1;
            }
            Err(e) => assert!(e.is_conflict(), "unexpected error: {e:?}"),
        }
    }
    assert_eq!(winners, 1);
    assert_eq!(registry.history().await.unwrap().len(), 1);
}

#[tokio::test]
async fn fs_lock_left_by_dead_writer_does_not_block_publish() {
    let dir = tempfile::tempdir().unwrap();
    let registry = FsModelRegistry::open(dir.path())
        .unwrap()
        .with_lock_timeout(Duration::from_millis(200));

    // A writer killed mid-publish leaves its lock file behind.
    std::fs::write(
        registry.lock_path(),
        "pid=999999 acquired_at=2026-01-01T00:00:00Z\n",
    )
    .unwrap();

    let entry = registry
        .publish(request(b"model-v1", metrics(0.81, 0.9), None))
        .await
        .expect("stale lock file must not block");
    assert_eq!(entry.version, 1);
}

#[tokio::test]
async fn fs_weights_sibling_is_stored() {
    let dir = tempfile::tempdir().unwrap();
    let registry = FsModelRegistry::open(dir.path()).unwrap();
    let mut req = request(b"model", metrics(0.81, 0.9), None);
    req.weights = Some((b"weights".to_vec(), "candidate_model.weights.h5".to_string()));

    let entry = registry.publish(req).await.unwrap();
    let weights = entry.weights.expect("weights ref");
    assert_eq!(weights.size_bytes, 7);
    assert_eq!(weights.file_name, "candidate_model.weights.h5");
}
