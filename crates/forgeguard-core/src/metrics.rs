//! Process-wide promotion counters.
//!
//! Incremented silently at the call site; [`PromotionMetrics::flush`] emits
//! the current values as a single `tracing::info!` event.

use std::sync::atomic::{AtomicU64, Ordering};

/// Global counters singleton.
pub static PROMOTION_METRICS: PromotionMetrics = PromotionMetrics::new();

/// Lightweight atomic counters.
pub struct PromotionMetrics {
    deployed: AtomicU64,
    kept: AtomicU64,
    sync_failures: AtomicU64,
    conflicts: AtomicU64,
}

impl Default for PromotionMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl PromotionMetrics {
    pub const fn new() -> Self {
        Self {
            deployed: AtomicU64::new(0),
            kept: AtomicU64::new(0),
            sync_failures: AtomicU64::new(0),
            conflicts: AtomicU64::new(0),
        }
    }

    pub fn inc_deployed(&self) {
        self.deployed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_kept(&self) {
        self.kept.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_sync_failures(&self) {
        self.sync_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_conflicts(&self) {
        self.conflicts.fetch_add(1, Ordering::Relaxed);
    }

    /// Emit all current counter values as one `info!` event.
    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            deployed = self.deployed(),
            kept = self.kept(),
            sync_failures = self.sync_failures(),
            conflicts = self.conflicts(),
        );
    }

    pub fn deployed(&self) -> u64 {
        self.deployed.load(Ordering::Relaxed)
    }

    pub fn kept(&self) -> u64 {
        self.kept.load(Ordering::Relaxed)
    }

    pub fn sync_failures(&self) -> u64 {
        self.sync_failures.load(Ordering::Relaxed)
    }

    pub fn conflicts(&self) -> u64 {
        self.conflicts.load(Ordering::Relaxed)
    }
}
