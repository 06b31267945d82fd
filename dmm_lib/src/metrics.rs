// Feature-gated metrics helpers for dmm_lib.
// When the "stats" feature is enabled this exposes lightweight atomics.

#[cfg(feature = "stats")]
mod with_stats {
    use std::sync::atomic::{AtomicU64, Ordering};

    static ROUTING_RECOMPUTATIONS: AtomicU64 = AtomicU64::new(0);
    static RULES_WRITTEN: AtomicU64 = AtomicU64::new(0);
    static RULES_DELETED: AtomicU64 = AtomicU64::new(0);
    static RULE_FAILURES: AtomicU64 = AtomicU64::new(0);

    pub fn inc_routing_recomputation() {
        ROUTING_RECOMPUTATIONS.fetch_add(1, Ordering::Relaxed);
    }

    pub fn routing_recomputations() -> u64 {
        ROUTING_RECOMPUTATIONS.load(Ordering::Relaxed)
    }

    pub fn inc_rule_written() {
        RULES_WRITTEN.fetch_add(1, Ordering::Relaxed);
    }

    pub fn rules_written() -> u64 {
        RULES_WRITTEN.load(Ordering::Relaxed)
    }

    pub fn inc_rule_deleted() {
        RULES_DELETED.fetch_add(1, Ordering::Relaxed);
    }

    pub fn rules_deleted() -> u64 {
        RULES_DELETED.load(Ordering::Relaxed)
    }

    pub fn inc_rule_failure() {
        RULE_FAILURES.fetch_add(1, Ordering::Relaxed);
    }

    pub fn rule_failures() -> u64 {
        RULE_FAILURES.load(Ordering::Relaxed)
    }
}

#[cfg(not(feature = "stats"))]
mod without_stats {
    pub fn inc_routing_recomputation() {}
    pub fn routing_recomputations() -> u64 {
        0
    }
    pub fn inc_rule_written() {}
    pub fn rules_written() -> u64 {
        0
    }
    pub fn inc_rule_deleted() {}
    pub fn rules_deleted() -> u64 {
        0
    }
    pub fn inc_rule_failure() {}
    pub fn rule_failures() -> u64 {
        0
    }
}

#[cfg(feature = "stats")]
pub use with_stats::*;

#[cfg(not(feature = "stats"))]
pub use without_stats::*;
