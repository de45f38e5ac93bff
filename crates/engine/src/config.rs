// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Engine configuration
//!
//! Every tunable knob the cache actor, loader and AggStar matcher consult,
//! collected in one place so a caller configures the engine once rather than
//! threading individual flags through `register_star`/`lookup`/`load`.

/// Tunables for one [`crate::RolapEngine`] instance.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Enable AggStar matching. With this off every batch is served from the
    /// fact table regardless of what candidates a star has registered.
    pub use_aggregates: bool,

    /// Bypass the segment index entirely: every lookup is a miss and every
    /// load issues fresh SQL. Takes precedence over `enable_session_caching`.
    pub disable_caching: bool,

    /// Partition the segment index per caller-supplied session id.
    pub enable_session_caching: bool,

    /// Below this axis-product size, a segment body is never stored sparse.
    pub sparse_segment_count_threshold: u64,

    /// Sparse when `(possible - actual) * density > actual`.
    pub sparse_segment_density_threshold: f64,

    /// A list predicate naming more values than this forces the fact table
    /// for that batch, the same way a compound predicate does, rather than
    /// being rendered as a native `IN (...)` against an AggStar.
    pub max_constraints: usize,

    /// Abort a load with `ResourceLimitExceeded` once it scans more than
    /// this many result rows. `None` leaves the row count unbounded.
    pub result_limit: Option<u64>,

    /// Size of the worker pool issuing SQL on behalf of the cache actor.
    pub sql_executor_threads: usize,

    /// Size of the worker pool servicing the external cache tier.
    pub cache_executor_threads: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            use_aggregates: true,
            disable_caching: false,
            enable_session_caching: false,
            sparse_segment_count_threshold: 1_000,
            sparse_segment_density_threshold: 0.5,
            max_constraints: 1_000,
            result_limit: None,
            sql_executor_threads: 4,
            cache_executor_threads: 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_enable_aggregates_and_leave_caching_on() {
        let config = EngineConfig::default();
        assert!(config.use_aggregates);
        assert!(!config.disable_caching);
        assert!(!config.enable_session_caching);
        assert_eq!(config.result_limit, None);
    }
}
