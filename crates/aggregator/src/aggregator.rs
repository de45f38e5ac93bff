// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Aggregator definitions and rollup strategy
//!
//! Whether a measure's aggregate value can be recomputed from an
//! already-aggregated (coarser) segment, rather than re-read from the fact
//! table, depends entirely on which aggregate function produced it. A
//! [`RollupStrategy`] captures that per-function, so the AggStar matcher and
//! the rollup planner in `rolap-cache` can ask "is this measure rollable"
//! without re-deriving the rule at every call site.

use rolap_sql_ir::DataType;
use serde::{Deserialize, Serialize};

/// The SQL aggregate function backing a measure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AggregatorKind {
    Sum,
    Count,
    Min,
    Max,
    Avg,
    CountDistinct,
}

impl AggregatorKind {
    pub fn sql_name(&self) -> &'static str {
        match self {
            AggregatorKind::Sum => "SUM",
            AggregatorKind::Count => "COUNT",
            AggregatorKind::Min => "MIN",
            AggregatorKind::Max => "MAX",
            AggregatorKind::Avg => "AVG",
            AggregatorKind::CountDistinct => "COUNT",
        }
    }

    pub fn is_distinct(&self) -> bool {
        matches!(self, AggregatorKind::CountDistinct)
    }
}

/// How a measure aggregated at one grain can (or cannot) be recomputed at a
/// coarser grain from already-aggregated values, instead of re-reading the
/// fact table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RollupStrategy {
    /// The same function re-applied over the finer-grained aggregates
    /// produces the correct coarser-grained result (`SUM`, `COUNT`, `MIN`,
    /// `MAX`).
    Direct,
    /// Not safely rollable on its own; a second aggregator must be
    /// co-materialized and combined at read time. `AVG` needs `SUM` and
    /// `COUNT` rolled up separately and divided back out — rolling up the
    /// stored averages directly would weight each finer-grained group
    /// equally regardless of how many fact rows it represents.
    RequiresCoAggregate { with: AggregatorKind },
    /// Rollable only when the coarser grain's level bit key is still a
    /// superset of the rollable level bit key the distinct count was
    /// originally computed against — collapsing a dimension the distinct
    /// column's uniqueness depended on would double-count.
    WithinRollableLevels,
}

/// A named aggregate function with its return type and rollup behaviour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aggregator {
    pub name: String,
    pub kind: AggregatorKind,
    pub return_type: DataType,
    pub rollup: RollupStrategy,
}

impl Aggregator {
    pub fn new(name: impl Into<String>, kind: AggregatorKind, return_type: DataType, rollup: RollupStrategy) -> Self {
        Self {
            name: name.into(),
            kind,
            return_type,
            rollup,
        }
    }

    /// Whether this measure can be recomputed from already-aggregated
    /// segments at all (regardless of whether the co-aggregate or the
    /// rollable-levels condition is actually satisfied at a given site —
    /// callers that need the full answer consult [`Aggregator::rollup`]
    /// directly).
    pub fn is_rollable(&self) -> bool {
        !matches!(self.rollup, RollupStrategy::RequiresCoAggregate { .. })
    }

    /// The non-distinct aggregate that replaces this one in the outer query
    /// of a distinct rewrite (inner `DISTINCT`/`GROUP BY` subquery feeding
    /// an outer, non-distinct aggregation). Only `COUNT(DISTINCT x)` needs
    /// this: the inner subquery already de-duplicates `x`, so the outer
    /// query just counts rows.
    pub fn non_distinct_equivalent(&self) -> Option<AggregatorKind> {
        match self.kind {
            AggregatorKind::CountDistinct => Some(AggregatorKind::Count),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn avg_requires_co_aggregate_and_is_not_rollable_alone() {
        let avg = Aggregator::new(
            "AVG",
            AggregatorKind::Avg,
            DataType::Decimal,
            RollupStrategy::RequiresCoAggregate {
                with: AggregatorKind::Count,
            },
        );
        assert!(!avg.is_rollable());
    }

    #[test]
    fn sum_is_directly_rollable() {
        let sum = Aggregator::new("SUM", AggregatorKind::Sum, DataType::Decimal, RollupStrategy::Direct);
        assert!(sum.is_rollable());
    }

    #[test]
    fn count_distinct_maps_to_count_in_distinct_rewrite() {
        let cd = Aggregator::new(
            "COUNT_DISTINCT",
            AggregatorKind::CountDistinct,
            DataType::BigInt,
            RollupStrategy::WithinRollableLevels,
        );
        assert_eq!(cd.non_distinct_equivalent(), Some(AggregatorKind::Count));
        assert!(cd.is_rollable());
    }
}
