// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! Builtin aggregator definitions shared by every dialect. Unlike scalar
//! SQL functions, the six OLAP measure aggregators behave identically
//! across engines — only their rendered SQL text differs, and that's the
//! query builder's concern, not the registry's.

use rolap_sql_ir::DataType;

use crate::aggregator::{Aggregator, AggregatorKind, RollupStrategy};

pub fn all_aggregators() -> Vec<Aggregator> {
    vec![
        Aggregator::new("SUM", AggregatorKind::Sum, DataType::Decimal, RollupStrategy::Direct),
        Aggregator::new("COUNT", AggregatorKind::Count, DataType::BigInt, RollupStrategy::Direct),
        Aggregator::new("MIN", AggregatorKind::Min, DataType::Decimal, RollupStrategy::Direct),
        Aggregator::new("MAX", AggregatorKind::Max, DataType::Decimal, RollupStrategy::Direct),
        Aggregator::new(
            "AVG",
            AggregatorKind::Avg,
            DataType::Decimal,
            RollupStrategy::RequiresCoAggregate {
                with: AggregatorKind::Count,
            },
        ),
        Aggregator::new(
            "COUNT_DISTINCT",
            AggregatorKind::CountDistinct,
            DataType::BigInt,
            RollupStrategy::WithinRollableLevels,
        ),
    ]
}
