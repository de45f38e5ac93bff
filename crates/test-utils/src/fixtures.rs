// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Sample star / dialect fixtures
//!
//! A small sales star (`region_id`, `product_id`, `amount`) reused across
//! `rolap-cache`, `rolap-loader`, and `rolap-engine` tests, plus the two
//! dialect shapes the query builder branches on: a permissive one (native
//! `COUNT(DISTINCT)`, grouping sets) and a conservative one that forces the
//! distinct rewrite and rejects grouping sets.

use rolap_bitkey::BitKey;
use rolap_schema::{AggStar, AggStarColumn, Star, StarColumn};
use rolap_sql_ir::{DataType, Dialect};

/// `region_id` (bit 0), `product_id` (bit 1), `amount` (bit 2, the
/// measure column), no AggStars registered.
pub fn sales_star() -> Star {
    Star::new(
        "sales_fact",
        vec![
            StarColumn::new(0, "region_id", "sales_fact", DataType::Integer),
            StarColumn::new(1, "product_id", "sales_fact", DataType::Integer),
            StarColumn::new(2, "amount", "sales_fact", DataType::Decimal),
        ],
    )
}

/// [`sales_star`] plus one fully-collapsed AggStar pre-aggregating
/// `region_id` against `amount`, for matcher/rollup tests that need a
/// coarser candidate to pick.
pub fn sales_star_with_agg() -> Star {
    let mut star = sales_star();
    let agg = AggStar::new(
        "agg_region",
        1_000,
        BitKey::from_positions(3, [0]),
        BitKey::from_positions(3, [2]),
        BitKey::empty(3),
        BitKey::empty(3),
        true,
        false,
        vec![
            AggStarColumn {
                bit_position: 0,
                physical_name: "region_id".into(),
                physical_table: "agg_region".into(),
            },
            AggStarColumn {
                bit_position: 2,
                physical_name: "amount_sum".into(),
                physical_table: "agg_region".into(),
            },
        ],
    )
    .expect("level and measure bit keys are disjoint");
    star.add_agg_star(agg);
    star
}

/// A mainstream-engine dialect: native `COUNT(DISTINCT)`, grouping sets,
/// inner `DISTINCT` subqueries all supported.
pub fn permissive_dialect() -> Dialect {
    Dialect::postgres_like("test_permissive")
}

/// A conservative dialect forcing the distinct rewrite and rejecting
/// `GROUPING SETS`, for exercising the planner's fallback paths.
pub fn conservative_dialect() -> Dialect {
    Dialect::legacy_no_distinct("test_conservative")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sales_star_has_three_columns() {
        assert_eq!(sales_star().width(), 3);
    }

    #[test]
    fn sales_star_with_agg_has_one_candidate() {
        assert_eq!(sales_star_with_agg().agg_stars().len(), 1);
    }

    #[test]
    fn dialects_differ_on_count_distinct() {
        assert!(permissive_dialect().capabilities.allows_count_distinct);
        assert!(!conservative_dialect().capabilities.allows_count_distinct);
    }
}
