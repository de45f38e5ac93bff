// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # AggStar matcher
//!
//! Given a request's level/measure bit keys, finds the smallest candidate
//! AggStar (pre-aggregated table) that can satisfy it, and whether serving
//! the request from that AggStar additionally requires a rollup (a further
//! GROUP BY collapsing some of the AggStar's own detail). AggStars are
//! tried in ascending `estimated_row_count` order — [`rolap_schema::Star::add_agg_star`]
//! keeps them sorted, so the first acceptable candidate is already the
//! smallest.

use rolap_bitkey::BitKey;
use rolap_schema::{AggStar, Star};
use tracing::trace;

/// A distinct-count measure present in the request, naming the bit key of
/// star levels its uniqueness computation is safe to roll up across.
#[derive(Debug, Clone)]
pub struct DistinctMeasureConstraint {
    pub measure_bit_position: usize,
    pub rollable_level_bit_key: BitKey,
}

/// The accepted AggStar plus whether serving from it requires an
/// additional rollup GROUP BY.
#[derive(Debug, Clone)]
pub struct MatchOutcome {
    pub agg_star_index: usize,
    pub rollup: bool,
    pub expanded_level_bit_key: BitKey,
}

/// Find the smallest AggStar that can serve `(level_bit_key, measure_bit_key)`.
///
/// Compound predicates and a disabled `useAggregates` flag both force the
/// fact table — the caller should not call this function in either case,
/// but passing `has_compound_predicates: true` or `use_aggregates: false`
/// short-circuits to `None` defensively.
pub fn match_agg_star(
    star: &Star,
    level_bit_key: &BitKey,
    measure_bit_key: &BitKey,
    distinct_measures: &[DistinctMeasureConstraint],
    use_aggregates: bool,
    has_compound_predicates: bool,
) -> Option<MatchOutcome> {
    if has_compound_predicates || !use_aggregates {
        return None;
    }

    let required = level_bit_key.or(measure_bit_key);

    for (index, agg) in star.agg_stars().iter().enumerate() {
        let combined = agg.level_bit_key().or(agg.measure_bit_key());
        if !required.is_subset_of(&combined) {
            continue;
        }

        let distinct_in_agg: Vec<&DistinctMeasureConstraint> = distinct_measures
            .iter()
            .filter(|d| agg.measure_bit_key().get(d.measure_bit_position))
            .collect();

        if distinct_in_agg.is_empty() {
            trace!(table = %agg.table, "AggStar accepted via case A (no distinct measures)");
            let rollup = !agg.fully_collapsed
                || agg.has_ignored_columns
                || level_bit_key.is_empty()
                || agg.level_bit_key() != level_bit_key;
            return Some(MatchOutcome {
                agg_star_index: index,
                rollup,
                expanded_level_bit_key: level_bit_key.clone(),
            });
        }

        if let Some(outcome) = try_case_b(star, agg, index, level_bit_key, measure_bit_key, &distinct_in_agg) {
            return Some(outcome);
        }
    }

    None
}

fn try_case_b(
    star: &Star,
    agg: &AggStar,
    index: usize,
    level_bit_key: &BitKey,
    measure_bit_key: &BitKey,
    distinct_in_agg: &[&DistinctMeasureConstraint],
) -> Option<MatchOutcome> {
    if agg.has_ignored_columns {
        return None;
    }

    let combined_rollable = distinct_in_agg
        .iter()
        .map(|d| d.rollable_level_bit_key.clone())
        .reduce(|a, b| a.and(&b))?;
    if combined_rollable.is_empty() {
        return None;
    }

    if agg.has_foreign_keys {
        let remaining_fk = agg.foreign_key_bit_key().minus(agg.distinct_measure_bit_key());
        if !remaining_fk.is_empty() {
            return None;
        }
    }

    let expanded_level_bit_key = expand_level_bit_key(star, level_bit_key);
    if expanded_level_bit_key.is_empty() {
        return None;
    }

    if !agg_star_selects(agg, &expanded_level_bit_key, &combined_rollable, measure_bit_key) {
        return None;
    }

    trace!(table = %agg.table, "AggStar accepted via case B (distinct measures present)");
    let rollup = agg.level_bit_key() != &expanded_level_bit_key;
    Some(MatchOutcome {
        agg_star_index: index,
        rollup,
        expanded_level_bit_key,
    })
}

/// Whether `agg` covers everything Case B ultimately needs: the expanded
/// levels (for the parent-column walk), the columns the distinct measures
/// can be safely rolled up across, and the requested measures.
fn agg_star_selects(agg: &AggStar, expanded_level_bit_key: &BitKey, combined_rollable: &BitKey, measure_bit_key: &BitKey) -> bool {
    let required = expanded_level_bit_key.or(combined_rollable).or(measure_bit_key);
    let combined = agg.level_bit_key().or(agg.measure_bit_key());
    required.is_subset_of(&combined)
}

/// Expand `level_bit_key` by walking every set bit's `parent` chain to the
/// root, setting each ancestor's bit along the way.
fn expand_level_bit_key(star: &Star, level_bit_key: &BitKey) -> BitKey {
    let mut expanded = level_bit_key.clone();
    for bit in level_bit_key.iter_set_bits() {
        let mut current = bit;
        while let Ok(column) = star.column(current) {
            match column.parent {
                Some(parent) => {
                    expanded.set(parent);
                    current = parent;
                }
                None => break,
            }
        }
    }
    expanded
}

#[cfg(test)]
mod tests {
    use super::*;
    use rolap_schema::{AggStarColumn, StarColumn};
    use rolap_sql_ir::DataType;

    fn star_with_agg(fully_collapsed: bool, level_bits: &[usize], measure_bits: &[usize]) -> Star {
        let mut star = Star::new(
            "sales_fact",
            vec![
                StarColumn::new(0, "region_id", "sales_fact", DataType::Integer),
                StarColumn::new(1, "product_id", "sales_fact", DataType::Integer),
                StarColumn::new(2, "amount", "sales_fact", DataType::Decimal),
                StarColumn::new(3, "customer_id", "sales_fact", DataType::Integer),
            ],
        );
        let agg = AggStar::new(
            "agg_region_product",
            1_000,
            BitKey::from_positions(4, level_bits.iter().copied()),
            BitKey::from_positions(4, measure_bits.iter().copied()),
            BitKey::empty(4),
            BitKey::empty(4),
            fully_collapsed,
            false,
            level_bits
                .iter()
                .chain(measure_bits)
                .map(|&bit| AggStarColumn {
                    bit_position: bit,
                    physical_name: format!("col_{bit}"),
                    physical_table: "agg_region_product".into(),
                })
                .collect(),
        )
        .unwrap();
        star.add_agg_star(agg);
        star
    }

    #[test]
    fn case_a_fully_collapsed_exact_match_skips_rollup() {
        let star = star_with_agg(true, &[0, 1], &[2]);
        let level = BitKey::from_positions(4, [0, 1]);
        let measure = BitKey::from_positions(4, [2]);
        let outcome = match_agg_star(&star, &level, &measure, &[], true, false).unwrap();
        assert!(!outcome.rollup);
    }

    #[test]
    fn case_a_coarser_level_requires_rollup() {
        let star = star_with_agg(true, &[0, 1], &[2]);
        let level = BitKey::from_positions(4, [0]);
        let measure = BitKey::from_positions(4, [2]);
        let outcome = match_agg_star(&star, &level, &measure, &[], true, false).unwrap();
        assert!(outcome.rollup);
    }

    #[test]
    fn compound_predicates_force_fact_table() {
        let star = star_with_agg(true, &[0, 1], &[2]);
        let level = BitKey::from_positions(4, [0, 1]);
        let measure = BitKey::from_positions(4, [2]);
        assert!(match_agg_star(&star, &level, &measure, &[], true, true).is_none());
    }

    #[test]
    fn unmatched_superset_falls_through_to_none() {
        let star = star_with_agg(true, &[0], &[2]);
        let level = BitKey::from_positions(4, [0, 3]);
        let measure = BitKey::from_positions(4, [2]);
        assert!(match_agg_star(&star, &level, &measure, &[], true, false).is_none());
    }
}
