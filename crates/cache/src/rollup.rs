// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Rollup planning
//!
//! On a miss, before asking `rolap-loader` to run SQL, the cache actor
//! asks [`find_rollup_candidates`] whether the requested region can
//! instead be derived from segments already `Loaded` for the same star —
//! a finer-grained segment summed up to the coarser one being requested.
//! Mirrors `rolap-query-plan::matcher`'s AggStar case split: an aggregator
//! whose `RollupStrategy` requires a co-aggregate (plain `AVG`) can never
//! be rolled up from an already-summarised segment, and one that's only
//! rollable `WithinRollableLevels` (`COUNT DISTINCT`) may only roll up
//! across columns that stay inside the measure's rollable level bit key.

use std::collections::HashMap;

use rolap_aggregator::{Aggregator, RollupStrategy};
use rolap_bitkey::BitKey;
use rolap_segment::{ColumnRegion, Segment, SegmentHeader};

/// A set of loaded segments whose rows, re-aggregated over
/// `excess_columns`, produce the target header's data.
#[derive(Debug, Clone)]
pub struct RollupCandidate {
    pub headers: Vec<SegmentHeader>,
    pub excess_columns: BitKey,
}

pub fn find_rollup_candidates<'a>(
    target: &SegmentHeader,
    loaded: impl IntoIterator<Item = (&'a SegmentHeader, &'a Segment)>,
    aggregator: &Aggregator,
    rollable_level_bit_key: Option<&BitKey>,
) -> Option<RollupCandidate> {
    if matches!(aggregator.rollup, RollupStrategy::RequiresCoAggregate { .. }) {
        return None;
    }

    // Step 1+2: same (schema, cube, fact, measure) coordinates, a strictly
    // wider bit key. An equal bit key would have been a hit, not a miss.
    let supersets: Vec<&SegmentHeader> = loaded
        .into_iter()
        .filter(|(_, segment)| segment.is_loaded())
        .map(|(header, _)| header)
        .filter(|header| header.shares_coordinates_with(target) && target.bit_key.is_subset_of(&header.bit_key) && header.bit_key != target.bit_key)
        .collect();

    if supersets.is_empty() {
        return None;
    }

    // Step 3: group candidates by their excess columns (the columns they
    // constrain beyond the target), since only headers sharing the same
    // excess shape can be rolled up together with one aggregation.
    let mut by_excess: HashMap<String, Vec<&SegmentHeader>> = HashMap::new();
    for header in supersets {
        let excess = header.bit_key.minus(&target.bit_key);
        by_excess.entry(excess.to_string()).or_default().push(header);
    }

    let mut best: Option<RollupCandidate> = None;
    for group in by_excess.into_values() {
        let excess_columns = group[0].bit_key.minus(&target.bit_key);

        if matches!(aggregator.rollup, RollupStrategy::WithinRollableLevels) {
            let Some(rollable) = rollable_level_bit_key else {
                continue;
            };
            if !excess_columns.is_subset_of(rollable) {
                continue;
            }
        }

        if !covers_target_region(target, &group) {
            continue;
        }

        let candidate = RollupCandidate {
            headers: group.into_iter().cloned().collect(),
            excess_columns,
        };

        let is_better = match &best {
            None => true,
            Some(current) => candidate.headers.len() < current.headers.len(),
        };
        if is_better {
            best = Some(candidate);
        }
    }

    best
}

/// Every column the target constrains must be covered by at least one
/// header in the group, either because that header's region for the
/// column matches the target's exactly or because the header claims a
/// wildcard (the whole domain, which always covers a narrower target
/// region).
fn covers_target_region(target: &SegmentHeader, group: &[&SegmentHeader]) -> bool {
    for (&bit, target_region) in &target.regions {
        let covered = group.iter().any(|header| match header.regions.get(&bit) {
            Some(ColumnRegion::Wildcard) => true,
            Some(region) => region == target_region,
            None => false,
        });
        if !covered {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use rolap_aggregator::AggregatorKind;
    use rolap_segment::HeaderValue;
    use rolap_sql_ir::DataType;

    use super::*;

    fn header(bit_key: BitKey, regions: BTreeMap<usize, ColumnRegion>) -> SegmentHeader {
        SegmentHeader::new("s", "c", "sales_fact", "amount", bit_key, regions, BTreeMap::new(), vec![])
    }

    fn exact(values: &[i64]) -> ColumnRegion {
        ColumnRegion::Exact(values.iter().map(|v| HeaderValue::Integer(*v)).collect())
    }

    #[test]
    fn rolls_up_from_a_finer_grained_loaded_segment() {
        let target = header(BitKey::from_positions(4, [0]), BTreeMap::from([(0, exact(&[1]))]));
        let mut wider_regions = BTreeMap::new();
        wider_regions.insert(0, exact(&[1]));
        wider_regions.insert(1, ColumnRegion::Wildcard);
        let wider = header(BitKey::from_positions(4, [0, 1]), wider_regions);
        let segment = Segment::loaded(wider.clone(), vec![], rolap_segment::SegmentBody::Dense { axis_lengths: vec![], cells: vec![] });

        let sum = Aggregator::new("sum_amount", AggregatorKind::Sum, DataType::Decimal, RollupStrategy::Direct);
        let candidate = find_rollup_candidates(&target, [(&wider, &segment)], &sum, None).expect("should find a rollup candidate");
        assert_eq!(candidate.headers, vec![wider]);
    }

    #[test]
    fn avg_requiring_co_aggregate_never_rolls_up() {
        let target = header(BitKey::from_positions(4, [0]), BTreeMap::from([(0, exact(&[1]))]));
        let avg = Aggregator::new(
            "avg_amount",
            AggregatorKind::Avg,
            DataType::Decimal,
            RollupStrategy::RequiresCoAggregate { with: AggregatorKind::Count },
        );
        assert!(find_rollup_candidates(&target, std::iter::empty(), &avg, None).is_none());
    }

    #[test]
    fn no_candidate_when_nothing_loaded_is_wider() {
        let target = header(BitKey::from_positions(4, [0]), BTreeMap::from([(0, exact(&[1]))]));
        let sum = Aggregator::new("sum_amount", AggregatorKind::Sum, DataType::Decimal, RollupStrategy::Direct);
        assert!(find_rollup_candidates(&target, std::iter::empty(), &sum, None).is_none());
    }
}
