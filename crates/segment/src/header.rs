// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Segment headers
//!
//! The immutable fingerprint the cache manager keys on. Two segments with
//! the same header are interchangeable: a `SegmentHeader` must be
//! structurally `Hash`/`Eq`/`Ord` so it can live as a map key, sort
//! deterministically in logs, and round-trip through an external cache's
//! serialised form with a stable field order (`Serialize`/`Deserialize`
//! derive in declaration order).
//!
//! [`PredicateValue`] itself isn't `Hash`/`Eq` (its `Float` variant carries
//! an `f64`), so headers store [`HeaderValue`] instead — the same value
//! domain with floats represented by their bit pattern, which is exactly
//! as discriminating as `f64` equality needs to be for a cache key (two
//! results that produced bit-identical floats are the same region; NaN
//! payload differences are not a case the query engine itself produces).

use std::cmp::Ordering;
use std::collections::BTreeMap;

use rolap_bitkey::BitKey;
use rolap_predicate::PredicateValue;
use serde::{Deserialize, Serialize};

/// A hashable, totally-ordered stand-in for [`PredicateValue`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum HeaderValue {
    Null,
    Integer(i64),
    /// `f64::to_bits()` of a float value.
    FloatBits(u64),
    Text(String),
}

impl HeaderValue {
    pub fn from_predicate(value: &PredicateValue) -> Self {
        match value {
            PredicateValue::Null => HeaderValue::Null,
            PredicateValue::Integer(i) => HeaderValue::Integer(*i),
            PredicateValue::Float(f) => HeaderValue::FloatBits(f.to_bits()),
            PredicateValue::Text(s) => HeaderValue::Text(s.clone()),
        }
    }

    pub fn to_predicate(&self) -> PredicateValue {
        match self {
            HeaderValue::Null => PredicateValue::Null,
            HeaderValue::Integer(i) => PredicateValue::Integer(*i),
            HeaderValue::FloatBits(bits) => PredicateValue::Float(f64::from_bits(*bits)),
            HeaderValue::Text(s) => PredicateValue::Text(s.clone()),
        }
    }
}

/// The region a header claims for one constrained column: an exact,
/// sorted value set, or a wildcard meaning "every value observed for this
/// column in the backing aggregation" (used when the segment's axis was
/// populated from an unconstrained GROUP BY rather than a predicate).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ColumnRegion {
    Exact(Vec<HeaderValue>),
    Wildcard,
}

/// Immutable fingerprint identifying a segment: schema/cube/fact/measure
/// coordinates, the bit key of constrained columns, the region claimed per
/// column (with any excluded sub-region carved out by a prior `minus`),
/// and the fingerprints of the compound (slicer) predicates in force.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SegmentHeader {
    pub schema_id: String,
    pub cube_id: String,
    pub fact_table: String,
    pub measure_id: String,
    pub bit_key: BitKey,
    pub regions: BTreeMap<usize, ColumnRegion>,
    pub excluded: BTreeMap<usize, Vec<HeaderValue>>,
    pub compound_fingerprints: Vec<u64>,
}

impl SegmentHeader {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        schema_id: impl Into<String>,
        cube_id: impl Into<String>,
        fact_table: impl Into<String>,
        measure_id: impl Into<String>,
        bit_key: BitKey,
        regions: BTreeMap<usize, ColumnRegion>,
        excluded: BTreeMap<usize, Vec<HeaderValue>>,
        mut compound_fingerprints: Vec<u64>,
    ) -> Self {
        compound_fingerprints.sort_unstable();
        Self {
            schema_id: schema_id.into(),
            cube_id: cube_id.into(),
            fact_table: fact_table.into(),
            measure_id: measure_id.into(),
            bit_key,
            regions,
            excluded,
            compound_fingerprints,
        }
    }

    /// Whether `self`'s same-coordinate region set is a superset of
    /// `other`'s: every column `other` constrains is also constrained by
    /// `self` with a region at least as wide. Used by the rollup planner
    /// to decide whether an existing segment can stand in for a
    /// coarser-grained target (see `rolap-cache::rollup`).
    pub fn shares_coordinates_with(&self, other: &SegmentHeader) -> bool {
        self.schema_id == other.schema_id
            && self.cube_id == other.cube_id
            && self.fact_table == other.fact_table
            && self.measure_id == other.measure_id
    }

    fn sort_key(&self) -> (&str, &str, &str, &str, String, &BTreeMap<usize, ColumnRegion>, &BTreeMap<usize, Vec<HeaderValue>>, &Vec<u64>) {
        (
            &self.schema_id,
            &self.cube_id,
            &self.fact_table,
            &self.measure_id,
            self.bit_key.to_string(),
            &self.regions,
            &self.excluded,
            &self.compound_fingerprints,
        )
    }
}

impl PartialOrd for SegmentHeader {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SegmentHeader {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}
