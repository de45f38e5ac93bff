// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Batch to header
//!
//! Computes the [`SegmentHeader`] each measure in a [`Batch`] would
//! populate. A segment is measure-specific, so a batch carrying several
//! measures reserves one header per measure — all sharing the same
//! columns, regions, and compound fingerprints, since those come from the
//! shared [`AggregationKey`](rolap_cell_request::AggregationKey).

use std::collections::BTreeMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use rolap_cell_request::Batch;
use rolap_segment::{ColumnRegion, HeaderValue, SegmentHeader};

/// One header per `batch.measures` entry, in the same order.
pub fn headers_for_batch(schema_id: &str, cube_id: &str, fact_table: &str, batch: &Batch) -> Vec<SegmentHeader> {
    let mut regions = BTreeMap::new();
    for predicate in &batch.column_predicates {
        let region = match predicate.enumerate_values() {
            Some(values) => {
                let mut header_values: Vec<HeaderValue> = values.iter().map(HeaderValue::from_predicate).collect();
                header_values.sort();
                header_values.dedup();
                ColumnRegion::Exact(header_values)
            }
            None => ColumnRegion::Wildcard,
        };
        regions.insert(predicate.column.bit_position, region);
    }

    let compound_fingerprints: Vec<u64> = batch.key.compound_predicates.iter().map(fingerprint_predicate).collect();

    batch
        .measures
        .iter()
        .map(|measure| {
            SegmentHeader::new(
                schema_id,
                cube_id,
                fact_table,
                measure.clone(),
                batch.key.constrained_columns.clone(),
                regions.clone(),
                BTreeMap::new(),
                compound_fingerprints.clone(),
            )
        })
        .collect()
}

/// A compound predicate's `Debug` rendering is a faithful structural
/// fingerprint: it includes every child predicate's column, op, and
/// values, and two predicates built the same way render identically.
fn fingerprint_predicate(predicate: &rolap_predicate::CompoundPredicate) -> u64 {
    let mut hasher = DefaultHasher::new();
    format!("{predicate:?}").hash(&mut hasher);
    hasher.finish()
}
