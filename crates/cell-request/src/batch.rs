// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Cell-request batching
//!
//! Groups cell requests by [`AggregationKey`]. For each group, computes
//! the deduplicated union of requested measures and, per constrained
//! column, the union of per-request value predicates — exactly the shape
//! `rolap-query-plan::QuerySpec` needs so one SQL statement satisfies every
//! request in the batch.

use rolap_predicate::{Column, ColumnPredicate, CompoundPredicate, PredicateValue};
use rolap_schema::{Star, StarColumn};

use crate::aggregation_key::AggregationKey;
use crate::request::CellRequest;

/// One aggregation's worth of batched cell requests: the shared key, the
/// union of requested measures, one merged predicate per constrained
/// column, and the original requests (so callers can fan a segment's
/// loaded body back out to each request's own waiter).
#[derive(Debug, Clone)]
pub struct Batch {
    pub key: AggregationKey,
    pub measures: Vec<String>,
    pub column_predicates: Vec<ColumnPredicate>,
    pub requests: Vec<CellRequest>,
}

pub struct Batcher;

impl Batcher {
    /// Group `requests` against `star` by aggregation key.
    pub fn batch(star_id: &str, star: &Star, requests: &[CellRequest]) -> Vec<Batch> {
        let mut batches: Vec<Batch> = Vec::new();

        for request in requests {
            let constrained = request.constrained_columns();
            let compound_predicates: Vec<CompoundPredicate> = request.slicer.values().cloned().collect();
            let key = AggregationKey::new(star_id, constrained, compound_predicates);

            let index = batches.iter().position(|batch| batch.key == key);
            let batch = match index {
                Some(i) => &mut batches[i],
                None => {
                    batches.push(Batch {
                        key,
                        measures: Vec::new(),
                        column_predicates: Vec::new(),
                        requests: Vec::new(),
                    });
                    batches.last_mut().expect("just pushed")
                }
            };

            if !batch.measures.iter().any(|m| m == &request.measure) {
                batch.measures.push(request.measure.clone());
            }

            for &(bit_position, ref value) in &request.coordinates {
                let star_column = star
                    .column(bit_position)
                    .expect("cell request coordinate names an unknown star column");
                merge_column_value(batch, star_column, value.clone());
            }

            batch.requests.push(request.clone());
        }

        batches
    }
}

fn merge_column_value(batch: &mut Batch, star_column: &StarColumn, value: PredicateValue) {
    let existing = batch.column_predicates.iter().position(|p| p.column.bit_position == star_column.bit_position);
    let incoming = ColumnPredicate::value(predicate_column(star_column), value);
    match existing {
        Some(i) => {
            batch.column_predicates[i] = batch.column_predicates[i].or_column(&incoming);
        }
        None => batch.column_predicates.push(incoming),
    }
}

fn predicate_column(star_column: &StarColumn) -> Column {
    Column::new(star_column.bit_position, star_column.sql_expr(), star_column.datatype.clone())
}

#[cfg(test)]
mod tests {
    use rolap_sql_ir::DataType;

    use super::*;

    fn sample_star() -> Star {
        Star::new(
            "sales_fact",
            vec![
                StarColumn::new(0, "region_id", "sales_fact", DataType::Integer),
                StarColumn::new(1, "product_id", "sales_fact", DataType::Integer),
            ],
        )
    }

    #[test]
    fn requests_sharing_shape_merge_into_one_batch() {
        let star = sample_star();
        let requests = vec![
            CellRequest::new(2, "sales", vec![(0, PredicateValue::Integer(1))]),
            CellRequest::new(2, "sales", vec![(0, PredicateValue::Integer(2))]),
        ];
        let batches = Batcher::batch("sales_fact", &star, &requests);
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].requests.len(), 2);
        assert_eq!(
            batches[0].column_predicates[0].enumerate_values().unwrap().len(),
            2,
            "both region ids should be unioned into one predicate"
        );
    }

    #[test]
    fn requests_with_different_constrained_columns_batch_separately() {
        let star = sample_star();
        let requests = vec![
            CellRequest::new(2, "sales", vec![(0, PredicateValue::Integer(1))]),
            CellRequest::new(2, "sales", vec![(1, PredicateValue::Integer(1))]),
        ];
        let batches = Batcher::batch("sales_fact", &star, &requests);
        assert_eq!(batches.len(), 2);
    }

    #[test]
    fn measures_are_deduplicated_within_a_batch() {
        let star = sample_star();
        let requests = vec![
            CellRequest::new(2, "sales", vec![(0, PredicateValue::Integer(1))]),
            CellRequest::new(2, "sales", vec![(0, PredicateValue::Integer(1))]),
        ];
        let batches = Batcher::batch("sales_fact", &star, &requests);
        assert_eq!(batches[0].measures, vec!["sales".to_string()]);
    }
}
