// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # In-process rollup materialisation
//!
//! Once [`crate::rollup::find_rollup_candidates`] names a covering set of
//! already-loaded segments, the actor never issues SQL for the target —
//! it reads the candidates' bodies and rolls them up in memory. Each
//! source segment's excess-column axes are collapsed by re-applying the
//! measure's own aggregate function (sum, count, min, max); the
//! candidates' regions are disjoint on the kept columns by construction
//! (`find_rollup_candidates` only grouped them because together they
//! cover the target), so combining sources is a union keyed by the kept
//! coordinates, falling back to the aggregate function only where two
//! sources happen to overlap.

use std::collections::HashMap;

use rolap_aggregator::{Aggregator, AggregatorKind};
use rolap_bitkey::BitKey;
use rolap_segment::{Cell, Segment, SegmentAxis, SegmentBody, SegmentHeader, HeaderValue};

pub fn materialize(
    target: &SegmentHeader,
    sources: &[(&SegmentHeader, &Segment)],
    excess_columns: &BitKey,
    aggregator: &Aggregator,
    sparse_count_threshold: u64,
    sparse_density_threshold: f64,
) -> Option<(Vec<SegmentAxis>, SegmentBody)> {
    let target_bits: Vec<usize> = target.bit_key.iter_set_bits().collect();
    let mut rows: HashMap<Vec<HeaderValue>, Cell> = HashMap::new();

    for &(source_header, source_segment) in sources {
        let body = source_segment.body()?;
        let source_bits: Vec<usize> = source_header.bit_key.iter_set_bits().collect();

        let keep_positions: Vec<Option<usize>> = source_bits
            .iter()
            .map(|bit| {
                if excess_columns.get(*bit) {
                    None
                } else {
                    target_bits.iter().position(|b| b == bit)
                }
            })
            .collect();

        for (coords, value) in populated_cells(body) {
            if matches!(value, Cell::Null) {
                continue;
            }
            let mut key: Vec<Option<HeaderValue>> = vec![None; target_bits.len()];
            for (axis_index, &coord) in coords.iter().enumerate() {
                let Some(target_index) = keep_positions.get(axis_index).copied().flatten() else {
                    continue;
                };
                let axis = source_segment.axes.get(axis_index)?;
                let axis_value = axis.keys().get(coord)?;
                key[target_index] = Some(HeaderValue::from_predicate(axis_value));
            }
            let Some(key) = key.into_iter().collect::<Option<Vec<_>>>() else {
                continue;
            };
            rows.entry(key).and_modify(|existing| *existing = combine(*existing, value, aggregator)).or_insert(value);
        }
    }

    if target_bits.is_empty() {
        let value = rows.into_values().next().unwrap_or(Cell::Null);
        return Some((Vec::new(), SegmentBody::Dense { axis_lengths: Vec::new(), cells: vec![value] }));
    }

    let mut per_axis_keys: Vec<Vec<HeaderValue>> = vec![Vec::new(); target_bits.len()];
    for key in rows.keys() {
        for (i, value) in key.iter().enumerate() {
            per_axis_keys[i].push(value.clone());
        }
    }
    let axes: Vec<SegmentAxis> = per_axis_keys.into_iter().map(|values| SegmentAxis::new(values.into_iter().map(|v| v.to_predicate()).collect())).collect();
    let axis_lengths: Vec<usize> = axes.iter().map(SegmentAxis::len).collect();

    let mut coord_cells: HashMap<Vec<usize>, Cell> = HashMap::with_capacity(rows.len());
    for (key, value) in rows {
        let mut coords = Vec::with_capacity(key.len());
        for (axis, header_value) in axes.iter().zip(&key) {
            coords.push(axis.offset_of(&header_value.to_predicate())?);
        }
        coord_cells.insert(coords, value);
    }

    let possible = SegmentBody::possible_cell_count(&axis_lengths);
    let actual = coord_cells.len() as u64;
    let body = if SegmentBody::should_use_sparse(possible, actual, sparse_count_threshold, sparse_density_threshold) {
        SegmentBody::Sparse { axis_lengths, cells: coord_cells }
    } else {
        let mut cells = vec![Cell::Null; possible.unwrap_or(0) as usize];
        for (coords, value) in coord_cells {
            let offset = SegmentBody::row_major_offset(&axis_lengths, &coords);
            cells[offset] = value;
        }
        SegmentBody::Dense { axis_lengths, cells }
    };

    Some((axes, body))
}

fn populated_cells(body: &SegmentBody) -> Vec<(Vec<usize>, Cell)> {
    match body {
        SegmentBody::Sparse { cells, .. } => cells.iter().map(|(coords, value)| (coords.clone(), *value)).collect(),
        SegmentBody::Dense { axis_lengths, cells } => cells
            .iter()
            .enumerate()
            .filter(|(_, value)| !matches!(value, Cell::Null))
            .map(|(flat, value)| (decode_row_major(axis_lengths, flat), *value))
            .collect(),
    }
}

fn decode_row_major(axis_lengths: &[usize], mut flat: usize) -> Vec<usize> {
    let mut coords = vec![0usize; axis_lengths.len()];
    for i in (0..axis_lengths.len()).rev() {
        let len = axis_lengths[i].max(1);
        coords[i] = flat % len;
        flat /= len;
    }
    coords
}

fn combine(a: Cell, b: Cell, aggregator: &Aggregator) -> Cell {
    match (a, b) {
        (Cell::Null, other) | (other, Cell::Null) => other,
        _ => match aggregator.kind {
            AggregatorKind::Sum | AggregatorKind::Count => match (a, b) {
                (Cell::Int(x), Cell::Int(y)) => Cell::Int(x + y),
                _ => Cell::Float(as_f64(a) + as_f64(b)),
            },
            AggregatorKind::Min => {
                if as_f64(a) <= as_f64(b) {
                    a
                } else {
                    b
                }
            }
            AggregatorKind::Max => {
                if as_f64(a) >= as_f64(b) {
                    a
                } else {
                    b
                }
            }
            // Gated upstream: `Aggregator::rollup` for AVG and COUNT
            // DISTINCT never reaches here for an overlapping region.
            AggregatorKind::Avg | AggregatorKind::CountDistinct => b,
        },
    }
}

fn as_f64(cell: Cell) -> f64 {
    match cell {
        Cell::Int(i) => i as f64,
        Cell::Float(f) => f,
        Cell::Null => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use rolap_aggregator::RollupStrategy;
    use rolap_segment::ColumnRegion;
    use rolap_sql_ir::DataType;

    use super::*;

    fn source_header(regions: BTreeMap<usize, ColumnRegion>) -> SegmentHeader {
        SegmentHeader::new("s", "c", "sales_fact", "amount", BitKey::from_positions(4, [0, 1]), regions, BTreeMap::new(), vec![])
    }

    fn target_header(regions: BTreeMap<usize, ColumnRegion>) -> SegmentHeader {
        SegmentHeader::new("s", "c", "sales_fact", "amount", BitKey::from_positions(4, [0]), regions, BTreeMap::new(), vec![])
    }

    #[test]
    fn collapses_one_excess_column_by_summing() {
        let regions = BTreeMap::from([(0, ColumnRegion::Wildcard), (1, ColumnRegion::Wildcard)]);
        let header = source_header(regions);
        let axes = vec![
            SegmentAxis::new(vec![rolap_predicate::PredicateValue::Integer(1)]),
            SegmentAxis::new(vec![rolap_predicate::PredicateValue::Integer(10), rolap_predicate::PredicateValue::Integer(20)]),
        ];
        let body = SegmentBody::Dense {
            axis_lengths: vec![1, 2],
            cells: vec![Cell::Int(5), Cell::Int(7)],
        };
        let segment = Segment::loaded(header.clone(), axes, body);

        let target_regions = BTreeMap::from([(0, ColumnRegion::Wildcard)]);
        let target = target_header(target_regions);
        let aggregator = Aggregator::new("sum_amount", AggregatorKind::Sum, DataType::Decimal, RollupStrategy::Direct);
        let excess = BitKey::from_positions(4, [1]);

        let (axes, body) = materialize(&target, &[(&header, &segment)], &excess, &aggregator, 1000, 0.5).expect("materializes");
        assert_eq!(axes.len(), 1);
        assert_eq!(body.get(&[0]), Some(Cell::Int(12)));
    }
}
