// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Segment loading
//!
//! [`SegmentLoader::load`] is the single entry point: render SQL for a
//! [`QuerySpec`] against a [`Dialect`], execute it, and fold every returned
//! row into the reserved header(s) it belongs to. A request with
//! `grouping_sets` set produces rows at several levels of detail in one
//! result set, tagged by `GROUPING()` indicator columns the SQL builder
//! appends; [`ingest_row`] reads those indicators back to recover which
//! reservation a row belongs to before it ever touches an axis or a cell.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use rolap_bitkey::BitKey;
use rolap_predicate::PredicateValue;
use rolap_query_plan::{QuerySpec, build_distinct_rewrite, build_non_distinct, render_select};
use rolap_segment::{Cell, HeaderValue, SegmentAxis, SegmentBody, SegmentHeader};
use rolap_sql_ir::Dialect;
use tracing::{debug, warn};

use crate::error::LoaderError;
use crate::executor::{CellValue, ExecutionContext, RowCursor, SqlExecutor};

/// One header this load should populate, plus its SQL result.
#[derive(Debug, Clone)]
pub struct SegmentReservation {
    pub header: SegmentHeader,
}

impl SegmentReservation {
    pub fn new(header: SegmentHeader) -> Self {
        Self { header }
    }
}

/// A fully populated segment: header, per-column sorted axes, and a dense
/// or sparse body.
#[derive(Debug, Clone)]
pub struct LoadedSegment {
    pub header: SegmentHeader,
    pub axes: Vec<SegmentAxis>,
    pub body: SegmentBody,
}

/// Turns a matched query spec into populated segments. Holds only the
/// sparse/dense policy thresholds and the result-row ceiling — everything
/// else needed for one load is passed into [`SegmentLoader::load`], so a
/// single loader instance is shared across every star and measure.
pub struct SegmentLoader {
    sparse_segment_count_threshold: u64,
    sparse_segment_density_threshold: f64,
    result_limit: Option<u64>,
}

impl SegmentLoader {
    pub fn new(sparse_segment_count_threshold: u64, sparse_segment_density_threshold: f64) -> Self {
        Self {
            sparse_segment_count_threshold,
            sparse_segment_density_threshold,
            result_limit: None,
        }
    }

    /// Abort the whole batch with [`LoaderError::ResourceLimitExceeded`]
    /// once the number of rows scanned for one load exceeds `limit`
    /// (spec.md §6 `resultLimit`, §7 `ResourceLimitExceeded`).
    pub fn with_result_limit(mut self, limit: u64) -> Self {
        self.result_limit = Some(limit);
        self
    }

    pub async fn load(&self, spec: &QuerySpec, dialect: &Dialect, executor: &dyn SqlExecutor, reserved: &[SegmentReservation], exec_ctx: &ExecutionContext) -> Result<Vec<LoadedSegment>, LoaderError> {
        exec_ctx.checked_cancel_or_timeout()?;

        let has_distinct = spec.measures.iter().any(|m| m.aggregator.kind.is_distinct());
        let use_rewrite = has_distinct && !dialect.capabilities.allows_count_distinct;

        let (sql, layout) = if use_rewrite {
            let sql = build_distinct_rewrite(spec, dialect)?;
            (sql, ColumnLayout::for_distinct_rewrite(spec))
        } else {
            let select = build_non_distinct(spec, dialect)?;
            (render_select(&select, dialect), ColumnLayout::for_non_distinct(spec, dialect))
        };

        debug!(sql = %sql, reserved = reserved.len(), "issuing segment load SQL");

        let measure_index_by_id: HashMap<&str, usize> = spec.measures.iter().enumerate().map(|(i, m)| (m.alias.as_str(), i)).collect();

        let mut cursor = executor.execute(&sql, exec_ctx).await?;
        let mut accumulators: Vec<Accumulator> = reserved.iter().map(|_| Accumulator::default()).collect();

        let mut row_count: u64 = 0;
        while cursor.next()? {
            exec_ctx.checked_cancel_or_timeout()?;
            row_count += 1;
            if let Some(limit) = self.result_limit
                && row_count > limit
            {
                return Err(LoaderError::ResourceLimitExceeded(format!("row count exceeded the configured limit of {limit}")));
            }
            ingest_row(spec, &layout, cursor.as_ref(), reserved, &measure_index_by_id, &mut accumulators)?;
        }

        let mut results = Vec::with_capacity(reserved.len());
        for (reservation, accumulator) in reserved.iter().zip(accumulators) {
            if accumulator.rows.is_empty() {
                warn!(measure = %reservation.header.measure_id, "grouping-set cohort produced no rows");
                return Err(LoaderError::EmptyResult);
            }
            results.push(finish(&reservation.header, accumulator, self.sparse_segment_count_threshold, self.sparse_segment_density_threshold)?);
        }
        Ok(results)
    }
}

/// Maps a query spec's fixed projection order (projected columns, then
/// measures, then — when grouping sets are rendered — `GROUPING()`
/// indicator columns) onto result-row column indices, mirroring exactly how
/// `rolap-query-plan::sql_builder` assembles the SELECT list.
struct ColumnLayout {
    /// `spec.columns` indices that are projected, in ascending order —
    /// the order their `c{i}` aliases appear in the result set.
    projected_columns: Vec<usize>,
    /// `spec.columns` indices with a `GROUPING()` indicator column,
    /// ascending, empty unless grouping sets were rendered.
    grouping_indicator_columns: Vec<usize>,
}

impl ColumnLayout {
    fn for_non_distinct(spec: &QuerySpec, dialect: &Dialect) -> Self {
        let projected_columns = projected_indices(spec);
        let grouping_indicator_columns = match &spec.grouping_sets {
            Some(sets) if dialect.capabilities.supports_grouping_sets => spec
                .columns
                .iter()
                .enumerate()
                .filter(|(i, _)| !sets.iter().all(|set| set.contains(i)))
                .map(|(i, _)| i)
                .collect(),
            _ => Vec::new(),
        };
        Self {
            projected_columns,
            grouping_indicator_columns,
        }
    }

    /// The distinct rewrite's outer query never emits `GROUPING()`
    /// indicators — it has exactly one level of detail.
    fn for_distinct_rewrite(spec: &QuerySpec) -> Self {
        Self {
            projected_columns: projected_indices(spec),
            grouping_indicator_columns: Vec::new(),
        }
    }

    fn measure_column(&self, measure_index: usize) -> usize {
        self.projected_columns.len() + measure_index
    }

    fn grouping_column(&self, measure_count: usize, indicator_slot: usize) -> usize {
        self.projected_columns.len() + measure_count + indicator_slot
    }
}

fn projected_indices(spec: &QuerySpec) -> Vec<usize> {
    spec.columns.iter().enumerate().filter(|(_, c)| c.projected).map(|(i, _)| i).collect()
}

#[derive(Default)]
struct Accumulator {
    rows: HashMap<Vec<HeaderValue>, Cell>,
}

/// Read one result row, work out which grouping level it belongs to (the
/// set of `spec.columns` indices still present rather than rolled up), and
/// fold it into every reservation whose header matches that level.
fn ingest_row(spec: &QuerySpec, layout: &ColumnLayout, row: &dyn RowCursor, reservations: &[SegmentReservation], measure_index_by_id: &HashMap<&str, usize>, accumulators: &mut [Accumulator]) -> Result<(), LoaderError> {
    let mut row_values: BTreeMap<usize, PredicateValue> = BTreeMap::new();
    let mut active_columns: BTreeSet<usize> = BTreeSet::new();

    for (slot, &col_idx) in layout.projected_columns.iter().enumerate() {
        let value = read_cell(row, slot)?.to_predicate();
        row_values.insert(spec.columns[col_idx].column.bit_position, value);
        active_columns.insert(col_idx);
    }

    let mut measure_values = Vec::with_capacity(spec.measures.len());
    for i in 0..spec.measures.len() {
        let column_index = layout.measure_column(i);
        measure_values.push(read_cell(row, column_index)?.to_cell(column_index)?);
    }

    for (slot, &col_idx) in layout.grouping_indicator_columns.iter().enumerate() {
        let column_index = layout.grouping_column(spec.measures.len(), slot);
        let rolled_up = matches!(read_cell(row, column_index)?, CellValue::Integer(1));
        if rolled_up {
            active_columns.remove(&col_idx);
            row_values.remove(&spec.columns[col_idx].column.bit_position);
        }
    }

    for (reservation, accumulator) in reservations.iter().zip(accumulators.iter_mut()) {
        let header = &reservation.header;
        if !header_matches_active(header, spec, &active_columns) {
            continue;
        }
        let Some(&measure_idx) = measure_index_by_id.get(header.measure_id.as_str()) else {
            continue;
        };

        let mut coords = Vec::with_capacity(header.bit_key.width());
        for bit in header.bit_key.iter_set_bits() {
            let value = row_values.get(&bit).expect("active bit always has a row value");
            coords.push(HeaderValue::from_predicate(value));
        }
        accumulator.rows.insert(coords, measure_values[measure_idx]);
    }

    Ok(())
}

/// Whether a row's active (non-rolled-up) column set is exactly the set
/// this header reserved — built at the header's own width so a narrower
/// star never has to agree on a shared width with the header up front.
fn header_matches_active(header: &SegmentHeader, spec: &QuerySpec, active_columns: &BTreeSet<usize>) -> bool {
    let mut expected = BitKey::empty(header.bit_key.width());
    for &col_idx in active_columns {
        let bit = spec.columns[col_idx].column.bit_position;
        if bit >= expected.width() {
            return false;
        }
        expected.set(bit);
    }
    expected.is_subset_of(&header.bit_key) && header.bit_key.is_subset_of(&expected)
}

fn read_cell(row: &dyn RowCursor, column_index: usize) -> Result<CellValue, LoaderError> {
    if row.was_null(column_index) {
        return Ok(CellValue::Null);
    }
    row.get_value(column_index)
}

/// Build one segment's axes and body from its accumulated coordinate→value
/// rows: distinct sorted keys per axis, then the dense/sparse decision
/// `rolap_segment::SegmentBody` already knows how to make.
fn finish(header: &SegmentHeader, accumulator: Accumulator, count_threshold: u64, density_threshold: f64) -> Result<LoadedSegment, LoaderError> {
    let target_bits: Vec<usize> = header.bit_key.iter_set_bits().collect();
    let mut per_axis_keys: Vec<Vec<HeaderValue>> = vec![Vec::new(); target_bits.len()];
    for key in accumulator.rows.keys() {
        for (i, value) in key.iter().enumerate() {
            per_axis_keys[i].push(value.clone());
        }
    }
    let axes: Vec<SegmentAxis> = per_axis_keys.into_iter().map(|values| SegmentAxis::new(values.into_iter().map(|v| v.to_predicate()).collect())).collect();
    let axis_lengths: Vec<usize> = axes.iter().map(SegmentAxis::len).collect();

    let mut coord_cells: HashMap<Vec<usize>, Cell> = HashMap::with_capacity(accumulator.rows.len());
    for (key, value) in accumulator.rows {
        let mut coords = Vec::with_capacity(key.len());
        for (axis, header_value) in axes.iter().zip(&key) {
            let offset = axis.offset_of(&header_value.to_predicate()).expect("value was inserted into this axis during the same pass");
            coords.push(offset);
        }
        coord_cells.insert(coords, value);
    }

    let possible = SegmentBody::possible_cell_count(&axis_lengths);
    let actual = coord_cells.len() as u64;
    let body = if SegmentBody::should_use_sparse(possible, actual, count_threshold, density_threshold) {
        SegmentBody::Sparse { axis_lengths, cells: coord_cells }
    } else {
        let cell_count = possible.ok_or(LoaderError::DecimalOverflow)?;
        let mut cells = vec![Cell::Null; cell_count as usize];
        for (coords, value) in coord_cells {
            let offset = SegmentBody::row_major_offset(&axis_lengths, &coords);
            cells[offset] = value;
        }
        SegmentBody::Dense { axis_lengths, cells }
    };

    Ok(LoadedSegment { header: header.clone(), axes, body })
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use rolap_aggregator::{Aggregator, AggregatorKind, RollupStrategy};
    use rolap_predicate::{Column, ColumnPredicate, PredicateValue};
    use rolap_query_plan::{ColumnSpec, MeasureSpec};
    use rolap_sql_ir::{ColumnRef, DataType};

    use super::*;

    struct FixedRows {
        rows: Vec<Vec<CellValue>>,
    }

    struct FixedCursor {
        rows: Vec<Vec<CellValue>>,
        next_index: usize,
        current: Option<usize>,
    }

    #[async_trait]
    impl SqlExecutor for FixedRows {
        async fn execute(&self, _sql: &str, _context: &ExecutionContext) -> Result<Box<dyn RowCursor>, LoaderError> {
            Ok(Box::new(FixedCursor {
                rows: self.rows.clone(),
                next_index: 0,
                current: None,
            }))
        }
    }

    impl RowCursor for FixedCursor {
        fn next(&mut self) -> Result<bool, LoaderError> {
            if self.next_index >= self.rows.len() {
                return Ok(false);
            }
            self.current = Some(self.next_index);
            self.next_index += 1;
            Ok(true)
        }

        fn get_value(&self, column_index: usize) -> Result<CellValue, LoaderError> {
            let row = self.current.expect("get_value called before next()");
            Ok(self.rows[row][column_index].clone())
        }

        fn was_null(&self, column_index: usize) -> bool {
            let row = self.current.expect("was_null called before next()");
            matches!(self.rows[row][column_index], CellValue::Null)
        }

        fn column_count(&self) -> usize {
            self.rows.first().map(Vec::len).unwrap_or(0)
        }
    }

    fn region_column() -> Column {
        Column::new(0, ColumnRef::new("region_id").with_table("sales_fact"), DataType::Integer)
    }

    fn sum_spec() -> QuerySpec {
        let region = region_column();
        let amount = ColumnRef::new("amount").with_table("sales_fact");
        QuerySpec::new("sales_fact")
            .with_columns(vec![ColumnSpec {
                predicate: ColumnPredicate::literal_true(region.clone()),
                column: region,
                projected: true,
            }])
            .with_measures(vec![MeasureSpec {
                alias: "sum_amount".into(),
                expr: amount,
                aggregator: Aggregator::new("SUM", AggregatorKind::Sum, DataType::Decimal, RollupStrategy::Direct),
            }])
    }

    fn header_for(bit_positions: &[usize]) -> SegmentHeader {
        SegmentHeader::new("s", "c", "sales_fact", "sum_amount", BitKey::from_positions(4, bit_positions.iter().copied()), BTreeMap::new(), BTreeMap::new(), vec![])
    }

    #[tokio::test]
    async fn loads_one_dense_segment_from_simple_rows() {
        let spec = sum_spec();
        let dialect = Dialect::postgres_like("test");
        let executor = FixedRows {
            rows: vec![vec![CellValue::Integer(1), CellValue::Integer(10)], vec![CellValue::Integer(2), CellValue::Integer(20)]],
        };
        let reserved = vec![SegmentReservation::new(header_for(&[0]))];
        let loader = SegmentLoader::new(1000, 0.5);
        let ctx = ExecutionContext::new(None);

        let loaded = loader.load(&spec, &dialect, &executor, &reserved, &ctx).await.expect("loads");
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].axes[0].len(), 2);
        assert!(!loaded[0].body.is_sparse());
        assert_eq!(loaded[0].body.get(&[0]), Some(Cell::Int(10)));
        assert_eq!(loaded[0].body.get(&[1]), Some(Cell::Int(20)));
    }

    #[tokio::test]
    async fn empty_result_set_is_reported_as_benign() {
        let spec = sum_spec();
        let dialect = Dialect::postgres_like("test");
        let executor = FixedRows { rows: vec![] };
        let reserved = vec![SegmentReservation::new(header_for(&[0]))];
        let loader = SegmentLoader::new(1000, 0.5);
        let ctx = ExecutionContext::new(None);

        let err = loader.load(&spec, &dialect, &executor, &reserved, &ctx).await.unwrap_err();
        assert!(matches!(err, LoaderError::EmptyResult));
    }

    #[tokio::test]
    async fn row_count_over_limit_aborts_the_batch() {
        let spec = sum_spec();
        let dialect = Dialect::postgres_like("test");
        let executor = FixedRows {
            rows: vec![vec![CellValue::Integer(1), CellValue::Integer(10)], vec![CellValue::Integer(2), CellValue::Integer(20)]],
        };
        let reserved = vec![SegmentReservation::new(header_for(&[0]))];
        let loader = SegmentLoader::new(1000, 0.5).with_result_limit(1);
        let ctx = ExecutionContext::new(None);

        let err = loader.load(&spec, &dialect, &executor, &reserved, &ctx).await.unwrap_err();
        assert!(matches!(err, LoaderError::ResourceLimitExceeded(_)));
    }

    fn product_column() -> Column {
        Column::new(1, ColumnRef::new("product_id").with_table("sales_fact"), DataType::Integer)
    }

    /// Two columns (region, product), grouping sets `[[region, product],
    /// [region]]`: one detailed cohort and one cohort rolled up to region
    /// only. `product` is the only column not present in every set, so it
    /// is the only one the builder would attach a `GROUPING()` indicator
    /// to (spec §4.6 steps 3 & 6).
    fn grouping_sets_spec() -> QuerySpec {
        let region = region_column();
        let product = product_column();
        let amount = ColumnRef::new("amount").with_table("sales_fact");
        QuerySpec::new("sales_fact")
            .with_columns(vec![
                ColumnSpec {
                    predicate: ColumnPredicate::literal_true(region.clone()),
                    column: region,
                    projected: true,
                },
                ColumnSpec {
                    predicate: ColumnPredicate::literal_true(product.clone()),
                    column: product,
                    projected: true,
                },
            ])
            .with_measures(vec![MeasureSpec {
                alias: "sum_amount".into(),
                expr: amount,
                aggregator: Aggregator::new("SUM", AggregatorKind::Sum, DataType::Decimal, RollupStrategy::Direct),
            }])
            .with_grouping_sets(vec![vec![0, 1], vec![0]])
    }

    #[tokio::test]
    async fn grouping_sets_demultiplex_rows_into_their_own_cohort_and_skip_rolled_up_cells() {
        let spec = grouping_sets_spec();
        let dialect = Dialect::postgres_like("test");
        // Columns: c0=region, c1=product, m0=measure, g1=GROUPING(product).
        let executor = FixedRows {
            rows: vec![
                // Detailed cohort: region x product.
                vec![CellValue::Integer(1), CellValue::Integer(10), CellValue::Integer(5), CellValue::Integer(0)],
                vec![CellValue::Integer(1), CellValue::Integer(20), CellValue::Integer(7), CellValue::Integer(0)],
                vec![CellValue::Integer(2), CellValue::Integer(10), CellValue::Integer(3), CellValue::Integer(0)],
                // Rolled-up cohort: region only, product collapsed away.
                vec![CellValue::Integer(1), CellValue::Null, CellValue::Integer(12), CellValue::Integer(1)],
                vec![CellValue::Integer(2), CellValue::Null, CellValue::Integer(3), CellValue::Integer(1)],
            ],
        };
        let detailed_header = header_for(&[0, 1]);
        let coarse_header = header_for(&[0]);
        let reserved = vec![SegmentReservation::new(detailed_header), SegmentReservation::new(coarse_header)];
        let loader = SegmentLoader::new(1000, 0.5);
        let ctx = ExecutionContext::new(None);

        let loaded = loader.load(&spec, &dialect, &executor, &reserved, &ctx).await.expect("loads");
        assert_eq!(loaded.len(), 2);

        let detailed = &loaded[0];
        assert_eq!(detailed.axes[0].len(), 2, "detailed cohort sees both region values");
        assert_eq!(detailed.axes[1].len(), 2, "detailed cohort sees both product values");
        let region1 = detailed.axes[0].offset_of(&PredicateValue::Integer(1)).expect("region 1 present");
        let region2 = detailed.axes[0].offset_of(&PredicateValue::Integer(2)).expect("region 2 present");
        let product10 = detailed.axes[1].offset_of(&PredicateValue::Integer(10)).expect("product 10 present");
        let product20 = detailed.axes[1].offset_of(&PredicateValue::Integer(20)).expect("product 20 present");
        assert_eq!(detailed.body.get(&[region1, product10]), Some(Cell::Int(5)));
        assert_eq!(detailed.body.get(&[region1, product20]), Some(Cell::Int(7)));
        assert_eq!(detailed.body.get(&[region2, product10]), Some(Cell::Int(3)));

        let coarse = &loaded[1];
        assert_eq!(coarse.axes.len(), 1, "the rolled-up cohort only keeps the region axis");
        assert_eq!(coarse.axes[0].len(), 2);
        let coarse_region1 = coarse.axes[0].offset_of(&PredicateValue::Integer(1)).expect("region 1 present");
        let coarse_region2 = coarse.axes[0].offset_of(&PredicateValue::Integer(2)).expect("region 2 present");
        assert_eq!(coarse.body.get(&[coarse_region1]), Some(Cell::Int(12)), "rolled-up region 1 total, not a per-product cell");
        assert_eq!(coarse.body.get(&[coarse_region2]), Some(Cell::Int(3)));
    }

    fn count_distinct_spec() -> QuerySpec {
        let region = region_column();
        let customer = ColumnRef::new("customer_id").with_table("sales_fact");
        QuerySpec::new("sales_fact")
            .with_columns(vec![ColumnSpec {
                predicate: ColumnPredicate::literal_true(region.clone()),
                column: region,
                projected: true,
            }])
            .with_measures(vec![MeasureSpec {
                alias: "distinct_customers".into(),
                expr: customer,
                aggregator: Aggregator::new("COUNT_DISTINCT", AggregatorKind::CountDistinct, DataType::BigInt, RollupStrategy::WithinRollableLevels),
            }])
    }

    fn count_distinct_header() -> SegmentHeader {
        SegmentHeader::new("s", "c", "sales_fact", "distinct_customers", BitKey::from_positions(4, [0]), BTreeMap::new(), BTreeMap::new(), vec![])
    }

    /// Spec §8 seed scenario 2: a dialect lacking native `COUNT(DISTINCT
    /// ...)` routes through `build_distinct_rewrite`, whose outer query
    /// re-counts the inner `SELECT DISTINCT` rows. The fake executor here
    /// stands in for that outer query's result set directly — rows
    /// `(a,1),(a,1),(a,2),(b,2)` de-duplicated and re-counted by region
    /// yield exactly `a=2, b=1`.
    #[tokio::test]
    async fn distinct_rewrite_counts_deduplicated_customers_per_region() {
        let spec = count_distinct_spec();
        let dialect = Dialect::legacy_no_distinct("legacy");
        let executor = FixedRows {
            rows: vec![vec![CellValue::Integer(0), CellValue::Integer(2)], vec![CellValue::Integer(1), CellValue::Integer(1)]],
        };
        let reserved = vec![SegmentReservation::new(count_distinct_header())];
        let loader = SegmentLoader::new(1000, 0.5);
        let ctx = ExecutionContext::new(None);

        let loaded = loader.load(&spec, &dialect, &executor, &reserved, &ctx).await.expect("loads");
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].body.get(&[0]), Some(Cell::Int(2)), "region a has two distinct customers");
        assert_eq!(loaded[0].body.get(&[1]), Some(Cell::Int(1)), "region b has one distinct customer");
    }

    #[tokio::test]
    async fn cancelled_execution_never_issues_sql() {
        let spec = sum_spec();
        let dialect = Dialect::postgres_like("test");
        let executor = FixedRows { rows: vec![] };
        let reserved = vec![SegmentReservation::new(header_for(&[0]))];
        let loader = SegmentLoader::new(1000, 0.5);
        let ctx = ExecutionContext::new(None);
        ctx.cancel();

        let err = loader.load(&spec, &dialect, &executor, &reserved, &ctx).await.unwrap_err();
        assert!(matches!(err, LoaderError::Cancelled));
    }
}
