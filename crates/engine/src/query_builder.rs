// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Batch-to-query translation
//!
//! The piece `rolap-cache`'s batcher and `rolap-query-plan`'s matcher never
//! talk to each other directly: a [`rolap_cell_request::Batch`] names
//! measures by string id and constrains columns by bit position, but
//! `match_agg_star` wants level/measure bit keys and `QuerySpec` wants
//! concrete SQL expressions. [`build_query_spec`] is the glue — look up
//! every measure's [`crate::registry::MeasureDef`], decide fact table vs.
//! AggStar the same way §4.3 of the design describes, and resolve each
//! constrained column (and each measure) to the physical expression that
//! side of the match actually reads from.

use std::collections::HashMap;

use rolap_aggregator::AggregatorKind;
use rolap_bitkey::BitKey;
use rolap_cell_request::Batch;
use rolap_predicate::{Column, ColumnPredicate};
use rolap_query_plan::{ColumnSpec, DistinctMeasureConstraint, MeasureSpec, QuerySpec, match_agg_star};
use rolap_schema::{AggStar, Star};
use rolap_sql_ir::ColumnRef;
use tracing::debug;

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::registry::MeasureDef;

/// Which physical source a [`QuerySpec`] was built against — the engine
/// needs this only for logging/diagnostics; the SQL itself is already
/// fully resolved by the time this is returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchedSource {
    FactTable,
    AggStar { index: usize, rollup: bool },
}

pub struct BuiltQuery {
    pub spec: QuerySpec,
    pub source: MatchedSource,
}

/// Translate one batch into a [`QuerySpec`], picking the smallest AggStar
/// that can serve it (spec.md §4.3) or falling back to the fact table.
///
/// Compound (slicer) predicates always force the fact table, as does a
/// list predicate naming more distinct values than
/// [`EngineConfig::max_constraints`] — both are "not a plain level/measure
/// shape" conditions the matcher itself isn't told to reason about.
pub fn build_query_spec(star: &Star, measures: &HashMap<String, MeasureDef>, batch: &Batch, config: &EngineConfig) -> Result<BuiltQuery, EngineError> {
    let measure_defs = resolve_measures(measures, &batch.measures)?;

    let exceeds_max_constraints = batch.column_predicates.iter().any(|p| p.enumerate_values().is_some_and(|values| values.len() > config.max_constraints));
    let has_compound_predicates = !batch.key.compound_predicates.is_empty();
    let use_aggregates = config.use_aggregates && !exceeds_max_constraints;

    let level_bit_key = batch.key.constrained_columns.clone();
    let measure_bit_key = BitKey::from_positions(star.width(), measure_defs.iter().map(|m| m.column_bit_position));
    let distinct_measures: Vec<DistinctMeasureConstraint> = measure_defs
        .iter()
        .filter(|m| m.aggregator.kind.is_distinct())
        .map(|m| DistinctMeasureConstraint {
            measure_bit_position: m.column_bit_position,
            rollable_level_bit_key: m.rollable_level_bit_key.clone().unwrap_or_else(|| BitKey::empty(star.width())),
        })
        .collect();

    let outcome = match_agg_star(star, &level_bit_key, &measure_bit_key, &distinct_measures, use_aggregates, has_compound_predicates);

    match outcome {
        Some(outcome) => {
            let agg = &star.agg_stars()[outcome.agg_star_index];
            debug!(table = %agg.table, rollup = outcome.rollup, "serving batch from AggStar");
            let projected_bit_key = if outcome.rollup { &level_bit_key } else { agg.level_bit_key() };
            let spec = build_spec_against(agg.table.clone(), star, batch, &measure_defs, projected_bit_key, |bit| agg_column_expr(agg, bit))?;
            Ok(BuiltQuery {
                spec,
                source: MatchedSource::AggStar {
                    index: outcome.agg_star_index,
                    rollup: outcome.rollup,
                },
            })
        }
        None => {
            let spec = build_spec_against(star.fact_table.clone(), star, batch, &measure_defs, &level_bit_key, |bit| fact_column_expr(star, bit))?;
            Ok(BuiltQuery { spec, source: MatchedSource::FactTable })
        }
    }
}

fn resolve_measures<'a>(measures: &'a HashMap<String, MeasureDef>, ids: &[String]) -> Result<Vec<&'a MeasureDef>, EngineError> {
    ids.iter()
        .map(|id| {
            measures.get(id).ok_or_else(|| EngineError::UnknownMeasure {
                star_id: String::new(),
                measure_id: id.clone(),
            })
        })
        .collect()
}

fn fact_column_expr(star: &Star, bit: usize) -> Result<ColumnRef, EngineError> {
    Ok(star.column(bit)?.sql_expr())
}

fn agg_column_expr(agg: &AggStar, bit: usize) -> Result<ColumnRef, EngineError> {
    Ok(agg.column_for_bit(bit)?.sql_expr())
}

/// Assemble the actual [`QuerySpec`]: one [`ColumnSpec`] per constrained
/// column (always projected — a batch's column predicates are exactly the
/// columns the resulting segments are axed on), the slicer's compound
/// predicates as extra WHERE-only constraints, and one [`MeasureSpec`] per
/// requested measure, with every expression resolved via `resolve_column`
/// against whichever physical source (fact table or AggStar) was matched.
fn build_spec_against(
    fact_table: String,
    star: &Star,
    batch: &Batch,
    measure_defs: &[&MeasureDef],
    projected_bit_key: &BitKey,
    resolve_column: impl Fn(usize) -> Result<ColumnRef, EngineError>,
) -> Result<QuerySpec, EngineError> {
    let mut columns = Vec::with_capacity(batch.column_predicates.len());
    for predicate in &batch.column_predicates {
        let bit = predicate.column.bit_position;
        let physical = resolve_column(bit)?;
        let star_column = star.column(bit)?;
        let column = Column::new(bit, physical, star_column.datatype.clone());
        columns.push(ColumnSpec {
            predicate: retarget_predicate(predicate, column.clone()),
            column,
            projected: projected_bit_key.get(bit),
        });
    }

    let mut measures = Vec::with_capacity(measure_defs.len());
    for measure in measure_defs {
        let expr = resolve_column(measure.column_bit_position)?;
        measures.push(MeasureSpec {
            alias: measure.id.clone(),
            expr,
            aggregator: measure.aggregator.clone(),
        });
    }

    Ok(QuerySpec::new(fact_table).with_columns(columns).with_extra_predicates(batch.key.compound_predicates.clone()).with_measures(measures))
}

/// Re-point a column predicate at the physical column actually being
/// queried (fact table vs. AggStar), keeping its value constraint intact.
fn retarget_predicate(predicate: &ColumnPredicate, column: Column) -> ColumnPredicate {
    predicate.clone_with_column(column)
}

/// Whether `kind` denotes a distinct-count aggregator, used by `rolap-cache`
/// callers building [`DistinctMeasureConstraint`]s outside this module too.
pub fn is_distinct(kind: AggregatorKind) -> bool {
    kind.is_distinct()
}

#[cfg(test)]
mod tests {
    use rolap_aggregator::{Aggregator, AggregatorKind, RollupStrategy};
    use rolap_cell_request::{Batcher, CellRequest};
    use rolap_predicate::PredicateValue;
    use rolap_sql_ir::DataType;
    use rolap_test_utils::{sales_star, sales_star_with_agg};

    use super::*;

    fn measures() -> HashMap<String, MeasureDef> {
        let mut map = HashMap::new();
        map.insert(
            "sum_amount".to_string(),
            MeasureDef::new("sum_amount", 2, Aggregator::new("SUM", AggregatorKind::Sum, DataType::Decimal, RollupStrategy::Direct)),
        );
        map
    }

    fn batch_for(star: &Star) -> Batch {
        let requests = vec![CellRequest::new(star.width(), "sum_amount", vec![(0, PredicateValue::Integer(1))])];
        Batcher::batch("sales_fact", star, &requests).into_iter().next().expect("one batch")
    }

    #[test]
    fn falls_back_to_fact_table_when_no_agg_star_registered() {
        let star = sales_star();
        let batch = batch_for(&star);
        let built = build_query_spec(&star, &measures(), &batch, &EngineConfig::default()).unwrap();
        assert_eq!(built.source, MatchedSource::FactTable);
        assert_eq!(built.spec.fact_table, "sales_fact");
    }

    #[test]
    fn matches_agg_star_when_available() {
        let star = sales_star_with_agg();
        let batch = batch_for(&star);
        let built = build_query_spec(&star, &measures(), &batch, &EngineConfig::default()).unwrap();
        assert!(matches!(built.source, MatchedSource::AggStar { .. }));
        assert_eq!(built.spec.fact_table, "agg_region");
    }

    #[test]
    fn disabling_aggregates_forces_fact_table() {
        let star = sales_star_with_agg();
        let batch = batch_for(&star);
        let config = EngineConfig { use_aggregates: false, ..EngineConfig::default() };
        let built = build_query_spec(&star, &measures(), &batch, &config).unwrap();
        assert_eq!(built.source, MatchedSource::FactTable);
    }

    #[test]
    fn a_list_predicate_beyond_max_constraints_forces_fact_table() {
        let star = sales_star_with_agg();
        let requests = vec![
            CellRequest::new(star.width(), "sum_amount", vec![(0, PredicateValue::Integer(1))]),
            CellRequest::new(star.width(), "sum_amount", vec![(0, PredicateValue::Integer(2))]),
        ];
        let batch = Batcher::batch("sales_fact", &star, &requests).into_iter().next().unwrap();
        let config = EngineConfig { max_constraints: 1, ..EngineConfig::default() };
        let built = build_query_spec(&star, &measures(), &batch, &config).unwrap();
        assert_eq!(built.source, MatchedSource::FactTable);
    }
}
