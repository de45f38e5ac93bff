// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Query specification
//!
//! The input the SQL builder consumes: which columns are constrained (and
//! which of those must be projected), the extra compound predicates from
//! the slicer, the requested measures, and an optional grouping-sets list.
//! This is assembled by `rolap-cache`'s batcher (one [`QuerySpec`] per
//! aggregation key) and handed to [`crate::sql_builder`].

use rolap_aggregator::Aggregator;
use rolap_predicate::{Column, ColumnPredicate, CompoundPredicate};
use rolap_sql_ir::ColumnRef;

/// A single constrained column and whether it must appear in the SELECT
/// list (as opposed to only constraining WHERE/GROUP BY).
#[derive(Debug, Clone)]
pub struct ColumnSpec {
    pub column: Column,
    pub predicate: ColumnPredicate,
    pub projected: bool,
}

/// A requested measure: which aggregator to apply to which expression.
#[derive(Debug, Clone)]
pub struct MeasureSpec {
    pub alias: String,
    pub expr: ColumnRef,
    pub aggregator: Aggregator,
}

/// One grouping set: the indices into `QuerySpec::columns` that remain
/// ungrouped at this level of detail. Entries must be topologically
/// ordered — the first (detailed) set's columns are a superset of every
/// subsequent set's, matching the grouping-set invariant the loader relies
/// on when demultiplexing result rows.
pub type GroupingSet = Vec<usize>;

#[derive(Debug, Clone)]
pub struct QuerySpec {
    pub fact_table: String,
    pub columns: Vec<ColumnSpec>,
    pub extra_predicates: Vec<CompoundPredicate>,
    pub measures: Vec<MeasureSpec>,
    pub grouping_sets: Option<Vec<GroupingSet>>,
}

impl QuerySpec {
    pub fn new(fact_table: impl Into<String>) -> Self {
        Self {
            fact_table: fact_table.into(),
            columns: Vec::new(),
            extra_predicates: Vec::new(),
            measures: Vec::new(),
            grouping_sets: None,
        }
    }

    pub fn with_columns(mut self, columns: Vec<ColumnSpec>) -> Self {
        self.columns = columns;
        self
    }

    pub fn with_extra_predicates(mut self, predicates: Vec<CompoundPredicate>) -> Self {
        self.extra_predicates = predicates;
        self
    }

    pub fn with_measures(mut self, measures: Vec<MeasureSpec>) -> Self {
        self.measures = measures;
        self
    }

    pub fn with_grouping_sets(mut self, grouping_sets: Vec<GroupingSet>) -> Self {
        self.grouping_sets = Some(grouping_sets);
        self
    }
}
