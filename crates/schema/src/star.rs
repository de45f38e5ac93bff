// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Star / AggStar physical model
//!
//! A [`Star`] is the physical join-graph descriptor the query planner
//! matches cell requests against: a fact table, its columns (each
//! identified by a bit position — see `rolap-bitkey`), and an ordered set
//! of candidate pre-aggregated tables (`AggStar`s). Columns are created
//! once when the star is introspected and are immutable thereafter;
//! predicates never hold a reference back into a `Star`, only the
//! `(bit_position)` they constrain, which is how the predicate algebra
//! avoids an ownership cycle between columns and the predicates over them
//! (see `rolap_predicate::column::Column`).

use std::collections::HashMap;

use rolap_bitkey::BitKey;
use rolap_sql_ir::{ColumnRef, DataType};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::{StarError, StarResult};

/// A single star column, identified by its bit position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StarColumn {
    pub bit_position: usize,
    pub name: String,
    pub table: String,
    pub datatype: DataType,
    /// Bit position of this column's parent in a parent-child hierarchy,
    /// used for "expanded level" walks during AggStar matching (see
    /// `rolap-query-plan`'s Case B matcher).
    pub parent: Option<usize>,
}

impl StarColumn {
    pub fn new(bit_position: usize, name: impl Into<String>, table: impl Into<String>, datatype: DataType) -> Self {
        Self {
            bit_position,
            name: name.into(),
            table: table.into(),
            datatype,
            parent: None,
        }
    }

    pub fn with_parent(mut self, parent_bit_position: usize) -> Self {
        self.parent = Some(parent_bit_position);
        self
    }

    /// The SQL expression that reads this column against the fact table.
    /// AggStar columns may read it from a different physical name/table —
    /// see [`AggStarColumn::sql_expr`].
    pub fn sql_expr(&self) -> ColumnRef {
        ColumnRef::new(self.name.clone()).with_table(self.table.clone())
    }
}

/// A star's fact table plus its ordered candidate AggStars.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Star {
    pub fact_table: String,
    columns: Vec<StarColumn>,
    /// Ascending by `estimated_row_count`; the matcher returns the first
    /// acceptable entry, so insertion keeps this sorted rather than
    /// sorting at match time.
    agg_stars: Vec<AggStar>,
}

impl Star {
    pub fn new(fact_table: impl Into<String>, columns: Vec<StarColumn>) -> Self {
        Self {
            fact_table: fact_table.into(),
            columns,
            agg_stars: Vec::new(),
        }
    }

    /// Number of columns in the star; the width every `BitKey` over this
    /// star must share.
    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn column(&self, bit_position: usize) -> StarResult<&StarColumn> {
        self.columns
            .get(bit_position)
            .ok_or(StarError::ColumnNotFound(bit_position, self.width()))
    }

    pub fn columns(&self) -> &[StarColumn] {
        &self.columns
    }

    /// Insert a candidate AggStar, keeping the list sorted ascending by
    /// estimated row count so the matcher can return the first acceptable
    /// entry it finds.
    pub fn add_agg_star(&mut self, agg_star: AggStar) {
        trace!(
            table = %agg_star.table,
            rows = agg_star.estimated_row_count,
            "registering AggStar candidate"
        );
        let pos = self
            .agg_stars
            .partition_point(|existing| existing.estimated_row_count <= agg_star.estimated_row_count);
        self.agg_stars.insert(pos, agg_star);
    }

    /// Candidate AggStars in ascending estimated-row-count order.
    pub fn agg_stars(&self) -> &[AggStar] {
        &self.agg_stars
    }
}

/// Where an AggStar physically stores the value for one star bit
/// position: its own column name, or — for a foreign key into a
/// dimension the AggStar doesn't materialise at full detail — a pass-
/// through reference resolved by joining that dimension table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggStarColumn {
    pub bit_position: usize,
    pub physical_name: String,
    pub physical_table: String,
}

impl AggStarColumn {
    pub fn sql_expr(&self) -> ColumnRef {
        ColumnRef::new(self.physical_name.clone()).with_table(self.physical_table.clone())
    }
}

/// A candidate pre-aggregated table for a star.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggStar {
    pub table: String,
    pub estimated_row_count: u64,
    level_bit_key: BitKey,
    measure_bit_key: BitKey,
    distinct_measure_bit_key: BitKey,
    foreign_key_bit_key: BitKey,
    pub fully_collapsed: bool,
    pub has_ignored_columns: bool,
    pub has_foreign_keys: bool,
    columns: HashMap<usize, AggStarColumn>,
}

impl AggStar {
    /// `level_bit_key` and `measure_bit_key` must be disjoint — an AggStar
    /// never both materialises a column at full detail and aggregates it
    /// as a measure.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        table: impl Into<String>,
        estimated_row_count: u64,
        level_bit_key: BitKey,
        measure_bit_key: BitKey,
        distinct_measure_bit_key: BitKey,
        foreign_key_bit_key: BitKey,
        fully_collapsed: bool,
        has_ignored_columns: bool,
        columns: Vec<AggStarColumn>,
    ) -> StarResult<Self> {
        if !level_bit_key.is_disjoint(&measure_bit_key) {
            return Err(StarError::InvariantViolation(format!(
                "AggStar '{}' has overlapping level and measure bit keys",
                table.into()
            )));
        }
        let has_foreign_keys = !foreign_key_bit_key.is_empty();
        Ok(Self {
            table: table.into(),
            estimated_row_count,
            level_bit_key,
            measure_bit_key,
            distinct_measure_bit_key,
            foreign_key_bit_key,
            fully_collapsed,
            has_ignored_columns,
            has_foreign_keys,
            columns: columns.into_iter().map(|c| (c.bit_position, c)).collect(),
        })
    }

    pub fn level_bit_key(&self) -> &BitKey {
        &self.level_bit_key
    }

    pub fn measure_bit_key(&self) -> &BitKey {
        &self.measure_bit_key
    }

    pub fn distinct_measure_bit_key(&self) -> &BitKey {
        &self.distinct_measure_bit_key
    }

    pub fn foreign_key_bit_key(&self) -> &BitKey {
        &self.foreign_key_bit_key
    }

    pub fn column_for_bit(&self, bit_position: usize) -> StarResult<&AggStarColumn> {
        self.columns.get(&bit_position).ok_or_else(|| StarError::AggStarColumnMissing {
            agg_star: self.table.clone(),
            bit_position,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_star() -> Star {
        Star::new(
            "sales_fact",
            vec![
                StarColumn::new(0, "region_id", "sales_fact", DataType::Integer),
                StarColumn::new(1, "product_id", "sales_fact", DataType::Integer),
                StarColumn::new(2, "amount", "sales_fact", DataType::Decimal),
            ],
        )
    }

    #[test]
    fn agg_stars_insert_sorted_by_row_count() {
        let mut star = sample_star();
        let a = AggStar::new(
            "agg_big",
            10_000,
            BitKey::from_positions(3, [0]),
            BitKey::from_positions(3, [2]),
            BitKey::empty(3),
            BitKey::empty(3),
            false,
            false,
            vec![
                AggStarColumn {
                    bit_position: 0,
                    physical_name: "region_id".into(),
                    physical_table: "agg_big".into(),
                },
                AggStarColumn {
                    bit_position: 2,
                    physical_name: "amount_sum".into(),
                    physical_table: "agg_big".into(),
                },
            ],
        )
        .unwrap();
        let b = AggStar::new(
            "agg_small",
            100,
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
                    physical_table: "agg_small".into(),
                },
                AggStarColumn {
                    bit_position: 2,
                    physical_name: "amount_sum".into(),
                    physical_table: "agg_small".into(),
                },
            ],
        )
        .unwrap();

        star.add_agg_star(a);
        star.add_agg_star(b);

        let rows: Vec<u64> = star.agg_stars().iter().map(|a| a.estimated_row_count).collect();
        assert_eq!(rows, vec![100, 10_000]);
    }

    #[test]
    fn overlapping_level_and_measure_bit_keys_rejected() {
        let overlapping = BitKey::from_positions(3, [0, 1]);
        let result = AggStar::new(
            "bad_agg",
            1,
            overlapping.clone(),
            overlapping,
            BitKey::empty(3),
            BitKey::empty(3),
            false,
            false,
            vec![],
        );
        assert!(matches!(result, Err(StarError::InvariantViolation(_))));
    }

    #[test]
    fn column_lookup_by_bit_position() {
        let star = sample_star();
        assert_eq!(star.column(1).unwrap().name, "product_id");
        assert!(star.column(9).is_err());
    }
}
