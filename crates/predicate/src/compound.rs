// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Compound predicates
//!
//! A [`CompoundPredicate`] combines constraints across columns: slicer
//! members expressed as tuples (`region = 'US' AND product = 'Widget'`) or
//! arbitrary OR-of-AND member sets. Every compound predicate carries the
//! union of its children's constrained columns as a [`BitKey`], which is
//! what [`crate::Column`]-keyed cell requests use to merge compatible
//! predicates and what the aggregation key uses for its deterministic sort
//! order.

use rolap_bitkey::BitKey;
use serde::{Deserialize, Serialize};

use crate::column::ColumnPredicate;
use crate::error::PredicateError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BoolOp {
    And,
    Or,
}

/// A child of a compound predicate: either a single-column constraint or
/// a nested compound (to express OR-of-AND member sets).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CompoundChild {
    Column(ColumnPredicate),
    Compound(Box<CompoundPredicate>),
}

impl CompoundChild {
    fn bit_key(&self, width: usize) -> BitKey {
        match self {
            CompoundChild::Column(c) => BitKey::from_positions(width, [c.column.bit_position]),
            CompoundChild::Compound(c) => c.constrained_columns.clone(),
        }
    }

    fn to_sql(&self, quoting: &rolap_sql_ir::dialect::QuoteStyle) -> Result<String, PredicateError> {
        match self {
            CompoundChild::Column(c) => c.to_sql(quoting),
            CompoundChild::Compound(c) => c.to_sql(quoting),
        }
    }
}

/// A boolean combination of column/compound children.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompoundPredicate {
    pub op: BoolOp,
    pub children: Vec<CompoundChild>,
    /// Union of every child's constrained column(s).
    pub constrained_columns: BitKey,
}

impl CompoundPredicate {
    pub fn new(op: BoolOp, width: usize, children: Vec<CompoundChild>) -> Self {
        let mut constrained_columns = BitKey::empty(width);
        for child in &children {
            constrained_columns = constrained_columns.or(&child.bit_key(width));
        }
        Self {
            op,
            children,
            constrained_columns,
        }
    }

    /// A tuple predicate: a single AND of column-value equalities,
    /// encoding one compound member (e.g. `region = 'US' AND year = 2024`).
    pub fn tuple(width: usize, columns: Vec<ColumnPredicate>) -> Self {
        Self::new(BoolOp::And, width, columns.into_iter().map(CompoundChild::Column).collect())
    }

    /// An OR of tuple predicates, encoding an arbitrary compound member set.
    pub fn or_of_tuples(width: usize, tuples: Vec<CompoundPredicate>) -> Self {
        Self::new(
            BoolOp::Or,
            width,
            tuples.into_iter().map(|t| CompoundChild::Compound(Box::new(t))).collect(),
        )
    }

    /// Render as a parenthesised boolean expression.
    pub fn to_sql(&self, quoting: &rolap_sql_ir::dialect::QuoteStyle) -> Result<String, PredicateError> {
        let joiner = match self.op {
            BoolOp::And => " AND ",
            BoolOp::Or => " OR ",
        };
        let parts: Vec<String> = self
            .children
            .iter()
            .map(|c| c.to_sql(quoting))
            .collect::<Result<_, _>>()?;
        if parts.len() == 1 {
            return Ok(parts.into_iter().next().unwrap());
        }
        Ok(format!("({})", parts.join(joiner)))
    }

    /// Deterministic sort key for a list of compound predicates (see
    /// the aggregation key's sorted-by-bit-key invariant): ascending set
    /// bit positions of `constrained_columns`.
    pub fn sort_key(&self) -> Vec<usize> {
        self.constrained_columns.iter_set_bits().collect()
    }

    /// Structural equality modulo child order, delegating single-column
    /// comparisons to [`ColumnPredicate::equal_constraint`].
    pub fn equal_constraint(&self, other: &CompoundPredicate) -> bool {
        if self.op != other.op || self.children.len() != other.children.len() {
            return false;
        }
        if self.constrained_columns != other.constrained_columns {
            return false;
        }
        let mut unmatched: Vec<&CompoundChild> = other.children.iter().collect();
        for child in &self.children {
            let pos = unmatched.iter().position(|candidate| child_equal(child, candidate));
            match pos {
                Some(i) => {
                    unmatched.remove(i);
                }
                None => return false,
            }
        }
        unmatched.is_empty()
    }
}

fn child_equal(a: &CompoundChild, b: &CompoundChild) -> bool {
    match (a, b) {
        (CompoundChild::Column(x), CompoundChild::Column(y)) => x.equal_constraint(y),
        (CompoundChild::Compound(x), CompoundChild::Compound(y)) => x.equal_constraint(y),
        _ => false,
    }
}
