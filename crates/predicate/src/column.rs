// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Column predicates
//!
//! A [`ColumnPredicate`] constrains a single star column. It is the unit
//! the cache manager's segment matching and the SQL builder both operate
//! on: segment axes are checked against a region via [`ColumnPredicate::intersect`],
//! and WHERE fragments are produced via [`ColumnPredicate::to_sql`].

use std::collections::HashSet;

use rolap_sql_ir::dialect::QuoteStyle;
use rolap_sql_ir::{ColumnRef, DataType};
use serde::{Deserialize, Serialize};

use crate::error::PredicateError;
use crate::value::PredicateValue;

/// Identifies the star column a [`ColumnPredicate`] constrains. Predicates
/// never hold a shared owning reference back to the star — only the
/// `(bit_position)` pair plus enough to render SQL — so a star's column
/// arena and its predicates can't form a reference cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub bit_position: usize,
    pub sql: ColumnRef,
    pub datatype: DataType,
}

impl Column {
    pub fn new(bit_position: usize, sql: ColumnRef, datatype: DataType) -> Self {
        Self {
            bit_position,
            sql,
            datatype,
        }
    }
}

/// An inclusive/exclusive bound used by [`ColumnPredicateKind::Range`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bound {
    pub value: PredicateValue,
    /// `true` renders `<` / `>`; `false` renders `<=` / `>=`.
    pub strict: bool,
}

/// The SQL projection of a hierarchy member's key, for columns whose key
/// is a computed expression rather than a plain literal (e.g. a
/// parent-child closure key). `value` is what `evaluate`/`enumerate_values`
/// compare against; `sql` is spliced into the WHERE clause verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberKeyProjection {
    pub value: PredicateValue,
    pub sql: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ColumnPredicateKind {
    LiteralTrue,
    LiteralFalse,
    Value(PredicateValue),
    List(Vec<PredicateValue>),
    Range {
        lower: Option<Bound>,
        upper: Option<Bound>,
    },
    Minus {
        base: Box<ColumnPredicateKind>,
        subtrahend: Box<ColumnPredicateKind>,
    },
    MemberColumn(MemberKeyProjection),
}

/// A typed constraint over a single star column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnPredicate {
    pub column: Column,
    pub kind: ColumnPredicateKind,
}

/// Result of intersecting two column predicates: the portion of `self`
/// that overlaps `other`, the unmatched residual, and the fraction of
/// `self`'s enumerable children that matched.
#[derive(Debug, Clone, PartialEq)]
pub struct Overlap {
    pub matched: ColumnPredicate,
    pub remaining: ColumnPredicate,
    pub selectivity: f64,
}

impl ColumnPredicate {
    pub fn literal_true(column: Column) -> Self {
        Self {
            column,
            kind: ColumnPredicateKind::LiteralTrue,
        }
    }

    pub fn literal_false(column: Column) -> Self {
        Self {
            column,
            kind: ColumnPredicateKind::LiteralFalse,
        }
    }

    pub fn value(column: Column, value: PredicateValue) -> Self {
        Self {
            column,
            kind: ColumnPredicateKind::Value(value),
        }
    }

    /// Builds a list predicate, deduplicating and sorting values so
    /// construction order never affects equality or SQL rendering.
    pub fn list(column: Column, mut values: Vec<PredicateValue>) -> Self {
        values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        values.dedup_by(|a, b| a == b);
        Self {
            column,
            kind: ColumnPredicateKind::List(values),
        }
    }

    pub fn range(column: Column, lower: Option<Bound>, upper: Option<Bound>) -> Self {
        Self {
            column,
            kind: ColumnPredicateKind::Range { lower, upper },
        }
    }

    pub fn member_column(column: Column, projection: MemberKeyProjection) -> Self {
        Self {
            column,
            kind: ColumnPredicateKind::MemberColumn(projection),
        }
    }

    fn is_literal_true(&self) -> bool {
        matches!(self.kind, ColumnPredicateKind::LiteralTrue)
    }

    fn is_literal_false(&self) -> bool {
        matches!(self.kind, ColumnPredicateKind::LiteralFalse)
    }

    /// Evaluate this predicate against a candidate value. Total for
    /// singletons and lists; for ranges, compares using the host-neutral
    /// comparator on [`PredicateValue`] (NULL sorts low).
    pub fn evaluate(&self, candidate: &PredicateValue) -> bool {
        match &self.kind {
            ColumnPredicateKind::LiteralTrue => true,
            ColumnPredicateKind::LiteralFalse => false,
            ColumnPredicateKind::Value(v) => v == candidate,
            ColumnPredicateKind::List(values) => values.contains(candidate),
            ColumnPredicateKind::Range { lower, upper } => {
                let above_lower = match lower {
                    None => true,
                    Some(b) => match candidate.partial_cmp(&b.value) {
                        Some(std::cmp::Ordering::Greater) => true,
                        Some(std::cmp::Ordering::Equal) => !b.strict,
                        _ => false,
                    },
                };
                let below_upper = match upper {
                    None => true,
                    Some(b) => match candidate.partial_cmp(&b.value) {
                        Some(std::cmp::Ordering::Less) => true,
                        Some(std::cmp::Ordering::Equal) => !b.strict,
                        _ => false,
                    },
                };
                above_lower && below_upper
            }
            ColumnPredicateKind::Minus { base, subtrahend } => {
                Self::evaluate_kind(base, candidate) && !Self::evaluate_kind(subtrahend, candidate)
            }
            ColumnPredicateKind::MemberColumn(proj) => &proj.value == candidate,
        }
    }

    fn evaluate_kind(kind: &ColumnPredicateKind, candidate: &PredicateValue) -> bool {
        let probe = ColumnPredicate {
            column: Column::new(0, ColumnRef::new(""), DataType::Text),
            kind: kind.clone(),
        };
        probe.evaluate(candidate)
    }

    /// The predicate's finite value set, if it has one. `Range` and
    /// `Minus` are treated as non-enumerable even when they happen to be
    /// finite in practice (e.g. an integer range) — callers that need an
    /// exact value set should already have one in list form.
    pub fn enumerate_values(&self) -> Option<Vec<PredicateValue>> {
        match &self.kind {
            ColumnPredicateKind::LiteralTrue => None,
            ColumnPredicateKind::LiteralFalse => Some(Vec::new()),
            ColumnPredicateKind::Value(v) => Some(vec![v.clone()]),
            ColumnPredicateKind::List(values) => Some(values.clone()),
            ColumnPredicateKind::MemberColumn(proj) => Some(vec![proj.value.clone()]),
            ColumnPredicateKind::Range { .. } | ColumnPredicateKind::Minus { .. } => None,
        }
    }

    /// Render this predicate's WHERE-clause fragment. `literal_true`
    /// predicates are the caller's signal to skip emitting anything —
    /// callers should check [`ColumnPredicate::is_always_true`] first
    /// rather than splice a always-true fragment into a query.
    pub fn to_sql(&self, quoting: &QuoteStyle) -> Result<String, PredicateError> {
        let expr = self.column.sql.qualified();
        match &self.kind {
            ColumnPredicateKind::LiteralTrue => Ok("1 = 1".to_string()),
            ColumnPredicateKind::LiteralFalse => Ok("1 = 0".to_string()),
            ColumnPredicateKind::Value(v) => Self::render_value_eq(&expr, v, &self.column.datatype, quoting),
            ColumnPredicateKind::List(values) => Self::render_list(&expr, values, &self.column.datatype, quoting),
            ColumnPredicateKind::Range { lower, upper } => {
                Self::render_range(&expr, lower, upper, &self.column.datatype, quoting)
            }
            ColumnPredicateKind::Minus { base, subtrahend } => {
                let base_sql = ColumnPredicate {
                    column: self.column.clone(),
                    kind: (**base).clone(),
                }
                .to_sql(quoting)?;
                let sub_sql = ColumnPredicate {
                    column: self.column.clone(),
                    kind: (**subtrahend).clone(),
                }
                .to_sql(quoting)?;
                Ok(format!("({base_sql} AND NOT ({sub_sql}))"))
            }
            ColumnPredicateKind::MemberColumn(proj) => Ok(format!("{expr} = {}", proj.sql)),
        }
    }

    fn render_value_eq(
        expr: &str,
        value: &PredicateValue,
        datatype: &DataType,
        quoting: &QuoteStyle,
    ) -> Result<String, PredicateError> {
        if value.is_null() {
            return Ok(format!("{expr} IS NULL"));
        }
        Ok(format!("{expr} = {}", Self::render_scalar(value, datatype, quoting)?))
    }

    fn render_list(
        expr: &str,
        values: &[PredicateValue],
        datatype: &DataType,
        quoting: &QuoteStyle,
    ) -> Result<String, PredicateError> {
        let mut sorted: Vec<&PredicateValue> = values.iter().collect();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        let has_null = sorted.iter().any(|v| v.is_null());
        let non_null: Vec<&PredicateValue> = sorted.iter().filter(|v| !v.is_null()).copied().collect();

        if non_null.is_empty() {
            return Ok(format!("{expr} IS NULL"));
        }

        let rendered: Vec<String> = non_null
            .iter()
            .map(|v| Self::render_scalar(v, datatype, quoting))
            .collect::<Result<_, _>>()?;

        if !has_null {
            return Ok(format!("{expr} IN ({})", rendered.join(", ")));
        }

        if rendered.len() == 1 {
            return Ok(format!("({expr} = {} OR {expr} IS NULL)", rendered[0]));
        }

        Ok(format!("({expr} IN ({}) OR {expr} IS NULL)", rendered.join(", ")))
    }

    fn render_range(
        expr: &str,
        lower: &Option<Bound>,
        upper: &Option<Bound>,
        datatype: &DataType,
        quoting: &QuoteStyle,
    ) -> Result<String, PredicateError> {
        let mut clauses = Vec::new();
        if let Some(b) = lower {
            let op = if b.strict { ">" } else { ">=" };
            clauses.push(format!("{expr} {op} {}", Self::render_scalar(&b.value, datatype, quoting)?));
        }
        if let Some(b) = upper {
            let op = if b.strict { "<" } else { "<=" };
            clauses.push(format!("{expr} {op} {}", Self::render_scalar(&b.value, datatype, quoting)?));
        }
        if clauses.is_empty() {
            return Ok("1 = 1".to_string());
        }
        if clauses.len() == 1 {
            return Ok(clauses.remove(0));
        }
        Ok(format!("({})", clauses.join(" AND ")))
    }

    fn render_scalar(
        value: &PredicateValue,
        datatype: &DataType,
        quoting: &QuoteStyle,
    ) -> Result<String, PredicateError> {
        use rolap_sql_ir::dialect::SqlValue;
        match value {
            PredicateValue::Null => Ok("NULL".to_string()),
            PredicateValue::Integer(i) => {
                if !datatype.is_numeric() {
                    return Err(PredicateError::InvalidConstraint(format!(
                        "integer value against non-numeric column datatype {datatype:?}"
                    )));
                }
                Ok(quoting.quote_value(&SqlValue::Number(i.to_string()), datatype))
            }
            PredicateValue::Float(f) => {
                if !datatype.is_numeric() {
                    return Err(PredicateError::InvalidConstraint(format!(
                        "float value against non-numeric column datatype {datatype:?}"
                    )));
                }
                Ok(quoting.quote_value(&SqlValue::Number(f.to_string()), datatype))
            }
            PredicateValue::Text(s) => Ok(quoting.quote_value(&SqlValue::Text(s.clone()), datatype)),
        }
    }

    /// Whether a range/intersection computation can touch this predicate
    /// directly, or must be deferred to the planner's fallback path.
    pub fn is_minus(&self) -> bool {
        matches!(self.kind, ColumnPredicateKind::Minus { .. })
    }

    /// `matched`/`remaining`/`selectivity` against `other`. Enumerable
    /// predicates (list/value/member-column/literal) compute an exact
    /// split; non-enumerable predicates (range) fall back to a boolean
    /// `might_intersect` check with selectivity 0 or 1, since the segment
    /// axes this feeds never hold a continuous range axis in practice —
    /// only list predicates do (see `rolap-segment::SegmentAxis`).
    pub fn intersect(&self, other: &ColumnPredicate) -> Result<Overlap, PredicateError> {
        if self.is_minus() || other.is_minus() {
            return Err(PredicateError::ConstraintNotSupported(
                "intersect is not defined over a minus-predicate".to_string(),
            ));
        }

        if self.is_literal_false() || other.is_literal_false() {
            return Ok(Overlap {
                matched: ColumnPredicate::literal_false(self.column.clone()),
                remaining: self.clone(),
                selectivity: 0.0,
            });
        }
        if self.is_literal_true() {
            return Ok(Overlap {
                matched: other.clone(),
                remaining: ColumnPredicate::literal_false(self.column.clone()),
                selectivity: 1.0,
            });
        }
        if other.is_literal_true() {
            return Ok(Overlap {
                matched: self.clone(),
                remaining: ColumnPredicate::literal_false(self.column.clone()),
                selectivity: 1.0,
            });
        }

        if let (Some(mine), Some(theirs)) = (self.enumerate_values(), other.enumerate_values()) {
            let theirs: HashSet<&PredicateValue> = theirs.iter().collect();
            let total = mine.len().max(1) as f64;
            let matched: Vec<PredicateValue> = mine.iter().filter(|v| theirs.contains(v)).cloned().collect();
            let remaining: Vec<PredicateValue> = mine.iter().filter(|v| !theirs.contains(v)).cloned().collect();
            let selectivity = matched.len() as f64 / total;
            return Ok(Overlap {
                matched: ColumnPredicate::list(self.column.clone(), matched),
                remaining: ColumnPredicate::list(self.column.clone(), remaining),
                selectivity,
            });
        }

        if self.might_intersect(other) {
            Ok(Overlap {
                matched: self.clone(),
                remaining: ColumnPredicate::literal_false(self.column.clone()),
                selectivity: 1.0,
            })
        } else {
            Ok(Overlap {
                matched: ColumnPredicate::literal_false(self.column.clone()),
                remaining: self.clone(),
                selectivity: 0.0,
            })
        }
    }

    /// Set-difference `self \ other`. For list predicates, drops values
    /// `other` accepts. Literal-true/false collapse per the algebra's
    /// identities; otherwise a [`ColumnPredicateKind::Minus`] is
    /// introduced since neither side can reduce further.
    pub fn minus(&self, other: &ColumnPredicate) -> ColumnPredicate {
        if other.is_literal_true() {
            return ColumnPredicate::literal_false(self.column.clone());
        }
        if other.is_literal_false() || self.is_literal_false() {
            return self.clone();
        }
        if self.is_literal_true() {
            // self minus other, self unconstrained: the only representable
            // residual without enumerating the whole domain is the
            // minus-predicate itself.
            return ColumnPredicate {
                column: self.column.clone(),
                kind: ColumnPredicateKind::Minus {
                    base: Box::new(self.kind.clone()),
                    subtrahend: Box::new(other.kind.clone()),
                },
            };
        }
        if let Some(mine) = self.enumerate_values() {
            let remaining: Vec<PredicateValue> = mine.into_iter().filter(|v| !other.evaluate(v)).collect();
            return ColumnPredicate::list(self.column.clone(), remaining);
        }
        ColumnPredicate {
            column: self.column.clone(),
            kind: ColumnPredicateKind::Minus {
                base: Box::new(self.kind.clone()),
                subtrahend: Box::new(other.kind.clone()),
            },
        }
    }

    /// Union with another predicate over the *same* column. The
    /// cell-request batching path (§4.2) only ever unions enumerable
    /// value-sets into a list predicate; a non-enumerable operand falls
    /// back to returning the enumerable side unmodified, since the
    /// algebra has no "or of ranges" variant to construct.
    pub fn or_column(&self, other: &ColumnPredicate) -> ColumnPredicate {
        if self.is_literal_true() || other.is_literal_true() {
            return ColumnPredicate::literal_true(self.column.clone());
        }
        if self.is_literal_false() {
            return other.clone();
        }
        if other.is_literal_false() {
            return self.clone();
        }
        match (self.enumerate_values(), other.enumerate_values()) {
            (Some(mut mine), Some(theirs)) => {
                mine.extend(theirs);
                ColumnPredicate::list(self.column.clone(), mine)
            }
            (Some(_), None) => other.clone(),
            _ => self.clone(),
        }
    }

    /// A cheap, possibly over-approximating test for whether `self` and
    /// `other` can share a satisfying value. Never returns `false` when an
    /// overlap actually exists.
    pub fn might_intersect(&self, other: &ColumnPredicate) -> bool {
        if self.is_literal_false() || other.is_literal_false() {
            return false;
        }
        if self.is_literal_true() || other.is_literal_true() {
            return true;
        }
        match (self.enumerate_values(), other.enumerate_values()) {
            (Some(mine), Some(theirs)) => mine.iter().any(|v| theirs.contains(v)),
            _ => match (&self.kind, &other.kind) {
                (
                    ColumnPredicateKind::Range { lower: l1, upper: u1 },
                    ColumnPredicateKind::Range { lower: l2, upper: u2 },
                ) => ranges_overlap(l1, u1, l2, u2),
                (ColumnPredicateKind::Range { lower, upper }, _) => other
                    .enumerate_values()
                    .map(|values| {
                        values.iter().any(|v| {
                            let probe = ColumnPredicate::range(self.column.clone(), lower.clone(), upper.clone());
                            probe.evaluate(v)
                        })
                    })
                    .unwrap_or(true),
                _ => true,
            },
        }
    }

    /// Rebind this predicate to a different column of the same shape
    /// (used when walking to an "expanded level" column during AggStar
    /// matching).
    pub fn clone_with_column(&self, column: Column) -> ColumnPredicate {
        ColumnPredicate {
            column,
            kind: self.kind.clone(),
        }
    }

    /// Structural equality, modulo child order for list predicates.
    pub fn equal_constraint(&self, other: &ColumnPredicate) -> bool {
        if self.column.bit_position != other.column.bit_position {
            return false;
        }
        match (&self.kind, &other.kind) {
            (ColumnPredicateKind::List(a), ColumnPredicateKind::List(b)) => {
                a.len() == b.len() && a.iter().all(|v| b.contains(v))
            }
            (
                ColumnPredicateKind::Minus { base: b1, subtrahend: s1 },
                ColumnPredicateKind::Minus { base: b2, subtrahend: s2 },
            ) => {
                let p = |k: &ColumnPredicateKind, col: &Column| ColumnPredicate {
                    column: col.clone(),
                    kind: k.clone(),
                };
                p(b1, &self.column).equal_constraint(&p(b2, &other.column))
                    && p(s1, &self.column).equal_constraint(&p(s2, &other.column))
            }
            _ => self.kind == other.kind,
        }
    }
}

fn ranges_overlap(l1: &Option<Bound>, u1: &Option<Bound>, l2: &Option<Bound>, u2: &Option<Bound>) -> bool {
    let lower_ok = match (l1, u2) {
        (Some(l), Some(u)) => match l.value.partial_cmp(&u.value) {
            Some(std::cmp::Ordering::Less) => true,
            Some(std::cmp::Ordering::Equal) => !(l.strict || u.strict),
            _ => false,
        },
        _ => true,
    };
    let upper_ok = match (l2, u1) {
        (Some(l), Some(u)) => match l.value.partial_cmp(&u.value) {
            Some(std::cmp::Ordering::Less) => true,
            Some(std::cmp::Ordering::Equal) => !(l.strict || u.strict),
            _ => false,
        },
        _ => true,
    };
    lower_ok && upper_ok
}
