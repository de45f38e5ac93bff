// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Query representation
//!
//! The aggregate-query builder only ever emits one shape of statement: a
//! single `SELECT ... FROM ... WHERE ... GROUP BY ...`, optionally with
//! `GROUPING SETS`. There are no joins, CTEs, window functions, or set
//! operations here — the star schema's FROM clause is a fixed list of
//! tables the query planner already knows how to join, rendered as plain
//! SQL text rather than modelled as a join tree (see
//! `rolap-query-plan::sql_builder`).

use serde::{Deserialize, Serialize};

use crate::expr::Expr;

/// A single aggregate SELECT statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectStatement {
    pub distinct: bool,
    pub projection: Vec<SelectItem>,
    pub from: Vec<TableRef>,
    pub where_clause: Option<Expr>,
    pub group_by: GroupBy,
}

impl Default for SelectStatement {
    fn default() -> Self {
        Self {
            distinct: false,
            projection: Vec::new(),
            from: Vec::new(),
            where_clause: None,
            group_by: GroupBy::None,
        }
    }
}

impl SelectStatement {
    pub fn with_projection(mut self, projection: Vec<SelectItem>) -> Self {
        self.projection = projection;
        self
    }

    pub fn with_from(mut self, from: Vec<TableRef>) -> Self {
        self.from = from;
        self
    }

    pub fn with_where(mut self, expr: Expr) -> Self {
        self.where_clause = Some(expr);
        self
    }

    pub fn with_group_by(mut self, group_by: GroupBy) -> Self {
        self.group_by = group_by;
        self
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }
}

/// Item in a SELECT projection list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SelectItem {
    UnnamedExpr(Expr),
    AliasedExpr { expr: Expr, alias: String },
}

/// Table reference in a FROM clause. Joins between star/dimension tables
/// are pre-resolved by the query planner and rendered as additional
/// `TableRef`s plus a join predicate folded into the WHERE clause, matching
/// how the AggStar matcher already thinks about a fact/dimension pairing
/// as "tables plus a constraint", not as a join tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableRef {
    pub name: String,
    pub alias: Option<String>,
}

impl TableRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alias: None,
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn reference(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

/// GROUP BY clause: either a flat column list or a `GROUPING SETS` list,
/// one entry per grouping the cache manager asked for in a single batched
/// SQL statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GroupBy {
    None,
    Columns(Vec<Expr>),
    GroupingSets(Vec<Vec<Expr>>),
}

impl GroupBy {
    pub fn is_empty(&self) -> bool {
        matches!(self, GroupBy::None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::ColumnRef;

    #[test]
    fn select_default_has_no_group_by() {
        let select = SelectStatement::default();
        assert!(select.group_by.is_empty());
        assert!(select.from.is_empty());
    }

    #[test]
    fn table_ref_prefers_alias() {
        let t = TableRef::new("sales_fact").with_alias("f");
        assert_eq!(t.reference(), "f");
    }

    #[test]
    fn grouping_sets_holds_one_entry_per_grouping() {
        let gb = GroupBy::GroupingSets(vec![
            vec![Expr::column(ColumnRef::new("region"))],
            vec![Expr::column(ColumnRef::new("region")), Expr::column(ColumnRef::new("product"))],
        ]);
        match gb {
            GroupBy::GroupingSets(sets) => assert_eq!(sets.len(), 2),
            _ => panic!("expected grouping sets"),
        }
    }
}
