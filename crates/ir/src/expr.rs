// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Expressions
//!
//! A small SQL expression tree covering exactly what the star/AggStar query
//! builder needs to emit: column references, literals, function calls
//! (aggregators and the few scalar wrappers a dialect needs, e.g. an
//! upper-casing wrapper for case-insensitive comparisons), boolean
//! combinations, and a `Raw` escape hatch for fragments the predicate
//! algebra has already rendered to text (see `rolap-predicate`, which emits
//! its own `IN (...)` / `IS NULL` text rather than building a full `Expr`
//! tree for every value list).

use serde::{Deserialize, Serialize};

/// A SQL expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum Expr {
    /// Column reference (e.g., `table.column` or just `column`).
    Column(ColumnRef),

    /// Literal value.
    Literal(Literal),

    /// Binary operation (e.g., `a AND b`, `x = 5`).
    BinaryOp {
        left: Box<Expr>,
        op: BinaryOp,
        right: Box<Expr>,
    },

    /// Unary operation (e.g., `-x`, `NOT a`).
    UnaryOp { op: UnaryOp, expr: Box<Expr> },

    /// Function call (e.g., `SUM(x)`, `COUNT(DISTINCT x)`).
    Function {
        name: String,
        args: Vec<Expr>,
        distinct: bool,
    },

    /// Parenthesized expression.
    Paren(Box<Expr>),

    /// A fragment of SQL text produced elsewhere (typically the predicate
    /// algebra's own `IN (...)` / `IS NULL` rendering) and spliced in
    /// verbatim.
    Raw(String),
}

impl Expr {
    pub fn column(col: ColumnRef) -> Self {
        Expr::Column(col)
    }

    pub fn and(self, other: Expr) -> Self {
        Expr::BinaryOp {
            left: Box::new(self),
            op: BinaryOp::And,
            right: Box::new(other),
        }
    }

    pub fn or(self, other: Expr) -> Self {
        Expr::BinaryOp {
            left: Box::new(self),
            op: BinaryOp::Or,
            right: Box::new(other),
        }
    }

    pub fn paren(self) -> Self {
        Expr::Paren(Box::new(self))
    }
}

/// Column reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnRef {
    /// Owning table/alias name.
    pub table: Option<String>,
    /// Column name, or a computed expression string for derived columns.
    pub column: String,
}

impl ColumnRef {
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            table: None,
            column: column.into(),
        }
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    pub fn qualified(&self) -> String {
        match &self.table {
            Some(table) => format!("{table}.{}", self.column),
            None => self.column.clone(),
        }
    }
}

/// Literal value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum Literal {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
pub enum BinaryOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
pub enum UnaryOp {
    Neg,
    Not,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_ref_qualification() {
        let col = ColumnRef::new("id");
        assert_eq!(col.qualified(), "id");

        let qualified = col.with_table("sales_fact");
        assert_eq!(qualified.qualified(), "sales_fact.id");
    }

    #[test]
    fn and_or_build_binary_tree() {
        let a = Expr::Raw("a = 1".into());
        let b = Expr::Raw("b = 2".into());
        let combined = a.and(b);
        assert!(matches!(
            combined,
            Expr::BinaryOp {
                op: BinaryOp::And,
                ..
            }
        ));
    }
}
