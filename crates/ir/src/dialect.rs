// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Dialect capability records
//!
//! The query builder never branches on "is this MySQL" — it branches on a
//! capability flag. [`DialectCapabilities`] is a plain data record (no class
//! hierarchy) describing what a target database can do; [`QuoteStyle`]
//! carries the handful of quoting/formatting functions that differ per
//! engine. A concrete [`Dialect`] bundles both.

use serde::{Deserialize, Serialize};

use crate::metadata::DataType;

/// Capability flags consulted by the query spec / SQL builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialectCapabilities {
    /// `SELECT expr AS alias` is permitted wherever the builder wants one.
    pub allows_field_as: bool,
    /// A derived table (`FROM (SELECT ...) AS t`) may itself be aggregated over.
    pub allows_from_query: bool,
    /// Columns may appear in SELECT without appearing in GROUP BY.
    pub allows_select_not_in_group_by: bool,
    /// `COUNT(DISTINCT x)` is supported directly.
    pub allows_count_distinct: bool,
    /// More than one `COUNT(DISTINCT x)` may appear in a single query.
    pub allows_multiple_count_distinct: bool,
    /// `SELECT DISTINCT` is permitted in a subquery feeding an outer aggregate.
    pub allows_inner_distinct: bool,
    /// `IN (v1, v2, ...)` with more than one value.
    pub supports_multi_value_in_expr: bool,
    /// No engine-imposed cap on the number of values in an `IN` list.
    pub supports_unlimited_value_list: bool,
    /// `GROUP BY GROUPING SETS (...)`.
    pub supports_grouping_sets: bool,
}

impl DialectCapabilities {
    /// A permissive capability set matching mainstream engines (PostgreSQL-like).
    pub const fn full() -> Self {
        Self {
            allows_field_as: true,
            allows_from_query: true,
            allows_select_not_in_group_by: false,
            allows_count_distinct: true,
            allows_multiple_count_distinct: true,
            allows_inner_distinct: true,
            supports_multi_value_in_expr: true,
            supports_unlimited_value_list: true,
            supports_grouping_sets: true,
        }
    }

    /// A conservative capability set: no grouping sets, no native
    /// count-distinct, no inner DISTINCT subqueries. Forces the query
    /// builder's rewrite paths.
    pub const fn conservative() -> Self {
        Self {
            allows_field_as: true,
            allows_from_query: true,
            allows_select_not_in_group_by: false,
            allows_count_distinct: false,
            allows_multiple_count_distinct: false,
            allows_inner_distinct: false,
            supports_multi_value_in_expr: true,
            supports_unlimited_value_list: false,
            supports_grouping_sets: false,
        }
    }
}

/// A scalar value destined for SQL text, pre-validated against a column's
/// datatype by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SqlValue {
    Null,
    /// Already-formatted numeric text (caller has verified parseability).
    Number(String),
    Text(String),
}

/// Value-quoting, identifier-quoting, and the handful of expression-shaping
/// functions whose syntax differs per engine.
///
/// `dummyname_uppercase` surfaces an open question rather than guessing at
/// it: the distinct rewrite's inner derived-table alias is a literal
/// `dummyname`, and whether it needs upper-casing to match the outer query
/// depends on whether the dialect folds unquoted identifiers to uppercase
/// (Oracle-style) or leaves them as written (PostgreSQL-style). The
/// distinct-rewrite code in `rolap-query-plan` consults this flag directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteStyle {
    pub identifier_quote: char,
    pub dummyname_uppercase: bool,
}

impl QuoteStyle {
    pub fn quote_identifier(&self, name: &str) -> String {
        let q = self.identifier_quote;
        format!(
            "{q}{}{q}",
            name.replace(q, &format!("{q}{q}"))
        )
    }

    pub fn quote_value(&self, value: &SqlValue, datatype: &DataType) -> String {
        match value {
            SqlValue::Null => "NULL".to_string(),
            SqlValue::Number(n) => {
                debug_assert!(datatype.is_numeric() || matches!(datatype, DataType::Other(_)));
                n.clone()
            }
            SqlValue::Text(s) => format!("'{}'", s.replace('\'', "''")),
        }
    }

    /// `COUNT(expr)`-style rendering for a count expression.
    pub fn generate_count_expression(&self, expr: &str) -> String {
        format!("COUNT({expr})")
    }

    /// Wrap an expression so comparisons against it are case-insensitive.
    pub fn wrap_into_sql_upper_case_function(&self, expr: &str) -> String {
        format!("UPPER({expr})")
    }
}

/// A target SQL dialect: capability flags plus quoting/formatting behaviour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dialect {
    pub name: String,
    pub capabilities: DialectCapabilities,
    pub quoting: QuoteStyle,
}

impl Dialect {
    pub fn postgres_like(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            capabilities: DialectCapabilities::full(),
            quoting: QuoteStyle {
                identifier_quote: '"',
                dummyname_uppercase: false,
            },
        }
    }

    /// A dialect modelling an engine with no native count-distinct support
    /// and identifiers folded to uppercase (forces both the distinct
    /// rewrite and the `dummyname` casing question).
    pub fn legacy_no_distinct(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            capabilities: DialectCapabilities::conservative(),
            quoting: QuoteStyle {
                identifier_quote: '"',
                dummyname_uppercase: true,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quote_identifier_escapes_embedded_quote() {
        let quoting = QuoteStyle {
            identifier_quote: '"',
            dummyname_uppercase: false,
        };
        assert_eq!(quoting.quote_identifier(r#"weird"name"#), r#""weird""name""#);
    }

    #[test]
    fn conservative_capabilities_disable_distinct_and_grouping_sets() {
        let caps = DialectCapabilities::conservative();
        assert!(!caps.allows_count_distinct);
        assert!(!caps.supports_grouping_sets);
    }

    #[test]
    fn quote_value_renders_null_and_text() {
        let quoting = QuoteStyle {
            identifier_quote: '"',
            dummyname_uppercase: false,
        };
        assert_eq!(quoting.quote_value(&SqlValue::Null, &DataType::Integer), "NULL");
        assert_eq!(
            quoting.quote_value(&SqlValue::Text("O'Brien".into()), &DataType::Text),
            "'O''Brien'"
        );
    }
}
