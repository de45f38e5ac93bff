// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # SQL intermediate representation
//!
//! A small expression/query tree plus dialect capability records, shared by
//! `rolap-predicate` (renders constraints into [`expr::Expr::Raw`] /
//! [`query::SelectStatement::where_clause`] fragments) and
//! `rolap-query-plan` (assembles [`query::SelectStatement`]s against a
//! matched AggStar).

pub mod dialect;
pub mod expr;
pub mod metadata;
pub mod query;

pub use dialect::{Dialect, DialectCapabilities, QuoteStyle, SqlValue};
pub use expr::{BinaryOp, ColumnRef, Expr, Literal, UnaryOp};
pub use metadata::DataType;
pub use query::{GroupBy, SelectItem, SelectStatement, TableRef};
