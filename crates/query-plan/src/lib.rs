// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Query planning
//!
//! Sits between the segment cache manager and the SQL dialect layer: given
//! a request's level/measure bit keys, [`matcher::match_agg_star`] picks the
//! smallest AggStar that can serve it, and [`sql_builder`] turns the
//! resulting [`query_spec::QuerySpec`] into SQL text.

pub mod matcher;
pub mod query_spec;
pub mod sql_builder;

pub use matcher::{DistinctMeasureConstraint, MatchOutcome, match_agg_star};
pub use query_spec::{ColumnSpec, GroupingSet, MeasureSpec, QuerySpec};
pub use sql_builder::{build_distinct_rewrite, build_non_distinct, render_select};
