// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Predicate algebra
//!
//! Typed predicates over a star column (or tuple of columns), with the
//! set-algebraic operations the segment cache manager and SQL builder need:
//! intersection against a segment's axis region, set-difference when
//! narrowing a cached region, union when batching cell requests, and
//! deterministic SQL materialisation.

pub mod column;
pub mod compound;
pub mod error;
pub mod value;

pub use column::{Bound, Column, ColumnPredicate, ColumnPredicateKind, MemberKeyProjection, Overlap};
pub use compound::{BoolOp, CompoundChild, CompoundPredicate};
pub use error::PredicateError;
pub use value::PredicateValue;
