// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Loader errors

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum LoaderError {
    /// The query would need more statement/memory resources than the
    /// caller's limits allow (e.g. `maxConstraints`).
    #[error("resource limit exceeded: {0}")]
    ResourceLimitExceeded(String),

    /// The addressable cell count of a segment's axes overflowed `u64`
    /// while computing the dense/sparse decision.
    #[error("segment cell count overflowed while sizing the body")]
    DecimalOverflow,

    /// A result column's runtime value didn't match what ingestion expected
    /// at that position (e.g. a measure column came back as text).
    #[error("type mismatch reading column {column}: {message}")]
    TypeMismatch { column: usize, message: String },

    /// SQL generation or execution failed.
    #[error("sql failure: {0}")]
    SqlFailure(String),

    /// A reserved header's grouping-set cohort produced no rows. Benign —
    /// the caller (`rolap-cache`) treats it as "nothing to cache", not a
    /// load failure.
    #[error("grouping-set cohort had no rows")]
    EmptyResult,

    /// The execution was cancelled, or its deadline passed, before the
    /// load finished.
    #[error("execution was cancelled or timed out")]
    Cancelled,
}

impl From<rolap_predicate::PredicateError> for LoaderError {
    fn from(error: rolap_predicate::PredicateError) -> Self {
        LoaderError::SqlFailure(error.to_string())
    }
}
