// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

use thiserror::Error;

/// Failure modes of the predicate algebra. Both are surfaced to the
/// planner rather than the caller trying to recover locally: a
/// `ConstraintNotSupported` falls back to fetching from the fact table,
/// an `InvalidConstraint` is fatal for the current request.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PredicateError {
    /// A predicate shape this algebra does not translate to SQL, e.g.
    /// `intersect` against a minus-predicate, or a range spanning a tuple
    /// of columns.
    #[error("constraint not supported: {0}")]
    ConstraintNotSupported(String),

    /// A value failed to validate against its column's declared datatype
    /// (e.g. non-numeric text against a numeric column).
    #[error("invalid constraint: {0}")]
    InvalidConstraint(String),
}
