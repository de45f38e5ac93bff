// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Error types for the star/AggStar model

use serde::Serialize;
use thiserror::Error;

pub type StarResult<T> = Result<T, StarError>;

#[derive(Debug, Error, Clone, Serialize)]
pub enum StarError {
    /// No star column is registered at the given bit position.
    #[error("no column at bit position {0} (star width {1})")]
    ColumnNotFound(usize, usize),

    /// An AggStar's column lookup has no physical column for this bit
    /// position, even though the bit is set in its level or measure key.
    #[error("AggStar '{agg_star}' has no column mapping for bit position {bit_position}")]
    AggStarColumnMissing { agg_star: String, bit_position: usize },

    /// Construction-time invariant violation (e.g. overlapping level/measure bit keys).
    #[error("star invariant violated: {0}")]
    InvariantViolation(String),
}
