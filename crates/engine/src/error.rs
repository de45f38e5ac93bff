// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Facade error
//!
//! `rolap-engine` is the top of the dependency graph, so its error type is
//! the one place every lower crate's error gets folded into a single
//! caller-facing enum rather than making callers match on five different
//! error types to handle one failed call.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Star(#[from] rolap_schema::StarError),

    #[error(transparent)]
    Predicate(#[from] rolap_predicate::PredicateError),

    #[error(transparent)]
    Cache(#[from] rolap_cache::CacheError),

    #[error(transparent)]
    Loader(#[from] rolap_loader::LoaderError),

    /// A batch/lookup named a star id nothing was ever registered under.
    #[error("no star registered under id '{0}'")]
    UnknownStar(String),

    /// A cell request or batch named a measure id this star's registration
    /// never defined.
    #[error("star '{star_id}' has no measure '{measure_id}'")]
    UnknownMeasure { star_id: String, measure_id: String },
}
