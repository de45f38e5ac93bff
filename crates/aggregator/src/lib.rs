// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Aggregator registry
//!
//! Defines the measure aggregate functions the query engine understands
//! (`SUM`, `COUNT`, `MIN`, `MAX`, `AVG`, `COUNT DISTINCT`) and, for each,
//! whether and how it can be rolled up from an already-aggregated segment
//! rather than recomputed from the fact table. `rolap-query-plan`'s AggStar
//! matcher and `rolap-cache`'s rollup planner both consult this crate
//! instead of hard-coding per-function rules.

pub mod aggregator;
pub mod builtin;
pub mod registry;

pub use aggregator::{Aggregator, AggregatorKind, RollupStrategy};
pub use registry::AggregatorRegistry;
