// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Star / AggStar schema model
//!
//! The physical join-graph descriptor a query plans against: a star's fact
//! table, its bit-positioned columns, and its candidate pre-aggregated
//! tables ordered by estimated row count. How a `Star` is introspected
//! from a live database or a static definition file is outside this
//! crate's scope — callers hand it a fully-built [`Star`].

pub mod error;
pub mod star;

pub use error::{StarError, StarResult};
pub use star::{AggStar, AggStarColumn, Star, StarColumn};
