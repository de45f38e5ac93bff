// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Cell requests, aggregation keys, and batching
//!
//! A [`CellRequest`] is a single multidimensional cell lookup. The cache
//! manager never issues one SQL statement per request — it first groups
//! requests by [`AggregationKey`] (same star, same constrained columns,
//! same compound predicates) via [`Batcher::batch`], so one query can
//! satisfy every request in a group.

pub mod aggregation_key;
pub mod batch;
pub mod request;

pub use aggregation_key::AggregationKey;
pub use batch::{Batch, Batcher};
pub use request::CellRequest;
