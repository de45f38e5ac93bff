// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Segment source
//!
//! The boundary between the cache actor and SQL execution. `rolap-cache`
//! knows nothing about `SqlExecutor`/`RowCursor` or SQL generation — it
//! only knows it can hand a [`rolap_cell_request::Batch`] plus the
//! reserved headers it computed for that batch to a [`SegmentSource`] and
//! get back, one result per header, either a loaded body or an error.
//! `rolap-engine` is the only crate that implements this trait, by
//! composing `rolap-loader::SegmentLoader` with a concrete executor.

use async_trait::async_trait;
use rolap_cell_request::Batch;
use rolap_segment::{SegmentAxis, SegmentBody, SegmentHeader};

use crate::error::CacheError;

#[async_trait]
pub trait SegmentSource: Send + Sync {
    /// Load every reserved header's data, in response to one batch of
    /// cell requests. `reservations` has the same length and measure
    /// order as `batch.measures`; the returned vector must too.
    async fn load_batch(&self, batch: &Batch, reservations: &[SegmentHeader]) -> Vec<Result<(Vec<SegmentAxis>, SegmentBody), CacheError>>;
}
