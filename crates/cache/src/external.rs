// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Pluggable external segment store
//!
//! The cache actor's in-memory [`crate::index::SegmentIndex`] is always
//! authoritative for what is currently loading or loaded in this process.
//! An [`ExternalSegmentCache`] sits behind it as an optional second tier
//! (a distributed cache, a local disk spill) that a freshly started actor
//! can warm from, and that a loaded segment can be written through to.
//! Implementations own their own consistency story; the actor only ever
//! reads an external entry as a hint — a miss or stale read is retried
//! through `rolap-loader` like any other miss.

use async_trait::async_trait;
use rolap_segment::{SegmentAxis, SegmentBody, SegmentHeader};

#[async_trait]
pub trait ExternalSegmentCache: Send + Sync {
    async fn get(&self, header: &SegmentHeader) -> Option<(Vec<SegmentAxis>, SegmentBody)>;

    async fn put(&self, header: SegmentHeader, axes: Vec<SegmentAxis>, body: SegmentBody);

    async fn remove(&self, header: &SegmentHeader);
}
