// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Segment data model
//!
//! A [`Segment`] is the unit the cache manager indexes and the loader
//! populates: an immutable [`SegmentHeader`] fingerprint, one [`SegmentAxis`]
//! per constrained column, and a [`SegmentState`] carrying the eventual
//! [`SegmentBody`]. Two segments with equal headers are interchangeable in
//! cache — `SegmentHeader` is structurally `Hash`/`Eq` for exactly that
//! reason.

pub mod axis;
pub mod body;
pub mod header;
pub mod segment;

pub use axis::SegmentAxis;
pub use body::{Cell, SegmentBody};
pub use header::{ColumnRegion, HeaderValue, SegmentHeader};
pub use segment::{Segment, SegmentState};
