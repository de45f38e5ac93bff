// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Segment loader
//!
//! Turns a matched [`rolap_query_plan::QuerySpec`] into SQL text (via
//! `rolap-query-plan`), executes it through a caller-supplied
//! [`executor::SqlExecutor`], and ingests the resulting rows into one
//! [`loader::LoadedSegment`] per reserved header: sorted per-axis key sets,
//! grouping-set demultiplexing via the row's `GROUPING()` indicator columns,
//! and the dense/sparse body decision [`rolap_segment::SegmentBody`] already
//! exposes. Nothing below this crate (`rolap-cache`, `rolap-schema`, ...)
//! knows a concrete `SqlExecutor` exists — `rolap-engine` is the only
//! consumer that wires one in.

pub mod error;
pub mod executor;
pub mod loader;

pub use error::LoaderError;
pub use executor::{CellValue, ExecutionContext, RowCursor, SqlExecutor, StatementHandle};
pub use loader::{LoadedSegment, SegmentLoader, SegmentReservation};
