// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Cache actor command protocol
//!
//! The actor owns all mutable cache state; every caller, including the
//! actor's own spawned load tasks, talks to it by sending a [`Command`]
//! over its `mpsc` channel and, where a reply is expected, awaiting a
//! `oneshot` receiver. `rolap-engine` never touches [`crate::index`]
//! directly.

use std::sync::Arc;

use rolap_bitkey::BitKey;
use rolap_cell_request::{Batch, CellRequest};
use rolap_segment::{Segment, SegmentAxis, SegmentBody, SegmentHeader};
use tokio::sync::oneshot;

use crate::error::CacheError;

/// Identifies one logical query execution for cancellation purposes. The
/// caller (`rolap-engine`) mints these; the cache actor only ever compares
/// them for equality.
pub type ExecutionId = u64;

/// What a load eventually resolves to, delivered once per waiter.
#[derive(Debug, Clone)]
pub enum LoadResult {
    Loaded(Arc<Segment>),
    Failed(CacheError),
    /// The slot was flushed (or the execution cancelled) before the load
    /// completed; the waiter should retry the lookup.
    Stale,
}

/// The synchronous answer to a [`Command::Lookup`].
pub enum LookupOutcome {
    Hit(Arc<Segment>),
    Pending(oneshot::Receiver<LoadResult>),
    Miss,
}

/// A star (and, if session caching is enabled, a session) plus a bit key
/// of columns to flush. An empty bit key flushes every segment for the
/// star.
#[derive(Debug, Clone)]
pub struct FlushRegion {
    pub star_id: String,
    pub bit_key: BitKey,
}

pub(crate) enum Command {
    Lookup {
        star_id: String,
        session: Option<String>,
        request: CellRequest,
        execution: ExecutionId,
        reply: oneshot::Sender<LookupOutcome>,
    },
    Load {
        star_id: String,
        session: Option<String>,
        schema_id: String,
        cube_id: String,
        fact_table: String,
        batch: Batch,
        execution: ExecutionId,
        reply: oneshot::Sender<Vec<oneshot::Receiver<LoadResult>>>,
    },
    Flush {
        region: FlushRegion,
        reply: oneshot::Sender<usize>,
    },
    CancelExecution {
        execution: ExecutionId,
        reply: oneshot::Sender<()>,
    },
    LoadSucceeded {
        star_id: String,
        session: Option<String>,
        header: SegmentHeader,
        axes: Vec<SegmentAxis>,
        body: SegmentBody,
    },
    LoadFailed {
        star_id: String,
        session: Option<String>,
        header: SegmentHeader,
        error: CacheError,
    },
    Shutdown,
}
