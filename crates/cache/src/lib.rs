// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Segment cache manager
//!
//! A single-threaded actor ([`actor::CacheActor`]) owning the in-memory
//! [`index::SegmentIndex`]. Clients never touch the index directly — they
//! hold a [`handle::CacheHandle`] and send commands: `lookup`, `load`,
//! `flush`, `cancel`. The actor is generic over a [`source::SegmentSource`]
//! (how to actually run SQL for a miss, implemented by `rolap-engine`) and
//! an optional [`external::ExternalSegmentCache`] (a pluggable second
//! tier). On a miss, [`rollup::find_rollup_candidates`] is consulted
//! before any SQL is issued — a request coverable by already-loaded,
//! finer-grained segments is satisfied by [`materialize::materialize`]
//! instead.

pub mod actor;
pub mod commands;
pub mod error;
pub mod external;
pub mod fingerprint;
pub mod handle;
pub mod index;
pub mod materialize;
pub mod rollup;
pub mod source;

pub use actor::{ActorConfig, CacheActor};
pub use commands::{ExecutionId, FlushRegion, LoadResult, LookupOutcome};
pub use error::CacheError;
pub use external::ExternalSegmentCache;
pub use handle::CacheHandle;
pub use source::SegmentSource;
