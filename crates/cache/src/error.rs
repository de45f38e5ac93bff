// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Cache errors

use thiserror::Error;

/// Errors surfaced to a waiter on a segment load, or to a caller of the
/// cache manager's synchronous operations.
#[derive(Debug, Clone, Error)]
pub enum CacheError {
    #[error("segment load failed: {0}")]
    LoadFailed(String),

    #[error("segment invalidated by a concurrent flush before the load completed")]
    Stale,

    #[error("execution was cancelled before its load completed")]
    ExecutionCancelled,

    #[error("cache actor shut down while a request was in flight")]
    ActorUnavailable,

    #[error("internal invariant violated: {0}")]
    Internal(String),
}
