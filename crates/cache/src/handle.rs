// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Cache handle
//!
//! The client-facing wrapper `rolap-engine` holds: a cheap-to-clone
//! sender plus an execution-id counter. Every public method sends one
//! [`Command`] and awaits its reply; the actor itself lives in the task
//! spawned by [`crate::actor::CacheActor::spawn`].

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use rolap_bitkey::BitKey;
use rolap_cell_request::{Batch, CellRequest};
use tokio::sync::{mpsc, oneshot};

use crate::commands::{Command, ExecutionId, FlushRegion, LoadResult, LookupOutcome};
use crate::error::CacheError;

#[derive(Clone)]
pub struct CacheHandle {
    sender: mpsc::Sender<Command>,
    next_execution: Arc<AtomicU64>,
}

impl CacheHandle {
    pub(crate) fn new(sender: mpsc::Sender<Command>) -> Self {
        Self {
            sender,
            next_execution: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Mint a fresh execution id to tag every `Lookup`/`Load` issued on
    /// behalf of one logical query, so a later `cancel` can reach all of
    /// them.
    pub fn begin_execution(&self) -> ExecutionId {
        self.next_execution.fetch_add(1, Ordering::Relaxed)
    }

    pub async fn lookup(&self, star_id: impl Into<String>, session: Option<String>, request: CellRequest, execution: ExecutionId) -> Result<LookupOutcome, CacheError> {
        let (reply, rx) = oneshot::channel();
        self.sender
            .send(Command::Lookup {
                star_id: star_id.into(),
                session,
                request,
                execution,
                reply,
            })
            .await
            .map_err(|_| CacheError::ActorUnavailable)?;
        rx.await.map_err(|_| CacheError::ActorUnavailable)
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn load(
        &self,
        star_id: impl Into<String>,
        session: Option<String>,
        schema_id: impl Into<String>,
        cube_id: impl Into<String>,
        fact_table: impl Into<String>,
        batch: Batch,
        execution: ExecutionId,
    ) -> Result<Vec<oneshot::Receiver<LoadResult>>, CacheError> {
        let (reply, rx) = oneshot::channel();
        self.sender
            .send(Command::Load {
                star_id: star_id.into(),
                session,
                schema_id: schema_id.into(),
                cube_id: cube_id.into(),
                fact_table: fact_table.into(),
                batch,
                execution,
                reply,
            })
            .await
            .map_err(|_| CacheError::ActorUnavailable)?;
        rx.await.map_err(|_| CacheError::ActorUnavailable)
    }

    pub async fn flush(&self, star_id: impl Into<String>, bit_key: BitKey) -> Result<usize, CacheError> {
        let (reply, rx) = oneshot::channel();
        self.sender
            .send(Command::Flush {
                region: FlushRegion { star_id: star_id.into(), bit_key },
                reply,
            })
            .await
            .map_err(|_| CacheError::ActorUnavailable)?;
        rx.await.map_err(|_| CacheError::ActorUnavailable)
    }

    pub async fn cancel(&self, execution: ExecutionId) -> Result<(), CacheError> {
        let (reply, rx) = oneshot::channel();
        self.sender.send(Command::CancelExecution { execution, reply }).await.map_err(|_| CacheError::ActorUnavailable)?;
        rx.await.map_err(|_| CacheError::ActorUnavailable)
    }

    /// Stop the actor. Outstanding commands already queued ahead of this
    /// one still run; nothing queued after it will.
    pub async fn shutdown(&self) {
        let _ = self.sender.send(Command::Shutdown).await;
    }
}
