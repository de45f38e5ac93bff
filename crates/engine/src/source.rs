// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Engine segment source
//!
//! The only implementation of [`rolap_cache::SegmentSource`] in this
//! workspace: composes [`crate::query_builder::build_query_spec`] with
//! [`rolap_loader::SegmentLoader`] and a caller-supplied [`SqlExecutor`].
//! `rolap-cache` never sees a `Star`, a `Dialect`, or a `SqlExecutor` —
//! only this trait object.

use std::sync::Arc;

use async_trait::async_trait;
use rolap_cache::{CacheError, SegmentSource};
use rolap_cell_request::Batch;
use rolap_loader::{ExecutionContext, SegmentLoader, SegmentReservation, SqlExecutor};
use rolap_segment::{SegmentAxis, SegmentBody, SegmentHeader};
use rolap_sql_ir::Dialect;
use tracing::warn;

use crate::config::EngineConfig;
use crate::query_builder::build_query_spec;
use crate::registry::StarRegistry;

pub struct EngineSegmentSource {
    registry: Arc<StarRegistry>,
    dialect: Dialect,
    executor: Arc<dyn SqlExecutor>,
    loader: SegmentLoader,
    config: EngineConfig,
}

impl EngineSegmentSource {
    pub fn new(registry: Arc<StarRegistry>, dialect: Dialect, executor: Arc<dyn SqlExecutor>, loader: SegmentLoader, config: EngineConfig) -> Self {
        Self {
            registry,
            dialect,
            executor,
            loader,
            config,
        }
    }
}

#[async_trait]
impl SegmentSource for EngineSegmentSource {
    async fn load_batch(&self, batch: &Batch, reservations: &[SegmentHeader]) -> Vec<Result<(Vec<SegmentAxis>, SegmentBody), CacheError>> {
        let star_id = batch.key.star_id.clone();
        let Some(entry) = self.registry.get(&star_id) else {
            let error = CacheError::LoadFailed(format!("no star registered under id '{star_id}'"));
            return reservations.iter().map(|_| Err(error.clone())).collect();
        };

        let built = match build_query_spec(&entry.star, &entry.measures, batch, &self.config) {
            Ok(built) => built,
            Err(error) => {
                let error = CacheError::LoadFailed(error.to_string());
                return reservations.iter().map(|_| Err(error.clone())).collect();
            }
        };

        let reserved: Vec<SegmentReservation> = reservations.iter().cloned().map(SegmentReservation::new).collect();
        let ctx = ExecutionContext::new(None);

        match self.loader.load(&built.spec, &self.dialect, self.executor.as_ref(), &reserved, &ctx).await {
            Ok(loaded) if loaded.len() == reservations.len() => loaded.into_iter().map(|segment| Ok((segment.axes, segment.body))).collect(),
            Ok(loaded) => {
                warn!(expected = reservations.len(), got = loaded.len(), "loader returned a mismatched segment count for this batch");
                let error = CacheError::LoadFailed("loader returned a mismatched segment count".to_string());
                reservations.iter().map(|_| Err(error.clone())).collect()
            }
            Err(error) => {
                let error = CacheError::LoadFailed(error.to_string());
                reservations.iter().map(|_| Err(error.clone())).collect()
            }
        }
    }
}
