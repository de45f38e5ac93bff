// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # The cache actor
//!
//! Single task, single owner of [`SegmentIndex`]: every command runs to
//! completion before the next is read off the channel, so there is never
//! a data race over reservations, waiter lists, or the rollup planner's
//! view of what is loaded. Actual SQL execution happens off this task, in
//! a future spawned by [`CacheActor::spawn_load`] that reports back over
//! the same channel as [`Command::LoadSucceeded`]/[`Command::LoadFailed`]
//! — the actor loop itself never awaits I/O.

use std::collections::HashMap;
use std::sync::Arc;

use rolap_aggregator::AggregatorRegistry;
use rolap_cell_request::{Batch, CellRequest};
use rolap_segment::{ColumnRegion, HeaderValue, Segment, SegmentAxis, SegmentBody, SegmentHeader, SegmentState};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::commands::{Command, ExecutionId, LoadResult, LookupOutcome};
use crate::error::CacheError;
use crate::external::ExternalSegmentCache;
use crate::fingerprint::headers_for_batch;
use crate::handle::CacheHandle;
use crate::index::SegmentIndex;
use crate::materialize::materialize;
use crate::rollup::find_rollup_candidates;
use crate::source::SegmentSource;

pub struct ActorConfig {
    pub schema_id: String,
    pub cube_id: String,
    /// When set, every lookup that isn't an immediate in-flight hit falls
    /// straight through to a fresh load and nothing is retained in the
    /// index once waiters are resolved.
    pub disable_caching: bool,
    pub enable_session_caching: bool,
    pub sparse_segment_count_threshold: u64,
    pub sparse_segment_density_threshold: f64,
}

pub struct CacheActor {
    index: SegmentIndex,
    external: Option<Arc<dyn ExternalSegmentCache>>,
    source: Arc<dyn SegmentSource>,
    registry: Arc<AggregatorRegistry>,
    config: ActorConfig,
    command_tx: mpsc::Sender<Command>,
    pending_by_execution: HashMap<ExecutionId, Vec<(String, Option<String>, SegmentHeader)>>,
}

impl CacheActor {
    pub fn spawn(source: Arc<dyn SegmentSource>, external: Option<Arc<dyn ExternalSegmentCache>>, registry: Arc<AggregatorRegistry>, config: ActorConfig) -> CacheHandle {
        let (tx, rx) = mpsc::channel(1024);
        let actor = CacheActor {
            index: SegmentIndex::new(),
            external,
            source,
            registry,
            config,
            command_tx: tx.clone(),
            pending_by_execution: HashMap::new(),
        };
        tokio::spawn(actor.run(rx));
        CacheHandle::new(tx)
    }

    async fn run(mut self, mut rx: mpsc::Receiver<Command>) {
        info!("cache actor started");
        while let Some(command) = rx.recv().await {
            if matches!(command, Command::Shutdown) {
                break;
            }
            self.handle(command).await;
        }
        info!("cache actor stopped");
    }

    fn session_key(&self, session: Option<String>) -> Option<String> {
        if self.config.enable_session_caching { session } else { None }
    }

    async fn handle(&mut self, command: Command) {
        match command {
            Command::Shutdown => unreachable!("filtered out in run()"),
            Command::Lookup { star_id, session, request, execution, reply } => {
                let session = self.session_key(session);
                let outcome = self.handle_lookup(&star_id, session, request, execution);
                let _ = reply.send(outcome);
            }
            Command::Load {
                star_id,
                session,
                schema_id,
                cube_id,
                fact_table,
                batch,
                execution,
                reply,
            } => {
                let session = self.session_key(session);
                let receivers = self.handle_load(star_id, session, schema_id, cube_id, fact_table, batch, execution).await;
                let _ = reply.send(receivers);
            }
            Command::Flush { region, reply } => {
                let flushed = self.index.flush_star(&region.star_id, &region.bit_key);
                if let Some(external) = &self.external {
                    for header in &flushed {
                        external.remove(header).await;
                    }
                }
                debug!(star_id = %region.star_id, flushed = flushed.len(), "segment cache flush");
                let _ = reply.send(flushed.len());
            }
            Command::CancelExecution { execution, reply } => {
                self.handle_cancel(execution);
                let _ = reply.send(());
            }
            Command::LoadSucceeded { star_id, session, header, axes, body } => {
                self.handle_load_succeeded(star_id, session, header, axes, body).await;
            }
            Command::LoadFailed { star_id, session, header, error } => {
                self.handle_load_failed(&star_id, &session, header, error);
            }
        }
    }

    fn handle_lookup(&mut self, star_id: &str, session: Option<String>, request: CellRequest, execution: ExecutionId) -> LookupOutcome {
        let target_values: Vec<(usize, HeaderValue)> = request.coordinates.iter().map(|(bit, value)| (*bit, HeaderValue::from_predicate(value))).collect();
        let constrained = request.constrained_columns();

        for header in self.index.headers_for_star(star_id, &session) {
            if header.bit_key != constrained {
                continue;
            }
            if !region_covers_point(&header, &target_values) {
                continue;
            }
            let Some(slot) = self.index.get_mut(star_id, &session, &header) else {
                continue;
            };
            match &slot.segment.state {
                SegmentState::Loaded(_) => return LookupOutcome::Hit(Arc::new(slot.segment.clone())),
                SegmentState::Loading => {
                    let (tx, rx) = oneshot::channel();
                    slot.waiters.insert(execution, tx);
                    return LookupOutcome::Pending(rx);
                }
                SegmentState::Failed(_) => continue,
            }
        }

        LookupOutcome::Miss
    }

    #[allow(clippy::too_many_arguments)]
    async fn handle_load(&mut self, star_id: String, session: Option<String>, schema_id: String, cube_id: String, fact_table: String, batch: Batch, execution: ExecutionId) -> Vec<oneshot::Receiver<LoadResult>> {
        let headers = headers_for_batch(&schema_id, &cube_id, &fact_table, &batch);
        let mut receivers = Vec::with_capacity(headers.len());
        let mut needs_sql = Vec::new();

        for header in headers {
            if let Some(existing) = self.index.get_mut(&star_id, &session, &header) {
                receivers.push(attach_to_existing(existing, execution));
                continue;
            }

            if let Some(receiver) = self.try_materialize_rollup(&star_id, &session, &header) {
                receivers.push(receiver);
                continue;
            }

            if let Some(receiver) = self.try_warm_from_external(&star_id, &session, &header).await {
                receivers.push(receiver);
                continue;
            }

            self.index.reserve(&star_id, &session, header.clone());
            self.pending_by_execution.entry(execution).or_default().push((star_id.clone(), session.clone(), header.clone()));
            let (tx, rx) = oneshot::channel();
            if let Some(slot) = self.index.get_mut(&star_id, &session, &header) {
                slot.waiters.insert(execution, tx);
            }
            receivers.push(rx);
            needs_sql.push(header);
        }

        if !needs_sql.is_empty() {
            self.spawn_load(star_id, session, batch, needs_sql);
        }

        receivers
    }

    /// Check the external (second-tier) cache for a body before reserving
    /// a SQL load. A hit is installed as an immediately-loaded slot, the
    /// same way an in-memory rollup is — this is the warm-start path the
    /// external store exists for (spec §1/§6).
    async fn try_warm_from_external(&mut self, star_id: &str, session: &Option<String>, header: &SegmentHeader) -> Option<oneshot::Receiver<LoadResult>> {
        if self.config.disable_caching {
            return None;
        }
        let external = self.external.as_ref()?;
        let (axes, body) = external.get(header).await?;

        debug!(measure = %header.measure_id, "segment warmed from external cache");
        let segment = Segment::loaded(header.clone(), axes, body);
        self.index.reserve(star_id, session, header.clone());
        if let Some(slot) = self.index.get_mut(star_id, session, header) {
            slot.segment = segment.clone();
        }
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(LoadResult::Loaded(Arc::new(segment)));
        Some(rx)
    }

    /// If an already-loaded, more granular segment (or set of segments)
    /// covers `header`'s region, roll it up in memory and install it as
    /// an immediately-loaded slot instead of reserving a SQL load.
    fn try_materialize_rollup(&mut self, star_id: &str, session: &Option<String>, header: &SegmentHeader) -> Option<oneshot::Receiver<LoadResult>> {
        if self.config.disable_caching {
            return None;
        }
        let aggregator = self.registry.get(&header.measure_id)?;
        let candidate = find_rollup_candidates(header, self.index.loaded_segments(star_id, session), aggregator, None)?;

        let sources: Vec<(&SegmentHeader, &Segment)> = candidate
            .headers
            .iter()
            .filter_map(|candidate_header| self.index.get(star_id, session, candidate_header).map(|slot| (candidate_header, &slot.segment)))
            .collect();
        if sources.len() != candidate.headers.len() {
            return None;
        }

        let (axes, body) = materialize(header, &sources, &candidate.excess_columns, aggregator, self.config.sparse_segment_count_threshold, self.config.sparse_segment_density_threshold)?;

        debug!(measure = %header.measure_id, sources = sources.len(), "segment satisfied by in-memory rollup");
        let segment = Segment::loaded(header.clone(), axes, body);
        self.index.reserve(star_id, session, header.clone());
        if let Some(slot) = self.index.get_mut(star_id, session, header) {
            slot.segment = segment.clone();
        }
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(LoadResult::Loaded(Arc::new(segment)));
        Some(rx)
    }

    fn spawn_load(&mut self, star_id: String, session: Option<String>, batch: Batch, headers: Vec<SegmentHeader>) {
        let source = Arc::clone(&self.source);
        let tx = self.command_tx.clone();
        tokio::spawn(async move {
            let results = source.load_batch(&batch, &headers).await;
            for (header, result) in headers.into_iter().zip(results) {
                let command = match result {
                    Ok((axes, body)) => Command::LoadSucceeded {
                        star_id: star_id.clone(),
                        session: session.clone(),
                        header,
                        axes,
                        body,
                    },
                    Err(error) => Command::LoadFailed {
                        star_id: star_id.clone(),
                        session: session.clone(),
                        header,
                        error,
                    },
                };
                if tx.send(command).await.is_err() {
                    break;
                }
            }
        });
    }

    async fn handle_load_succeeded(&mut self, star_id: String, session: Option<String>, header: SegmentHeader, axes: Vec<SegmentAxis>, body: SegmentBody) {
        // A Flush or a zero-waiter cancellation may have removed the slot
        // while this load was in flight (spec §5/§8 "Flush stale"): such a
        // body must be discarded rather than installed, including in the
        // external tier, or a later warm-start would resurrect stale data.
        // So the reservation is checked *before* writing through.
        if self.index.get(&star_id, &session, &header).is_none() {
            warn!(measure = %header.measure_id, "load succeeded for a header with no reservation (flushed or cancelled mid-flight)");
            return;
        }

        if let Some(external) = &self.external {
            external.put(header.clone(), axes.clone(), body.clone()).await;
        }

        let Some(slot) = self.index.get_mut(&star_id, &session, &header) else {
            return;
        };

        let segment = Segment::loaded(header, axes, body);
        slot.segment = segment.clone();
        slot.resolve_waiters(LoadResult::Loaded(Arc::new(segment)));

        if self.config.disable_caching {
            let header = slot.segment.header.clone();
            self.index.remove(&star_id, &session, &header);
        }
    }

    fn handle_load_failed(&mut self, star_id: &str, session: &Option<String>, header: SegmentHeader, error: CacheError) {
        if let Some(mut slot) = self.index.remove(star_id, session, &header) {
            slot.resolve_waiters(LoadResult::Failed(error));
        }
    }

    fn handle_cancel(&mut self, execution: ExecutionId) {
        let Some(pending) = self.pending_by_execution.remove(&execution) else {
            return;
        };
        for (star_id, session, header) in pending {
            let Some(slot) = self.index.get_mut(&star_id, &session, &header) else {
                continue;
            };
            if let Some(waiter) = slot.waiters.remove(&execution) {
                let _ = waiter.send(LoadResult::Stale);
            }
            if slot.waiters.is_empty() && matches!(slot.segment.state, SegmentState::Loading) {
                // No one else is waiting on this in-flight load; drop the
                // reservation. The SQL task itself keeps running to
                // completion (no statement-handle-level cancellation at
                // this layer) but its result lands on a slot that no
                // longer exists and is discarded in `handle_load_succeeded`.
                self.index.remove(&star_id, &session, &header);
            }
        }
    }
}

fn region_covers_point(header: &SegmentHeader, values: &[(usize, HeaderValue)]) -> bool {
    for (bit, value) in values {
        match header.regions.get(bit) {
            Some(ColumnRegion::Wildcard) => continue,
            Some(ColumnRegion::Exact(values)) => {
                if !values.contains(value) {
                    return false;
                }
            }
            None => return false,
        }
    }
    true
}

/// Hand a waiter a receiver for a slot that already exists (loading,
/// loaded, or failed), rather than reserving a new one.
fn attach_to_existing(slot: &mut crate::index::Slot, execution: ExecutionId) -> oneshot::Receiver<LoadResult> {
    let (tx, rx) = oneshot::channel();
    match &slot.segment.state {
        SegmentState::Loaded(_) => {
            let _ = tx.send(LoadResult::Loaded(Arc::new(slot.segment.clone())));
        }
        SegmentState::Loading => {
            slot.waiters.insert(execution, tx);
        }
        SegmentState::Failed(message) => {
            let _ = tx.send(LoadResult::Failed(CacheError::LoadFailed(message.clone())));
        }
    }
    rx
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

    use async_trait::async_trait;
    use rolap_aggregator::AggregatorRegistry;
    use rolap_cell_request::Batcher;
    use rolap_predicate::PredicateValue;
    use rolap_schema::{Star, StarColumn};
    use rolap_segment::{Cell, SegmentAxis};
    use rolap_sql_ir::DataType;

    use super::*;

    struct FakeSource {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl SegmentSource for FakeSource {
        async fn load_batch(&self, _batch: &Batch, reservations: &[SegmentHeader]) -> Vec<Result<(Vec<SegmentAxis>, SegmentBody), CacheError>> {
            self.calls.fetch_add(1, AtomicOrdering::SeqCst);
            reservations
                .iter()
                .map(|_| {
                    Ok((
                        vec![SegmentAxis::new(vec![PredicateValue::Integer(1)])],
                        SegmentBody::Dense {
                            axis_lengths: vec![1],
                            cells: vec![Cell::Int(42)],
                        },
                    ))
                })
                .collect()
        }
    }

    fn sample_star() -> Star {
        Star::new("sales_fact", vec![StarColumn::new(0, "region_id", "sales_fact", DataType::Integer)])
    }

    fn config() -> ActorConfig {
        ActorConfig {
            schema_id: "schema".to_string(),
            cube_id: "cube".to_string(),
            disable_caching: false,
            enable_session_caching: false,
            sparse_segment_count_threshold: 1000,
            sparse_segment_density_threshold: 0.5,
        }
    }

    #[tokio::test]
    async fn concurrent_loads_for_the_same_batch_issue_sql_at_most_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        struct CountingSource(Arc<AtomicUsize>);
        #[async_trait]
        impl SegmentSource for CountingSource {
            async fn load_batch(&self, _batch: &Batch, reservations: &[SegmentHeader]) -> Vec<Result<(Vec<SegmentAxis>, SegmentBody), CacheError>> {
                self.0.fetch_add(1, AtomicOrdering::SeqCst);
                reservations
                    .iter()
                    .map(|_| {
                        Ok((
                            vec![SegmentAxis::new(vec![PredicateValue::Integer(1)])],
                            SegmentBody::Dense {
                                axis_lengths: vec![1],
                                cells: vec![Cell::Int(42)],
                            },
                        ))
                    })
                    .collect()
            }
        }

        let source = Arc::new(CountingSource(Arc::clone(&calls)));
        let handle = CacheActor::spawn(source, None, Arc::new(AggregatorRegistry::new()), config());

        let star = sample_star();
        let requests = vec![CellRequest::new(1, "sum_amount", vec![(0, PredicateValue::Integer(1))])];
        let batches = Batcher::batch("sales_fact", &star, &requests);
        let batch = batches.into_iter().next().expect("one batch");

        let exec1 = handle.begin_execution();
        let exec2 = handle.begin_execution();

        let receivers1 = handle.load("sales_fact", None, "schema", "cube", "sales_fact", batch.clone(), exec1).await.expect("load 1 accepted");
        let receivers2 = handle.load("sales_fact", None, "schema", "cube", "sales_fact", batch, exec2).await.expect("load 2 accepted");

        for rx in receivers1.into_iter().chain(receivers2) {
            match rx.await.expect("load resolves") {
                LoadResult::Loaded(segment) => assert_eq!(segment.body().and_then(|b| b.get(&[0])), Some(Cell::Int(42))),
                other => panic!("expected Loaded, got {other:?}"),
            }
        }

        assert_eq!(calls.load(AtomicOrdering::SeqCst), 1, "one reservation should issue exactly one SQL load");
    }

    #[tokio::test]
    async fn lookup_after_load_is_a_hit() {
        let source = Arc::new(FakeSource { calls: AtomicUsize::new(0) });
        let handle = CacheActor::spawn(source, None, Arc::new(AggregatorRegistry::new()), config());

        let star = sample_star();
        let request = CellRequest::new(1, "sum_amount", vec![(0, PredicateValue::Integer(1))]);
        let batches = Batcher::batch("sales_fact", &star, std::slice::from_ref(&request));
        let batch = batches.into_iter().next().expect("one batch");

        let exec = handle.begin_execution();
        let receivers = handle.load("sales_fact", None, "schema", "cube", "sales_fact", batch, exec).await.expect("load accepted");
        for rx in receivers {
            rx.await.expect("load resolves");
        }

        let outcome = handle.lookup("sales_fact", None, request, exec).await.expect("lookup accepted");
        match outcome {
            LookupOutcome::Hit(segment) => assert!(segment.is_loaded()),
            _ => panic!("expected a cache hit after load completed"),
        }
    }

    #[tokio::test]
    async fn flush_resolves_in_flight_waiters_as_stale() {
        let source = Arc::new(FakeSource { calls: AtomicUsize::new(0) });
        let handle = CacheActor::spawn(source, None, Arc::new(AggregatorRegistry::new()), config());

        let star = sample_star();
        let request = CellRequest::new(1, "sum_amount", vec![(0, PredicateValue::Integer(1))]);
        let batches = Batcher::batch("sales_fact", &star, std::slice::from_ref(&request));
        let batch = batches.into_iter().next().expect("one batch");

        let exec = handle.begin_execution();
        handle.load("sales_fact", None, "schema", "cube", "sales_fact", batch, exec).await.expect("load accepted");

        let flushed = handle.flush("sales_fact", rolap_bitkey::BitKey::empty(1)).await.expect("flush accepted");
        assert_eq!(flushed, 1, "the single reserved/loaded segment for this star should be flushed");
    }

    #[derive(Default)]
    struct RecordingExternalCache {
        store: std::sync::Mutex<HashMap<SegmentHeader, (Vec<SegmentAxis>, SegmentBody)>>,
        puts: AtomicUsize,
        removes: AtomicUsize,
    }

    #[async_trait]
    impl ExternalSegmentCache for RecordingExternalCache {
        async fn get(&self, header: &SegmentHeader) -> Option<(Vec<SegmentAxis>, SegmentBody)> {
            self.store.lock().unwrap().get(header).cloned()
        }

        async fn put(&self, header: SegmentHeader, axes: Vec<SegmentAxis>, body: SegmentBody) {
            self.puts.fetch_add(1, AtomicOrdering::SeqCst);
            self.store.lock().unwrap().insert(header, (axes, body));
        }

        async fn remove(&self, header: &SegmentHeader) {
            self.removes.fetch_add(1, AtomicOrdering::SeqCst);
            self.store.lock().unwrap().remove(header);
        }
    }

    #[tokio::test]
    async fn a_loaded_segment_is_written_through_to_the_external_cache() {
        let source = Arc::new(FakeSource { calls: AtomicUsize::new(0) });
        let external = Arc::new(RecordingExternalCache::default());
        let handle = CacheActor::spawn(source, Some(Arc::clone(&external) as Arc<dyn ExternalSegmentCache>), Arc::new(AggregatorRegistry::new()), config());

        let star = sample_star();
        let request = CellRequest::new(1, "sum_amount", vec![(0, PredicateValue::Integer(1))]);
        let batches = Batcher::batch("sales_fact", &star, std::slice::from_ref(&request));
        let batch = batches.into_iter().next().expect("one batch");

        let exec = handle.begin_execution();
        let receivers = handle.load("sales_fact", None, "schema", "cube", "sales_fact", batch, exec).await.expect("load accepted");
        for rx in receivers {
            rx.await.expect("load resolves");
        }

        assert_eq!(external.puts.load(AtomicOrdering::SeqCst), 1, "a successful load should be written through to the external tier");
    }

    #[tokio::test]
    async fn a_flush_removes_the_segment_from_the_external_cache() {
        let source = Arc::new(FakeSource { calls: AtomicUsize::new(0) });
        let external = Arc::new(RecordingExternalCache::default());
        let handle = CacheActor::spawn(source, Some(Arc::clone(&external) as Arc<dyn ExternalSegmentCache>), Arc::new(AggregatorRegistry::new()), config());

        let star = sample_star();
        let request = CellRequest::new(1, "sum_amount", vec![(0, PredicateValue::Integer(1))]);
        let batches = Batcher::batch("sales_fact", &star, std::slice::from_ref(&request));
        let batch = batches.into_iter().next().expect("one batch");

        let exec = handle.begin_execution();
        let receivers = handle.load("sales_fact", None, "schema", "cube", "sales_fact", batch, exec).await.expect("load accepted");
        for rx in receivers {
            rx.await.expect("load resolves");
        }

        handle.flush("sales_fact", rolap_bitkey::BitKey::empty(1)).await.expect("flush accepted");

        assert_eq!(external.removes.load(AtomicOrdering::SeqCst), 1, "flush should drop the external copy too");
    }

    #[tokio::test]
    async fn a_miss_in_the_index_is_warmed_from_the_external_cache_without_issuing_sql() {
        let calls = Arc::new(AtomicUsize::new(0));
        struct CountingSource(Arc<AtomicUsize>);
        #[async_trait]
        impl SegmentSource for CountingSource {
            async fn load_batch(&self, _batch: &Batch, reservations: &[SegmentHeader]) -> Vec<Result<(Vec<SegmentAxis>, SegmentBody), CacheError>> {
                self.0.fetch_add(1, AtomicOrdering::SeqCst);
                reservations
                    .iter()
                    .map(|_| {
                        Ok((
                            vec![SegmentAxis::new(vec![PredicateValue::Integer(1)])],
                            SegmentBody::Dense {
                                axis_lengths: vec![1],
                                cells: vec![Cell::Int(42)],
                            },
                        ))
                    })
                    .collect()
            }
        }
        let source = Arc::new(CountingSource(Arc::clone(&calls)));
        let external = Arc::new(RecordingExternalCache::default());

        let star = sample_star();
        let request = CellRequest::new(1, "sum_amount", vec![(0, PredicateValue::Integer(1))]);
        let batches = Batcher::batch("sales_fact", &star, std::slice::from_ref(&request));
        let batch = batches.into_iter().next().expect("one batch");
        let header = headers_for_batch("schema", "cube", "sales_fact", &batch).into_iter().next().expect("one header");

        external
            .put(
                header,
                vec![SegmentAxis::new(vec![PredicateValue::Integer(1)])],
                SegmentBody::Dense {
                    axis_lengths: vec![1],
                    cells: vec![Cell::Int(99)],
                },
            )
            .await;

        let handle = CacheActor::spawn(source, Some(Arc::clone(&external) as Arc<dyn ExternalSegmentCache>), Arc::new(AggregatorRegistry::new()), config());

        let exec = handle.begin_execution();
        let receivers = handle.load("sales_fact", None, "schema", "cube", "sales_fact", batch, exec).await.expect("load accepted");
        for rx in receivers {
            match rx.await.expect("load resolves") {
                LoadResult::Loaded(segment) => assert_eq!(segment.body().and_then(|b| b.get(&[0])), Some(Cell::Int(99))),
                other => panic!("expected Loaded from external warm-start, got {other:?}"),
            }
        }

        assert_eq!(calls.load(AtomicOrdering::SeqCst), 0, "a hit in the external tier should never issue SQL");
    }
}
