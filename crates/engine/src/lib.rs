// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # rolap-engine
//!
//! The facade: [`RolapEngineBuilder`] collects stars and measures, then
//! [`RolapEngineBuilder::build`] assembles the combined
//! [`rolap_aggregator::AggregatorRegistry`] and spawns the single
//! [`rolap_cache::CacheActor`] every lookup/load runs against, wired to a
//! [`source::EngineSegmentSource`] over the caller's star catalog. Every
//! crate below this one is reusable outside an OLAP context
//! (`rolap-predicate`, `rolap-sql-ir`) or purpose-built but caller-agnostic
//! (`rolap-cache`, `rolap-loader`, `rolap-query-plan`); this crate is the
//! one place they are all actually connected.
//!
//! Star registration happens only through the builder, not after
//! [`RolapEngine`] exists: `CacheActor::spawn` freezes its aggregator
//! registry at spawn time, and that registry needs one entry per measure
//! across every star the engine will ever serve (see
//! [`RolapEngineBuilder::register_star`]) before the actor can start
//! accepting lookups.

pub mod config;
pub mod drillthrough;
pub mod error;
pub mod query_builder;
pub mod registry;
pub mod source;

pub use config::EngineConfig;
pub use drillthrough::DrillThroughSql;
pub use error::EngineError;
pub use registry::MeasureDef;

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use rolap_aggregator::{Aggregator, AggregatorRegistry};
use rolap_bitkey::BitKey;
use rolap_cache::{ActorConfig, CacheActor, CacheError, CacheHandle, ExecutionId, ExternalSegmentCache, LoadResult, LookupOutcome};
use rolap_cell_request::{Batcher, CellRequest};
use rolap_loader::SqlExecutor;
use rolap_predicate::{CompoundPredicate, PredicateValue};
use rolap_schema::Star;
use rolap_segment::{Cell, HeaderValue, Segment};
use rolap_sql_ir::Dialect;

use crate::registry::StarRegistry;
use crate::source::EngineSegmentSource;

/// Collects star/measure registrations before any actor exists.
pub struct RolapEngineBuilder {
    schema_id: String,
    cube_id: String,
    dialect: Dialect,
    config: EngineConfig,
    registry: StarRegistry,
    aggregators: AggregatorRegistry,
}

impl RolapEngineBuilder {
    pub fn new(schema_id: impl Into<String>, cube_id: impl Into<String>, dialect: Dialect) -> Self {
        Self {
            schema_id: schema_id.into(),
            cube_id: cube_id.into(),
            dialect,
            config: EngineConfig::default(),
            registry: StarRegistry::new(),
            aggregators: AggregatorRegistry::new(),
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Register a star and its measure catalog.
    ///
    /// `rolap-cache`'s rollup planner looks an `Aggregator` up by
    /// `SegmentHeader::measure_id` (see `CacheActor::try_materialize_rollup`),
    /// not by aggregator kind — two measures that both happen to be `SUM`
    /// still need independently addressable rollup strategies. So every
    /// measure's aggregator is re-registered here under the measure's own
    /// id rather than under its SQL function name.
    pub fn register_star(mut self, star_id: impl Into<String>, star: Star, measures: Vec<MeasureDef>) -> Self {
        let star_id = star_id.into();
        for measure in &measures {
            let aggregator = Aggregator {
                name: measure.id.clone(),
                ..measure.aggregator.clone()
            };
            self.aggregators.register(aggregator);
        }
        self.registry.register(star_id, star, measures);
        self
    }

    pub fn build(self, executor: Arc<dyn SqlExecutor>, external: Option<Arc<dyn ExternalSegmentCache>>) -> RolapEngine {
        let registry = Arc::new(self.registry);

        let mut loader = rolap_loader::SegmentLoader::new(self.config.sparse_segment_count_threshold, self.config.sparse_segment_density_threshold);
        if let Some(limit) = self.config.result_limit {
            loader = loader.with_result_limit(limit);
        }

        let source = Arc::new(EngineSegmentSource::new(registry.clone(), self.dialect.clone(), executor, loader, self.config.clone()));
        let actor_config = ActorConfig {
            schema_id: self.schema_id.clone(),
            cube_id: self.cube_id.clone(),
            disable_caching: self.config.disable_caching,
            enable_session_caching: self.config.enable_session_caching,
            sparse_segment_count_threshold: self.config.sparse_segment_count_threshold,
            sparse_segment_density_threshold: self.config.sparse_segment_density_threshold,
        };
        let handle = CacheActor::spawn(source, external, Arc::new(self.aggregators), actor_config);

        RolapEngine {
            schema_id: self.schema_id,
            cube_id: self.cube_id,
            registry,
            handle,
        }
    }
}

/// The engine's public API. Cheap to clone (an `Arc`'d registry and a
/// `CacheHandle` wrapping a channel sender).
#[derive(Clone)]
pub struct RolapEngine {
    schema_id: String,
    cube_id: String,
    registry: Arc<StarRegistry>,
    handle: CacheHandle,
}

impl RolapEngine {
    /// Mint an execution id to tag every lookup/load issued on behalf of
    /// one logical query, so a later [`RolapEngine::cancel`] reaches all
    /// of them.
    pub fn begin_execution(&self) -> ExecutionId {
        self.handle.begin_execution()
    }

    pub async fn lookup(&self, star_id: impl Into<String>, session: Option<String>, request: CellRequest, execution: ExecutionId) -> Result<LookupOutcome, EngineError> {
        Ok(self.handle.lookup(star_id, session, request, execution).await?)
    }

    pub async fn load(&self, star_id: impl Into<String>, session: Option<String>, batch: rolap_cell_request::Batch, execution: ExecutionId) -> Result<Vec<tokio::sync::oneshot::Receiver<LoadResult>>, EngineError> {
        let star_id = star_id.into();
        let entry = self.registry.get(&star_id).ok_or_else(|| EngineError::UnknownStar(star_id.clone()))?;
        Ok(self
            .handle
            .load(star_id, session, self.schema_id.clone(), self.cube_id.clone(), entry.star.fact_table.clone(), batch, execution)
            .await?)
    }

    pub async fn flush(&self, star_id: impl Into<String>, bit_key: BitKey) -> Result<usize, EngineError> {
        Ok(self.handle.flush(star_id, bit_key).await?)
    }

    pub async fn cancel(&self, execution: ExecutionId) -> Result<(), EngineError> {
        Ok(self.handle.cancel(execution).await?)
    }

    pub async fn shutdown(&self) {
        self.handle.shutdown().await;
    }

    pub fn generate_drill_through_sql(&self, star_id: &str, coordinates: &[(usize, PredicateValue)], slicer: &[CompoundPredicate], fields: &[usize], count_only: bool) -> Result<DrillThroughSql, EngineError> {
        let entry = self.registry.get(star_id).ok_or_else(|| EngineError::UnknownStar(star_id.to_string()))?;
        drillthrough::generate_drill_through_sql(&entry.star, coordinates, slicer, fields, count_only)
    }

    /// Resolve a set of cell requests to their values, batching misses
    /// together the same way a query engine's own axis evaluation would
    /// (spec.md §4.4): one `lookup` per request first (cheap, synchronous
    /// against the in-memory index), then one batched `load` per distinct
    /// aggregation shape among the misses.
    pub async fn get_cells(&self, star_id: impl Into<String>, session: Option<String>, requests: Vec<CellRequest>) -> Vec<Result<Cell, EngineError>> {
        let star_id = star_id.into();
        let entry = match self.registry.get(&star_id) {
            Some(entry) => entry,
            None => return requests.iter().map(|_| Err(EngineError::UnknownStar(star_id.clone()))).collect(),
        };

        let execution = self.begin_execution();
        let mut results: Vec<Option<Result<Cell, EngineError>>> = vec![None; requests.len()];
        let mut misses = Vec::new();

        for (index, request) in requests.iter().enumerate() {
            match self.handle.lookup(star_id.clone(), session.clone(), request.clone(), execution).await {
                Ok(LookupOutcome::Hit(segment)) => results[index] = Some(resolve_cell(&segment, &request.coordinates)),
                Ok(LookupOutcome::Pending(rx)) => results[index] = Some(await_and_resolve(rx, &request.coordinates).await),
                Ok(LookupOutcome::Miss) => misses.push(index),
                Err(error) => results[index] = Some(Err(error.into())),
            }
        }

        if !misses.is_empty() {
            let miss_requests: Vec<CellRequest> = misses.iter().map(|&i| requests[i].clone()).collect();
            let mut index_by_shape = index_requests_by_shape(&miss_requests, &misses);

            for batch in Batcher::batch(&star_id, &entry.star, &miss_requests) {
                let receivers = match self
                    .handle
                    .load(star_id.clone(), session.clone(), self.schema_id.clone(), self.cube_id.clone(), entry.star.fact_table.clone(), batch.clone(), execution)
                    .await
                {
                    Ok(receivers) => receivers,
                    Err(error) => {
                        for request in &batch.requests {
                            if let Some(index) = take_index(&mut index_by_shape, request) {
                                results[index] = Some(Err(error.clone().into()));
                            }
                        }
                        continue;
                    }
                };

                for (measure_index, rx) in receivers.into_iter().enumerate() {
                    let measure_id = batch.measures[measure_index].clone();
                    let matching: Vec<&CellRequest> = batch.requests.iter().filter(|r| r.measure == measure_id).collect();
                    if matching.is_empty() {
                        continue;
                    }
                    match rx.await {
                        Ok(LoadResult::Loaded(segment)) => {
                            for request in matching {
                                if let Some(index) = take_index(&mut index_by_shape, request) {
                                    results[index] = Some(resolve_cell(&segment, &request.coordinates));
                                }
                            }
                        }
                        Ok(LoadResult::Failed(error)) => {
                            for request in matching {
                                if let Some(index) = take_index(&mut index_by_shape, request) {
                                    results[index] = Some(Err(error.clone().into()));
                                }
                            }
                        }
                        Ok(LoadResult::Stale) => {
                            for request in matching {
                                if let Some(index) = take_index(&mut index_by_shape, request) {
                                    results[index] = Some(Err(CacheError::Stale.into()));
                                }
                            }
                        }
                        Err(_) => {
                            for request in matching {
                                if let Some(index) = take_index(&mut index_by_shape, request) {
                                    results[index] = Some(Err(CacheError::ActorUnavailable.into()));
                                }
                            }
                        }
                    }
                }
            }
        }

        results
            .into_iter()
            .map(|r| r.unwrap_or_else(|| Err(EngineError::Cache(CacheError::Internal("request was dropped before a result was recorded".to_string())))))
            .collect()
    }
}

async fn await_and_resolve(rx: tokio::sync::oneshot::Receiver<LoadResult>, coordinates: &[(usize, PredicateValue)]) -> Result<Cell, EngineError> {
    match rx.await {
        Ok(LoadResult::Loaded(segment)) => resolve_cell(&segment, coordinates),
        Ok(LoadResult::Failed(error)) => Err(error.into()),
        Ok(LoadResult::Stale) => Err(CacheError::Stale.into()),
        Err(_) => Err(CacheError::ActorUnavailable.into()),
    }
}

/// Place each request's coordinate values on the segment's axes (in the
/// header's bit-position order, see `rolap_segment::axis`) and read the
/// cell at that offset.
fn resolve_cell(segment: &Segment, coordinates: &[(usize, PredicateValue)]) -> Result<Cell, EngineError> {
    let body = segment.body().ok_or_else(|| EngineError::Cache(CacheError::Internal("segment has no body yet".to_string())))?;

    let mut offsets = Vec::with_capacity(segment.axes.len());
    for (axis, bit) in segment.axes.iter().zip(segment.header.bit_key.iter_set_bits()) {
        let Some((_, value)) = coordinates.iter().find(|(b, _)| *b == bit) else {
            return Err(EngineError::Cache(CacheError::Internal(format!("no coordinate given for constrained column {bit}"))));
        };
        let offset = axis
            .offset_of(value)
            .ok_or_else(|| EngineError::Cache(CacheError::Internal(format!("value not present on the loaded axis for column {bit}"))))?;
        offsets.push(offset);
    }

    Ok(body.get(&offsets).unwrap_or(Cell::Null))
}

type ShapeKey = (String, Vec<(usize, HeaderValue)>);

fn shape_key(request: &CellRequest) -> ShapeKey {
    let mut coordinates: Vec<(usize, HeaderValue)> = request.coordinates.iter().map(|(bit, value)| (*bit, HeaderValue::from_predicate(value))).collect();
    coordinates.sort_by_key(|(bit, _)| *bit);
    (request.measure.clone(), coordinates)
}

/// `Batcher::batch` clones requests into its own `Vec`s, losing their
/// position in the caller's original request list. This rebuilds that
/// mapping so a loaded segment's value lands back at the right index,
/// tolerating duplicate requests (same measure and coordinates) via a
/// FIFO queue per shape.
fn index_requests_by_shape(requests: &[CellRequest], original_indices: &[usize]) -> HashMap<ShapeKey, VecDeque<usize>> {
    let mut map: HashMap<ShapeKey, VecDeque<usize>> = HashMap::new();
    for (request, &original_index) in requests.iter().zip(original_indices) {
        map.entry(shape_key(request)).or_default().push_back(original_index);
    }
    map
}

fn take_index(map: &mut HashMap<ShapeKey, VecDeque<usize>>, request: &CellRequest) -> Option<usize> {
    let key = shape_key(request);
    let queue = map.get_mut(&key)?;
    let index = queue.pop_front();
    if queue.is_empty() {
        map.remove(&key);
    }
    index
}

#[cfg(test)]
mod tests {
    use rolap_aggregator::{AggregatorKind, RollupStrategy};
    use rolap_cache::ExternalSegmentCache;
    use rolap_sql_ir::DataType;
    use rolap_test_utils::{FixedRowsExecutor, permissive_dialect, sales_star};

    use super::*;

    fn build_engine() -> RolapEngine {
        let star = sales_star();
        let measures = vec![MeasureDef::new("sum_amount", 2, Aggregator::new("SUM", AggregatorKind::Sum, DataType::Decimal, RollupStrategy::Direct))];
        let executor: Arc<dyn SqlExecutor> = Arc::new(FixedRowsExecutor::new(3, Vec::new()));
        RolapEngineBuilder::new("schema", "cube", permissive_dialect())
            .register_star("sales", star, measures)
            .build(executor, None::<Arc<dyn ExternalSegmentCache>>)
    }

    #[tokio::test]
    async fn unknown_star_is_rejected_without_spawning_a_load() {
        let engine = build_engine();
        let star = sales_star();
        let requests = vec![CellRequest::new(star.width(), "sum_amount", vec![(0, PredicateValue::Integer(1))])];
        let batch = Batcher::batch("missing", &star, &requests).into_iter().next().unwrap();
        let error = engine.load("missing", None, batch, engine.begin_execution()).await.unwrap_err();
        assert!(matches!(error, EngineError::UnknownStar(_)));
    }

    #[tokio::test]
    async fn generate_drill_through_sql_rejects_unregistered_stars() {
        let engine = build_engine();
        let result = engine.generate_drill_through_sql("missing", &[], &[], &[], true);
        assert!(matches!(result, Err(EngineError::UnknownStar(_))));
    }

    #[tokio::test]
    async fn get_cells_on_an_empty_request_list_returns_immediately() {
        let engine = build_engine();
        let results = engine.get_cells("sales", None, vec![]).await;
        assert!(results.is_empty());
    }
}
