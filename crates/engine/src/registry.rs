// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Star and measure registration
//!
//! `rolap-schema::Star` names columns and candidate AggStars, but nothing
//! below this crate owns the mapping a cell request's `measure: String`
//! (e.g. `"sum_amount"`) needs: which star column it aggregates and which
//! [`Aggregator`] to apply. A [`MeasureDef`] is that mapping, one per
//! measure a cube exposes; [`StarRegistry`] holds every star and its
//! measures keyed by star id, the same identifier `rolap-cache`'s
//! `CacheHandle` already uses.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use rolap_aggregator::Aggregator;
use rolap_bitkey::BitKey;
use rolap_schema::Star;

/// One named measure: which star column it reads and how to aggregate it.
#[derive(Debug, Clone)]
pub struct MeasureDef {
    pub id: String,
    pub column_bit_position: usize,
    pub aggregator: Aggregator,
    /// For a `COUNT DISTINCT` measure, the bit key of levels its uniqueness
    /// computation stays safe to roll up across (see
    /// `rolap_query_plan::matcher::DistinctMeasureConstraint`). Ignored for
    /// non-distinct aggregators.
    pub rollable_level_bit_key: Option<BitKey>,
}

impl MeasureDef {
    pub fn new(id: impl Into<String>, column_bit_position: usize, aggregator: Aggregator) -> Self {
        Self {
            id: id.into(),
            column_bit_position,
            aggregator,
            rollable_level_bit_key: None,
        }
    }

    pub fn with_rollable_level_bit_key(mut self, bit_key: BitKey) -> Self {
        self.rollable_level_bit_key = Some(bit_key);
        self
    }
}

/// A registered star plus its measure catalog.
pub(crate) struct StarEntry {
    pub star: Star,
    pub measures: HashMap<String, MeasureDef>,
}

/// Every star `RolapEngine::register_star` has accepted, keyed by star id.
/// Reads happen on every batch a load spawns (off the cache actor's own
/// task, see `rolap_cache::actor::CacheActor::spawn_load`); writes only
/// happen at registration time, so a `RwLock` never meaningfully
/// contends.
#[derive(Default)]
pub(crate) struct StarRegistry {
    entries: RwLock<HashMap<String, Arc<StarEntry>>>,
}

impl StarRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, star_id: impl Into<String>, star: Star, measures: Vec<MeasureDef>) {
        let measures = measures.into_iter().map(|m| (m.id.clone(), m)).collect();
        let entry = Arc::new(StarEntry { star, measures });
        self.entries.write().expect("star registry poisoned").insert(star_id.into(), entry);
    }

    pub fn get(&self, star_id: &str) -> Option<Arc<StarEntry>> {
        self.entries.read().expect("star registry poisoned").get(star_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use rolap_aggregator::{AggregatorKind, RollupStrategy};
    use rolap_sql_ir::DataType;

    use super::*;

    #[test]
    fn registered_star_is_retrievable_by_id() {
        let registry = StarRegistry::new();
        let star = Star::new("sales_fact", vec![]);
        let measure = MeasureDef::new("sum_amount", 2, Aggregator::new("SUM", AggregatorKind::Sum, DataType::Decimal, RollupStrategy::Direct));
        registry.register("sales", star, vec![measure]);

        let entry = registry.get("sales").expect("registered star should be retrievable");
        assert!(entry.measures.contains_key("sum_amount"));
        assert!(registry.get("missing").is_none());
    }
}
