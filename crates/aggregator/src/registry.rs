// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

use std::collections::HashMap;

use crate::aggregator::Aggregator;
use crate::builtin;

/// Lookup table of named aggregators, keyed case-insensitively.
#[derive(Debug, Clone)]
pub struct AggregatorRegistry {
    aggregators: HashMap<String, Aggregator>,
}

impl AggregatorRegistry {
    /// A registry pre-loaded with the builtin SUM/COUNT/MIN/MAX/AVG/COUNT_DISTINCT aggregators.
    pub fn new() -> Self {
        let mut aggregators = HashMap::new();
        for agg in builtin::all_aggregators() {
            aggregators.insert(agg.name.to_ascii_uppercase(), agg);
        }
        Self { aggregators }
    }

    pub fn get(&self, name: &str) -> Option<&Aggregator> {
        self.aggregators.get(&name.to_ascii_uppercase())
    }

    pub fn register(&mut self, aggregator: Aggregator) {
        self.aggregators.insert(aggregator.name.to_ascii_uppercase(), aggregator);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }
}

impl Default for AggregatorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_case_insensitive() {
        let registry = AggregatorRegistry::new();
        assert!(registry.get("sum").is_some());
        assert!(registry.get("SUM").is_some());
        assert!(registry.get("Sum").is_some());
    }

    #[test]
    fn unknown_name_is_absent() {
        let registry = AggregatorRegistry::new();
        assert!(!registry.contains("MEDIAN"));
    }
}
