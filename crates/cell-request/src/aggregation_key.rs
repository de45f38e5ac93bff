// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Aggregation key
//!
//! `(star identity, constrained-columns bit key, sorted list of compound
//! predicates)` — the identity of a logical aggregation that may be
//! materialised by one or more segments. The predicate list is sorted by
//! [`CompoundPredicate::sort_key`] at construction so two keys built from
//! the same predicates in different orders still compare and hash equal.

use std::hash::{Hash, Hasher};

use rolap_bitkey::BitKey;
use rolap_predicate::CompoundPredicate;

#[derive(Debug, Clone)]
pub struct AggregationKey {
    pub star_id: String,
    pub constrained_columns: BitKey,
    pub compound_predicates: Vec<CompoundPredicate>,
}

impl AggregationKey {
    pub fn new(star_id: impl Into<String>, constrained_columns: BitKey, mut compound_predicates: Vec<CompoundPredicate>) -> Self {
        compound_predicates.sort_by_key(|p| p.sort_key());
        Self {
            star_id: star_id.into(),
            constrained_columns,
            compound_predicates,
        }
    }
}

impl PartialEq for AggregationKey {
    fn eq(&self, other: &Self) -> bool {
        self.star_id == other.star_id
            && self.constrained_columns == other.constrained_columns
            && self.compound_predicates.len() == other.compound_predicates.len()
            && self
                .compound_predicates
                .iter()
                .zip(&other.compound_predicates)
                .all(|(a, b)| a.equal_constraint(b))
    }
}

impl Eq for AggregationKey {}

impl Hash for AggregationKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.star_id.hash(state);
        self.constrained_columns.hash(state);
        self.compound_predicates.len().hash(state);
        for predicate in &self.compound_predicates {
            predicate.sort_key().hash(state);
        }
    }
}

#[cfg(test)]
mod tests {
    use rolap_predicate::{Column, ColumnPredicate, PredicateValue};
    use rolap_sql_ir::{ColumnRef, DataType};

    use super::*;

    fn column(pos: usize) -> Column {
        Column::new(pos, ColumnRef::new(format!("c{pos}")), DataType::Integer)
    }

    fn tuple(width: usize, pos: usize, value: i64) -> CompoundPredicate {
        CompoundPredicate::tuple(width, vec![ColumnPredicate::value(column(pos), PredicateValue::Integer(value))])
    }

    #[test]
    fn equal_regardless_of_predicate_construction_order() {
        let a = AggregationKey::new("sales", BitKey::from_positions(8, [1, 3]), vec![tuple(8, 1, 10), tuple(8, 3, 20)]);
        let b = AggregationKey::new("sales", BitKey::from_positions(8, [1, 3]), vec![tuple(8, 3, 20), tuple(8, 1, 10)]);
        assert_eq!(a, b);

        use std::collections::HashSet;
        let mut set = HashSet::new();
        set.insert(a);
        assert!(set.contains(&b));
    }

    #[test]
    fn differing_star_id_is_distinct() {
        let a = AggregationKey::new("sales", BitKey::empty(4), vec![]);
        let b = AggregationKey::new("inventory", BitKey::empty(4), vec![]);
        assert_ne!(a, b);
    }
}
