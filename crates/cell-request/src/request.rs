// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Cell request
//!
//! `(measure, ordered sequence of (column, value))`, plus the
//! `extendedContext`/`drillThrough` flags and a slicer map from bit key to
//! compound predicate. The constrained-columns bit key is derived, not
//! stored, so it can never drift out of sync with `coordinates`/`slicer`.

use std::collections::HashMap;

use rolap_bitkey::BitKey;
use rolap_predicate::{CompoundPredicate, PredicateValue};

/// A single multidimensional cell lookup.
#[derive(Debug, Clone)]
pub struct CellRequest {
    /// Width of the star this request is against; every `BitKey` derived
    /// from this request shares it.
    pub star_width: usize,
    pub measure: String,
    pub coordinates: Vec<(usize, PredicateValue)>,
    pub extended_context: bool,
    pub drill_through: bool,
    /// Slicer compound predicates, keyed by the bit key of columns each
    /// one constrains.
    pub slicer: HashMap<BitKey, CompoundPredicate>,
}

impl CellRequest {
    pub fn new(star_width: usize, measure: impl Into<String>, coordinates: Vec<(usize, PredicateValue)>) -> Self {
        Self {
            star_width,
            measure: measure.into(),
            coordinates,
            extended_context: false,
            drill_through: false,
            slicer: HashMap::new(),
        }
    }

    pub fn with_slicer(mut self, bit_key: BitKey, predicate: CompoundPredicate) -> Self {
        self.slicer.insert(bit_key, predicate);
        self
    }

    pub fn extended_context(mut self) -> Self {
        self.extended_context = true;
        self
    }

    pub fn drill_through(mut self) -> Self {
        self.drill_through = true;
        self
    }

    /// Union of the columns named by `coordinates` and every slicer bit
    /// key.
    pub fn constrained_columns(&self) -> BitKey {
        let mut key = BitKey::empty(self.star_width);
        for &(bit_position, _) in &self.coordinates {
            key.set(bit_position);
        }
        for slicer_key in self.slicer.keys() {
            key = key.or(slicer_key);
        }
        key
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constrained_columns_unions_coordinates_and_slicer() {
        let request = CellRequest::new(8, "sales", vec![(1, PredicateValue::Integer(1))])
            .with_slicer(BitKey::from_positions(8, [3]), CompoundPredicate::tuple(8, vec![]));
        let bits: Vec<usize> = request.constrained_columns().iter_set_bits().collect();
        assert_eq!(bits, vec![1, 3]);
    }

    #[test]
    fn empty_request_has_no_constrained_columns() {
        let request = CellRequest::new(4, "sales", vec![]);
        assert!(request.constrained_columns().is_empty());
    }
}
