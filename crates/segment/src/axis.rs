// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Segment axes
//!
//! One [`SegmentAxis`] per constrained column of a loaded segment: the
//! sorted, deduplicated set of distinct values the SQL result actually
//! contained, plus a key→offset lookup the loader uses to place a row's
//! measure value in the body (dense row-major or sparse coordinate map).

use std::cmp::Ordering;

use rolap_predicate::PredicateValue;

/// The distinct keys observed for one constrained column, in the
/// predicate algebra's host-neutral order (NULL sorts lowest).
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentAxis {
    keys: Vec<PredicateValue>,
}

impl SegmentAxis {
    /// Build an axis from the (possibly unsorted, possibly duplicated) set
    /// of keys observed for a column while ingesting SQL rows.
    pub fn new(mut keys: Vec<PredicateValue>) -> Self {
        keys.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
        keys.dedup_by(|a, b| a == b);
        Self { keys }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn keys(&self) -> &[PredicateValue] {
        &self.keys
    }

    pub fn has_null(&self) -> bool {
        self.keys.first().is_some_and(PredicateValue::is_null)
    }

    /// The row-major offset of `value` along this axis, if it was
    /// observed.
    pub fn offset_of(&self, value: &PredicateValue) -> Option<usize> {
        self.keys
            .binary_search_by(|probe| probe.partial_cmp(value).unwrap_or(Ordering::Equal))
            .ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sorts_and_dedups_keys() {
        let axis = SegmentAxis::new(vec![
            PredicateValue::Integer(3),
            PredicateValue::Integer(1),
            PredicateValue::Integer(3),
            PredicateValue::Null,
        ]);
        assert_eq!(axis.len(), 3);
        assert!(axis.has_null());
        assert_eq!(axis.offset_of(&PredicateValue::Integer(1)), Some(1));
    }

    #[test]
    fn offset_of_missing_value_is_none() {
        let axis = SegmentAxis::new(vec![PredicateValue::Integer(1)]);
        assert_eq!(axis.offset_of(&PredicateValue::Integer(99)), None);
    }
}
