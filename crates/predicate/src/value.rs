// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Predicate values
//!
//! A host-neutral ordering over the values a column predicate can hold.
//! `NULL` sorts lowest, matching the effective order most backing
//! databases use when NULLs are asked to participate in a comparison —
//! this is the comparator `evaluate` and `toSql`'s deterministic value
//! ordering both rely on.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PredicateValue {
    Null,
    Integer(i64),
    Float(f64),
    Text(String),
}

impl PredicateValue {
    pub fn is_null(&self) -> bool {
        matches!(self, PredicateValue::Null)
    }
}

impl PartialOrd for PredicateValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        use PredicateValue::*;
        Some(match (self, other) {
            (Null, Null) => Ordering::Equal,
            (Null, _) => Ordering::Less,
            (_, Null) => Ordering::Greater,
            (Integer(a), Integer(b)) => a.cmp(b),
            (Integer(a), Float(b)) => (*a as f64).partial_cmp(b)?,
            (Float(a), Integer(b)) => a.partial_cmp(&(*b as f64))?,
            (Float(a), Float(b)) => a.partial_cmp(b)?,
            (Text(a), Text(b)) => a.cmp(b),
            // Cross numeric/text comparisons never arise for a well-typed
            // column; treat them as incomparable rather than panicking.
            _ => return None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_sorts_lowest() {
        let mut values = vec![
            PredicateValue::Integer(5),
            PredicateValue::Null,
            PredicateValue::Integer(-3),
        ];
        values.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(values[0], PredicateValue::Null);
    }
}
