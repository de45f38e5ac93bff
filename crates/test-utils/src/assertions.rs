// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! Custom assertion helpers for segment/SQL test coverage

use rolap_segment::{Cell, Segment, SegmentBody};

/// Assertion helpers over a loaded [`Segment`].
pub struct SegmentAssertions;

impl SegmentAssertions {
    /// Assert the segment reached `Loaded` and return its body for further
    /// inspection.
    pub fn assert_loaded(segment: &Segment) -> &SegmentBody {
        segment.body().unwrap_or_else(|| panic!("expected segment to be loaded, state was {:?}", segment.state))
    }

    /// Assert a segment's body chose the dense representation.
    pub fn assert_dense(segment: &Segment) {
        let body = Self::assert_loaded(segment);
        assert!(!body.is_sparse(), "expected a dense body, got sparse");
    }

    /// Assert a segment's body chose the sparse representation.
    pub fn assert_sparse(segment: &Segment) {
        let body = Self::assert_loaded(segment);
        assert!(body.is_sparse(), "expected a sparse body, got dense");
    }

    /// Assert the cell at `coords` holds the given numeric value.
    pub fn assert_cell_eq(segment: &Segment, coords: &[usize], expected: Cell) {
        let body = Self::assert_loaded(segment);
        let actual = body.get(coords);
        assert_eq!(actual, Some(expected), "cell at {coords:?} did not match");
    }

    /// Assert the cell at `coords` is unpopulated (absent from a sparse
    /// body, or `Cell::Null` in a dense one).
    pub fn assert_cell_absent_or_null(segment: &Segment, coords: &[usize]) {
        let body = Self::assert_loaded(segment);
        match body.get(coords) {
            None | Some(Cell::Null) => {}
            Some(other) => panic!("expected cell at {coords:?} to be absent or null, found {other:?}"),
        }
    }
}

/// Assert `sql` contains every needle, case-insensitively, in order of
/// appearance — not a full parser, just enough to pin down that a clause
/// made it into the generated statement without hard-coding whitespace.
pub fn assert_sql_contains_in_order(sql: &str, needles: &[&str]) {
    let haystack = sql.to_uppercase();
    let mut cursor = 0usize;
    for needle in needles {
        let needle_upper = needle.to_uppercase();
        match haystack[cursor..].find(&needle_upper) {
            Some(found_at) => cursor += found_at + needle_upper.len(),
            None => panic!("expected {needle:?} to appear in SQL after position {cursor}, got:\n{sql}"),
        }
    }
}

/// Count occurrences of `needle` in `haystack`, case-insensitively. Used to
/// assert a dialect without `allows_multiple_count_distinct` never gets two
/// `COUNT(DISTINCT ...)` clauses in one statement.
pub fn count_occurrences(haystack: &str, needle: &str) -> usize {
    let haystack = haystack.to_uppercase();
    let needle = needle.to_uppercase();
    if needle.is_empty() {
        return 0;
    }
    haystack.matches(&needle).count()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use rolap_bitkey::BitKey;
    use rolap_segment::{SegmentHeader, SegmentState};

    use super::*;

    fn loaded_segment(body: SegmentBody) -> Segment {
        let header = SegmentHeader::new("s", "c", "sales_fact", "amount", BitKey::empty(1), BTreeMap::new(), BTreeMap::new(), vec![]);
        Segment {
            header,
            axes: Vec::new(),
            state: SegmentState::Loaded(body),
        }
    }

    #[test]
    fn assert_dense_passes_for_dense_body() {
        let segment = loaded_segment(SegmentBody::Dense {
            axis_lengths: vec![1],
            cells: vec![Cell::Int(42)],
        });
        SegmentAssertions::assert_dense(&segment);
        SegmentAssertions::assert_cell_eq(&segment, &[0], Cell::Int(42));
    }

    #[test]
    #[should_panic(expected = "expected a dense body")]
    fn assert_dense_fails_for_sparse_body() {
        let segment = loaded_segment(SegmentBody::Sparse {
            axis_lengths: vec![10],
            cells: std::collections::HashMap::new(),
        });
        SegmentAssertions::assert_dense(&segment);
    }

    #[test]
    fn sql_contains_in_order_matches_clause_sequence() {
        assert_sql_contains_in_order(
            "SELECT region_id, SUM(amount) FROM sales_fact GROUP BY region_id",
            &["select", "from sales_fact", "group by"],
        );
    }

    #[test]
    #[should_panic(expected = "expected")]
    fn sql_contains_in_order_fails_on_wrong_sequence() {
        assert_sql_contains_in_order("SELECT * FROM sales_fact GROUP BY region_id", &["group by", "select"]);
    }

    #[test]
    fn count_occurrences_counts_case_insensitively() {
        assert_eq!(count_occurrences("COUNT(DISTINCT a), count(distinct b)", "count(distinct"), 2);
    }
}
