// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Segment
//!
//! A segment's header plus its (eventual) body. States move strictly
//! `Loading -> {Loaded, Failed}`, never backwards — the cache manager is
//! the only component allowed to flip a segment's state (see
//! `rolap-cache`).

use crate::axis::SegmentAxis;
use crate::body::SegmentBody;
use crate::header::SegmentHeader;

/// A segment's lifecycle state. A loaded segment's body is immutable; a
/// failed segment carries the error that caused the transition and is
/// removed from the index (see `rolap-cache::index`).
#[derive(Debug, Clone)]
pub enum SegmentState {
    Loading,
    Loaded(SegmentBody),
    Failed(String),
}

/// A header, its axes (one per constrained column, in bit-position order),
/// and its current state.
#[derive(Debug, Clone)]
pub struct Segment {
    pub header: SegmentHeader,
    pub axes: Vec<SegmentAxis>,
    pub state: SegmentState,
}

impl Segment {
    pub fn loading(header: SegmentHeader) -> Self {
        Self {
            header,
            axes: Vec::new(),
            state: SegmentState::Loading,
        }
    }

    pub fn loaded(header: SegmentHeader, axes: Vec<SegmentAxis>, body: SegmentBody) -> Self {
        Self {
            header,
            axes,
            state: SegmentState::Loaded(body),
        }
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self.state, SegmentState::Loaded(_))
    }

    pub fn body(&self) -> Option<&SegmentBody> {
        match &self.state {
            SegmentState::Loaded(body) => Some(body),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use rolap_bitkey::BitKey;

    use super::*;

    #[test]
    fn loading_segment_has_no_body() {
        let header = SegmentHeader::new("s", "c", "fact", "m", BitKey::empty(2), BTreeMap::new(), BTreeMap::new(), vec![]);
        let segment = Segment::loading(header);
        assert!(!segment.is_loaded());
        assert!(segment.body().is_none());
    }
}
