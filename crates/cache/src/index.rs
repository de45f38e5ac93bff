// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # In-memory segment index
//!
//! `(star id, optional session id) -> header -> slot`. `IndexMap` keeps
//! insertion order so a log of the index (or a deterministic test
//! assertion over `headers_for_star`) doesn't depend on `HashMap`'s
//! unspecified iteration order. Session partitioning is just a second key
//! component: when `enableSessionCaching` is off the session is always
//! `None` and every lookup shares the one partition.

use std::collections::HashMap;

use indexmap::IndexMap;
use rolap_segment::{Segment, SegmentHeader};
use tokio::sync::oneshot;

use crate::commands::{ExecutionId, LoadResult};

/// One reserved or resolved segment slot. `waiters` holds a reply channel
/// per execution currently blocked on this slot's load; they are drained
/// (one send each) the moment the slot resolves to `Loaded`/`Failed`.
pub struct Slot {
    pub segment: Segment,
    pub waiters: HashMap<ExecutionId, oneshot::Sender<LoadResult>>,
}

impl Slot {
    pub fn loading(header: SegmentHeader) -> Self {
        Self {
            segment: Segment::loading(header),
            waiters: HashMap::new(),
        }
    }

    /// Send `result` to every registered waiter, consuming them. A waiter
    /// whose receiver was already dropped (the caller gave up) is simply
    /// skipped.
    pub fn resolve_waiters(&mut self, result: LoadResult) {
        for (_, sender) in self.waiters.drain() {
            let _ = sender.send(result.clone());
        }
    }
}

#[derive(Default)]
pub struct SegmentIndex {
    partitions: HashMap<(String, Option<String>), IndexMap<SegmentHeader, Slot>>,
}

impl SegmentIndex {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(star_id: &str, session: &Option<String>) -> (String, Option<String>) {
        (star_id.to_string(), session.clone())
    }

    pub fn get(&self, star_id: &str, session: &Option<String>, header: &SegmentHeader) -> Option<&Slot> {
        self.partitions.get(&Self::key(star_id, session))?.get(header)
    }

    pub fn get_mut(&mut self, star_id: &str, session: &Option<String>, header: &SegmentHeader) -> Option<&mut Slot> {
        self.partitions.get_mut(&Self::key(star_id, session))?.get_mut(header)
    }

    /// Reserve a `Loading` slot for `header` if one doesn't already exist.
    /// Returns `true` if this call created the reservation (the caller
    /// must now actually issue the load); `false` if a slot already
    /// existed (loading or loaded) and the caller should instead register
    /// as a waiter or read the loaded body directly.
    pub fn reserve(&mut self, star_id: &str, session: &Option<String>, header: SegmentHeader) -> bool {
        let partition = self.partitions.entry(Self::key(star_id, session)).or_default();
        if partition.contains_key(&header) {
            return false;
        }
        partition.insert(header.clone(), Slot::loading(header));
        true
    }

    pub fn remove(&mut self, star_id: &str, session: &Option<String>, header: &SegmentHeader) -> Option<Slot> {
        self.partitions.get_mut(&Self::key(star_id, session))?.shift_remove(header)
    }

    pub fn headers_for_star(&self, star_id: &str, session: &Option<String>) -> Vec<SegmentHeader> {
        self.partitions
            .get(&Self::key(star_id, session))
            .map(|partition| partition.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn loaded_segments(&self, star_id: &str, session: &Option<String>) -> Vec<(&SegmentHeader, &Segment)> {
        self.partitions
            .get(&Self::key(star_id, session))
            .map(|partition| partition.iter().filter(|(_, slot)| slot.segment.is_loaded()).map(|(h, s)| (h, &s.segment)).collect())
            .unwrap_or_default()
    }

    /// Remove every slot in every partition of `star_id` whose bit key
    /// intersects `bit_key` (an empty `bit_key` matches every slot, i.e.
    /// "flush the whole star"). Loading slots are resolved with
    /// `LoadResult::Stale` before being dropped. Returns the headers
    /// actually flushed, so the caller can also drop their external-cache
    /// copies (spec §4.5: Flush "asks external cache workers to drop their
    /// copies").
    pub fn flush_star(&mut self, star_id: &str, bit_key: &rolap_bitkey::BitKey) -> Vec<SegmentHeader> {
        let mut flushed = Vec::new();
        for ((partition_star, _), partition) in self.partitions.iter_mut() {
            if partition_star != star_id {
                continue;
            }
            let to_remove: Vec<SegmentHeader> = partition
                .keys()
                .filter(|header| bit_key.is_empty() || !header.bit_key.is_disjoint(bit_key))
                .cloned()
                .collect();
            for header in to_remove {
                if let Some(mut slot) = partition.shift_remove(&header) {
                    slot.resolve_waiters(LoadResult::Stale);
                    flushed.push(header);
                }
            }
        }
        flushed
    }
}
