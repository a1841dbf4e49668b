// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! Capacity-bounded space-saving summary.
//!
//! Every retained item has a `count` (an upper bound on its true frequency) and an `error`
//! (how much of `count` may be overcount), so `count - error` is a lower bound. Items are
//! ordered twice: by count for eviction, where ties evict the highest sequence number, and by
//! sequence for iteration and tie-breaking in query results.
//!
//! Sequence numbers follow first insertion while a summary is fed from a single stream. A merge
//! renumbers every entry by a caller-supplied item key, so the merged summary does not depend
//! on which side was folded into which.
//!
//! `floor` is the largest count ever evicted. Any item not retained has true frequency at most
//! `floor`, and every retained count is at least `floor`.

use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::collections::HashMap;
use std::hash::Hash;

use log::trace;

use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct Counter {
    pub count: u64,
    pub error: u64,
    pub seq: u64,
}

impl Counter {
    fn eviction_key(&self) -> (u64, Reverse<u64>) {
        (self.count, Reverse(self.seq))
    }

    fn raised_by(&self, count: u64, error: u64) -> Option<(u64, u64)> {
        Some((self.count.checked_add(count)?, self.error.checked_add(error)?))
    }
}

#[derive(Debug, Clone)]
pub(super) struct SpaceSaving<T> {
    capacity: usize,
    floor: u64,
    next_seq: u64,
    counters: HashMap<T, Counter>,
    by_count: BTreeSet<(u64, Reverse<u64>)>,
    by_seq: BTreeMap<u64, T>,
}

impl<T: Eq + Hash + Clone> SpaceSaving<T> {
    pub fn new(capacity: usize) -> Self {
        debug_assert!(capacity > 0);
        Self {
            capacity,
            floor: 0,
            next_seq: 0,
            counters: HashMap::new(),
            by_count: BTreeSet::new(),
            by_seq: BTreeMap::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn floor(&self) -> u64 {
        self.floor
    }

    pub fn len(&self) -> usize {
        self.counters.len()
    }

    pub fn get(&self, item: &T) -> Option<Counter> {
        self.counters.get(item).copied()
    }

    /// Iterates items with their counters in sequence order.
    pub fn iter(&self) -> impl Iterator<Item = (&T, Counter)> + '_ {
        self.by_seq
            .values()
            .filter_map(|item| self.counters.get(item).map(|counter| (item, *counter)))
    }

    /// Adds `count` occurrences of `item`.
    ///
    /// If the item is absent and the summary is full, the minimum entry is evicted and the
    /// newcomer starts from its count, which becomes the newcomer's error. Fails without
    /// touching the summary if the new count does not fit in a `u64`.
    pub fn add(&mut self, item: T, count: u64) -> Result<(), Error> {
        let overflow =
            || Error::invalid_parameter(format!("adding {count} overflows an item count"));
        if let Some(counter) = self.counters.get_mut(&item) {
            let total = counter.count.checked_add(count).ok_or_else(overflow)?;
            self.by_count.remove(&counter.eviction_key());
            counter.count = total;
            self.by_count.insert(counter.eviction_key());
            return Ok(());
        }
        let full = self.counters.len() >= self.capacity;
        let base = match self.by_count.first() {
            Some((min, _)) if full => *min,
            _ => 0,
        };
        let total = base.checked_add(count).ok_or_else(overflow)?;
        if full {
            self.evict_min();
        }
        self.insert_new(item, total, base);
        Ok(())
    }

    /// Inserts an absent item without checking capacity.
    fn insert_new(&mut self, item: T, count: u64, error: u64) {
        debug_assert!(!self.counters.contains_key(&item));
        let counter = Counter {
            count,
            error,
            seq: self.next_seq,
        };
        self.next_seq += 1;
        self.by_count.insert(counter.eviction_key());
        self.by_seq.insert(counter.seq, item.clone());
        self.counters.insert(item, counter);
    }

    /// Folds `other` into this summary.
    ///
    /// Shared items add counts and errors. Items on one side only are raised by the other
    /// side's floor, since they may have been seen there up to that many times. The merged
    /// entries are renumbered in ascending `sort_key` order, then the capacity bound is
    /// restored by evicting minimum entries. Fails without touching the summary if a count
    /// overflows.
    pub fn merge<K: Ord>(
        &mut self,
        other: &Self,
        sort_key: impl Fn(&T) -> K,
    ) -> Result<(), Error> {
        let overflow = || Error::incompatible("merged counts overflow u64");
        let floor = self.floor.checked_add(other.floor).ok_or_else(overflow)?;

        let mut entries = Vec::with_capacity(self.len() + other.len());
        for (item, ours) in self.iter() {
            let (count, error) = match other.get(item) {
                Some(theirs) => (theirs.count, theirs.error),
                None => (other.floor, other.floor),
            };
            let (count, error) = ours.raised_by(count, error).ok_or_else(overflow)?;
            entries.push((item.clone(), count, error));
        }
        for (item, theirs) in other.iter() {
            if !self.counters.contains_key(item) {
                let (count, error) = theirs
                    .raised_by(self.floor, self.floor)
                    .ok_or_else(overflow)?;
                entries.push((item.clone(), count, error));
            }
        }
        entries.sort_by_cached_key(|(item, _, _)| sort_key(item));

        let mut merged = Self::restore(self.capacity, floor, entries);
        while merged.len() > merged.capacity {
            merged.evict_min();
        }
        *self = merged;
        Ok(())
    }

    /// Removes the entry with the smallest count, the highest sequence on ties.
    fn evict_min(&mut self) {
        let Some((count, Reverse(seq))) = self.by_count.pop_first() else {
            return;
        };
        if let Some(item) = self.by_seq.remove(&seq) {
            self.counters.remove(&item);
        }
        self.floor = self.floor.max(count);
        trace!("space-saving summary evicted entry with count {count}, floor {}", self.floor);
    }

    /// Restores a summary from deserialized entries, given in sequence order.
    pub fn restore(
        capacity: usize,
        floor: u64,
        entries: impl IntoIterator<Item = (T, u64, u64)>,
    ) -> Self {
        let mut summary = Self::new(capacity);
        summary.floor = floor;
        for (item, count, error) in entries {
            summary.insert_new(item, count, error);
        }
        summary
    }

    pub fn clear(&mut self) {
        *self = Self::new(self.capacity);
    }
}
