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

//! Frequent items sketch implementations.

use std::collections::HashSet;
use std::marker::PhantomData;

use crate::codec::SketchBytes;
use crate::codec::SketchSlice;
use crate::codec::assert::ensure_fully_consumed;
use crate::codec::assert::ensure_in_range;
use crate::codec::assert::ensure_preamble_longs_is;
use crate::codec::assert::ensure_serial_version_is;
use crate::codec::assert::insufficient_data;
use crate::codec::family::Family;
use crate::error::Error;
use crate::frequencies::DEFAULT_TOP_K;
use crate::frequencies::MAP_SLACK_FACTOR;
use crate::frequencies::MAX_TOP_K;
use crate::frequencies::MIN_TOP_K;
use crate::frequencies::serde::FrequentItemValue;
use crate::frequencies::serialization::*;
use crate::frequencies::space_saving::Counter;
use crate::frequencies::space_saving::SpaceSaving;

/// Error guarantees for frequent item queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ErrorType {
    /// Include items if upper bound exceeds threshold (no false negatives).
    NoFalseNegatives,
    /// Include items if lower bound exceeds threshold (no false positives).
    #[default]
    NoFalsePositives,
}

/// Result row for frequent item queries.
///
/// Each row includes an estimate and upper and lower bounds on the true frequency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row<T> {
    item: T,
    estimate: u64,
    upper_bound: u64,
    lower_bound: u64,
    seq: u64,
}

impl<T> Row<T> {
    /// Returns the item value.
    pub fn item(&self) -> &T {
        &self.item
    }

    /// Consumes the row and returns the item value.
    pub fn into_item(self) -> T {
        self.item
    }

    /// Returns the estimated frequency.
    pub fn estimate(&self) -> u64 {
        self.estimate
    }

    /// Returns the upper bound for the frequency.
    pub fn upper_bound(&self) -> u64 {
        self.upper_bound
    }

    /// Returns the guaranteed lower bound for the frequency.
    pub fn lower_bound(&self) -> u64 {
        self.lower_bound
    }
}

/// Frequent items sketch for generic item types.
///
/// The sketch tracks approximate item frequencies and can return estimates with
/// guaranteed upper and lower bounds.
///
/// See [`crate::frequencies`] for an overview and error guarantees.
#[derive(Debug, Clone)]
pub struct FrequentItemsSketch<T> {
    top_k: u32,
    stream_weight: u64,
    summary: SpaceSaving<T>,
}

impl<T: FrequentItemValue> FrequentItemsSketch<T> {
    /// Create a new builder for FrequentItemsSketch
    pub fn builder() -> FrequentItemsSketchBuilder<T> {
        FrequentItemsSketchBuilder::default()
    }

    /// Returns true if the sketch is empty.
    pub fn is_empty(&self) -> bool {
        self.summary.len() == 0
    }

    /// Returns the number of active items being tracked.
    pub fn num_active_items(&self) -> usize {
        self.summary.len()
    }

    /// Returns the configured number of top items.
    pub fn top_k(&self) -> u32 {
        self.top_k
    }

    /// Returns the maximum number of tracked items, `top_k * MAP_SLACK_FACTOR`.
    pub fn capacity(&self) -> usize {
        self.summary.capacity()
    }

    /// Returns the total weight of the stream.
    ///
    /// This is the sum of all counts passed to `update` and `update_with_count`.
    pub fn total_weight(&self) -> u64 {
        self.stream_weight
    }

    /// Returns the estimated frequency for an item.
    ///
    /// If the item is tracked, this is its upper bound. Otherwise it is zero.
    pub fn estimate(&self, item: &T) -> u64 {
        self.summary.get(item).map_or(0, |counter| counter.count)
    }

    /// Returns the guaranteed lower bound frequency for an item.
    ///
    /// If the item is not tracked, the lower bound is zero.
    pub fn lower_bound(&self, item: &T) -> u64 {
        self.summary
            .get(item)
            .map_or(0, |counter| counter.count - counter.error)
    }

    /// Returns the guaranteed upper bound frequency for an item.
    ///
    /// If the item is not tracked this is the largest count ever evicted.
    pub fn upper_bound(&self, item: &T) -> u64 {
        self.summary
            .get(item)
            .map_or(self.summary.floor(), |counter| counter.count)
    }

    /// Returns an upper bound on the maximum error of [`FrequentItemsSketch::estimate`]
    /// for any item.
    ///
    /// This is the maximum distance between the upper bound and the lower bound for any item.
    pub fn maximum_error(&self) -> u64 {
        self.summary.floor()
    }

    /// Updates the sketch with a count of one.
    ///
    /// # Errors
    ///
    /// See [`update_with_count`](Self::update_with_count).
    pub fn update(&mut self, item: T) -> Result<(), Error> {
        self.update_with_count(item, 1)
    }

    /// Updates the sketch with an item and count.
    ///
    /// A count of zero is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidParameter`](crate::error::ErrorKind::InvalidParameter) if the total
    /// weight or the item's count would overflow a `u64`. The sketch is left untouched.
    pub fn update_with_count(&mut self, item: T, count: u64) -> Result<(), Error> {
        if count == 0 {
            return Ok(());
        }
        let stream_weight = self.stream_weight.checked_add(count).ok_or_else(|| {
            Error::invalid_parameter(format!("adding {count} overflows the total weight"))
        })?;
        self.summary.add(item, count)?;
        self.stream_weight = stream_weight;
        Ok(())
    }

    /// Merges another sketch into this one.
    ///
    /// The merge never underestimates: the upper bound of every item stays at or above its
    /// true frequency in the union of both streams. The result is the same whichever sketch is
    /// merged into which; merged entries are ordered by their encoded bytes.
    ///
    /// # Errors
    ///
    /// Returns [`IncompatibleState`](crate::error::ErrorKind::IncompatibleState) if the
    /// sketches have different `top_k` or if a merged count overflows a `u64`. This sketch is
    /// left untouched.
    pub fn merge(&mut self, other: &Self) -> Result<(), Error> {
        if self.top_k != other.top_k {
            return Err(Error::incompatible(format!(
                "top_k mismatch: {} vs {}",
                self.top_k, other.top_k
            )));
        }
        if other.is_empty() {
            return Ok(());
        }
        if self.is_empty() {
            *self = other.clone();
            return Ok(());
        }
        let stream_weight = self
            .stream_weight
            .checked_add(other.stream_weight)
            .ok_or_else(|| Error::incompatible("merged total weight overflows u64"))?;
        self.summary.merge(&other.summary, encoded)?;
        self.stream_weight = stream_weight;
        Ok(())
    }

    /// Resets the sketch to an empty state.
    pub fn reset(&mut self) {
        self.summary.clear();
        self.stream_weight = 0;
    }

    /// Returns frequent items using the sketch maximum error as threshold.
    ///
    /// This is equivalent to `frequent_items_with_threshold(error_type, self.maximum_error())`.
    pub fn frequent_items(&self, error_type: ErrorType) -> Vec<Row<T>> {
        self.frequent_items_with_threshold(error_type, self.maximum_error())
    }

    /// Returns frequent items using a custom threshold.
    ///
    /// If `threshold` is less than `maximum_error`, `maximum_error` is used instead.
    ///
    /// For [`ErrorType::NoFalseNegatives`], items are included when `upper_bound > threshold`.
    /// For [`ErrorType::NoFalsePositives`], items are included when `lower_bound > threshold`.
    pub fn frequent_items_with_threshold(
        &self,
        error_type: ErrorType,
        threshold: u64,
    ) -> Vec<Row<T>> {
        let threshold = threshold.max(self.maximum_error());
        let rows = self.rows().filter(|row| match error_type {
            ErrorType::NoFalseNegatives => row.upper_bound > threshold,
            ErrorType::NoFalsePositives => row.lower_bound > threshold,
        });
        sorted(rows)
    }

    /// Returns the heaviest `top_k` items under the given error guarantee.
    ///
    /// - [`ErrorType::NoFalsePositives`]: items whose lower bound is strictly greater than the
    ///   `(top_k + 1)`-th largest upper bound, counting untracked items at
    ///   [`maximum_error`](Self::maximum_error). Every returned item is certainly among the top
    ///   `top_k`.
    /// - [`ErrorType::NoFalseNegatives`]: items whose upper bound is at least the `top_k`-th
    ///   largest lower bound. Every true top `top_k` item is returned.
    ///
    /// Rows are ordered by descending estimate. Ties follow first insertion, or the encoded
    /// item bytes once the sketch has absorbed a merge.
    pub fn top_k_items(&self, error_type: ErrorType) -> Vec<Row<T>> {
        let k = self.top_k as usize;
        match error_type {
            ErrorType::NoFalsePositives => {
                let mut uppers: Vec<u64> = self.rows().map(|row| row.upper_bound).collect();
                uppers.sort_unstable_by(|a, b| b.cmp(a));
                let cutoff = uppers
                    .get(k)
                    .copied()
                    .unwrap_or(0)
                    .max(self.summary.floor());
                let mut rows = sorted(self.rows().filter(|row| row.lower_bound > cutoff));
                rows.truncate(k);
                rows
            }
            ErrorType::NoFalseNegatives => {
                let mut lowers: Vec<u64> = self.rows().map(|row| row.lower_bound).collect();
                lowers.sort_unstable_by(|a, b| b.cmp(a));
                let cutoff = k
                    .checked_sub(1)
                    .and_then(|i| lowers.get(i).copied())
                    .unwrap_or(0);
                sorted(self.rows().filter(|row| row.upper_bound >= cutoff))
            }
        }
    }

    fn rows(&self) -> impl Iterator<Item = Row<T>> + '_ {
        self.summary.iter().map(|(item, counter)| to_row(item, counter))
    }

    /// Serializes this sketch into a byte vector.
    pub fn serialize(&self) -> Vec<u8> {
        let pre_longs = if self.is_empty() {
            PREAMBLE_LONGS_EMPTY
        } else {
            PREAMBLE_LONGS_NONEMPTY
        };
        let mut bytes = SketchBytes::with_capacity(
            pre_longs as usize * 8 + self.num_active_items() * 16,
        );
        bytes.write_u8(pre_longs);
        bytes.write_u8(SER_VER);
        bytes.write_u8(Family::FrequentItems.id());
        bytes.write_u8(if self.is_empty() { EMPTY_FLAG_MASK } else { 0 });
        bytes.write_u32_le(self.top_k);
        if self.is_empty() {
            return bytes.into_bytes();
        }

        bytes.write_u32_le(self.num_active_items() as u32);
        bytes.write_u32_le(0);
        bytes.write_u64_le(self.stream_weight);
        bytes.write_u64_le(self.summary.floor());
        let mut items = Vec::new();
        for (item, counter) in self.summary.iter() {
            bytes.write_u64_le(counter.count);
            bytes.write_u64_le(counter.error);
            item.serialize_value(&mut items);
        }
        bytes.write(&items);
        bytes.into_bytes()
    }

    /// Deserializes a sketch from bytes.
    ///
    /// # Errors
    ///
    /// Returns [`CorruptState`](crate::error::ErrorKind::CorruptState) if the bytes are not a
    /// valid frequent items image for item type `T`.
    pub fn deserialize(bytes: &[u8]) -> Result<Self, Error> {
        let mut cursor = SketchSlice::new(bytes);
        let pre_longs = cursor.read_u8().map_err(insufficient_data("pre_longs"))?;
        let serial_version = cursor.read_u8().map_err(insufficient_data("serial_version"))?;
        let family_id = cursor.read_u8().map_err(insufficient_data("family_id"))?;
        let flags = cursor.read_u8().map_err(insufficient_data("flags"))?;
        let top_k = cursor.read_u32_le().map_err(insufficient_data("top_k"))?;

        Family::FrequentItems.validate_id(family_id)?;
        ensure_serial_version_is(SER_VER, serial_version)?;
        ensure_in_range("top_k", MIN_TOP_K..=MAX_TOP_K, top_k)?;
        let capacity = top_k as usize * MAP_SLACK_FACTOR;

        if flags & EMPTY_FLAG_MASK != 0 {
            ensure_preamble_longs_is(PREAMBLE_LONGS_EMPTY, pre_longs)?;
            ensure_fully_consumed(&cursor)?;
            return Ok(Self::with_top_k(top_k));
        }
        ensure_preamble_longs_is(PREAMBLE_LONGS_NONEMPTY, pre_longs)?;

        let num_active = cursor
            .read_u32_le()
            .map_err(insufficient_data("num_active"))? as usize;
        ensure_in_range("num_active", 1..=capacity, num_active)?;
        cursor.read_u32_le().map_err(insufficient_data("unused"))?;
        let stream_weight = cursor
            .read_u64_le()
            .map_err(insufficient_data("stream_weight"))?;
        let floor = cursor.read_u64_le().map_err(insufficient_data("floor"))?;

        let mut counters = Vec::with_capacity(num_active.min(cursor.remaining() / 16));
        let mut guaranteed = 0u64;
        for _ in 0..num_active {
            let count = cursor.read_u64_le().map_err(insufficient_data("count"))?;
            let error = cursor.read_u64_le().map_err(insufficient_data("error"))?;
            if count == 0 || error > floor || floor > count {
                return Err(Error::deserial(format!(
                    "inconsistent counter: count {count}, error {error}, floor {floor}"
                )));
            }
            guaranteed = guaranteed.saturating_add(count - error);
            counters.push((count, error));
        }
        if guaranteed > stream_weight {
            return Err(Error::deserial(format!(
                "stream weight {stream_weight} is below the sum of lower bounds {guaranteed}"
            )));
        }

        let mut items = Vec::with_capacity(counters.len());
        let mut seen = HashSet::with_capacity(counters.len());
        let remaining = cursor.remaining();
        let tail = cursor
            .read_slice(remaining)
            .map_err(insufficient_data("items"))?;
        let mut offset = 0;
        for _ in 0..num_active {
            let (item, consumed) = T::deserialize_value(&tail[offset..])?;
            offset += consumed;
            if !seen.insert(item.clone()) {
                return Err(Error::deserial("duplicate item in frequent items image"));
            }
            items.push(item);
        }
        if offset != tail.len() {
            return Err(Error::deserial(format!(
                "{} trailing bytes after sketch image",
                tail.len() - offset
            )));
        }

        let entries = items
            .into_iter()
            .zip(counters)
            .map(|(item, (count, error))| (item, count, error));
        Ok(FrequentItemsSketch {
            top_k,
            stream_weight,
            summary: SpaceSaving::restore(capacity, floor, entries),
        })
    }

    fn with_top_k(top_k: u32) -> Self {
        FrequentItemsSketch {
            top_k,
            stream_weight: 0,
            summary: SpaceSaving::new(top_k as usize * MAP_SLACK_FACTOR),
        }
    }
}

fn to_row<T: Clone>(item: &T, counter: Counter) -> Row<T> {
    Row {
        item: item.clone(),
        estimate: counter.count,
        upper_bound: counter.count,
        lower_bound: counter.count - counter.error,
        seq: counter.seq,
    }
}

fn encoded<T: FrequentItemValue>(item: &T) -> Vec<u8> {
    let mut out = Vec::new();
    item.serialize_value(&mut out);
    out
}

/// Orders rows by descending estimate, ties by sequence.
fn sorted<T>(rows: impl Iterator<Item = Row<T>>) -> Vec<Row<T>> {
    let mut rows: Vec<Row<T>> = rows.collect();
    rows.sort_by(|a, b| b.estimate.cmp(&a.estimate).then(a.seq.cmp(&b.seq)));
    rows
}

/// Builder for FrequentItemsSketch
#[derive(Debug)]
pub struct FrequentItemsSketchBuilder<T> {
    top_k: u32,
    _item: PhantomData<T>,
}

impl<T> Default for FrequentItemsSketchBuilder<T> {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            _item: PhantomData,
        }
    }
}

impl<T: FrequentItemValue> FrequentItemsSketchBuilder<T> {
    /// Set the number of top items to track. Validated in [`build`](Self::build).
    pub fn top_k(mut self, top_k: u32) -> Self {
        self.top_k = top_k;
        self
    }

    /// Build the FrequentItemsSketch.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidParameter`](crate::error::ErrorKind::InvalidParameter) if `top_k` is
    /// not in `[MIN_TOP_K, MAX_TOP_K]`.
    pub fn build(self) -> Result<FrequentItemsSketch<T>, Error> {
        if !(MIN_TOP_K..=MAX_TOP_K).contains(&self.top_k) {
            return Err(Error::invalid_parameter(format!(
                "top_k must be in [{MIN_TOP_K}, {MAX_TOP_K}], got {}",
                self.top_k
            )));
        }
        Ok(FrequentItemsSketch::with_top_k(self.top_k))
    }
}
