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

//! Retained hash set of a theta sketch.
//!
//! The set keeps at most `k = 2^lg_nom_size` hashes, all strictly below theta. Inserting a
//! hash that pushes the set above `k` evicts the largest retained hash, which becomes the new
//! theta. The state is therefore always "the k smallest distinct hashes seen, and theta equal
//! to the next one", independent of the order in which hashes arrived.

use std::collections::BTreeSet;
use std::hash::Hash;
use std::hash::Hasher;

use crate::hash::MurmurHash3X64128;

/// Theta value meaning "sampling probability 1.0": the largest 63-bit hash.
pub(crate) const MAX_THETA: u64 = i64::MAX as u64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct ThetaHashTable {
    lg_nom_size: u8,
    seed: u64,
    theta: u64,
    entries: BTreeSet<u64>,
}

impl ThetaHashTable {
    pub fn new(lg_nom_size: u8, seed: u64) -> Self {
        Self {
            lg_nom_size,
            seed,
            theta: MAX_THETA,
            entries: BTreeSet::new(),
        }
    }

    /// Rebuilds a table from validated serialized parts.
    pub fn from_parts(lg_nom_size: u8, seed: u64, theta: u64, hashes: Vec<u64>) -> Self {
        debug_assert!(hashes.iter().all(|&h| h != 0 && h < theta));
        debug_assert!(hashes.len() <= 1 << lg_nom_size);
        Self {
            lg_nom_size,
            seed,
            theta,
            entries: hashes.into_iter().collect(),
        }
    }

    /// Hashes `value` and returns the hash, or zero if it is screened out by theta.
    pub fn hash_and_screen<T: Hash>(&self, value: T) -> u64 {
        let mut hasher = MurmurHash3X64128::with_seed(self.seed);
        value.hash(&mut hasher);
        self.screen(hasher.finish() >> 1)
    }

    /// Hashes raw bytes and returns the hash, or zero if it is screened out by theta.
    pub fn hash_bytes_and_screen(&self, bytes: &[u8]) -> u64 {
        let mut hasher = MurmurHash3X64128::with_seed(self.seed);
        hasher.write(bytes);
        self.screen(hasher.finish() >> 1)
    }

    fn screen(&self, hash: u64) -> u64 {
        if hash >= self.theta { 0 } else { hash }
    }

    /// Inserts a hash below theta, lowering theta if the set exceeds its nominal size.
    ///
    /// Returns true if the hash was newly retained.
    pub fn try_insert(&mut self, hash: u64) -> bool {
        if hash == 0 || hash >= self.theta || !self.entries.insert(hash) {
            return false;
        }
        if self.entries.len() > self.nominal_size() {
            if let Some(largest) = self.entries.pop_last() {
                self.theta = largest;
            }
            return self.entries.contains(&hash);
        }
        true
    }

    /// Lowers theta to `theta` (never raises it) and drops hashes at or above it.
    pub fn lower_theta(&mut self, theta: u64) {
        if theta < self.theta {
            self.theta = theta;
            drop(self.entries.split_off(&theta));
        }
    }

    pub fn contains(&self, hash: u64) -> bool {
        self.entries.contains(&hash)
    }

    pub fn theta(&self) -> u64 {
        self.theta
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn lg_nom_size(&self) -> u8 {
        self.lg_nom_size
    }

    pub fn nominal_size(&self) -> usize {
        1 << self.lg_nom_size
    }

    pub fn num_entries(&self) -> usize {
        self.entries.len()
    }

    /// An empty table has seen nothing: no retained hashes and theta untouched.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.theta == MAX_THETA
    }

    pub fn reset(&mut self) {
        self.theta = MAX_THETA;
        self.entries.clear();
    }

    /// Iterates retained hashes in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = u64> + '_ {
        self.entries.iter().copied()
    }
}
