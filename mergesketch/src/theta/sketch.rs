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

//! Theta sketch implementation
//!
//! This module provides [`ThetaSketch`], a sketch for distinct counting that supports union,
//! intersection and set difference.

use std::hash::Hash;

use crate::codec::SketchBytes;
use crate::codec::SketchSlice;
use crate::codec::assert::ensure_fully_consumed;
use crate::codec::assert::ensure_in_range;
use crate::codec::assert::ensure_preamble_longs_is;
use crate::codec::assert::ensure_serial_version_is;
use crate::codec::assert::insufficient_data;
use crate::codec::family::Family;
use crate::common::NumStdDev;
use crate::common::normal_bounds;
use crate::error::Error;
use crate::hash::DEFAULT_UPDATE_SEED;
use crate::hash::compute_seed_hash;
use crate::theta::DEFAULT_LG_K;
use crate::theta::MAX_LG_K;
use crate::theta::MIN_LG_K;
use crate::theta::hash_table::MAX_THETA;
use crate::theta::hash_table::ThetaHashTable;
use crate::theta::serialization::*;

/// Mutable theta sketch for building from input data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThetaSketch {
    table: ThetaHashTable,
    seed_hash: u16,
}

impl ThetaSketch {
    /// Create a new builder for ThetaSketch
    pub fn builder() -> ThetaSketchBuilder {
        ThetaSketchBuilder::default()
    }

    /// Update the sketch with a hashable value
    pub fn update<T: Hash>(&mut self, value: T) {
        let hash = self.table.hash_and_screen(value);
        if hash != 0 {
            self.table.try_insert(hash);
        }
    }

    /// Update the sketch with raw bytes.
    ///
    /// Unlike `update(&[u8])`, which goes through [`Hash`] and so also hashes the slice
    /// length, this hashes exactly the given bytes.
    pub fn update_bytes(&mut self, bytes: &[u8]) {
        let hash = self.table.hash_bytes_and_screen(bytes);
        if hash != 0 {
            self.table.try_insert(hash);
        }
    }

    /// Update the sketch with a f64 value
    pub fn update_f64(&mut self, value: f64) {
        self.update(canonical_double(value));
    }

    /// Update the sketch with a f32 value
    pub fn update_f32(&mut self, value: f32) {
        self.update_f64(value as f64);
    }

    /// Return cardinality estimate
    pub fn estimate(&self) -> f64 {
        if self.is_empty() {
            return 0.0;
        }
        self.num_retained() as f64 / self.theta()
    }

    /// Returns the approximate lower error bound at the given number of standard deviations.
    ///
    /// Never below the number of retained hashes, and equal to the estimate in exact mode.
    pub fn lower_bound(&self, num_std_dev: NumStdDev) -> f64 {
        self.bounds(num_std_dev).0
    }

    /// Returns the approximate upper error bound at the given number of standard deviations.
    pub fn upper_bound(&self, num_std_dev: NumStdDev) -> f64 {
        self.bounds(num_std_dev).1
    }

    fn bounds(&self, num_std_dev: NumStdDev) -> (f64, f64) {
        let estimate = self.estimate();
        if !self.is_estimation_mode() {
            return (estimate, estimate);
        }
        let retained = self.num_retained() as f64;
        let p = self.theta();
        let std_dev = (retained * (1.0 - p)).sqrt() / p;
        normal_bounds(estimate, std_dev, num_std_dev, retained)
    }

    /// Return theta as a fraction (0.0 to 1.0)
    pub fn theta(&self) -> f64 {
        self.table.theta() as f64 / MAX_THETA as f64
    }

    /// Return theta as u64
    pub fn theta64(&self) -> u64 {
        self.table.theta()
    }

    /// Check if sketch is empty
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Check if sketch is in estimation mode
    pub fn is_estimation_mode(&self) -> bool {
        self.table.theta() < MAX_THETA
    }

    /// Return number of retained entries
    pub fn num_retained(&self) -> usize {
        self.table.num_entries()
    }

    /// Return lg_k
    pub fn lg_k(&self) -> u8 {
        self.table.lg_nom_size()
    }

    /// Return the hash seed
    pub fn seed(&self) -> u64 {
        self.table.seed()
    }

    /// Reset the sketch to empty state
    pub fn reset(&mut self) {
        self.table.reset();
    }

    /// Return iterator over retained hash values in ascending order
    pub fn iter(&self) -> impl Iterator<Item = u64> + '_ {
        self.table.iter()
    }

    /// Folds `other` into this sketch (set union).
    ///
    /// The result is identical whatever the order or grouping of merges.
    ///
    /// # Errors
    ///
    /// Returns [`IncompatibleState`](crate::error::ErrorKind::IncompatibleState) if the
    /// sketches use different seeds or different `lg_k`. This sketch is left untouched.
    pub fn merge(&mut self, other: &ThetaSketch) -> Result<(), Error> {
        self.ensure_same_seed(other)?;
        if self.lg_k() != other.lg_k() {
            return Err(Error::incompatible(format!(
                "lg_k mismatch: {} vs {}",
                self.lg_k(),
                other.lg_k()
            )));
        }
        self.table.lower_theta(other.table.theta());
        for hash in other.iter() {
            self.table.try_insert(hash);
        }
        Ok(())
    }

    /// Returns a sketch of the values seen by both sketches.
    ///
    /// # Errors
    ///
    /// Returns [`IncompatibleState`](crate::error::ErrorKind::IncompatibleState) if the seeds
    /// differ.
    pub fn intersect(&self, other: &ThetaSketch) -> Result<ThetaSketch, Error> {
        self.ensure_same_seed(other)?;
        let theta = self.table.theta().min(other.table.theta());
        let hashes = self
            .iter()
            .filter(|&hash| hash < theta && other.table.contains(hash))
            .collect();
        Ok(self.with_retained(theta, hashes))
    }

    /// Returns a sketch of the values seen by this sketch but not by `other`.
    ///
    /// # Errors
    ///
    /// Returns [`IncompatibleState`](crate::error::ErrorKind::IncompatibleState) if the seeds
    /// differ.
    pub fn a_not_b(&self, other: &ThetaSketch) -> Result<ThetaSketch, Error> {
        self.ensure_same_seed(other)?;
        let theta = self.table.theta().min(other.table.theta());
        let hashes = self
            .iter()
            .filter(|&hash| hash < theta && !other.table.contains(hash))
            .collect();
        Ok(self.with_retained(theta, hashes))
    }

    fn ensure_same_seed(&self, other: &ThetaSketch) -> Result<(), Error> {
        if self.seed() == other.seed() {
            Ok(())
        } else {
            Err(Error::incompatible(format!(
                "seed mismatch: {} vs {}",
                self.seed(),
                other.seed()
            )))
        }
    }

    fn with_retained(&self, theta: u64, hashes: Vec<u64>) -> ThetaSketch {
        ThetaSketch {
            table: ThetaHashTable::from_parts(self.lg_k(), self.seed(), theta, hashes),
            seed_hash: self.seed_hash,
        }
    }

    /// Serializes the sketch to its compact, ordered byte form.
    pub fn serialize(&self) -> Vec<u8> {
        let empty = self.is_empty();
        let estimation = self.is_estimation_mode();
        let pre_longs = if empty {
            PREAMBLE_LONGS_EMPTY
        } else if estimation {
            PREAMBLE_LONGS_ESTIMATION
        } else {
            PREAMBLE_LONGS_EXACT
        };
        let mut flags = FLAG_READ_ONLY | FLAG_COMPACT | FLAG_ORDERED;
        if empty {
            flags |= FLAG_EMPTY;
        }

        let capacity = 8 * (pre_longs as usize + self.num_retained());
        let mut bytes = SketchBytes::with_capacity(capacity);
        bytes.write_u8(pre_longs);
        bytes.write_u8(SERIAL_VERSION);
        bytes.write_u8(Family::Theta.id());
        bytes.write_u8(self.lg_k());
        bytes.write_u8(0);
        bytes.write_u8(flags);
        bytes.write_u16_le(self.seed_hash);
        if empty {
            return bytes.into_bytes();
        }

        bytes.write_u32_le(self.num_retained() as u32);
        bytes.write_f32_le(SAMPLING_PROBABILITY);
        if estimation {
            bytes.write_u64_le(self.table.theta());
        }
        for hash in self.iter() {
            bytes.write_u64_le(hash);
        }
        bytes.into_bytes()
    }

    /// Deserializes a sketch built with `seed` from bytes.
    ///
    /// # Errors
    ///
    /// Returns [`CorruptState`](crate::error::ErrorKind::CorruptState) if the bytes are not a
    /// valid compact theta image, and
    /// [`IncompatibleState`](crate::error::ErrorKind::IncompatibleState) if the image was built
    /// with a different seed.
    pub fn deserialize(bytes: &[u8], seed: u64) -> Result<Self, Error> {
        let expected_seed_hash = compute_seed_hash(seed)?;
        let mut cursor = SketchSlice::new(bytes);
        let pre_longs = cursor.read_u8().map_err(insufficient_data("pre_longs"))?;
        let serial_version = cursor.read_u8().map_err(insufficient_data("serial_version"))?;
        let family_id = cursor.read_u8().map_err(insufficient_data("family_id"))?;
        let lg_k = cursor.read_u8().map_err(insufficient_data("lg_k"))?;
        cursor.read_u8().map_err(insufficient_data("unused"))?;
        let flags = cursor.read_u8().map_err(insufficient_data("flags"))?;
        let seed_hash = cursor.read_u16_le().map_err(insufficient_data("seed_hash"))?;

        Family::Theta.validate_id(family_id)?;
        ensure_serial_version_is(SERIAL_VERSION, serial_version)?;
        ensure_in_range("lg_k", MIN_LG_K..=MAX_LG_K, lg_k)?;
        if flags & FLAG_COMPACT == 0 {
            return Err(Error::deserial("theta image is not in compact form"));
        }
        if seed_hash != expected_seed_hash {
            return Err(Error::seed_hash_mismatch(expected_seed_hash, seed_hash));
        }

        if flags & FLAG_EMPTY != 0 {
            ensure_preamble_longs_is(PREAMBLE_LONGS_EMPTY, pre_longs)?;
            ensure_fully_consumed(&cursor)?;
            return Ok(ThetaSketch {
                table: ThetaHashTable::new(lg_k, seed),
                seed_hash,
            });
        }

        let estimation = match pre_longs {
            PREAMBLE_LONGS_EXACT => false,
            PREAMBLE_LONGS_ESTIMATION => true,
            other => {
                return Err(Error::deserial(format!(
                    "invalid preamble longs {other} for a non-empty theta sketch"
                )));
            }
        };
        let num_retained = cursor
            .read_u32_le()
            .map_err(insufficient_data("num_retained"))? as usize;
        ensure_in_range("num_retained", 0..=(1usize << lg_k), num_retained)?;
        cursor.read_f32_le().map_err(insufficient_data("p"))?;
        let theta = if estimation {
            let theta = cursor.read_u64_le().map_err(insufficient_data("theta"))?;
            ensure_in_range("theta", 1..MAX_THETA, theta)?;
            theta
        } else {
            MAX_THETA
        };
        if !estimation && num_retained == 0 {
            return Err(Error::deserial(
                "non-empty exact theta image retains no hashes",
            ));
        }

        let mut hashes = Vec::with_capacity(num_retained.min(cursor.remaining() / 8));
        let mut previous = 0u64;
        for _ in 0..num_retained {
            let hash = cursor
                .read_u64_le()
                .map_err(insufficient_data("retained_hashes"))?;
            if hash <= previous || hash >= theta {
                return Err(Error::deserial(format!(
                    "retained hash {hash} is out of order or not below theta {theta}"
                )));
            }
            previous = hash;
            hashes.push(hash);
        }
        ensure_fully_consumed(&cursor)?;

        Ok(ThetaSketch {
            table: ThetaHashTable::from_parts(lg_k, seed, theta, hashes),
            seed_hash,
        })
    }
}

/// Builder for ThetaSketch
#[derive(Debug)]
pub struct ThetaSketchBuilder {
    lg_k: u8,
    seed: u64,
}

impl Default for ThetaSketchBuilder {
    fn default() -> Self {
        Self {
            lg_k: DEFAULT_LG_K,
            seed: DEFAULT_UPDATE_SEED,
        }
    }
}

impl ThetaSketchBuilder {
    /// Set lg_k (log2 of nominal size k). Validated in [`build`](Self::build).
    pub fn lg_k(mut self, lg_k: u8) -> Self {
        self.lg_k = lg_k;
        self
    }

    /// Set hash seed.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Build the ThetaSketch.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidParameter`](crate::error::ErrorKind::InvalidParameter) if `lg_k` is
    /// not in `[MIN_LG_K, MAX_LG_K]` or the seed hashes to zero.
    pub fn build(self) -> Result<ThetaSketch, Error> {
        if !(MIN_LG_K..=MAX_LG_K).contains(&self.lg_k) {
            return Err(Error::invalid_parameter(format!(
                "lg_k must be in [{MIN_LG_K}, {MAX_LG_K}], got {}",
                self.lg_k
            )));
        }
        let seed_hash = compute_seed_hash(self.seed)?;
        Ok(ThetaSketch {
            table: ThetaHashTable::new(self.lg_k, self.seed),
            seed_hash,
        })
    }
}

/// Canonicalize a double so that equal values hash equally.
fn canonical_double(value: f64) -> i64 {
    if value.is_nan() {
        0x7ff8000000000000i64
    } else {
        // Adding +0.0 turns -0.0 into +0.0.
        (value + 0.0).to_bits() as i64
    }
}
