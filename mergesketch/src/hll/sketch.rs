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

use std::hash::Hash;
use std::hash::Hasher;

use crate::codec::SketchBytes;
use crate::codec::SketchSlice;
use crate::codec::assert::ensure_fully_consumed;
use crate::codec::assert::ensure_in_range;
use crate::codec::assert::ensure_preamble_longs_is;
use crate::codec::assert::ensure_serial_version_is;
use crate::codec::assert::insufficient_data;
use crate::codec::family::Family;
use crate::common::NumStdDev;
use crate::error::Error;
use crate::hash::DEFAULT_UPDATE_SEED;
use crate::hash::MurmurHash3X64128;
use crate::hll::DEFAULT_HLL_TYPE;
use crate::hll::DEFAULT_LG_K;
use crate::hll::HllType;
use crate::hll::MAX_LG_K;
use crate::hll::MIN_LG_K;
use crate::hll::array8::Array8;
use crate::hll::estimator;
use crate::hll::serialization::*;
use crate::hll::slot_and_value;

/// A HyperLogLog sketch.
///
/// See the [hll module level documentation](crate::hll) for more.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HllSketch {
    registers: Array8,
    hll_type: HllType,
}

impl HllSketch {
    /// Create a new builder for HllSketch
    pub fn builder() -> HllSketchBuilder {
        HllSketchBuilder::default()
    }

    /// Update the sketch with a hashable value
    pub fn update<T: Hash>(&mut self, value: T) {
        let mut hasher = MurmurHash3X64128::with_seed(DEFAULT_UPDATE_SEED);
        value.hash(&mut hasher);
        self.update_hash(hasher.finish());
    }

    /// Update the sketch with raw bytes, hashing exactly the given bytes.
    pub fn update_bytes(&mut self, bytes: &[u8]) {
        let mut hasher = MurmurHash3X64128::with_seed(DEFAULT_UPDATE_SEED);
        hasher.write(bytes);
        self.update_hash(hasher.finish());
    }

    fn update_hash(&mut self, hash: u64) {
        let (slot, value) = slot_and_value(hash, self.lg_k());
        self.registers.update(slot, value);
    }

    /// Folds `other` into this sketch by taking the register-wise maximum.
    ///
    /// The target types may differ; this sketch keeps its own.
    ///
    /// # Errors
    ///
    /// Returns [`IncompatibleState`](crate::error::ErrorKind::IncompatibleState) if the
    /// sketches have different `lg_k`. This sketch is left untouched.
    pub fn merge(&mut self, other: &HllSketch) -> Result<(), Error> {
        if self.lg_k() != other.lg_k() {
            return Err(Error::incompatible(format!(
                "lg_k mismatch: {} vs {}",
                self.lg_k(),
                other.lg_k()
            )));
        }
        self.registers.merge(&other.registers);
        Ok(())
    }

    /// Returns the cardinality estimate.
    pub fn estimate(&self) -> f64 {
        estimator::estimate(&self.registers)
    }

    /// Returns the cardinality estimate rounded to the nearest integer.
    pub fn estimate_u64(&self) -> u64 {
        self.estimate().round().max(0.0) as u64
    }

    /// Returns the lower bound of the estimate at the given number of standard deviations.
    pub fn lower_bound(&self, num_std_dev: NumStdDev) -> f64 {
        estimator::bounds(&self.registers, num_std_dev).0
    }

    /// Returns the upper bound of the estimate at the given number of standard deviations.
    pub fn upper_bound(&self, num_std_dev: NumStdDev) -> f64 {
        estimator::bounds(&self.registers, num_std_dev).1
    }

    /// Returns true if no value has been seen.
    pub fn is_empty(&self) -> bool {
        self.registers.is_empty()
    }

    /// Returns log2 of the number of registers.
    pub fn lg_k(&self) -> u8 {
        self.registers.lg_k()
    }

    /// Returns the serialized target type.
    pub fn hll_type(&self) -> HllType {
        self.hll_type
    }

    /// Returns the value of register `slot`.
    ///
    /// # Panics
    ///
    /// Panics if `slot >= 2^lg_k`.
    pub fn register(&self, slot: u32) -> u8 {
        self.registers.get(slot)
    }

    /// Resets the sketch to its empty state.
    pub fn reset(&mut self) {
        self.registers.reset();
    }

    /// Serializes the sketch to its compact byte form.
    ///
    /// The smaller of the coupon list and the packed register array is written; on a tie the
    /// list wins.
    pub fn serialize(&self) -> Vec<u8> {
        if self.is_empty() {
            let mut bytes = SketchBytes::with_capacity(HEADER_BYTES);
            self.write_header(&mut bytes, FLAG_EMPTY | FLAG_COMPACT, MODE_LIST, 0);
            return bytes.into_bytes();
        }

        let list_len = list_encoded_len(&self.registers);
        let image = encode_array(&self.registers, self.hll_type);
        if list_len <= image.encoded_len() {
            let mut bytes = SketchBytes::with_capacity(HEADER_BYTES + list_len);
            self.write_header(&mut bytes, FLAG_COMPACT, MODE_LIST, 0);
            write_list(&mut bytes, &self.registers);
            bytes.into_bytes()
        } else {
            let mut bytes = SketchBytes::with_capacity(HEADER_BYTES + image.encoded_len());
            self.write_header(&mut bytes, FLAG_COMPACT, MODE_ARRAY, image.cur_min);
            write_array(&mut bytes, &image);
            bytes.into_bytes()
        }
    }

    fn write_header(&self, bytes: &mut SketchBytes, flags: u8, mode: u8, cur_min: u8) {
        bytes.write_u8(PREAMBLE_INTS);
        bytes.write_u8(SERIAL_VERSION);
        bytes.write_u8(Family::Hll.id());
        bytes.write_u8(self.lg_k());
        bytes.write_u8(self.hll_type.id());
        bytes.write_u8(flags);
        bytes.write_u8(mode);
        bytes.write_u8(cur_min);
    }

    /// Deserializes a sketch from bytes.
    ///
    /// # Errors
    ///
    /// Returns [`CorruptState`](crate::error::ErrorKind::CorruptState) if the bytes are not a
    /// valid compact HLL image.
    pub fn deserialize(bytes: &[u8]) -> Result<Self, Error> {
        let mut cursor = SketchSlice::new(bytes);
        let pre_ints = cursor.read_u8().map_err(insufficient_data("pre_ints"))?;
        let serial_version = cursor.read_u8().map_err(insufficient_data("serial_version"))?;
        let family_id = cursor.read_u8().map_err(insufficient_data("family_id"))?;
        let lg_k = cursor.read_u8().map_err(insufficient_data("lg_k"))?;
        let type_id = cursor.read_u8().map_err(insufficient_data("hll_type"))?;
        let flags = cursor.read_u8().map_err(insufficient_data("flags"))?;
        let mode = cursor.read_u8().map_err(insufficient_data("mode"))?;
        let cur_min = cursor.read_u8().map_err(insufficient_data("cur_min"))?;

        Family::Hll.validate_id(family_id)?;
        ensure_serial_version_is(SERIAL_VERSION, serial_version)?;
        ensure_preamble_longs_is(PREAMBLE_INTS, pre_ints)?;
        ensure_in_range("lg_k", MIN_LG_K..=MAX_LG_K, lg_k)?;
        let hll_type = HllType::from_id(type_id)?;
        if flags & FLAG_COMPACT == 0 {
            return Err(Error::deserial("HLL image is not in compact form"));
        }

        let registers = match mode {
            _ if flags & FLAG_EMPTY != 0 => {
                if mode != MODE_LIST || cur_min != 0 {
                    return Err(Error::deserial(format!(
                        "empty HLL image has mode {mode} and cur_min {cur_min}"
                    )));
                }
                Array8::new(lg_k)
            }
            MODE_LIST => {
                if cur_min != 0 {
                    return Err(Error::deserial(format!(
                        "HLL list image has cur_min {cur_min}"
                    )));
                }
                read_list(&mut cursor, lg_k)?
            }
            MODE_ARRAY => read_array(&mut cursor, lg_k, hll_type, cur_min)?,
            other => return Err(Error::deserial(format!("unknown HLL mode {other}"))),
        };
        ensure_fully_consumed(&cursor)?;

        Ok(HllSketch {
            registers,
            hll_type,
        })
    }
}

/// Builder for HllSketch
#[derive(Debug)]
pub struct HllSketchBuilder {
    lg_k: u8,
    hll_type: HllType,
}

impl Default for HllSketchBuilder {
    fn default() -> Self {
        Self {
            lg_k: DEFAULT_LG_K,
            hll_type: DEFAULT_HLL_TYPE,
        }
    }
}

impl HllSketchBuilder {
    /// Set lg_k (log2 of the number of registers). Validated in [`build`](Self::build).
    pub fn lg_k(mut self, lg_k: u8) -> Self {
        self.lg_k = lg_k;
        self
    }

    /// Set the serialized target type.
    pub fn hll_type(mut self, hll_type: HllType) -> Self {
        self.hll_type = hll_type;
        self
    }

    /// Build the HllSketch.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidParameter`](crate::error::ErrorKind::InvalidParameter) if `lg_k` is
    /// not in `[MIN_LG_K, MAX_LG_K]`.
    pub fn build(self) -> Result<HllSketch, Error> {
        if !(MIN_LG_K..=MAX_LG_K).contains(&self.lg_k) {
            return Err(Error::invalid_parameter(format!(
                "lg_k must be in [{MIN_LG_K}, {MAX_LG_K}], got {}",
                self.lg_k
            )));
        }
        Ok(HllSketch {
            registers: Array8::new(self.lg_k),
            hll_type: self.hll_type,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_layout() {
        let sketch = HllSketch::builder().lg_k(12).build().unwrap();
        insta::assert_debug_snapshot!(sketch.serialize(), @r"
        [
            2,
            1,
            7,
            12,
            0,
            12,
            0,
            0,
        ]
        ");
    }

    #[test]
    fn test_sparse_sketch_uses_list_mode() {
        let mut sketch = HllSketch::builder().lg_k(10).build().unwrap();
        for i in 0..10u32 {
            sketch.update(i);
        }
        let bytes = sketch.serialize();
        assert_eq!(bytes[6], MODE_LIST);
        let restored = HllSketch::deserialize(&bytes).unwrap();
        assert_eq!(restored, sketch);
    }

    #[test]
    fn test_dense_sketch_uses_array_mode() {
        for hll_type in [HllType::Hll4, HllType::Hll6, HllType::Hll8] {
            let mut sketch = HllSketch::builder()
                .lg_k(8)
                .hll_type(hll_type)
                .build()
                .unwrap();
            for i in 0..5_000u32 {
                sketch.update(i);
            }
            let bytes = sketch.serialize();
            assert_eq!(bytes[6], MODE_ARRAY, "{hll_type:?}");
            let restored = HllSketch::deserialize(&bytes).unwrap();
            assert_eq!(restored, sketch, "{hll_type:?}");
        }
    }
}
