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

//! HyperLogLog sketch for cardinality estimation.
//!
//! The sketch keeps `k = 2^lg_k` registers. Each update hashes the value, routes it to a
//! register by the low `lg_k` bits of the hash, and keeps in that register the maximum rank
//! (leading-zero run plus one) of the remaining bits. Merging takes the register-wise maximum,
//! so it is idempotent, commutative and associative.
//!
//! # Target types
//!
//! Registers are always held one byte each in memory. [`HllType`] only selects the array
//! layout of the serialized form:
//!
//! - [`HllType::Hll4`]: 4-bit nibbles relative to the minimum register, with an exception list
//!   for registers that do not fit. The most compact form and the default.
//! - [`HllType::Hll6`]: 6 bits per register.
//! - [`HllType::Hll8`]: one byte per register.
//!
//! Sparse sketches are written as a list of `(slot, value)` coupons whatever the target type,
//! whichever of the two forms is smaller.
//!
//! # Example
//!
//! ```
//! use mergesketch::hll::HllSketch;
//!
//! let mut left = HllSketch::builder().lg_k(12).build().unwrap();
//! let mut right = HllSketch::builder().lg_k(12).build().unwrap();
//! for i in 0..5_000u64 {
//!     left.update(i);
//!     right.update(i + 5_000);
//! }
//! left.merge(&right).unwrap();
//! let estimate = left.estimate();
//! assert!((estimate - 10_000.0).abs() < 10_000.0 * 0.1);
//! ```

mod array8;
mod estimator;
mod serialization;
mod sketch;

pub use self::sketch::HllSketch;
pub use self::sketch::HllSketchBuilder;

use crate::error::Error;

/// Default log2 of the number of registers.
pub const DEFAULT_LG_K: u8 = 11;
/// Smallest accepted `lg_k`.
pub const MIN_LG_K: u8 = 4;
/// Largest accepted `lg_k`.
pub const MAX_LG_K: u8 = 21;
/// Default serialized target type.
pub const DEFAULT_HLL_TYPE: HllType = HllType::Hll4;

/// Serialized register layout of an HLL sketch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum HllType {
    /// 4 bits per register plus exceptions.
    #[default]
    Hll4,
    /// 6 bits per register.
    Hll6,
    /// 8 bits per register.
    Hll8,
}

impl HllType {
    pub(crate) fn id(self) -> u8 {
        match self {
            HllType::Hll4 => 0,
            HllType::Hll6 => 1,
            HllType::Hll8 => 2,
        }
    }

    pub(crate) fn from_id(id: u8) -> Result<Self, Error> {
        match id {
            0 => Ok(HllType::Hll4),
            1 => Ok(HllType::Hll6),
            2 => Ok(HllType::Hll8),
            _ => Err(Error::deserial(format!("unknown HLL target type {id}"))),
        }
    }

    /// Bits per register in the packed array form.
    pub(crate) fn register_bits(self) -> u8 {
        match self {
            HllType::Hll4 => 4,
            HllType::Hll6 => 6,
            HllType::Hll8 => 8,
        }
    }
}

const KEY_BITS_26: u32 = 26;
const KEY_MASK_26: u32 = (1 << KEY_BITS_26) - 1;

/// Largest register value reachable with `lg_k` slot bits.
#[inline]
pub(crate) fn max_register_value(lg_k: u8) -> u8 {
    64 - lg_k + 1
}

/// Splits a 64-bit hash into its register slot and rank.
#[inline]
pub(crate) fn slot_and_value(hash: u64, lg_k: u8) -> (u32, u8) {
    let slot = (hash & ((1u64 << lg_k) - 1)) as u32;
    let rest = hash >> lg_k;
    // `rest` has lg_k leading zeros from the shift; an all-zero rest gets the maximum rank.
    let value = rest.leading_zeros() as u8 - lg_k + 1;
    (slot, value)
}

#[inline]
pub(crate) fn pack_coupon(slot: u32, value: u8) -> u32 {
    ((value as u32) << KEY_BITS_26) | (slot & KEY_MASK_26)
}

#[inline]
pub(crate) fn coupon_slot(coupon: u32) -> u32 {
    coupon & KEY_MASK_26
}

#[inline]
pub(crate) fn coupon_value(coupon: u32) -> u8 {
    (coupon >> KEY_BITS_26) as u8
}
