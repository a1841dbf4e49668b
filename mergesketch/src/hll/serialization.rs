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

//! Compact HLL layout.
//!
//! ```text
//! byte 0: preamble ints (always 2)
//! byte 1: serial version
//! byte 2: family id
//! byte 3: lg_k
//! byte 4: target HLL type (0 = HLL4, 1 = HLL6, 2 = HLL8)
//! byte 5: flags
//! byte 6: mode (0 = LIST, 2 = ARRAY)
//! byte 7: cur_min (ARRAY mode with HLL4 only, else 0)
//! -- LIST mode, not empty --
//! u32 coupon count, then coupons `slot | value << 26` ascending by slot
//! -- ARRAY mode --
//! u32 aux count, packed registers (4, 6 or 8 bits each, MSB first),
//! then aux coupons ascending by slot (HLL4 registers that do not fit a nibble)
//! ```

use crate::codec::SketchBytes;
use crate::codec::SketchSlice;
use crate::codec::assert::ensure_in_range;
use crate::codec::assert::insufficient_data;
use crate::codec::bit_pack::pack_values;
use crate::codec::bit_pack::packed_len;
use crate::codec::bit_pack::unpack_values;
use crate::error::Error;
use crate::hll::HllType;
use crate::hll::array8::Array8;
use crate::hll::coupon_slot;
use crate::hll::coupon_value;
use crate::hll::max_register_value;
use crate::hll::pack_coupon;

pub(super) const SERIAL_VERSION: u8 = 1;
pub(super) const PREAMBLE_INTS: u8 = 2;
pub(super) const HEADER_BYTES: usize = 8;

pub(super) const FLAG_EMPTY: u8 = 1 << 2;
pub(super) const FLAG_COMPACT: u8 = 1 << 3;

pub(super) const MODE_LIST: u8 = 0;
pub(super) const MODE_ARRAY: u8 = 2;

/// Nibble value marking an HLL4 register stored in the aux list.
const AUX_TOKEN: u8 = 15;

/// Register array encoded for a target type.
#[derive(Debug)]
pub(super) struct ArrayImage {
    pub cur_min: u8,
    pub packed: Vec<u8>,
    pub aux: Vec<u32>,
}

impl ArrayImage {
    pub fn encoded_len(&self) -> usize {
        4 + self.packed.len() + 4 * self.aux.len()
    }
}

pub(super) fn list_encoded_len(registers: &Array8) -> usize {
    let non_zero = registers.num_registers() - registers.num_zeros() as usize;
    4 + 4 * non_zero
}

pub(super) fn encode_array(registers: &Array8, hll_type: HllType) -> ArrayImage {
    match hll_type {
        HllType::Hll4 => {
            let cur_min = registers.registers().iter().copied().min().unwrap_or(0);
            let mut aux = vec![];
            let nibbles: Vec<u8> = registers
                .registers()
                .iter()
                .enumerate()
                .map(|(slot, &value)| {
                    let delta = value - cur_min;
                    if delta >= AUX_TOKEN {
                        aux.push(pack_coupon(slot as u32, value));
                        AUX_TOKEN
                    } else {
                        delta
                    }
                })
                .collect();
            ArrayImage {
                cur_min,
                packed: pack_values(&nibbles, 4),
                aux,
            }
        }
        HllType::Hll6 | HllType::Hll8 => ArrayImage {
            cur_min: 0,
            packed: pack_values(registers.registers(), hll_type.register_bits()),
            aux: vec![],
        },
    }
}

pub(super) fn write_list(bytes: &mut SketchBytes, registers: &Array8) {
    let count = registers.num_registers() - registers.num_zeros() as usize;
    bytes.write_u32_le(count as u32);
    for (slot, value) in registers.non_zero() {
        bytes.write_u32_le(pack_coupon(slot, value));
    }
}

pub(super) fn write_array(bytes: &mut SketchBytes, image: &ArrayImage) {
    bytes.write_u32_le(image.aux.len() as u32);
    bytes.write(&image.packed);
    for &coupon in &image.aux {
        bytes.write_u32_le(coupon);
    }
}

/// Reads `count` coupons with strictly ascending slots below `k` and in-range values.
fn read_coupons(
    cursor: &mut SketchSlice<'_>,
    count: usize,
    lg_k: u8,
    tag: &'static str,
) -> Result<Vec<(u32, u8)>, Error> {
    let k = 1u32 << lg_k;
    let max_value = max_register_value(lg_k);
    let mut coupons = Vec::with_capacity(count.min(cursor.remaining() / 4));
    let mut next_min_slot = 0u32;
    for _ in 0..count {
        let coupon = cursor.read_u32_le().map_err(insufficient_data(tag))?;
        let slot = coupon_slot(coupon);
        let value = coupon_value(coupon);
        if slot >= k || slot < next_min_slot {
            return Err(Error::deserial(format!(
                "{tag}: slot {slot} out of order or not below {k}"
            )));
        }
        ensure_in_range("register value", 1..=max_value, value)?;
        next_min_slot = slot + 1;
        coupons.push((slot, value));
    }
    Ok(coupons)
}

pub(super) fn read_list(cursor: &mut SketchSlice<'_>, lg_k: u8) -> Result<Array8, Error> {
    let k = 1usize << lg_k;
    let count = cursor.read_u32_le().map_err(insufficient_data("coupon_count"))? as usize;
    ensure_in_range("coupon_count", 1..=k, count)?;
    let mut registers = Array8::new(lg_k);
    for (slot, value) in read_coupons(cursor, count, lg_k, "coupons")? {
        registers.update(slot, value);
    }
    Ok(registers)
}

pub(super) fn read_array(
    cursor: &mut SketchSlice<'_>,
    lg_k: u8,
    hll_type: HllType,
    cur_min: u8,
) -> Result<Array8, Error> {
    let k = 1usize << lg_k;
    let max_value = max_register_value(lg_k);
    let aux_count = cursor.read_u32_le().map_err(insufficient_data("aux_count"))? as usize;
    ensure_in_range("aux_count", 0..=k, aux_count)?;

    let bits = hll_type.register_bits();
    let packed = cursor
        .read_slice(packed_len(k, bits))
        .map_err(insufficient_data("registers"))?;
    let mut values = unpack_values(packed, k, bits);

    let registers = match hll_type {
        HllType::Hll4 => {
            ensure_in_range("cur_min", 0..=max_value, cur_min)?;
            let mut aux_slots = vec![];
            for (slot, nibble) in values.iter_mut().enumerate() {
                if *nibble == AUX_TOKEN {
                    aux_slots.push(slot as u32);
                } else {
                    *nibble += cur_min;
                    ensure_in_range("register value", 0..=max_value, *nibble)?;
                }
            }
            if aux_slots.len() != aux_count {
                return Err(Error::deserial(format!(
                    "aux_count {aux_count} does not match {} exception registers",
                    aux_slots.len()
                )));
            }
            for (expected_slot, (slot, value)) in aux_slots
                .into_iter()
                .zip(read_coupons(cursor, aux_count, lg_k, "aux_coupons")?)
            {
                if slot != expected_slot || value < cur_min.saturating_add(AUX_TOKEN) {
                    return Err(Error::deserial(format!(
                        "aux coupon for slot {slot} does not match an exception register"
                    )));
                }
                values[slot as usize] = value;
            }
            values
        }
        HllType::Hll6 | HllType::Hll8 => {
            if cur_min != 0 || aux_count != 0 {
                return Err(Error::deserial(format!(
                    "{hll_type:?} array carries cur_min {cur_min} and {aux_count} aux entries"
                )));
            }
            for &value in &values {
                ensure_in_range("register value", 0..=max_value, value)?;
            }
            values
        }
    };

    let registers = Array8::from_registers(lg_k, registers);
    if registers.is_empty() {
        return Err(Error::deserial("non-empty HLL image has no set registers"));
    }
    Ok(registers)
}
