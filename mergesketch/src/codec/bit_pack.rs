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

//! MSB-first packing of narrow fixed-width values (at most 8 bits each).

#[inline]
fn low_bits_mask(bits: u8) -> u8 {
    if bits >= u8::BITS as u8 {
        u8::MAX
    } else {
        (1u8 << bits) - 1
    }
}

/// Returns the number of bytes needed to pack `count` values of `bits` width.
pub(crate) fn packed_len(count: usize, bits: u8) -> usize {
    (count * bits as usize).div_ceil(8)
}

/// Packs values into a byte buffer with a fixed bit width.
///
/// # Panics
///
/// Panics if the buffer is too small; callers size it with [`packed_len`].
struct BitPacker<'a> {
    bytes: &'a mut [u8],
    byte_index: usize,
    bits_used: u8,
}

impl<'a> BitPacker<'a> {
    fn new(bytes: &'a mut [u8]) -> Self {
        Self {
            bytes,
            byte_index: 0,
            bits_used: 0,
        }
    }

    fn pack(&mut self, value: u8, bits: u8) {
        debug_assert!(bits > 0 && bits <= 8, "bits must be in [1, 8]");
        let value = value & low_bits_mask(bits);
        let free = 8 - self.bits_used;

        if bits <= free {
            self.bytes[self.byte_index] |= value << (free - bits);
            self.bits_used += bits;
        } else {
            // Value straddles a byte boundary: high part here, low part in the next byte.
            let spill = bits - free;
            self.bytes[self.byte_index] |= value >> spill;
            self.byte_index += 1;
            self.bytes[self.byte_index] = value << (8 - spill);
            self.bits_used = spill;
        }
        if self.bits_used == 8 {
            self.byte_index += 1;
            self.bits_used = 0;
        }
    }
}

/// Unpacks values written by [`BitPacker`].
///
/// # Panics
///
/// Panics if the buffer holds fewer bits than requested; callers check the length first.
struct BitUnpacker<'a> {
    bytes: &'a [u8],
    byte_index: usize,
    bits_used: u8,
}

impl<'a> BitUnpacker<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            byte_index: 0,
            bits_used: 0,
        }
    }

    fn unpack(&mut self, bits: u8) -> u8 {
        debug_assert!(bits > 0 && bits <= 8, "bits must be in [1, 8]");
        let avail = 8 - self.bits_used;
        let current = self.bytes[self.byte_index];

        let value = if bits <= avail {
            let value = (current >> (avail - bits)) & low_bits_mask(bits);
            self.bits_used += bits;
            value
        } else {
            let spill = bits - avail;
            let high = current & low_bits_mask(avail);
            self.byte_index += 1;
            let low = self.bytes[self.byte_index] >> (8 - spill);
            self.bits_used = spill;
            (high << spill) | low
        };
        if self.bits_used == 8 {
            self.byte_index += 1;
            self.bits_used = 0;
        }
        value
    }
}

/// Packs every value using `bits` bits, MSB first.
pub(crate) fn pack_values(values: &[u8], bits: u8) -> Vec<u8> {
    let mut bytes = vec![0u8; packed_len(values.len(), bits)];
    let mut packer = BitPacker::new(&mut bytes);
    for &value in values {
        packer.pack(value, bits);
    }
    bytes
}

/// Unpacks `count` values of `bits` width from `bytes`.
///
/// The caller must ensure `bytes.len() >= packed_len(count, bits)`.
pub(crate) fn unpack_values(bytes: &[u8], count: usize, bits: u8) -> Vec<u8> {
    debug_assert!(bytes.len() >= packed_len(count, bits));
    let mut unpacker = BitUnpacker::new(bytes);
    (0..count).map(|_| unpacker.unpack(bits)).collect()
}
