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

//! Seeded MurmurHash3 (x64, 128-bit) used by all sketch families.

use std::hash::Hasher;

use crate::error::Error;

/// The default seed used when hashing values into sketches.
pub const DEFAULT_UPDATE_SEED: u64 = 9001;

const C1: u64 = 0x87c3_7b91_1142_53d5;
const C2: u64 = 0x4cf5_ad43_2745_937f;

/// Streaming MurmurHash3 x64/128 implementing [`Hasher`].
///
/// [`Hasher::finish`] returns the first 64-bit half of the digest; [`Self::finish128`] returns
/// both halves.
#[derive(Debug, Clone)]
pub struct MurmurHash3X64128 {
    h1: u64,
    h2: u64,
    tail: [u8; 16],
    tail_len: usize,
    total_len: u64,
}

impl MurmurHash3X64128 {
    /// Creates a hasher with the given seed.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            h1: seed,
            h2: seed,
            tail: [0; 16],
            tail_len: 0,
            total_len: 0,
        }
    }

    /// Returns the full 128-bit digest as `(h1, h2)`.
    pub fn finish128(&self) -> (u64, u64) {
        let mut h1 = self.h1;
        let mut h2 = self.h2;
        let tail = &self.tail[..self.tail_len];

        let mut k1 = 0u64;
        let mut k2 = 0u64;
        for (i, &b) in tail.iter().enumerate().skip(8) {
            k2 ^= (b as u64) << ((i - 8) * 8);
        }
        if tail.len() > 8 {
            k2 = k2.wrapping_mul(C2).rotate_left(33).wrapping_mul(C1);
            h2 ^= k2;
        }
        for (i, &b) in tail.iter().enumerate().take(8) {
            k1 ^= (b as u64) << (i * 8);
        }
        if !tail.is_empty() {
            k1 = k1.wrapping_mul(C1).rotate_left(31).wrapping_mul(C2);
            h1 ^= k1;
        }

        h1 ^= self.total_len;
        h2 ^= self.total_len;
        h1 = h1.wrapping_add(h2);
        h2 = h2.wrapping_add(h1);
        h1 = fmix64(h1);
        h2 = fmix64(h2);
        h1 = h1.wrapping_add(h2);
        h2 = h2.wrapping_add(h1);
        (h1, h2)
    }

    fn process_block(&mut self, block: &[u8; 16]) {
        let (lo, hi) = block.split_at(8);
        let mut k1 = u64::from_le_bytes(lo.try_into().expect("block half is 8 bytes"));
        let mut k2 = u64::from_le_bytes(hi.try_into().expect("block half is 8 bytes"));

        k1 = k1.wrapping_mul(C1).rotate_left(31).wrapping_mul(C2);
        self.h1 ^= k1;
        self.h1 = self
            .h1
            .rotate_left(27)
            .wrapping_add(self.h2)
            .wrapping_mul(5)
            .wrapping_add(0x52dc_e729);

        k2 = k2.wrapping_mul(C2).rotate_left(33).wrapping_mul(C1);
        self.h2 ^= k2;
        self.h2 = self
            .h2
            .rotate_left(31)
            .wrapping_add(self.h1)
            .wrapping_mul(5)
            .wrapping_add(0x3849_5ab5);
    }
}

impl Default for MurmurHash3X64128 {
    fn default() -> Self {
        Self::with_seed(DEFAULT_UPDATE_SEED)
    }
}

impl Hasher for MurmurHash3X64128 {
    fn finish(&self) -> u64 {
        self.finish128().0
    }

    fn write(&mut self, mut bytes: &[u8]) {
        self.total_len += bytes.len() as u64;

        if self.tail_len > 0 {
            let take = (16 - self.tail_len).min(bytes.len());
            self.tail[self.tail_len..self.tail_len + take].copy_from_slice(&bytes[..take]);
            self.tail_len += take;
            bytes = &bytes[take..];
            if self.tail_len < 16 {
                return;
            }
            let block = self.tail;
            self.process_block(&block);
            self.tail_len = 0;
        }

        let mut chunks = bytes.chunks_exact(16);
        for chunk in &mut chunks {
            let block: &[u8; 16] = chunk.try_into().expect("chunk is 16 bytes");
            self.process_block(block);
        }
        let rest = chunks.remainder();
        self.tail[..rest.len()].copy_from_slice(rest);
        self.tail_len = rest.len();
    }
}

#[inline]
fn fmix64(mut k: u64) -> u64 {
    k ^= k >> 33;
    k = k.wrapping_mul(0xff51_afd7_ed55_8ccd);
    k ^= k >> 33;
    k = k.wrapping_mul(0xc4ce_b9fe_1a85_ec53);
    k ^= k >> 33;
    k
}

/// Hashes raw bytes with the given seed, returning the first half of the digest.
pub(crate) fn hash_bytes(bytes: &[u8], seed: u64) -> u64 {
    let mut hasher = MurmurHash3X64128::with_seed(seed);
    hasher.write(bytes);
    hasher.finish()
}

/// Computes the 16-bit seed hash stored in serialized images to detect seed mismatches.
///
/// A seed whose hash is zero cannot be told apart from an unset field and is rejected.
pub fn compute_seed_hash(seed: u64) -> Result<u16, Error> {
    let seed_hash = (hash_bytes(&seed.to_le_bytes(), 0) & 0xffff) as u16;
    if seed_hash == 0 {
        return Err(Error::invalid_parameter(format!(
            "seed {seed} produces a zero seed hash, choose a different seed"
        )));
    }
    Ok(seed_hash)
}
