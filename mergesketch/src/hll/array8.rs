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

//! HyperLogLog register array, one byte per slot.
//!
//! This is the working representation for every target type; packing into 4 or 6 bits only
//! happens at serialization time.

/// Register array of an HLL sketch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct Array8 {
    lg_k: u8,
    /// Direct byte array: registers[slot] = value
    registers: Box<[u8]>,
    /// Count of slots with value 0
    num_zeros: u32,
}

impl Array8 {
    pub fn new(lg_k: u8) -> Self {
        let k = 1u32 << lg_k;
        Self {
            lg_k,
            registers: vec![0u8; k as usize].into_boxed_slice(),
            num_zeros: k,
        }
    }

    /// Rebuilds an array from decoded registers.
    pub fn from_registers(lg_k: u8, registers: Vec<u8>) -> Self {
        debug_assert_eq!(registers.len(), 1 << lg_k);
        let num_zeros = registers.iter().filter(|&&v| v == 0).count() as u32;
        Self {
            lg_k,
            registers: registers.into_boxed_slice(),
            num_zeros,
        }
    }

    #[inline]
    pub fn get(&self, slot: u32) -> u8 {
        self.registers[slot as usize]
    }

    /// Raises the register at `slot` to `value` if that is larger.
    pub fn update(&mut self, slot: u32, value: u8) {
        let old_value = self.get(slot);
        if value > old_value {
            self.registers[slot as usize] = value;
            if old_value == 0 {
                self.num_zeros -= 1;
            }
        }
    }

    /// Register-wise maximum with `other`, which must have the same `lg_k`.
    pub fn merge(&mut self, other: &Array8) {
        debug_assert_eq!(self.lg_k, other.lg_k);
        for (slot, &value) in other.registers.iter().enumerate() {
            self.update(slot as u32, value);
        }
    }

    pub fn lg_k(&self) -> u8 {
        self.lg_k
    }

    pub fn num_registers(&self) -> usize {
        self.registers.len()
    }

    pub fn num_zeros(&self) -> u32 {
        self.num_zeros
    }

    pub fn is_empty(&self) -> bool {
        self.num_zeros as usize == self.registers.len()
    }

    pub fn registers(&self) -> &[u8] {
        &self.registers
    }

    /// Iterates `(slot, value)` of non-zero registers in slot order.
    pub fn non_zero(&self) -> impl Iterator<Item = (u32, u8)> + '_ {
        self.registers
            .iter()
            .enumerate()
            .filter(|(_, v)| **v != 0)
            .map(|(slot, &v)| (slot as u32, v))
    }

    pub fn reset(&mut self) {
        self.registers.fill(0);
        self.num_zeros = self.registers.len() as u32;
    }
}
