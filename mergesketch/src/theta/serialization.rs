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

//! Compact theta sketch layout.
//!
//! ```text
//! byte  0: preamble longs (1 empty, 2 exact, 3 estimation)
//! byte  1: serial version
//! byte  2: family id
//! byte  3: lg_k
//! byte  4: unused
//! byte  5: flags
//! bytes 6-7: seed hash (u16)
//! -- when not empty --
//! bytes 8-11: number of retained hashes (u32)
//! bytes 12-15: sampling probability p (f32, always 1.0)
//! -- in estimation mode --
//! bytes 16-23: theta (u64)
//! -- then --
//! retained hashes, ascending, u64 each
//! ```

pub(super) const SERIAL_VERSION: u8 = 3;

pub(super) const PREAMBLE_LONGS_EMPTY: u8 = 1;
pub(super) const PREAMBLE_LONGS_EXACT: u8 = 2;
pub(super) const PREAMBLE_LONGS_ESTIMATION: u8 = 3;

pub(super) const FLAG_READ_ONLY: u8 = 1 << 1;
pub(super) const FLAG_EMPTY: u8 = 1 << 2;
pub(super) const FLAG_COMPACT: u8 = 1 << 3;
pub(super) const FLAG_ORDERED: u8 = 1 << 4;

pub(super) const SAMPLING_PROBABILITY: f32 = 1.0;
