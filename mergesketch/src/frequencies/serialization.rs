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

//! Serialization constants for frequency sketches.
//!
//! ```text
//! byte 0: preamble longs (1 empty, 4 non-empty)
//! byte 1: serial version
//! byte 2: family id
//! byte 3: flags
//! bytes 4-7: top_k (u32)
//! -- non-empty --
//! bytes 8-11: number of active items (u32)
//! bytes 12-15: unused
//! bytes 16-23: stream weight (u64)
//! bytes 24-31: floor (u64)
//! then per active item, in first-insertion order: count (u64), error (u64)
//! then the items in the same order
//! ```

/// Serialization version.
pub(super) const SER_VER: u8 = 1;

/// Preamble longs for empty sketch.
pub(super) const PREAMBLE_LONGS_EMPTY: u8 = 1;
/// Preamble longs for non-empty sketch.
pub(super) const PREAMBLE_LONGS_NONEMPTY: u8 = 4;

/// Empty flag mask.
pub(super) const EMPTY_FLAG_MASK: u8 = 1 << 2;
