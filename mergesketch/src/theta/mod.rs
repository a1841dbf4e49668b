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

//! Theta sketch implementation for cardinality estimation.
//!
//! Theta sketch is a generalization of the Kth Minimum Value (KMV) sketch. It retains the
//! `k` smallest distinct hashes of the input together with a sampling threshold, theta, equal
//! to the next smallest hash. Once more than `k` distinct values have been seen the sketch is
//! in estimation mode and the distinct count is estimated as `retained / theta`.
//!
//! # Overview
//!
//! - [`ThetaSketch`]: mutable sketch supporting updates, union (`merge`), intersection and
//!   set difference, and a compact serialized form.
//! - [`ThetaSketchBuilder`]: validated configuration (`lg_k`, seed).
//!
//! # Example
//!
//! ```
//! use mergesketch::common::NumStdDev;
//! use mergesketch::theta::ThetaSketch;
//!
//! let mut sketch = ThetaSketch::builder().lg_k(12).build().unwrap();
//! for i in 0..10_000u64 {
//!     sketch.update(i);
//! }
//! let estimate = sketch.estimate();
//! assert!(sketch.lower_bound(NumStdDev::Two) <= estimate);
//! assert!(estimate <= sketch.upper_bound(NumStdDev::Two));
//!
//! let bytes = sketch.serialize();
//! let restored = ThetaSketch::deserialize(&bytes, sketch.seed()).unwrap();
//! assert_eq!(restored.estimate(), estimate);
//! ```

mod hash_table;
mod serialization;
mod sketch;

pub use self::sketch::ThetaSketch;
pub use self::sketch::ThetaSketchBuilder;

/// Default log2 of the nominal number of retained hashes.
pub const DEFAULT_LG_K: u8 = 12;
/// Smallest accepted `lg_k`.
pub const MIN_LG_K: u8 = 4;
/// Largest accepted `lg_k`.
pub const MAX_LG_K: u8 = 21;
