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

//! Frequency sketches for finding heavy hitters in data streams.
//!
//! # Overview
//!
//! This sketch tracks approximate frequencies of items of type `T` that implements
//! [`FrequentItemValue`], with optional associated counts (`T` item, `u64` count). The true
//! frequency of an item is defined to be the sum of its associated counts.
//!
//! This implementation provides the following capabilities:
//! * Estimate the frequency of an item.
//! * Return upper and lower bounds of any item, such that the true frequency is always between the
//!   upper and lower bounds.
//! * Return a global maximum error that holds for all items in the stream.
//! * Return the top `K` items, or all items above a threshold, under either
//!   [`ErrorType::NoFalsePositives`] or [`ErrorType::NoFalseNegatives`].
//! * Merge itself with another sketch configured with the same `top_k`.
//! * Serialize to bytes, or deserialize from bytes, for storage or transmission.
//!
//! # Accuracy
//!
//! The sketch tracks at most `top_k * MAP_SLACK_FACTOR` items. While fewer distinct items than
//! that have been seen, every estimate is exact.
//!
//! Past that point each tracked item carries an error offset: its estimate is an upper bound on
//! its true frequency, and the estimate minus the offset is a lower bound. Any untracked item has
//! a true frequency of at most [`FrequentItemsSketch::maximum_error`], which for a single stream
//! of total weight `W` is at most `W / (top_k * MAP_SLACK_FACTOR)`.
//!
//! # Merging
//!
//! Merging is commutative: `a.merge(b)` and `b.merge(a)` produce the same sketch, byte for
//! byte. It is associative exactly while no merge has to evict, i.e. while the distinct items
//! retained across the merged sketches fit in the capacity. Beyond that, different merge trees
//! over the same inputs may retain different items with different bounds. What every tree
//! shape guarantees is:
//! * the same [`FrequentItemsSketch::total_weight`];
//! * for every item, `lower_bound <= true frequency <= upper_bound`;
//! * every item whose true frequency exceeds that tree's
//!   [`FrequentItemsSketch::maximum_error`] is reported under [`ErrorType::NoFalseNegatives`].
//!
//! # Background
//!
//! This code implements the "Space-Saving" algorithm of Metwally, Agrawal and Abbadi,
//! "Efficient Computation of Frequent and Top-k Elements in Data Streams", 2006, a relative of
//! the Misra-Gries summary. When the summary is full the item with the smallest count is evicted
//! and the newcomer inherits that count as its error offset.
//!
//! # Examples
//!
//! ```
//! # use mergesketch::frequencies::ErrorType;
//! # use mergesketch::frequencies::FrequentItemsSketch;
//! let mut sketch = FrequentItemsSketch::<i64>::builder().top_k(2).build().unwrap();
//! sketch.update_with_count(1, 3).unwrap();
//! sketch.update(2).unwrap();
//! let rows = sketch.top_k_items(ErrorType::NoFalsePositives);
//! assert_eq!(*rows[0].item(), 1);
//! ```
//!
//! # Serialization
//!
//! ```
//! # use mergesketch::frequencies::FrequentItemsSketch;
//! let mut sketch = FrequentItemsSketch::<String>::builder().build().unwrap();
//! sketch.update_with_count("apple".to_string(), 2).unwrap();
//!
//! let bytes = sketch.serialize();
//! let decoded = FrequentItemsSketch::<String>::deserialize(&bytes).unwrap();
//! assert_eq!(decoded.estimate(&"apple".to_string()), 2);
//! ```

mod serde;
mod serialization;
mod sketch;
mod space_saving;

pub use self::serde::FrequentItemValue;
pub use self::sketch::ErrorType;
pub use self::sketch::FrequentItemsSketch;
pub use self::sketch::FrequentItemsSketchBuilder;
pub use self::sketch::Row;

/// Default number of top items.
pub const DEFAULT_TOP_K: u32 = 1000;
/// Smallest accepted `top_k`.
pub const MIN_TOP_K: u32 = 1;
/// Largest accepted `top_k`.
pub const MAX_TOP_K: u32 = 1_000_000;
/// Number of tracked items per requested top item.
pub const MAP_SLACK_FACTOR: usize = 4;
