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

use std::collections::HashMap;

use googletest::prelude::*;
use mergesketch::error::ErrorKind;
use mergesketch::frequencies::ErrorType;
use mergesketch::frequencies::FrequentItemValue;
use mergesketch::frequencies::FrequentItemsSketch;
use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;

fn new_sketch<T: FrequentItemValue>(top_k: u32) -> FrequentItemsSketch<T> {
    FrequentItemsSketch::builder().top_k(top_k).build().unwrap()
}

/// Skewed stream over `0..universe`: small ids are far more frequent.
fn skewed_stream(seed: u64, len: usize, universe: f64) -> Vec<i64> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..len)
        .map(|_| (rng.random::<f64>().powi(4) * universe) as i64)
        .collect()
}

fn true_counts(stream: &[i64]) -> HashMap<i64, u64> {
    let mut counts = HashMap::new();
    for &item in stream {
        *counts.entry(item).or_insert(0) += 1;
    }
    counts
}

fn assert_bounds_hold(sketch: &FrequentItemsSketch<i64>, counts: &HashMap<i64, u64>) {
    for (item, &count) in counts {
        assert!(sketch.lower_bound(item) <= count, "item {item}");
        assert!(sketch.upper_bound(item) >= count, "item {item}");
    }
}

#[test]
fn test_no_false_positives_top_three() {
    let mut sketch = new_sketch::<String>(3);
    for (item, count) in [("x", 50), ("y", 30), ("z", 10), ("w", 5), ("v", 5)] {
        for _ in 0..count {
            sketch.update(item.to_string()).unwrap();
        }
    }
    let rows: Vec<(String, u64)> = sketch
        .top_k_items(ErrorType::NoFalsePositives)
        .into_iter()
        .map(|row| (row.item().clone(), row.estimate()))
        .collect();
    assert_eq!(
        rows,
        vec![
            ("x".to_string(), 50),
            ("y".to_string(), 30),
            ("z".to_string(), 10)
        ]
    );
    assert_eq!(sketch.total_weight(), 100);
    assert_eq!(sketch.maximum_error(), 0);
}

#[test]
fn test_never_evicted_items_are_exact() {
    let mut sketch = new_sketch::<i64>(2);
    for round in 1..=20u64 {
        sketch.update(1).unwrap();
        sketch.update(2).unwrap();
        sketch.update(1).unwrap();
        assert_eq!(sketch.estimate(&1), round * 2);
        assert_eq!(sketch.lower_bound(&1), round * 2);
        assert_eq!(sketch.estimate(&2), round);
    }
}

#[test]
fn test_bounds_hold_past_capacity() {
    let stream = skewed_stream(1, 50_000, 5_000.0);
    let counts = true_counts(&stream);
    let mut sketch = new_sketch::<i64>(10);
    for &item in &stream {
        sketch.update(item).unwrap();
    }
    assert_eq!(sketch.num_active_items(), sketch.capacity());
    let max_floor = stream.len() as u64 / sketch.capacity() as u64;
    assert_that!(sketch.maximum_error(), le(max_floor));
    assert_bounds_hold(&sketch, &counts);
}

#[test]
fn test_no_false_negatives_keeps_every_heavy_item() {
    let stream = skewed_stream(2, 50_000, 5_000.0);
    let counts = true_counts(&stream);
    let mut sketch = new_sketch::<i64>(10);
    for &item in &stream {
        sketch.update(item).unwrap();
    }

    let reported: Vec<i64> = sketch
        .frequent_items(ErrorType::NoFalseNegatives)
        .into_iter()
        .map(|row| *row.item())
        .collect();
    let heavy = sketch.total_weight() / sketch.top_k() as u64;
    assert_that!(sketch.maximum_error(), le(heavy));
    for (item, &count) in &counts {
        if count > sketch.maximum_error() {
            assert!(reported.contains(item), "heavy item {item} ({count}) missing");
        }
    }

    let mut by_count: Vec<(i64, u64)> = counts.iter().map(|(k, v)| (*k, *v)).collect();
    by_count.sort_by(|a, b| b.1.cmp(&a.1));
    let top: Vec<i64> = sketch
        .top_k_items(ErrorType::NoFalseNegatives)
        .into_iter()
        .map(|row| *row.item())
        .collect();
    for (item, count) in by_count.iter().take(10) {
        if *count > sketch.maximum_error() {
            assert!(top.contains(item), "true top item {item} missing");
        }
    }

    for row in sketch.frequent_items(ErrorType::NoFalsePositives) {
        assert_that!(counts[row.item()], gt(sketch.maximum_error()));
    }
}

#[test]
fn test_merge_preserves_bounds() {
    let stream = skewed_stream(3, 40_000, 3_000.0);
    let counts = true_counts(&stream);

    let mut parts: Vec<FrequentItemsSketch<i64>> = (0..4).map(|_| new_sketch(10)).collect();
    for (i, &item) in stream.iter().enumerate() {
        parts[i % 4].update(item).unwrap();
    }
    let mut merged = new_sketch::<i64>(10);
    for part in &parts {
        merged.merge(part).unwrap();
    }

    assert_eq!(merged.total_weight(), stream.len() as u64);
    assert_that!(merged.num_active_items(), le(merged.capacity()));
    assert_bounds_hold(&merged, &counts);
}

#[test]
fn test_merge_counts_are_order_independent() {
    let left_stream = skewed_stream(4, 5_000, 500.0);
    let right_stream = skewed_stream(5, 5_000, 500.0);
    let mut left = new_sketch::<i64>(8);
    let mut right = new_sketch::<i64>(8);
    for &item in &left_stream {
        left.update(item).unwrap();
    }
    for &item in &right_stream {
        right.update(item).unwrap();
    }

    let mut lr = left.clone();
    lr.merge(&right).unwrap();
    let mut rl = right.clone();
    rl.merge(&left).unwrap();

    assert_eq!(lr.serialize(), rl.serialize());
    assert_eq!(lr.total_weight(), rl.total_weight());
    assert_eq!(lr.maximum_error(), rl.maximum_error());
    for error_type in [ErrorType::NoFalsePositives, ErrorType::NoFalseNegatives] {
        let rows = |s: &FrequentItemsSketch<i64>| -> Vec<(i64, u64)> {
            s.top_k_items(error_type)
                .into_iter()
                .map(|row| (*row.item(), row.estimate()))
                .collect()
        };
        assert_eq!(rows(&lr), rows(&rl));
    }
}

#[test]
fn test_overflowing_counts_are_rejected() {
    let mut sketch = new_sketch::<i64>(2);
    sketch.update_with_count(1, u64::MAX - 1).unwrap();
    let before = sketch.serialize();

    let err = sketch.update_with_count(2, 2).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidParameter);
    let other = sketch.clone();
    let err = sketch.merge(&other).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IncompatibleState);
    assert_eq!(sketch.serialize(), before);
}

#[test]
fn test_merge_with_empty_is_identity() {
    let mut sketch = new_sketch::<String>(5);
    sketch.update_with_count("a".to_string(), 4).unwrap();
    sketch.update_with_count("b".to_string(), 2).unwrap();
    let bytes = sketch.serialize();
    sketch.merge(&new_sketch(5)).unwrap();
    assert_eq!(sketch.serialize(), bytes);

    let mut empty = new_sketch::<String>(5);
    empty.merge(&sketch).unwrap();
    assert_eq!(empty.serialize(), bytes);
}

#[test]
fn test_merge_rejects_different_top_k() {
    let mut left = new_sketch::<i64>(5);
    left.update(1).unwrap();
    let mut right = new_sketch::<i64>(6);
    right.update(2).unwrap();
    let err = left.merge(&right).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IncompatibleState);
    assert_eq!(left.estimate(&2), 0);
    assert_eq!(left.total_weight(), 1);
}

#[test]
fn test_invalid_top_k() {
    for top_k in [0, 1_000_001] {
        let err = FrequentItemsSketch::<i64>::builder()
            .top_k(top_k)
            .build()
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidParameter);
    }
}

#[test]
fn test_round_trip_past_capacity() {
    let mut sketch = new_sketch::<i64>(4);
    for &item in &skewed_stream(6, 2_000, 100.0) {
        sketch.update(item).unwrap();
    }
    let bytes = sketch.serialize();
    let restored = FrequentItemsSketch::<i64>::deserialize(&bytes).unwrap();
    assert_eq!(restored.serialize(), bytes);
    assert_eq!(restored.maximum_error(), sketch.maximum_error());
    assert_eq!(restored.total_weight(), sketch.total_weight());
    let summary = |s: &FrequentItemsSketch<i64>| -> Vec<(i64, u64, u64)> {
        s.top_k_items(ErrorType::NoFalseNegatives)
            .into_iter()
            .map(|row| (*row.item(), row.lower_bound(), row.upper_bound()))
            .collect()
    };
    assert_eq!(summary(&restored), summary(&sketch));
}

#[test]
fn test_round_trip_items() {
    let mut strings = new_sketch::<String>(4);
    strings.update_with_count("alpha".to_string(), 3).unwrap();
    strings.update_with_count("βeta".to_string(), 5).unwrap();
    strings.update_with_count(String::new(), 1).unwrap();
    let restored = FrequentItemsSketch::<String>::deserialize(&strings.serialize()).unwrap();
    assert_eq!(restored.estimate(&"βeta".to_string()), 5);
    assert_eq!(restored.estimate(&String::new()), 1);
    assert_eq!(restored.total_weight(), 9);

    let mut blobs = new_sketch::<Vec<u8>>(4);
    blobs.update(vec![0xff, 0x00]).unwrap();
    blobs.update(vec![0xff, 0x00]).unwrap();
    let restored = FrequentItemsSketch::<Vec<u8>>::deserialize(&blobs.serialize()).unwrap();
    assert_eq!(restored.estimate(&vec![0xff, 0x00]), 2);
}

#[test]
fn test_deserialize_rejects_corrupt_bytes() {
    let mut sketch = new_sketch::<String>(4);
    sketch.update_with_count("a".to_string(), 3).unwrap();
    sketch.update_with_count("b".to_string(), 1).unwrap();
    let bytes = sketch.serialize();

    for len in [0, 3, 8, 20, 40, bytes.len() - 1] {
        let err = FrequentItemsSketch::<String>::deserialize(&bytes[..len]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CorruptState, "truncated to {len}");
    }

    let mut trailing = bytes.clone();
    trailing.push(b'x');
    let err = FrequentItemsSketch::<String>::deserialize(&trailing).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CorruptState);

    // item "b" rewritten as a second "a"
    let mut duplicate = bytes.clone();
    let last = duplicate.len() - 1;
    duplicate[last] = b'a';
    let err = FrequentItemsSketch::<String>::deserialize(&duplicate).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CorruptState);

    // error of the first counter above the floor
    let mut inconsistent = bytes.clone();
    inconsistent[40..48].copy_from_slice(&1u64.to_le_bytes());
    let err = FrequentItemsSketch::<String>::deserialize(&inconsistent).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CorruptState);

    let err = FrequentItemsSketch::<i64>::deserialize(&bytes).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CorruptState);
}

#[cfg(feature = "serde")]
#[test]
fn test_error_type_serde() {
    let json = serde_json::to_string(&ErrorType::NoFalseNegatives).unwrap();
    assert_eq!(json, "\"NoFalseNegatives\"");
    let back: ErrorType = serde_json::from_str(&json).unwrap();
    assert_eq!(back, ErrorType::NoFalseNegatives);
}
