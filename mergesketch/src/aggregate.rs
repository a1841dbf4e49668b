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

//! Sketch aggregation over serialized states.
//!
//! An aggregation host keeps one serialized sketch per group and drives it through
//! `create -> update* -> combine* -> estimate`. Between steps only the bytes are kept, so every
//! call here decodes its input, applies one step and encodes a fresh buffer. Input buffers are
//! never modified, and a failed call returns an error without producing a new state.
//!
//! ```
//! use mergesketch::aggregate::Estimate;
//! use mergesketch::aggregate::EstimatePolicy;
//! use mergesketch::aggregate::SketchAggregator;
//! use mergesketch::aggregate::SketchParameters;
//!
//! let aggregator = SketchAggregator::new(SketchParameters::frequent_items()).unwrap();
//! let left = aggregator.update_batch(&aggregator.create(), ["x", "y", "x"]).unwrap();
//! let right = aggregator.update(&aggregator.create(), "x").unwrap();
//! let merged = aggregator.combine(&left, [&right]).unwrap();
//!
//! let estimate = aggregator.estimate(&merged, &EstimatePolicy::default()).unwrap();
//! assert_eq!(estimate.to_string(), "[[x,3],[y,1]]");
//! ```

use std::fmt;

use log::debug;

use crate::codec::family::Family;
use crate::common::NumStdDev;
use crate::error::Error;
use crate::frequencies;
use crate::frequencies::ErrorType;
use crate::frequencies::FrequentItemValue;
use crate::frequencies::FrequentItemsSketch;
use crate::hash::DEFAULT_UPDATE_SEED;
use crate::hll;
use crate::hll::HllSketch;
use crate::hll::HllType;
use crate::theta;
use crate::theta::ThetaSketch;

/// Operations shared by every sketch family.
pub trait MergeableSketch: Sized {
    /// The family tag written into serialized images.
    fn family() -> Family;

    /// Folds `other` into `self`.
    fn merge(&mut self, other: &Self) -> Result<(), Error>;

    /// Serializes the sketch to its compact byte form.
    fn serialize(&self) -> Vec<u8>;
}

impl MergeableSketch for ThetaSketch {
    fn family() -> Family {
        Family::Theta
    }

    fn merge(&mut self, other: &Self) -> Result<(), Error> {
        ThetaSketch::merge(self, other)
    }

    fn serialize(&self) -> Vec<u8> {
        ThetaSketch::serialize(self)
    }
}

impl MergeableSketch for HllSketch {
    fn family() -> Family {
        Family::Hll
    }

    fn merge(&mut self, other: &Self) -> Result<(), Error> {
        HllSketch::merge(self, other)
    }

    fn serialize(&self) -> Vec<u8> {
        HllSketch::serialize(self)
    }
}

impl<T: FrequentItemValue> MergeableSketch for FrequentItemsSketch<T> {
    fn family() -> Family {
        Family::FrequentItems
    }

    fn merge(&mut self, other: &Self) -> Result<(), Error> {
        FrequentItemsSketch::merge(self, other)
    }

    fn serialize(&self) -> Vec<u8> {
        FrequentItemsSketch::serialize(self)
    }
}

/// Configuration of one aggregation group, fixed at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "family", rename_all = "snake_case"))]
pub enum SketchParameters {
    /// Theta sketch with `2^lg_k` nominal entries and the given hash seed.
    Theta {
        /// Log2 of the nominal number of retained hashes.
        lg_k: u8,
        /// Hash seed; all states combined together must share it.
        seed: u64,
    },
    /// HLL sketch with `2^lg_k` registers.
    Hll {
        /// Log2 of the number of registers.
        lg_k: u8,
        /// Serialized register layout.
        hll_type: HllType,
    },
    /// Frequent items sketch reporting up to `top_k` items.
    FrequentItems {
        /// Number of top items.
        top_k: u32,
    },
}

impl SketchParameters {
    /// Theta parameters with the default `lg_k` and seed.
    pub fn theta() -> Self {
        SketchParameters::Theta {
            lg_k: theta::DEFAULT_LG_K,
            seed: DEFAULT_UPDATE_SEED,
        }
    }

    /// HLL parameters with the default `lg_k` and target type.
    pub fn hll() -> Self {
        SketchParameters::Hll {
            lg_k: hll::DEFAULT_LG_K,
            hll_type: hll::DEFAULT_HLL_TYPE,
        }
    }

    /// Frequent items parameters with the default `top_k`.
    pub fn frequent_items() -> Self {
        SketchParameters::FrequentItems {
            top_k: frequencies::DEFAULT_TOP_K,
        }
    }

    /// Returns the sketch family these parameters configure.
    pub fn family(&self) -> Family {
        match self {
            SketchParameters::Theta { .. } => Family::Theta,
            SketchParameters::Hll { .. } => Family::Hll,
            SketchParameters::FrequentItems { .. } => Family::FrequentItems,
        }
    }

    /// Checks every value against its family's validated range.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidParameter`](crate::error::ErrorKind::InvalidParameter) for the first
    /// out-of-range value.
    pub fn validate(&self) -> Result<(), Error> {
        self.empty_state().map(drop)
    }

    fn empty_state(&self) -> Result<Vec<u8>, Error> {
        match *self {
            SketchParameters::Theta { lg_k, seed } => {
                let sketch = ThetaSketch::builder().lg_k(lg_k).seed(seed).build()?;
                Ok(sketch.serialize())
            }
            SketchParameters::Hll { lg_k, hll_type } => {
                let sketch = HllSketch::builder().lg_k(lg_k).hll_type(hll_type).build()?;
                Ok(sketch.serialize())
            }
            SketchParameters::FrequentItems { top_k } => {
                let sketch = FrequentItemsSketch::<Vec<u8>>::builder()
                    .top_k(top_k)
                    .build()?;
                Ok(sketch.serialize())
            }
        }
    }
}

/// Options for [`SketchAggregator::estimate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EstimatePolicy {
    /// Width of theta confidence bounds.
    pub num_std_dev: NumStdDev,
    /// Reporting guarantee for frequent items.
    pub error_type: ErrorType,
}

impl EstimatePolicy {
    /// Creates a policy with bounds at `num_std_dev` standard deviations.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidParameter`](crate::error::ErrorKind::InvalidParameter) unless
    /// `num_std_dev` is 1, 2 or 3.
    pub fn with_std_devs(num_std_dev: u8) -> Result<Self, Error> {
        Ok(EstimatePolicy {
            num_std_dev: NumStdDev::try_from(num_std_dev)?,
            ..EstimatePolicy::default()
        })
    }

    /// Returns the policy with the given frequent items error type.
    pub fn error_type(mut self, error_type: ErrorType) -> Self {
        self.error_type = error_type;
        self
    }
}

/// Distinct count estimate with confidence bounds.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ThetaEstimate {
    /// Point estimate.
    pub estimate: f64,
    /// Lower confidence bound.
    pub lower_bound: f64,
    /// Upper confidence bound.
    pub upper_bound: f64,
}

/// One row of a frequent items result.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FrequentItem {
    /// The item bytes, read as UTF-8 with invalid sequences replaced.
    pub value: String,
    /// Its estimated frequency.
    pub estimate: u64,
}

/// Final answer of an aggregation group.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Estimate {
    /// Theta distinct count with bounds.
    Theta(ThetaEstimate),
    /// HLL distinct count.
    Hll(u64),
    /// Frequent items, heaviest first.
    FrequentItems(Vec<FrequentItem>),
}

impl fmt::Display for Estimate {
    /// Theta renders as `estimate [lower, upper]`, HLL as the integer count and frequent items
    /// as `[[item,count],...]`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Estimate::Theta(theta) => write!(
                f,
                "{} [{}, {}]",
                theta.estimate, theta.lower_bound, theta.upper_bound
            ),
            Estimate::Hll(count) => write!(f, "{count}"),
            Estimate::FrequentItems(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "[{},{}]", item.value, item.estimate)?;
                }
                f.write_str("]")
            }
        }
    }
}

/// Drives one aggregation group's sketches through serialized states.
#[derive(Debug, Clone)]
pub struct SketchAggregator {
    params: SketchParameters,
    empty: Vec<u8>,
}

impl SketchAggregator {
    /// Creates an aggregator after validating `params`.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidParameter`](crate::error::ErrorKind::InvalidParameter) if any value is
    /// out of range.
    pub fn new(params: SketchParameters) -> Result<Self, Error> {
        let empty = params.empty_state()?;
        debug!("{} aggregator created with {params:?}", params.family().name());
        Ok(SketchAggregator { params, empty })
    }

    /// Returns the group parameters.
    pub fn parameters(&self) -> &SketchParameters {
        &self.params
    }

    /// Returns the serialized empty state.
    pub fn create(&self) -> Vec<u8> {
        self.empty.clone()
    }

    /// Folds one value into `state`.
    ///
    /// # Errors
    ///
    /// Fails if `state` is corrupt or was created with different parameters.
    pub fn update(&self, state: &[u8], value: impl AsRef<[u8]>) -> Result<Vec<u8>, Error> {
        self.update_batch(state, [value])
    }

    /// Folds every value of `values` into `state` before re-serializing it.
    ///
    /// Frequent items are counted by their raw bytes, so values need not be valid UTF-8.
    ///
    /// # Errors
    ///
    /// Fails if `state` is corrupt or was created with different parameters.
    pub fn update_batch<I>(&self, state: &[u8], values: I) -> Result<Vec<u8>, Error>
    where
        I: IntoIterator,
        I::Item: AsRef<[u8]>,
    {
        let mut folded = 0usize;
        let bytes = match self.params {
            SketchParameters::Theta { lg_k, seed } => {
                let mut sketch = self.decode_theta(state, lg_k, seed)?;
                for value in values {
                    sketch.update_bytes(value.as_ref());
                    folded += 1;
                }
                sketch.serialize()
            }
            SketchParameters::Hll { lg_k, hll_type } => {
                let mut sketch = self.decode_hll(state, lg_k, hll_type)?;
                for value in values {
                    sketch.update_bytes(value.as_ref());
                    folded += 1;
                }
                sketch.serialize()
            }
            SketchParameters::FrequentItems { top_k } => {
                let mut sketch = self.decode_frequent_items(state, top_k)?;
                for value in values {
                    sketch.update(value.as_ref().to_vec())?;
                    folded += 1;
                }
                sketch.serialize()
            }
        };
        debug!(
            "{} update folded {folded} values into a {} byte state",
            self.params.family().name(),
            bytes.len()
        );
        Ok(bytes)
    }

    /// Combines `state` with every state of `others`.
    ///
    /// All inputs are decoded and checked before any merge happens. The result does not
    /// depend on the order or grouping of combines.
    ///
    /// # Errors
    ///
    /// Returns [`CorruptState`](crate::error::ErrorKind::CorruptState) if any buffer is
    /// corrupt, and [`IncompatibleState`](crate::error::ErrorKind::IncompatibleState) if any
    /// state was built with different parameters.
    pub fn combine<I>(&self, state: &[u8], others: I) -> Result<Vec<u8>, Error>
    where
        I: IntoIterator,
        I::Item: AsRef<[u8]>,
    {
        match self.params {
            SketchParameters::Theta { lg_k, seed } => {
                combine_states(state, others, |bytes| self.decode_theta(bytes, lg_k, seed))
            }
            SketchParameters::Hll { lg_k, hll_type } => {
                combine_states(state, others, |bytes| self.decode_hll(bytes, lg_k, hll_type))
            }
            SketchParameters::FrequentItems { top_k } => {
                combine_states(state, others, |bytes| self.decode_frequent_items(bytes, top_k))
            }
        }
    }

    /// Computes the final answer for `state`.
    ///
    /// # Errors
    ///
    /// Fails if `state` is corrupt or was created with different parameters.
    pub fn estimate(&self, state: &[u8], policy: &EstimatePolicy) -> Result<Estimate, Error> {
        let estimate = match self.params {
            SketchParameters::Theta { lg_k, seed } => {
                let sketch = self.decode_theta(state, lg_k, seed)?;
                Estimate::Theta(ThetaEstimate {
                    estimate: sketch.estimate(),
                    lower_bound: sketch.lower_bound(policy.num_std_dev),
                    upper_bound: sketch.upper_bound(policy.num_std_dev),
                })
            }
            SketchParameters::Hll { lg_k, hll_type } => {
                Estimate::Hll(self.decode_hll(state, lg_k, hll_type)?.estimate_u64())
            }
            SketchParameters::FrequentItems { top_k } => {
                let sketch = self.decode_frequent_items(state, top_k)?;
                let items = sketch
                    .top_k_items(policy.error_type)
                    .into_iter()
                    .map(|row| FrequentItem {
                        estimate: row.estimate(),
                        value: String::from_utf8_lossy(row.item()).into_owned(),
                    })
                    .collect();
                Estimate::FrequentItems(items)
            }
        };
        debug!("{} estimate: {estimate}", self.params.family().name());
        Ok(estimate)
    }

    fn ensure_family(&self, bytes: &[u8]) -> Result<(), Error> {
        let family = Family::of_image(bytes)?;
        let expected = self.params.family();
        if family == expected {
            Ok(())
        } else {
            Err(Error::deserial(format!(
                "state holds a {} sketch, aggregation group expects {}",
                family.name(),
                expected.name()
            )))
        }
    }

    fn decode_theta(&self, bytes: &[u8], lg_k: u8, seed: u64) -> Result<ThetaSketch, Error> {
        self.ensure_family(bytes)?;
        let sketch = ThetaSketch::deserialize(bytes, seed)?;
        ensure_same("lg_k", lg_k, sketch.lg_k())?;
        Ok(sketch)
    }

    fn decode_hll(&self, bytes: &[u8], lg_k: u8, hll_type: HllType) -> Result<HllSketch, Error> {
        self.ensure_family(bytes)?;
        let sketch = HllSketch::deserialize(bytes)?;
        ensure_same("lg_k", lg_k, sketch.lg_k())?;
        ensure_same("hll_type", hll_type, sketch.hll_type())?;
        Ok(sketch)
    }

    fn decode_frequent_items(
        &self,
        bytes: &[u8],
        top_k: u32,
    ) -> Result<FrequentItemsSketch<Vec<u8>>, Error> {
        self.ensure_family(bytes)?;
        let sketch = FrequentItemsSketch::<Vec<u8>>::deserialize(bytes)?;
        ensure_same("top_k", top_k, sketch.top_k())?;
        Ok(sketch)
    }
}

fn ensure_same<T: PartialEq + fmt::Debug>(
    name: &'static str,
    expected: T,
    actual: T,
) -> Result<(), Error> {
    if expected == actual {
        Ok(())
    } else {
        Err(Error::incompatible(format!(
            "state has {name} {actual:?}, aggregation group expects {expected:?}"
        )))
    }
}

fn combine_states<S, I, F>(state: &[u8], others: I, decode: F) -> Result<Vec<u8>, Error>
where
    S: MergeableSketch,
    I: IntoIterator,
    I::Item: AsRef<[u8]>,
    F: Fn(&[u8]) -> Result<S, Error>,
{
    let mut sketch = decode(state)?;
    let others = others
        .into_iter()
        .map(|bytes| decode(bytes.as_ref()))
        .collect::<Result<Vec<_>, _>>()?;
    for other in &others {
        sketch.merge(other)?;
    }
    let bytes = sketch.serialize();
    debug!(
        "{} combine merged {} states into a {} byte state",
        S::family().name(),
        others.len() + 1,
        bytes.len()
    );
    Ok(bytes)
}
