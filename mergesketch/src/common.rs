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

//! Definitions shared across sketch families.

use crate::error::Error;

/// Number of standard deviations used for confidence bounds.
///
/// One, two and three standard deviations correspond to approximately 68.3%, 95.4% and 99.7%
/// confidence respectively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum NumStdDev {
    /// One standard deviation.
    One = 1,
    /// Two standard deviations.
    #[default]
    Two = 2,
    /// Three standard deviations.
    Three = 3,
}

impl NumStdDev {
    /// Returns the multiplier as a floating point value.
    pub fn as_f64(self) -> f64 {
        self as u8 as f64
    }
}

impl TryFrom<u8> for NumStdDev {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(NumStdDev::One),
            2 => Ok(NumStdDev::Two),
            3 => Ok(NumStdDev::Three),
            _ => Err(Error::invalid_parameter(format!(
                "number of standard deviations must be in [1, 3], got {value}"
            ))),
        }
    }
}

/// Symmetric normal-approximation bounds around `estimate`, with the lower bound clamped to
/// `floor` (a count that is known with certainty).
pub(crate) fn normal_bounds(
    estimate: f64,
    std_dev: f64,
    num_std_dev: NumStdDev,
    floor: f64,
) -> (f64, f64) {
    let delta = num_std_dev.as_f64() * std_dev;
    let lower = (estimate - delta).max(floor).min(estimate);
    let upper = estimate + delta;
    (lower, upper)
}
