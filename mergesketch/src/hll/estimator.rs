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

//! Cardinality estimator over a register array.
//!
//! The raw estimate is the bias-corrected harmonic mean `alpha_m * m^2 / sum(2^-register)`
//! (Flajolet et al.). Below `2.5 * m` with empty registers it switches to linear counting
//! `m * ln(m / zeros)`, and close to the size of the 64-bit hash space it applies the
//! large-range correction `-2^64 * ln(1 - E / 2^64)`.

use crate::common::NumStdDev;
use crate::common::normal_bounds;
use crate::hll::array8::Array8;

/// Relative standard error factor of the HLL estimator: `RSE = 1.04 / sqrt(m)`.
const RSE_FACTOR: f64 = 1.04;

/// Returns the bias-correction constant for register count `m`.
fn alpha(m: usize) -> f64 {
    match m {
        16 => 0.673,
        32 => 0.697,
        64 => 0.709,
        _ => 0.7213 / (1.0 + 1.079 / m as f64),
    }
}

pub(super) fn estimate(registers: &Array8) -> f64 {
    if registers.is_empty() {
        return 0.0;
    }
    let m = registers.num_registers() as f64;
    let harmonic_sum: f64 = registers
        .registers()
        .iter()
        .map(|&register| 2f64.powi(-(register as i32)))
        .sum();
    let raw = alpha(registers.num_registers()) * m * m / harmonic_sum;

    let zeros = registers.num_zeros() as f64;
    let corrected = if raw <= 2.5 * m && zeros > 0.0 {
        m * (m / zeros).ln()
    } else {
        raw
    };

    let two_to_64 = u64::MAX as f64 + 1.0;
    if corrected > two_to_64 / 30.0 {
        let ratio = (corrected / two_to_64).min(1.0 - f64::EPSILON);
        -two_to_64 * (1.0 - ratio).ln()
    } else {
        corrected
    }
}

/// Returns `(lower, upper)` bounds; the lower bound never drops below the number of set
/// registers, since each one witnesses at least one distinct value.
pub(super) fn bounds(registers: &Array8, num_std_dev: NumStdDev) -> (f64, f64) {
    let estimate = estimate(registers);
    if estimate == 0.0 {
        return (0.0, 0.0);
    }
    let rse = RSE_FACTOR / (registers.num_registers() as f64).sqrt();
    let non_zero = registers.num_registers() as f64 - registers.num_zeros() as f64;
    normal_bounds(estimate, estimate * rse, num_std_dev, non_zero)
}
