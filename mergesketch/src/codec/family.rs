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

use crate::error::Error;

/// Offset of the family id byte, common to every serialized image.
pub(crate) const FAMILY_BYTE: usize = 2;

/// Sketch family tags embedded in every serialized image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
    /// Theta sketch (distinct counting via hash sampling).
    Theta,
    /// HyperLogLog sketch.
    Hll,
    /// Frequent items sketch.
    FrequentItems,
}

impl Family {
    /// Returns the family id byte.
    pub fn id(self) -> u8 {
        match self {
            Family::Theta => 3,
            Family::Hll => 7,
            Family::FrequentItems => 10,
        }
    }

    /// Returns the family name.
    pub fn name(self) -> &'static str {
        match self {
            Family::Theta => "Theta",
            Family::Hll => "HLL",
            Family::FrequentItems => "FrequentItems",
        }
    }

    /// Identifies the family of a serialized image from its preamble.
    pub fn of_image(bytes: &[u8]) -> Result<Self, Error> {
        let id = *bytes
            .get(FAMILY_BYTE)
            .ok_or_else(|| Error::insufficient_data("family_id"))?;
        [Family::Theta, Family::Hll, Family::FrequentItems]
            .into_iter()
            .find(|family| family.id() == id)
            .ok_or_else(|| Error::deserial(format!("unknown sketch family id {id}")))
    }

    pub(crate) fn validate_id(self, id: u8) -> Result<(), Error> {
        if id == self.id() {
            Ok(())
        } else {
            Err(Error::invalid_family(self.id(), id, self.name()))
        }
    }
}
