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

//! Item encodings for frequent items sketches.

use std::hash::Hash;
use std::str;

use crate::codec::SketchSlice;
use crate::codec::assert::insufficient_data;
use crate::error::Error;

/// An item type that a [`FrequentItemsSketch`](super::FrequentItemsSketch) can track and
/// serialize.
///
/// Implemented for `String` and `Vec<u8>` (a `u32` little-endian length followed by the
/// bytes) and for `i64` (8 bytes little-endian).
pub trait FrequentItemValue: Eq + Hash + Clone {
    /// Appends the encoded item to `out`.
    fn serialize_value(&self, out: &mut Vec<u8>);

    /// Decodes one item from the front of `bytes`, returning it with the number of bytes
    /// consumed.
    fn deserialize_value(bytes: &[u8]) -> Result<(Self, usize), Error>;
}

fn read_length_prefixed(bytes: &[u8]) -> Result<(&[u8], usize), Error> {
    let mut cursor = SketchSlice::new(bytes);
    let len = cursor.read_u32_le().map_err(insufficient_data("item length"))? as usize;
    let payload = cursor
        .read_slice(len)
        .map_err(insufficient_data("item payload"))?;
    Ok((payload, 4 + len))
}

impl FrequentItemValue for String {
    fn serialize_value(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&(self.len() as u32).to_le_bytes());
        out.extend_from_slice(self.as_bytes());
    }

    fn deserialize_value(bytes: &[u8]) -> Result<(Self, usize), Error> {
        let (payload, consumed) = read_length_prefixed(bytes)?;
        let value = str::from_utf8(payload)
            .map_err(|_| Error::deserial("invalid UTF-8 string payload"))?;
        Ok((value.to_string(), consumed))
    }
}

impl FrequentItemValue for Vec<u8> {
    fn serialize_value(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&(self.len() as u32).to_le_bytes());
        out.extend_from_slice(self);
    }

    fn deserialize_value(bytes: &[u8]) -> Result<(Self, usize), Error> {
        let (payload, consumed) = read_length_prefixed(bytes)?;
        Ok((payload.to_vec(), consumed))
    }
}

impl FrequentItemValue for i64 {
    fn serialize_value(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_le_bytes());
    }

    fn deserialize_value(bytes: &[u8]) -> Result<(Self, usize), Error> {
        let value = SketchSlice::new(bytes)
            .read_i64_le()
            .map_err(insufficient_data("i64 item"))?;
        Ok((value, 8))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_layout() {
        let mut out = vec![];
        "héllo".to_string().serialize_value(&mut out);
        assert_eq!(&out[..4], &6u32.to_le_bytes());
        assert_eq!(String::deserialize_value(&out).unwrap(), ("héllo".to_string(), 10));
    }

    #[test]
    fn test_string_rejects_invalid_utf8() {
        let bytes = [2, 0, 0, 0, 0xff, 0xfe];
        assert!(String::deserialize_value(&bytes).is_err());
        assert_eq!(
            Vec::<u8>::deserialize_value(&bytes).unwrap(),
            (vec![0xff, 0xfe], 6)
        );
    }

    #[test]
    fn test_truncated_payload() {
        let err = String::deserialize_value(&[5, 0, 0, 0, b'a']).unwrap_err();
        assert_eq!(err.message(), "insufficient data: item payload");
        assert!(i64::deserialize_value(&[0; 7]).is_err());
    }
}
