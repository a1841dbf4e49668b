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

//! # Mergeable sketches
//!
//! Constant-memory probabilistic summaries that can be built independently per data partition
//! and merged into one global answer:
//!
//! - [`theta`]: distinct counting with set operations (union, intersection, difference).
//! - [`hll`]: HyperLogLog distinct counting.
//! - [`frequencies`]: approximate heavy hitters (top-K).
//!
//! Every sketch supports update, merge, estimate and a compact, versioned serialized form. The
//! [`aggregate`] module drives those operations over serialized byte buffers, which is the
//! shape an external aggregation host works with.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]

pub mod aggregate;
pub mod common;
pub mod error;
pub mod frequencies;
pub mod hash;
pub mod hll;
pub mod theta;

pub(crate) mod codec;

pub use self::codec::family::Family;
