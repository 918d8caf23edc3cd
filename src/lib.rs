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

//! measurable makes resource clients report standardized metrics without the
//! calling code knowing they do.
//!
//! - Probes: transparent decorators for SQL drivers, cache clients and the
//!   HTTP request/response lifecycle, see [`probe`].
//! - Collectors: the [`Collector`] contract, the backend adapter and its
//!   resilience/logging decorators, see [`collect`].
//! - Stores: failure-tolerant wiring that picks a durable or in-process
//!   metrics store at startup, see [`store`].
//!
//! # Quick Start
//!
//! ```
//! use std::sync::Arc;
//!
//! use measurable::collect::FaultTolerantCollector;
//! use measurable::collect::PrometheusRegistry;
//! use measurable::collect::RegistryCollector;
//! use measurable::probe::MeasuredCache;
//! use measurable::raw::cache::CacheConnection;
//! use measurable::raw::cache::Command;
//! use measurable::services::MemoryCache;
//! use measurable::Result;
//!
//! fn main() -> Result<()> {
//!     // Adapt a prometheus registry to the Collector contract and harden
//!     // it against metrics-backend outages.
//!     let collector = Arc::new(FaultTolerantCollector::new(RegistryCollector::new(
//!         Arc::new(PrometheusRegistry::new(prometheus::default_registry())),
//!     )));
//!
//!     // Wrap a cache client; call sites stay unchanged.
//!     let mut cache = MeasuredCache::new(MemoryCache::new(), collector);
//!     cache.execute(&Command::new("set").arg("hello").arg("world"))?;
//!     cache.execute(&Command::new("get").arg("hello"))?;
//!
//!     Ok(())
//! }
//! ```

// Make sure all our public APIs have docs.
#![warn(missing_docs)]
// Deny unused qualifications.
#![deny(unused_qualifications)]

// Private module with public types, they will be accessed via `measurable::Xxxx`
mod types;
pub use types::*;

// Public modules, they will be accessed like `measurable::probe::Xxxx`
pub mod collect;
pub mod probe;
pub mod raw;
pub mod services;
pub mod store;

pub use collect::Collector;
