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

//! Raw modules provide the capability contracts the instrumentation layer is
//! built against: the metrics-registry surface that backend adapters drive,
//! and the resource surfaces (SQL driver chain, cache client, HTTP fetcher)
//! that the probes wrap.
//!
//! These contracts are intentionally minimal. A probe never requires more
//! from a resource than a standard client already exposes, plus a way to
//! read the target host for labeling.

mod registry;
pub use registry::CounterHandle;
pub use registry::GaugeHandle;
pub use registry::HistogramHandle;
pub use registry::MetricRegistry;

pub mod cache;
pub mod sql;

mod http;
pub use http::parse_content_length;
pub use http::BoxedFuture;
pub use http::HttpClient;
pub use http::HttpFetch;
pub use http::HttpFetchDyn;
