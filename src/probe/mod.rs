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

//! Probes are transparent decorators around resource clients: they forward
//! every operation to the wrapped resource unchanged and report timing and
//! outcome metrics to a [`Collector`][crate::collect::Collector] on the way
//! through.
//!
//! The contract shared by all probes:
//!
//! - Pass-through semantics. Wrapping a resource never changes the
//!   success/failure outcome of an operation; an operational error is
//!   re-raised unchanged after its error metric is recorded.
//! - Exactly one timing report per logical operation, on every exit path,
//!   via [`MeasureScope`][crate::collect::MeasureScope].
//! - A metric-emission failure never masks an in-flight operational error;
//!   emissions racing an error path are logged at debug and dropped.
//!
//! See [`collect`][crate::collect] for the full list of emitted metrics.

pub mod sql;

mod cache;
pub use cache::MeasuredCache;
pub use cache::UNMEASURED_COMMANDS;

mod http_client;
pub use http_client::MeasuredHttpFetcher;

mod http_server;
pub use http_server::HttpServerProbe;
pub use http_server::RequestObserver;

pub(crate) static LOGGING_TARGET: &str = "measurable::probe";
