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

//! The metric-collection side: the [`Collector`] capability every probe
//! depends on, the adapter that drives a concrete metrics backend, and the
//! decorators that can be composed around it.
//!
//! # Metrics Reference
//!
//! The metrics emitted by the built-in probes.
//!
//! ## SQL Metrics
//!
//! | Metric Name                    | Type      | Description                                   | Labels                    |
//! |--------------------------------|-----------|-----------------------------------------------|---------------------------|
//! | mysql_connection_dial          | Histogram | Time spent opening a connection               | host                      |
//! | mysql_query_execution_time     | Histogram | Time spent executing a query or statement     | operation, host, prepared |
//! | mysql_query_error              | Counter   | Queries and statement executions that failed  | host                      |
//! | mysql_transaction_pending      | Gauge     | Transactions begun but not yet settled        | host                      |
//! | mysql_transaction_exec         | Counter   | Settled transactions by outcome               | host, status              |
//!
//! ## Cache Metrics
//!
//! | Metric Name                    | Type      | Description                                   | Labels                    |
//! |--------------------------------|-----------|-----------------------------------------------|---------------------------|
//! | redis_connection_dial          | Histogram | Time spent connecting to the cache            | host, success             |
//! | redis_operation_exec_count     | Counter   | Measured commands dispatched                  | host, command             |
//! | redis_operation_exec_time      | Histogram | Time spent executing a measured command       | host, command             |
//! | redis_operation_error          | Counter   | Measured commands that failed                 | host, command             |
//! | redis_value_size               | Histogram | Rough serialized size of successful replies   | host                      |
//!
//! ## HTTP Metrics
//!
//! `<prefix>` defaults to `api` for the outbound probe and is `http` for the
//! inbound probe.
//!
//! | Metric Name                          | Type      | Description                             | Labels          |
//! |--------------------------------------|-----------|-----------------------------------------|-----------------|
//! | `<prefix>`_request_pending           | Gauge     | Requests currently in flight            | (route)         |
//! | `<prefix>`_request_response_time     | Histogram | Seconds from request start to response  | (route)         |
//! | `<prefix>`_request_status_code_count | Counter   | Responses by status code                | status, (route) |
//! | `<prefix>`_request_body_size         | Histogram | Response body size in bytes             | (route)         |
//!
//! The `route` label only exists on the inbound probe.
//!
//! # Composition
//!
//! A typical production stack, inside out: a registry implementation
//! ([`PrometheusRegistry`] or [`CacheRegistry`]), [`RegistryCollector`] to
//! adapt it to the [`Collector`] contract, [`FaultTolerantCollector`] when
//! the registry's transport can fail, and optionally [`LoggingCollector`]
//! during debugging. Probes only ever see `Arc<dyn Collector>`.

use std::fmt::Debug;
use std::sync::Arc;

use crate::*;

mod adapter;
pub use adapter::split_metric_name;
pub use adapter::RegistryCollector;

mod prometheus;
pub use self::prometheus::PrometheusRegistry;
pub use self::prometheus::PrometheusRegistryBuilder;

mod cache;
pub use self::cache::CacheRegistry;

mod fault_tolerant;
pub use fault_tolerant::FaultTolerantCollector;

mod logging;
pub use logging::LoggingCollector;

mod measure;
pub use measure::MeasureScope;

/// The capability interface all instrumentation code depends on.
///
/// Names are flat strings; labels are positional values whose ordering is a
/// contract between the caller and the backend-registered metric definition,
/// fixed for the process lifetime.
///
/// Operations are fire-and-forget and must not fail for normal usage.
/// Whether abnormal backend state is absorbed or surfaced is decided by the
/// decorators composed around the adapter, not by the caller.
pub trait Collector: Debug + Send + Sync {
    /// Increment the counter `name` by one.
    fn increment_counter(&self, name: &str, labels: &[&str]) -> Result<()> {
        self.increment_counter_by(name, 1, labels)
    }

    /// Increment the counter `name` by `count`.
    fn increment_counter_by(&self, name: &str, count: u64, labels: &[&str]) -> Result<()>;

    /// Increment the gauge `name` by one.
    fn increment_gauge(&self, name: &str, labels: &[&str]) -> Result<()> {
        self.increment_gauge_by(name, 1.0, labels)
    }

    /// Increment the gauge `name` by `value`.
    fn increment_gauge_by(&self, name: &str, value: f64, labels: &[&str]) -> Result<()>;

    /// Decrement the gauge `name` by one.
    fn decrement_gauge(&self, name: &str, labels: &[&str]) -> Result<()> {
        self.decrement_gauge_by(name, 1.0, labels)
    }

    /// Decrement the gauge `name` by `value`.
    fn decrement_gauge_by(&self, name: &str, value: f64, labels: &[&str]) -> Result<()>;

    /// Record one observation of `value` on the histogram `name`.
    fn observe_histogram(&self, name: &str, value: f64, labels: &[&str]) -> Result<()>;
}

impl<T: Collector + ?Sized> Collector for Arc<T> {
    fn increment_counter(&self, name: &str, labels: &[&str]) -> Result<()> {
        (**self).increment_counter(name, labels)
    }

    fn increment_counter_by(&self, name: &str, count: u64, labels: &[&str]) -> Result<()> {
        (**self).increment_counter_by(name, count, labels)
    }

    fn increment_gauge(&self, name: &str, labels: &[&str]) -> Result<()> {
        (**self).increment_gauge(name, labels)
    }

    fn increment_gauge_by(&self, name: &str, value: f64, labels: &[&str]) -> Result<()> {
        (**self).increment_gauge_by(name, value, labels)
    }

    fn decrement_gauge(&self, name: &str, labels: &[&str]) -> Result<()> {
        (**self).decrement_gauge(name, labels)
    }

    fn decrement_gauge_by(&self, name: &str, value: f64, labels: &[&str]) -> Result<()> {
        (**self).decrement_gauge_by(name, value, labels)
    }

    fn observe_histogram(&self, name: &str, value: f64, labels: &[&str]) -> Result<()> {
        (**self).observe_histogram(name, value, labels)
    }
}
