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

use std::fmt::Debug;
use std::sync::Arc;

use crate::*;

/// MetricRegistry is the contract a metrics backend must fulfil so that
/// [`RegistryCollector`][crate::collect::RegistryCollector] can drive it.
///
/// A registry hands out handles keyed by `(namespace, name)`. Handing out a
/// handle MUST be get-or-create: asking twice for the same metric returns a
/// handle onto the same underlying series, never a second registration.
///
/// Labels are positional at this boundary. `label_count` pins the cardinality
/// of a metric at creation time; handles reject label tuples of any other
/// length. The label ordering for a given metric name never changes within a
/// process.
pub trait MetricRegistry: Debug + Send + Sync + 'static {
    /// Get or create the counter registered under `(namespace, name)`.
    fn counter(
        &self,
        namespace: &str,
        name: &str,
        help: &str,
        label_count: usize,
    ) -> Result<Arc<dyn CounterHandle>>;

    /// Get or create the gauge registered under `(namespace, name)`.
    fn gauge(
        &self,
        namespace: &str,
        name: &str,
        help: &str,
        label_count: usize,
    ) -> Result<Arc<dyn GaugeHandle>>;

    /// Get or create the histogram registered under `(namespace, name)`.
    fn histogram(
        &self,
        namespace: &str,
        name: &str,
        help: &str,
        label_count: usize,
    ) -> Result<Arc<dyn HistogramHandle>>;
}

/// A handle onto one registered counter series.
pub trait CounterHandle: Debug + Send + Sync {
    /// Add `count` to the series selected by `labels`.
    fn inc_by(&self, count: u64, labels: &[&str]) -> Result<()>;
}

/// A handle onto one registered gauge series.
pub trait GaugeHandle: Debug + Send + Sync {
    /// Add `value` to the series selected by `labels`.
    fn add(&self, value: f64, labels: &[&str]) -> Result<()>;

    /// Subtract `value` from the series selected by `labels`.
    fn sub(&self, value: f64, labels: &[&str]) -> Result<()>;
}

/// A handle onto one registered histogram series.
pub trait HistogramHandle: Debug + Send + Sync {
    /// Record one observation of `value` on the series selected by `labels`.
    fn observe(&self, value: f64, labels: &[&str]) -> Result<()>;
}
