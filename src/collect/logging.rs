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

use log::debug;

use crate::collect::Collector;
use crate::*;

static LOGGING_TARGET: &str = "measurable::collect";

/// Wraps a [`Collector`] and logs every metric event before forwarding it.
/// Use for debugging purpose.
///
/// Events are logged at debug severity under the `measurable::collect`
/// target, one structured line per event:
///
/// ```shell
/// RUST_LOG="measurable::collect=debug" ./app
/// type=counter metric=mysql_query_error count=1 labels=["db-1"]
/// ```
///
/// Side effect only: the wrapped collector's result is returned unchanged,
/// and logging happens whether or not the delegate succeeds.
#[derive(Debug, Clone)]
pub struct LoggingCollector<C: Collector> {
    inner: C,
}

impl<C: Collector> LoggingCollector<C> {
    /// Wrap `inner`.
    pub fn new(inner: C) -> Self {
        Self { inner }
    }
}

impl<C: Collector> Collector for LoggingCollector<C> {
    fn increment_counter(&self, name: &str, labels: &[&str]) -> Result<()> {
        debug!(
            target: LOGGING_TARGET,
            "type=counter metric={name} count=1 labels={labels:?}"
        );
        self.inner.increment_counter(name, labels)
    }

    fn increment_counter_by(&self, name: &str, count: u64, labels: &[&str]) -> Result<()> {
        debug!(
            target: LOGGING_TARGET,
            "type=counter metric={name} count={count} labels={labels:?}"
        );
        self.inner.increment_counter_by(name, count, labels)
    }

    fn increment_gauge(&self, name: &str, labels: &[&str]) -> Result<()> {
        debug!(
            target: LOGGING_TARGET,
            "type=gauge metric={name} value=1 labels={labels:?}"
        );
        self.inner.increment_gauge(name, labels)
    }

    fn increment_gauge_by(&self, name: &str, value: f64, labels: &[&str]) -> Result<()> {
        debug!(
            target: LOGGING_TARGET,
            "type=gauge metric={name} value={value} labels={labels:?}"
        );
        self.inner.increment_gauge_by(name, value, labels)
    }

    fn decrement_gauge(&self, name: &str, labels: &[&str]) -> Result<()> {
        debug!(
            target: LOGGING_TARGET,
            "type=gauge metric={name} value=-1 labels={labels:?}"
        );
        self.inner.decrement_gauge(name, labels)
    }

    fn decrement_gauge_by(&self, name: &str, value: f64, labels: &[&str]) -> Result<()> {
        debug!(
            target: LOGGING_TARGET,
            "type=gauge metric={name} value=-{value} labels={labels:?}"
        );
        self.inner.decrement_gauge_by(name, value, labels)
    }

    fn observe_histogram(&self, name: &str, value: f64, labels: &[&str]) -> Result<()> {
        debug!(
            target: LOGGING_TARGET,
            "type=histogram metric={name} value={value} labels={labels:?}"
        );
        self.inner.observe_histogram(name, value, labels)
    }
}
