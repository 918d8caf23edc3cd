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

use crate::collect::Collector;
use crate::*;

/// Wraps a [`Collector`] and discards transport failures from the metrics
/// backend itself.
///
/// An instrumented database or cache call must never fail because the
/// metrics pipe is down: when the delegate reports a transport-category
/// error ([`ErrorKind::is_transport`]) the observation is lost and the call
/// returns normally, without retry. Every other error class propagates
/// unchanged.
///
/// Typically composed directly around a
/// [`RegistryCollector`][crate::collect::RegistryCollector] whose registry
/// writes through an unreliable network store.
#[derive(Debug, Clone)]
pub struct FaultTolerantCollector<C: Collector> {
    inner: C,
}

impl<C: Collector> FaultTolerantCollector<C> {
    /// Wrap `inner`.
    pub fn new(inner: C) -> Self {
        Self { inner }
    }
}

fn absorb_transport(res: Result<()>) -> Result<()> {
    match res {
        Err(err) if err.kind().is_transport() => Ok(()),
        other => other,
    }
}

impl<C: Collector> Collector for FaultTolerantCollector<C> {
    fn increment_counter_by(&self, name: &str, count: u64, labels: &[&str]) -> Result<()> {
        absorb_transport(self.inner.increment_counter_by(name, count, labels))
    }

    fn increment_gauge_by(&self, name: &str, value: f64, labels: &[&str]) -> Result<()> {
        absorb_transport(self.inner.increment_gauge_by(name, value, labels))
    }

    fn decrement_gauge_by(&self, name: &str, value: f64, labels: &[&str]) -> Result<()> {
        absorb_transport(self.inner.decrement_gauge_by(name, value, labels))
    }

    fn observe_histogram(&self, name: &str, value: f64, labels: &[&str]) -> Result<()> {
        absorb_transport(self.inner.observe_histogram(name, value, labels))
    }
}
