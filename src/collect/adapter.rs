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
use std::fmt::Formatter;
use std::sync::Arc;

use crate::collect::Collector;
use crate::raw::MetricRegistry;
use crate::*;

/// Split a flat metric name into the `(namespace, short_name)` pair a
/// backend registry expects.
///
/// The split happens at the first `_`; a name without one gets an empty
/// namespace.
///
/// ```
/// use measurable::collect::split_metric_name;
///
/// assert_eq!(split_metric_name("mysql_query_error"), ("mysql", "query_error"));
/// assert_eq!(split_metric_name("counter"), ("", "counter"));
/// ```
pub fn split_metric_name(name: &str) -> (&str, &str) {
    match name.split_once('_') {
        Some((namespace, short_name)) => (namespace, short_name),
        None => ("", name),
    }
}

/// Adapts a [`MetricRegistry`] backend to the [`Collector`] contract.
///
/// Each call splits the metric name via [`split_metric_name`], fetches the
/// matching handle from the registry (get-or-create, so repeated calls with
/// one name accumulate into one series) and forwards the delta or value with
/// the positional label values. The full flat name doubles as the registered
/// help text.
#[derive(Clone)]
pub struct RegistryCollector {
    registry: Arc<dyn MetricRegistry>,
}

impl Debug for RegistryCollector {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryCollector")
            .field("registry", &self.registry)
            .finish()
    }
}

impl RegistryCollector {
    /// Create a collector driving `registry`.
    pub fn new(registry: Arc<dyn MetricRegistry>) -> Self {
        Self { registry }
    }
}

impl Collector for RegistryCollector {
    fn increment_counter_by(&self, name: &str, count: u64, labels: &[&str]) -> Result<()> {
        let (namespace, short_name) = split_metric_name(name);
        self.registry
            .counter(namespace, short_name, name, labels.len())?
            .inc_by(count, labels)
    }

    fn increment_gauge_by(&self, name: &str, value: f64, labels: &[&str]) -> Result<()> {
        let (namespace, short_name) = split_metric_name(name);
        self.registry
            .gauge(namespace, short_name, name, labels.len())?
            .add(value, labels)
    }

    fn decrement_gauge_by(&self, name: &str, value: f64, labels: &[&str]) -> Result<()> {
        let (namespace, short_name) = split_metric_name(name);
        self.registry
            .gauge(namespace, short_name, name, labels.len())?
            .sub(value, labels)
    }

    fn observe_histogram(&self, name: &str, value: f64, labels: &[&str]) -> Result<()> {
        let (namespace, short_name) = split_metric_name(name);
        self.registry
            .histogram(namespace, short_name, name, labels.len())?
            .observe(value, labels)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::collect::PrometheusRegistry;

    #[test]
    fn test_split_metric_name() {
        assert_eq!(
            split_metric_name("mysql_query_error"),
            ("mysql", "query_error")
        );
        assert_eq!(
            split_metric_name("http_request_pending"),
            ("http", "request_pending")
        );
        assert_eq!(split_metric_name("counter"), ("", "counter"));
        assert_eq!(split_metric_name("_leading"), ("", "leading"));
    }

    #[test]
    fn test_adapter_is_idempotent() {
        let prometheus_registry = prometheus::Registry::new();
        let registry = Arc::new(PrometheusRegistry::new(&prometheus_registry));
        let collector = RegistryCollector::new(registry);

        // A second call with the same name must not re-register, only
        // accumulate.
        collector
            .increment_counter("mysql_query_error", &["db-1"])
            .unwrap();
        collector
            .increment_counter_by("mysql_query_error", 2, &["db-1"])
            .unwrap();

        let families = prometheus_registry.gather();
        assert_eq!(families.len(), 1);
        assert_eq!(families[0].get_name(), "mysql_query_error");
        assert_eq!(families[0].get_metric()[0].get_counter().get_value(), 3.0);
    }

    #[test]
    fn test_adapter_covers_all_operations() {
        let prometheus_registry = prometheus::Registry::new();
        let registry = Arc::new(PrometheusRegistry::new(&prometheus_registry));
        let collector = RegistryCollector::new(registry);

        collector
            .increment_gauge("mysql_transaction_pending", &["db-1"])
            .unwrap();
        collector
            .increment_gauge_by("mysql_transaction_pending", 2.0, &["db-1"])
            .unwrap();
        collector
            .decrement_gauge("mysql_transaction_pending", &["db-1"])
            .unwrap();
        collector
            .decrement_gauge_by("mysql_transaction_pending", 0.5, &["db-1"])
            .unwrap();
        collector
            .observe_histogram("redis_value_size", 128.0, &["cache-1"])
            .unwrap();

        let families = prometheus_registry.gather();
        let gauge = families
            .iter()
            .find(|f| f.get_name() == "mysql_transaction_pending")
            .unwrap();
        assert_eq!(gauge.get_metric()[0].get_gauge().get_value(), 1.5);

        let histogram = families
            .iter()
            .find(|f| f.get_name() == "redis_value_size")
            .unwrap();
        assert_eq!(
            histogram.get_metric()[0].get_histogram().get_sample_count(),
            1
        );
    }
}
