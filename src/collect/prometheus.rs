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

use std::collections::HashMap;
use std::fmt::Debug;
use std::fmt::Formatter;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;

use prometheus::exponential_buckets;
use prometheus::histogram_opts;
use prometheus::GaugeVec;
use prometheus::HistogramVec;
use prometheus::IntCounterVec;
use prometheus::Opts;
use prometheus::Registry;

use crate::raw::CounterHandle;
use crate::raw::GaugeHandle;
use crate::raw::HistogramHandle;
use crate::raw::MetricRegistry;
use crate::*;

/// A [`MetricRegistry`] over [prometheus](https://docs.rs/prometheus): the
/// volatile in-process store.
///
/// Metric vecs are created on first use, registered once and cached, so
/// repeated lookups with one name never attempt a duplicate registration.
/// Everything lives in process memory; contents are lost on restart, which
/// is exactly what the degraded mode of
/// [`MetricStoreFactory`][crate::store::MetricStoreFactory] wants.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
///
/// use measurable::collect::Collector;
/// use measurable::collect::PrometheusRegistry;
/// use measurable::collect::RegistryCollector;
/// use measurable::Result;
///
/// # fn main() -> Result<()> {
/// let registry = prometheus::default_registry();
/// let collector = RegistryCollector::new(Arc::new(
///     PrometheusRegistry::builder()
///         .label_names("mysql_query_error", &["host"])
///         .register(registry),
/// ));
///
/// collector.increment_counter("mysql_query_error", &["db-1"])?;
/// # Ok(())
/// # }
/// ```
pub struct PrometheusRegistry {
    registry: Registry,

    label_names: HashMap<String, Vec<String>>,
    histogram_buckets: Vec<f64>,

    counters: Mutex<HashMap<String, Arc<PrometheusCounter>>>,
    gauges: Mutex<HashMap<String, Arc<PrometheusGauge>>>,
    histograms: Mutex<HashMap<String, Arc<PrometheusHistogram>>>,
}

impl Debug for PrometheusRegistry {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrometheusRegistry")
            .field("label_names", &self.label_names)
            .finish_non_exhaustive()
    }
}

impl Default for PrometheusRegistry {
    fn default() -> Self {
        Self::new(prometheus::default_registry())
    }
}

impl PrometheusRegistry {
    /// Create a registry binding metrics into `registry`.
    pub fn new(registry: &Registry) -> Self {
        Self::builder().register(registry)
    }

    /// Create a [`PrometheusRegistryBuilder`].
    pub fn builder() -> PrometheusRegistryBuilder {
        PrometheusRegistryBuilder::default()
    }

    /// The underlying prometheus registry, e.g. for exposition.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    fn full_name(namespace: &str, name: &str) -> String {
        if namespace.is_empty() {
            name.to_string()
        } else {
            format!("{namespace}_{name}")
        }
    }

    fn names_for(&self, full_name: &str, label_count: usize) -> Result<Vec<String>> {
        let names = match self.label_names.get(full_name) {
            Some(names) => names.clone(),
            None => (0..label_count).map(|i| format!("label_{i}")).collect(),
        };

        if names.len() != label_count {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "label values don't match the metric's configured label names",
            )
            .with_operation("PrometheusRegistry::names_for")
            .with_context("metric", full_name)
            .with_context("expect", names.len())
            .with_context("got", label_count));
        }

        Ok(names)
    }
}

impl MetricRegistry for PrometheusRegistry {
    fn counter(
        &self,
        namespace: &str,
        name: &str,
        help: &str,
        label_count: usize,
    ) -> Result<Arc<dyn CounterHandle>> {
        let full_name = Self::full_name(namespace, name);

        let mut counters = self
            .counters
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = counters.get(&full_name) {
            return Ok(handle.clone());
        }

        let label_names = self.names_for(&full_name, label_count)?;
        let label_refs: Vec<&str> = label_names.iter().map(String::as_str).collect();
        let mut opts = Opts::new(name.to_string(), help.to_string());
        if !namespace.is_empty() {
            opts = opts.namespace(namespace.to_string());
        }

        let vec = IntCounterVec::new(opts, &label_refs).map_err(parse_prometheus_error)?;
        self.registry
            .register(Box::new(vec.clone()))
            .map_err(parse_prometheus_error)?;

        let handle = Arc::new(PrometheusCounter { vec });
        counters.insert(full_name, handle.clone());
        Ok(handle)
    }

    fn gauge(
        &self,
        namespace: &str,
        name: &str,
        help: &str,
        label_count: usize,
    ) -> Result<Arc<dyn GaugeHandle>> {
        let full_name = Self::full_name(namespace, name);

        let mut gauges = self.gauges.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = gauges.get(&full_name) {
            return Ok(handle.clone());
        }

        let label_names = self.names_for(&full_name, label_count)?;
        let label_refs: Vec<&str> = label_names.iter().map(String::as_str).collect();
        let mut opts = Opts::new(name.to_string(), help.to_string());
        if !namespace.is_empty() {
            opts = opts.namespace(namespace.to_string());
        }

        let vec = GaugeVec::new(opts, &label_refs).map_err(parse_prometheus_error)?;
        self.registry
            .register(Box::new(vec.clone()))
            .map_err(parse_prometheus_error)?;

        let handle = Arc::new(PrometheusGauge { vec });
        gauges.insert(full_name, handle.clone());
        Ok(handle)
    }

    fn histogram(
        &self,
        namespace: &str,
        name: &str,
        help: &str,
        label_count: usize,
    ) -> Result<Arc<dyn HistogramHandle>> {
        let full_name = Self::full_name(namespace, name);

        let mut histograms = self
            .histograms
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = histograms.get(&full_name) {
            return Ok(handle.clone());
        }

        let label_names = self.names_for(&full_name, label_count)?;
        let label_refs: Vec<&str> = label_names.iter().map(String::as_str).collect();
        let mut opts = histogram_opts!(
            name.to_string(),
            help.to_string(),
            self.histogram_buckets.clone()
        );
        if !namespace.is_empty() {
            opts = opts.namespace(namespace.to_string());
        }

        let vec = HistogramVec::new(opts, &label_refs).map_err(parse_prometheus_error)?;
        self.registry
            .register(Box::new(vec.clone()))
            .map_err(parse_prometheus_error)?;

        let handle = Arc::new(PrometheusHistogram { vec });
        histograms.insert(full_name, handle.clone());
        Ok(handle)
    }
}

/// [`PrometheusRegistryBuilder`] is a config builder to build a
/// [`PrometheusRegistry`].
pub struct PrometheusRegistryBuilder {
    histogram_buckets: Vec<f64>,
    label_names: HashMap<String, Vec<String>>,
}

impl Default for PrometheusRegistryBuilder {
    fn default() -> Self {
        Self {
            histogram_buckets: exponential_buckets(0.01, 2.0, 16).unwrap(),
            label_names: HashMap::new(),
        }
    }
}

impl PrometheusRegistryBuilder {
    /// Set buckets for all histograms created through this registry.
    pub fn histogram_buckets(mut self, buckets: Vec<f64>) -> Self {
        if !buckets.is_empty() {
            self.histogram_buckets = buckets;
        }
        self
    }

    /// Set the label names to register for the flat metric name `metric`.
    ///
    /// Metrics without configured names get positional ones (`label_0`,
    /// `label_1`, ...). Whatever is registered first pins the metric's
    /// cardinality for the process lifetime.
    pub fn label_names(mut self, metric: &str, names: &[&str]) -> Self {
        self.label_names.insert(
            metric.to_string(),
            names.iter().map(|v| v.to_string()).collect(),
        );
        self
    }

    /// Bind the metrics into `registry` and return a [`PrometheusRegistry`].
    pub fn register(self, registry: &Registry) -> PrometheusRegistry {
        PrometheusRegistry {
            registry: registry.clone(),
            label_names: self.label_names,
            histogram_buckets: self.histogram_buckets,
            counters: Mutex::new(HashMap::new()),
            gauges: Mutex::new(HashMap::new()),
            histograms: Mutex::new(HashMap::new()),
        }
    }
}

fn parse_prometheus_error(err: prometheus::Error) -> Error {
    let kind = match &err {
        prometheus::Error::InconsistentCardinality { .. } => ErrorKind::InvalidInput,
        _ => ErrorKind::Unexpected,
    };

    Error::new(kind, "prometheus backend rejected the call").set_source(err)
}

struct PrometheusCounter {
    vec: IntCounterVec,
}

impl Debug for PrometheusCounter {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrometheusCounter").finish_non_exhaustive()
    }
}

impl CounterHandle for PrometheusCounter {
    fn inc_by(&self, count: u64, labels: &[&str]) -> Result<()> {
        self.vec
            .get_metric_with_label_values(labels)
            .map_err(parse_prometheus_error)?
            .inc_by(count);
        Ok(())
    }
}

struct PrometheusGauge {
    vec: GaugeVec,
}

impl Debug for PrometheusGauge {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrometheusGauge").finish_non_exhaustive()
    }
}

impl GaugeHandle for PrometheusGauge {
    fn add(&self, value: f64, labels: &[&str]) -> Result<()> {
        self.vec
            .get_metric_with_label_values(labels)
            .map_err(parse_prometheus_error)?
            .add(value);
        Ok(())
    }

    fn sub(&self, value: f64, labels: &[&str]) -> Result<()> {
        self.vec
            .get_metric_with_label_values(labels)
            .map_err(parse_prometheus_error)?
            .sub(value);
        Ok(())
    }
}

struct PrometheusHistogram {
    vec: HistogramVec,
}

impl Debug for PrometheusHistogram {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrometheusHistogram").finish_non_exhaustive()
    }
}

impl HistogramHandle for PrometheusHistogram {
    fn observe(&self, value: f64, labels: &[&str]) -> Result<()> {
        self.vec
            .get_metric_with_label_values(labels)
            .map_err(parse_prometheus_error)?
            .observe(value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_get_or_create_reuses_the_series() {
        let prometheus_registry = Registry::new();
        let registry = PrometheusRegistry::new(&prometheus_registry);

        let first = registry.counter("mysql", "query_error", "mysql_query_error", 1);
        let second = registry.counter("mysql", "query_error", "mysql_query_error", 1);
        assert!(first.is_ok());
        assert!(second.is_ok());

        first.unwrap().inc_by(1, &["db-1"]).unwrap();
        second.unwrap().inc_by(1, &["db-1"]).unwrap();

        let families = prometheus_registry.gather();
        assert_eq!(families.len(), 1);
        assert_eq!(families[0].get_metric()[0].get_counter().get_value(), 2.0);
    }

    #[test]
    fn test_configured_label_names() {
        let prometheus_registry = Registry::new();
        let registry = PrometheusRegistry::builder()
            .label_names("mysql_query_error", &["host"])
            .register(&prometheus_registry);

        registry
            .counter("mysql", "query_error", "mysql_query_error", 1)
            .unwrap()
            .inc_by(1, &["db-1"])
            .unwrap();

        let families = prometheus_registry.gather();
        let labels = families[0].get_metric()[0].get_label();
        assert_eq!(labels[0].get_name(), "host");
        assert_eq!(labels[0].get_value(), "db-1");
    }

    #[test]
    fn test_label_cardinality_is_pinned() {
        let prometheus_registry = Registry::new();
        let registry = PrometheusRegistry::builder()
            .label_names("mysql_query_error", &["host"])
            .register(&prometheus_registry);

        // Two label values against a one-label metric.
        let err = registry
            .counter("mysql", "query_error", "mysql_query_error", 2)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn test_empty_namespace() {
        let prometheus_registry = Registry::new();
        let registry = PrometheusRegistry::new(&prometheus_registry);

        registry
            .gauge("", "pending", "pending", 0)
            .unwrap()
            .add(1.0, &[])
            .unwrap();

        let families = prometheus_registry.gather();
        assert_eq!(families[0].get_name(), "pending");
    }
}
