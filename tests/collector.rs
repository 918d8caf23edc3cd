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

//! Functional tests driving the full composed stack: probes reporting
//! through the adapter into a real prometheus registry.

#![cfg(feature = "services-memory")]

use std::sync::Arc;

use measurable::collect::Collector;
use measurable::collect::FaultTolerantCollector;
use measurable::collect::LoggingCollector;
use measurable::collect::PrometheusRegistry;
use measurable::collect::RegistryCollector;
use measurable::probe::MeasuredCache;
use measurable::raw::cache::CacheConnection;
use measurable::raw::cache::Command;
use measurable::services::MemoryCache;

fn gathered_value(registry: &prometheus::Registry, name: &str, labels: &[(&str, &str)]) -> f64 {
    let families = registry.gather();
    let family = families
        .iter()
        .find(|f| f.get_name() == name)
        .unwrap_or_else(|| panic!("metric family {name} not found"));

    let metric = family
        .get_metric()
        .iter()
        .find(|m| {
            labels.iter().all(|(k, v)| {
                m.get_label()
                    .iter()
                    .any(|l| l.get_name() == *k && l.get_value() == *v)
            })
        })
        .unwrap_or_else(|| panic!("no series of {name} matches {labels:?}"));

    if family.get_field_type() == prometheus::proto::MetricType::COUNTER {
        metric.get_counter().get_value()
    } else if family.get_field_type() == prometheus::proto::MetricType::GAUGE {
        metric.get_gauge().get_value()
    } else {
        metric.get_histogram().get_sample_count() as f64
    }
}

fn stack(registry: &prometheus::Registry) -> Arc<dyn Collector> {
    let _ = env_logger::builder().is_test(true).try_init();

    let backend = PrometheusRegistry::builder()
        .label_names("redis_operation_exec_count", &["host", "command"])
        .label_names("redis_operation_exec_time", &["host", "command"])
        .label_names("redis_operation_error", &["host", "command"])
        .label_names("redis_value_size", &["host"])
        .label_names("redis_connection_dial", &["host", "success"])
        .register(registry);

    Arc::new(LoggingCollector::new(FaultTolerantCollector::new(
        RegistryCollector::new(Arc::new(backend)),
    )))
}

#[test]
fn test_cache_probe_reports_into_prometheus() {
    let registry = prometheus::Registry::new();
    let collector = stack(&registry);

    let mut cache = MeasuredCache::new(MemoryCache::new(), collector);
    cache
        .execute(&Command::new("set").arg("greeting").arg("hello"))
        .unwrap();
    cache.execute(&Command::new("get").arg("greeting")).unwrap();
    cache.execute(&Command::new("get").arg("greeting")).unwrap();

    assert_eq!(
        gathered_value(
            &registry,
            "redis_operation_exec_count",
            &[("host", "memory"), ("command", "GET")],
        ),
        2.0
    );
    assert_eq!(
        gathered_value(
            &registry,
            "redis_operation_exec_count",
            &[("host", "memory"), ("command", "SET")],
        ),
        1.0
    );
    assert_eq!(
        gathered_value(
            &registry,
            "redis_operation_exec_time",
            &[("host", "memory"), ("command", "GET")],
        ),
        2.0
    );
    assert_eq!(
        gathered_value(&registry, "redis_value_size", &[("host", "memory")]),
        3.0
    );
}

#[test]
fn test_failed_command_is_counted_and_reraised() {
    let registry = prometheus::Registry::new();
    let collector = stack(&registry);

    let mut cache = MeasuredCache::new(MemoryCache::new(), collector);
    cache
        .execute(&Command::new("set").arg("greeting").arg("hello"))
        .unwrap();

    // HGET against a plain string key is rejected by the backend.
    cache
        .execute(&Command::new("hGet").arg("greeting").arg("f"))
        .unwrap_err();

    assert_eq!(
        gathered_value(
            &registry,
            "redis_operation_error",
            &[("host", "memory"), ("command", "HGET")],
        ),
        1.0
    );
    // The always-metrics cover the failed call too.
    assert_eq!(
        gathered_value(
            &registry,
            "redis_operation_exec_time",
            &[("host", "memory"), ("command", "HGET")],
        ),
        1.0
    );
}

#[test]
fn test_unmeasured_commands_stay_invisible() {
    let registry = prometheus::Registry::new();
    let collector = stack(&registry);

    let mut cache = MeasuredCache::new(MemoryCache::new(), collector);
    cache.execute(&Command::new("ping")).unwrap();
    cache.execute(&Command::new("select").arg("2")).unwrap();

    assert!(registry.gather().is_empty());
}

#[test]
fn test_dial_is_observed_with_the_success_flag() {
    let registry = prometheus::Registry::new();
    let collector = stack(&registry);

    let mut cache = MeasuredCache::new(MemoryCache::new(), collector);
    cache
        .connect(&measurable::raw::cache::CacheEndpoint::new("cache-1", 6379))
        .unwrap();

    assert_eq!(
        gathered_value(
            &registry,
            "redis_connection_dial",
            &[("host", "cache-1"), ("success", "true")],
        ),
        1.0
    );
}
