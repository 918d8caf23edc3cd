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

//! Observer for the inbound HTTP request/response lifecycle of a host web
//! framework.
//!
//! Measured metrics:
//!
//!   - `http_request_body_size`
//!   - `http_request_pending`
//!   - `http_request_response_time`
//!   - `http_request_status_code_count`

use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use http::Response;

use crate::collect::Collector;
use crate::raw::parse_content_length;
use crate::*;

static METRIC_REQUEST_PENDING: &str = "http_request_pending";
static METRIC_RESPONSE_TIME: &str = "http_request_response_time";
static METRIC_STATUS_CODE: &str = "http_request_status_code_count";
static METRIC_BODY_SIZE: &str = "http_request_body_size";

/// The route name the metrics exposition endpoint is assumed to live under
/// unless configured otherwise.
static DEFAULT_METRICS_ROUTE: &str = "metrics";

/// Binds inbound request instrumentation to a host web framework.
///
/// The probe itself is long-lived and shared; every in-flight request gets
/// its own [`RequestObserver`] via [`observer`][HttpServerProbe::observer].
/// The observer owns the request's start timestamp, so overlapping requests
/// can never corrupt each other's timing; correctness comes from one
/// observer per request, not from locking.
#[derive(Debug, Clone)]
pub struct HttpServerProbe {
    collector: Arc<dyn Collector>,
    metrics_route: Arc<str>,
}

impl HttpServerProbe {
    /// Create a probe reporting to `collector`.
    pub fn new(collector: Arc<dyn Collector>) -> Self {
        Self::with_metrics_route(collector, DEFAULT_METRICS_ROUTE)
    }

    /// Create a probe whose block-list excludes `metrics_route` instead of
    /// the default `metrics`.
    pub fn with_metrics_route(collector: Arc<dyn Collector>, metrics_route: &str) -> Self {
        Self {
            collector,
            metrics_route: Arc::from(metrics_route),
        }
    }

    /// Create the observer for one in-flight request.
    pub fn observer(&self) -> RequestObserver {
        RequestObserver {
            collector: self.collector.clone(),
            metrics_route: self.metrics_route.clone(),
            started: None,
        }
    }
}

/// Observes the lifecycle of a single request.
///
/// Bind [`on_request`][RequestObserver::on_request] to the framework's
/// request-received event and [`on_response`][RequestObserver::on_response]
/// to its response-finalized event.
#[derive(Debug)]
pub struct RequestObserver {
    collector: Arc<dyn Collector>,
    metrics_route: Arc<str>,
    started: Option<Instant>,
}

impl RequestObserver {
    /// Routes that never produce metrics: requests without a route
    /// identifier, framework-internal routes, and the metrics exposition
    /// route itself (scraping must not count itself).
    fn observed_route<'a>(&self, route: Option<&'a str>) -> Option<&'a str> {
        route.filter(|route| !route.starts_with('_') && *route != &*self.metrics_route)
    }

    /// Hook for the request-received event.
    pub fn on_request(&mut self, route: Option<&str>) -> Result<()> {
        let Some(route) = self.observed_route(route) else {
            return Ok(());
        };

        self.started = Some(Instant::now());
        self.collector
            .increment_gauge(METRIC_REQUEST_PENDING, &[route])
    }

    /// Hook for the response-finalized event.
    pub fn on_response(&mut self, route: Option<&str>, response: &Response<Bytes>) -> Result<()> {
        let Some(route) = self.observed_route(route) else {
            return Ok(());
        };

        let elapsed = self
            .started
            .map(|started| started.elapsed().as_secs_f64())
            .unwrap_or(0.0);
        let status = response.status().as_u16().to_string();
        let body_size = match parse_content_length(response.headers()) {
            Ok(Some(length)) => length as f64,
            _ => response.body().len() as f64,
        };

        self.collector
            .decrement_gauge(METRIC_REQUEST_PENDING, &[route])?;
        self.collector
            .observe_histogram(METRIC_RESPONSE_TIME, elapsed, &[route])?;
        self.collector
            .increment_counter(METRIC_STATUS_CODE, &[&status, route])?;
        self.collector
            .observe_histogram(METRIC_BODY_SIZE, body_size, &[route])
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use http::header::CONTENT_LENGTH;
    use http::StatusCode;
    use pretty_assertions::assert_eq;

    use super::*;

    #[derive(Debug, Default)]
    struct RecordingCollector {
        events: Mutex<Vec<String>>,
    }

    impl RecordingCollector {
        fn events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }

        fn push(&self, event: String) {
            self.events.lock().unwrap().push(event)
        }
    }

    impl Collector for RecordingCollector {
        fn increment_counter_by(&self, name: &str, count: u64, labels: &[&str]) -> Result<()> {
            self.push(format!("counter {name} {count} {}", labels.join(",")));
            Ok(())
        }

        fn increment_gauge_by(&self, name: &str, value: f64, labels: &[&str]) -> Result<()> {
            self.push(format!("gauge {name} +{value} {}", labels.join(",")));
            Ok(())
        }

        fn decrement_gauge_by(&self, name: &str, value: f64, labels: &[&str]) -> Result<()> {
            self.push(format!("gauge {name} -{value} {}", labels.join(",")));
            Ok(())
        }

        fn observe_histogram(&self, name: &str, value: f64, labels: &[&str]) -> Result<()> {
            if name == METRIC_BODY_SIZE {
                self.push(format!("histogram {name} {value} {}", labels.join(",")));
            } else {
                self.push(format!("histogram {name} {}", labels.join(",")));
            }
            Ok(())
        }
    }

    fn probe() -> (HttpServerProbe, Arc<RecordingCollector>) {
        let collector = Arc::new(RecordingCollector::default());
        (
            HttpServerProbe::new(collector.clone() as Arc<dyn Collector>),
            collector,
        )
    }

    fn response(body: &'static [u8]) -> Response<Bytes> {
        Response::new(Bytes::from_static(body))
    }

    #[test]
    fn test_request_lifecycle() {
        let (probe, collector) = probe();

        let mut observer = probe.observer();
        observer.on_request(Some("orders_list")).unwrap();
        observer
            .on_response(Some("orders_list"), &response(b"[]"))
            .unwrap();

        assert_eq!(
            collector.events(),
            vec![
                "gauge http_request_pending +1 orders_list".to_string(),
                "gauge http_request_pending -1 orders_list".to_string(),
                "histogram http_request_response_time orders_list".to_string(),
                "counter http_request_status_code_count 1 200,orders_list".to_string(),
                "histogram http_request_body_size 2 orders_list".to_string(),
            ]
        );
    }

    #[test]
    fn test_content_length_wins_over_body_length() {
        let (probe, collector) = probe();

        let mut response = response(b"[]");
        response
            .headers_mut()
            .insert(CONTENT_LENGTH, "512".parse().unwrap());

        let mut observer = probe.observer();
        observer.on_request(Some("orders_list")).unwrap();
        observer.on_response(Some("orders_list"), &response).unwrap();

        let events = collector.events();
        assert_eq!(events[4], "histogram http_request_body_size 512 orders_list");
    }

    #[test]
    fn test_status_code_label() {
        let (probe, collector) = probe();

        let mut response = response(b"");
        *response.status_mut() = StatusCode::NOT_FOUND;

        let mut observer = probe.observer();
        observer.on_request(Some("orders_get")).unwrap();
        observer.on_response(Some("orders_get"), &response).unwrap();

        let events = collector.events();
        assert_eq!(
            events[3],
            "counter http_request_status_code_count 1 404,orders_get"
        );
    }

    #[test]
    fn test_blocklisted_routes_produce_no_metrics() {
        let (probe, collector) = probe();

        for route in [None, Some("_profiler"), Some("metrics")] {
            let mut observer = probe.observer();
            observer.on_request(route).unwrap();
            observer.on_response(route, &response(b"x")).unwrap();
        }

        assert_eq!(collector.events(), Vec::<String>::new());
    }

    #[test]
    fn test_custom_metrics_route_is_blocklisted() {
        let collector = Arc::new(RecordingCollector::default());
        let probe = HttpServerProbe::with_metrics_route(
            collector.clone() as Arc<dyn Collector>,
            "prometheus",
        );

        let mut observer = probe.observer();
        observer.on_request(Some("prometheus")).unwrap();
        observer
            .on_response(Some("prometheus"), &response(b"x"))
            .unwrap();

        // The default name is observable again under a custom config.
        let mut observer = probe.observer();
        observer.on_request(Some("metrics")).unwrap();
        observer.on_response(Some("metrics"), &response(b"x")).unwrap();

        let events = collector.events();
        assert_eq!(events[0], "gauge http_request_pending +1 metrics");
        assert_eq!(events.len(), 5);
    }

    #[test]
    fn test_overlapping_requests_use_separate_observers() {
        let (probe, collector) = probe();

        let mut first = probe.observer();
        let mut second = probe.observer();

        first.on_request(Some("orders_list")).unwrap();
        second.on_request(Some("orders_get")).unwrap();
        second
            .on_response(Some("orders_get"), &response(b""))
            .unwrap();
        first
            .on_response(Some("orders_list"), &response(b""))
            .unwrap();

        let events = collector.events();
        assert_eq!(events.len(), 10);
        assert_eq!(events[0], "gauge http_request_pending +1 orders_list");
        assert_eq!(events[1], "gauge http_request_pending +1 orders_get");
    }
}
