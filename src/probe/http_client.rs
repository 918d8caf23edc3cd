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

//! Interception point for an outbound HTTP client's handler chain.
//!
//! Measured metrics, where `api` is a customisable prefix:
//!
//!   - `api_request_body_size`
//!   - `api_request_pending`
//!   - `api_request_response_time`
//!   - `api_request_status_code_count`

use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use http::Request;
use http::Response;
use log::debug;

use crate::collect::Collector;
use crate::probe::LOGGING_TARGET;
use crate::raw::parse_content_length;
use crate::raw::HttpFetch;
use crate::*;

/// The default metric prefix for outbound requests.
static DEFAULT_METRIC_PREFIX: &str = "api";

/// Wraps an [`HttpFetch`] and measures every request going through it.
///
/// Insert it anywhere in a client's fetcher chain, e.g. via
/// [`HttpClient::with`][crate::raw::HttpClient::with]:
///
/// ```no_run
/// # use std::sync::Arc;
/// # use measurable::collect::Collector;
/// # use measurable::probe::MeasuredHttpFetcher;
/// # use measurable::raw::HttpClient;
/// # use measurable::Result;
/// # fn wire(collector: Arc<dyn Collector>) -> Result<()> {
/// let client = HttpClient::with(MeasuredHttpFetcher::new(
///     reqwest::Client::new(),
///     collector,
/// ));
/// # Ok(())
/// # }
/// ```
///
/// While a request is in flight it is counted in the pending gauge. On a
/// successful response the gauge is settled and response time, status code
/// and body size are reported. When the underlying fetch fails only the
/// pending gauge is settled; the error carries no response to label a
/// status-code or size sample with, so none is recorded.
pub struct MeasuredHttpFetcher<F: HttpFetch> {
    inner: F,
    collector: Arc<dyn Collector>,

    metric_pending: String,
    metric_response_time: String,
    metric_status_code: String,
    metric_body_size: String,
}

impl<F: HttpFetch> MeasuredHttpFetcher<F> {
    /// Wrap `inner` under the default `api` metric prefix.
    pub fn new(inner: F, collector: Arc<dyn Collector>) -> Self {
        Self::with_prefix(inner, collector, DEFAULT_METRIC_PREFIX)
    }

    /// Wrap `inner`, deriving metric names from `prefix`.
    pub fn with_prefix(inner: F, collector: Arc<dyn Collector>, prefix: &str) -> Self {
        Self {
            inner,
            collector,
            metric_pending: format!("{prefix}_request_pending"),
            metric_response_time: format!("{prefix}_request_response_time"),
            metric_status_code: format!("{prefix}_request_status_code_count"),
            metric_body_size: format!("{prefix}_request_body_size"),
        }
    }
}

impl<F: HttpFetch> HttpFetch for MeasuredHttpFetcher<F> {
    async fn fetch(&self, req: Request<Bytes>) -> Result<Response<Bytes>> {
        let start = Instant::now();
        self.collector.increment_gauge(&self.metric_pending, &[])?;

        match self.inner.fetch(req).await {
            Ok(response) => {
                let elapsed = start.elapsed().as_secs_f64();
                let status = response.status().as_u16().to_string();
                let body_size = match parse_content_length(response.headers()) {
                    Ok(Some(length)) => length as f64,
                    _ => response.body().len() as f64,
                };

                self.collector.decrement_gauge(&self.metric_pending, &[])?;
                self.collector
                    .observe_histogram(&self.metric_response_time, elapsed, &[])?;
                self.collector
                    .increment_counter(&self.metric_status_code, &[&status])?;
                self.collector
                    .observe_histogram(&self.metric_body_size, body_size, &[])?;

                Ok(response)
            }
            Err(err) => {
                if let Err(e) = self.collector.decrement_gauge(&self.metric_pending, &[]) {
                    debug!(target: LOGGING_TARGET, "pending gauge not settled: {e}");
                }
                Err(err)
            }
        }
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

        fn increment_gauge_by(&self, name: &str, value: f64, _: &[&str]) -> Result<()> {
            self.push(format!("gauge {name} +{value}"));
            Ok(())
        }

        fn decrement_gauge_by(&self, name: &str, value: f64, _: &[&str]) -> Result<()> {
            self.push(format!("gauge {name} -{value}"));
            Ok(())
        }

        fn observe_histogram(&self, name: &str, value: f64, _: &[&str]) -> Result<()> {
            if name.ends_with("body_size") {
                self.push(format!("histogram {name} {value}"));
            } else {
                self.push(format!("histogram {name}"));
            }
            Ok(())
        }
    }

    struct MockFetcher {
        response: fn() -> Result<Response<Bytes>>,
    }

    impl HttpFetch for MockFetcher {
        async fn fetch(&self, _: Request<Bytes>) -> Result<Response<Bytes>> {
            (self.response)()
        }
    }

    fn request() -> Request<Bytes> {
        Request::builder()
            .uri("http://api.example.com/v1/orders")
            .body(Bytes::new())
            .unwrap()
    }

    #[tokio::test]
    async fn test_successful_request() {
        let collector = Arc::new(RecordingCollector::default());
        let fetcher = MeasuredHttpFetcher::new(
            MockFetcher {
                response: || Ok(Response::new(Bytes::from_static(b"hello"))),
            },
            collector.clone(),
        );

        fetcher.fetch(request()).await.unwrap();

        assert_eq!(
            collector.events(),
            vec![
                "gauge api_request_pending +1".to_string(),
                "gauge api_request_pending -1".to_string(),
                "histogram api_request_response_time".to_string(),
                "counter api_request_status_code_count 1 200".to_string(),
                "histogram api_request_body_size 5".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_content_length_wins_over_body_length() {
        let collector = Arc::new(RecordingCollector::default());
        let fetcher = MeasuredHttpFetcher::new(
            MockFetcher {
                response: || {
                    let mut response = Response::new(Bytes::from_static(b"hello"));
                    response
                        .headers_mut()
                        .insert(CONTENT_LENGTH, "1024".parse().unwrap());
                    Ok(response)
                },
            },
            collector.clone(),
        );

        fetcher.fetch(request()).await.unwrap();

        let events = collector.events();
        assert_eq!(events[4], "histogram api_request_body_size 1024");
    }

    #[tokio::test]
    async fn test_error_status_is_still_counted() {
        let collector = Arc::new(RecordingCollector::default());
        let fetcher = MeasuredHttpFetcher::new(
            MockFetcher {
                response: || {
                    let mut response = Response::new(Bytes::new());
                    *response.status_mut() = StatusCode::SERVICE_UNAVAILABLE;
                    Ok(response)
                },
            },
            collector.clone(),
        );

        fetcher.fetch(request()).await.unwrap();

        let events = collector.events();
        assert_eq!(events[3], "counter api_request_status_code_count 1 503");
    }

    #[tokio::test]
    async fn test_failed_request_settles_the_pending_gauge() {
        let collector = Arc::new(RecordingCollector::default());
        let fetcher = MeasuredHttpFetcher::new(
            MockFetcher {
                response: || Err(Error::new(ErrorKind::ConnectionFailed, "connection refused")),
            },
            collector.clone(),
        );

        let err = fetcher.fetch(request()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConnectionFailed);

        assert_eq!(
            collector.events(),
            vec![
                "gauge api_request_pending +1".to_string(),
                "gauge api_request_pending -1".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_custom_prefix() {
        let collector = Arc::new(RecordingCollector::default());
        let fetcher = MeasuredHttpFetcher::with_prefix(
            MockFetcher {
                response: || Ok(Response::new(Bytes::new())),
            },
            collector.clone(),
            "billing",
        );

        fetcher.fetch(request()).await.unwrap();

        let events = collector.events();
        assert_eq!(events[0], "gauge billing_request_pending +1");
        assert_eq!(events[2], "histogram billing_request_response_time");
    }
}
