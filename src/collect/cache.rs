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
use std::sync::Mutex;
use std::sync::PoisonError;

use crate::raw::cache::CacheConnection;
use crate::raw::cache::Command;
use crate::raw::CounterHandle;
use crate::raw::GaugeHandle;
use crate::raw::HistogramHandle;
use crate::raw::MetricRegistry;
use crate::*;

/// A [`MetricRegistry`] persisting samples in a key-value cache: the durable
/// store.
///
/// Every metric becomes one hash at `{prefix}:{kind}:{namespace}:{name}`;
/// each label tuple becomes a field holding the accumulated value, updated
/// with the cache's atomic hash-increment commands. Histograms keep a
/// `sum:`/`count:` field pair per label tuple; bucketing is left to whatever
/// reads the store back out, which keeps the write path to plain increments.
///
/// The transport underneath can fail at any call, so this registry is the
/// one to wrap in
/// [`FaultTolerantCollector`][crate::collect::FaultTolerantCollector].
pub struct CacheRegistry<C: CacheConnection> {
    conn: Arc<Mutex<C>>,
    key_prefix: String,
}

impl<C: CacheConnection> Debug for CacheRegistry<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheRegistry")
            .field("key_prefix", &self.key_prefix)
            .finish_non_exhaustive()
    }
}

impl<C: CacheConnection> CacheRegistry<C> {
    /// Create a registry storing samples through `conn`.
    pub fn new(conn: C) -> Self {
        Self::with_prefix(conn, "metrics")
    }

    /// Create a registry with a custom key prefix.
    pub fn with_prefix(conn: C, key_prefix: impl Into<String>) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
            key_prefix: key_prefix.into(),
        }
    }

    fn key(&self, kind: &str, namespace: &str, name: &str) -> String {
        format!("{}:{kind}:{namespace}:{name}", self.key_prefix)
    }
}

fn encode_labels(labels: &[&str], label_count: usize, operation: &'static str) -> Result<String> {
    if labels.len() != label_count {
        return Err(Error::new(
            ErrorKind::InvalidInput,
            "label values don't match the metric's cardinality",
        )
        .with_operation(operation)
        .with_context("expect", label_count)
        .with_context("got", labels.len()));
    }

    serde_json::to_string(labels).map_err(|err| {
        Error::new(ErrorKind::Unexpected, "encode label values")
            .with_operation(operation)
            .set_source(err)
    })
}

fn dispatch<C: CacheConnection>(conn: &Mutex<C>, cmd: &Command) -> Result<()> {
    conn.lock()
        .unwrap_or_else(PoisonError::into_inner)
        .execute(cmd)?;
    Ok(())
}

impl<C: CacheConnection + 'static> MetricRegistry for CacheRegistry<C> {
    fn counter(
        &self,
        namespace: &str,
        name: &str,
        _help: &str,
        label_count: usize,
    ) -> Result<Arc<dyn CounterHandle>> {
        Ok(Arc::new(CacheCounter {
            conn: self.conn.clone(),
            key: self.key("counter", namespace, name),
            label_count,
        }))
    }

    fn gauge(
        &self,
        namespace: &str,
        name: &str,
        _help: &str,
        label_count: usize,
    ) -> Result<Arc<dyn GaugeHandle>> {
        Ok(Arc::new(CacheGauge {
            conn: self.conn.clone(),
            key: self.key("gauge", namespace, name),
            label_count,
        }))
    }

    fn histogram(
        &self,
        namespace: &str,
        name: &str,
        _help: &str,
        label_count: usize,
    ) -> Result<Arc<dyn HistogramHandle>> {
        Ok(Arc::new(CacheHistogram {
            conn: self.conn.clone(),
            key: self.key("histogram", namespace, name),
            label_count,
        }))
    }
}

struct CacheCounter<C: CacheConnection> {
    conn: Arc<Mutex<C>>,
    key: String,
    label_count: usize,
}

impl<C: CacheConnection> Debug for CacheCounter<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheCounter").field("key", &self.key).finish()
    }
}

impl<C: CacheConnection> CounterHandle for CacheCounter<C> {
    fn inc_by(&self, count: u64, labels: &[&str]) -> Result<()> {
        let field = encode_labels(labels, self.label_count, "CacheCounter::inc_by")?;
        dispatch(
            &self.conn,
            &Command::new("hIncrBy")
                .arg(self.key.as_bytes())
                .arg(field)
                .arg(count.to_string()),
        )
    }
}

struct CacheGauge<C: CacheConnection> {
    conn: Arc<Mutex<C>>,
    key: String,
    label_count: usize,
}

impl<C: CacheConnection> Debug for CacheGauge<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheGauge").field("key", &self.key).finish()
    }
}

impl<C: CacheConnection> GaugeHandle for CacheGauge<C> {
    fn add(&self, value: f64, labels: &[&str]) -> Result<()> {
        let field = encode_labels(labels, self.label_count, "CacheGauge::add")?;
        dispatch(
            &self.conn,
            &Command::new("hIncrByFloat")
                .arg(self.key.as_bytes())
                .arg(field)
                .arg(value.to_string()),
        )
    }

    fn sub(&self, value: f64, labels: &[&str]) -> Result<()> {
        let field = encode_labels(labels, self.label_count, "CacheGauge::sub")?;
        dispatch(
            &self.conn,
            &Command::new("hIncrByFloat")
                .arg(self.key.as_bytes())
                .arg(field)
                .arg((-value).to_string()),
        )
    }
}

struct CacheHistogram<C: CacheConnection> {
    conn: Arc<Mutex<C>>,
    key: String,
    label_count: usize,
}

impl<C: CacheConnection> Debug for CacheHistogram<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheHistogram")
            .field("key", &self.key)
            .finish()
    }
}

impl<C: CacheConnection> HistogramHandle for CacheHistogram<C> {
    fn observe(&self, value: f64, labels: &[&str]) -> Result<()> {
        let field = encode_labels(labels, self.label_count, "CacheHistogram::observe")?;
        dispatch(
            &self.conn,
            &Command::new("hIncrByFloat")
                .arg(self.key.as_bytes())
                .arg(format!("sum:{field}"))
                .arg(value.to_string()),
        )?;
        dispatch(
            &self.conn,
            &Command::new("hIncrBy")
                .arg(self.key.as_bytes())
                .arg(format!("count:{field}"))
                .arg("1"),
        )
    }
}

#[cfg(all(test, feature = "services-memory"))]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::raw::cache::CacheValue;
    use crate::services::MemoryCache;

    fn hget(registry: &CacheRegistry<MemoryCache>, key: &str, field: &str) -> CacheValue {
        registry
            .conn
            .lock()
            .unwrap()
            .execute(&Command::new("hGet").arg(key).arg(field))
            .unwrap()
    }

    #[test]
    fn test_counter_accumulates() {
        let registry = CacheRegistry::new(MemoryCache::default());

        let counter = registry
            .counter("mysql", "query_error", "mysql_query_error", 1)
            .unwrap();
        counter.inc_by(1, &["db-1"]).unwrap();
        counter.inc_by(2, &["db-1"]).unwrap();

        let value = hget(&registry, "metrics:counter:mysql:query_error", "[\"db-1\"]");
        assert_eq!(value, CacheValue::Data(b"3".to_vec()));
    }

    #[test]
    fn test_histogram_keeps_sum_and_count() {
        let registry = CacheRegistry::new(MemoryCache::default());

        let histogram = registry
            .histogram("redis", "value_size", "redis_value_size", 1)
            .unwrap();
        histogram.observe(10.0, &["cache-1"]).unwrap();
        histogram.observe(32.0, &["cache-1"]).unwrap();

        let count = hget(
            &registry,
            "metrics:histogram:redis:value_size",
            "count:[\"cache-1\"]",
        );
        assert_eq!(count, CacheValue::Data(b"2".to_vec()));

        let sum = hget(
            &registry,
            "metrics:histogram:redis:value_size",
            "sum:[\"cache-1\"]",
        );
        assert_eq!(sum, CacheValue::Data(b"42".to_vec()));
    }

    #[test]
    fn test_label_cardinality_checked() {
        let registry = CacheRegistry::new(MemoryCache::default());

        let counter = registry
            .counter("mysql", "query_error", "mysql_query_error", 1)
            .unwrap();
        let err = counter.inc_by(1, &["db-1", "extra"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }
}
