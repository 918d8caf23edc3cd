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

//! Failure-tolerant wiring of the metrics store.
//!
//! A broken cache peer at boot must degrade metrics durability, never crash
//! the application. The pieces here make that happen:
//!
//! - [`FailSafeCacheFactory`] turns a transport failure during cache
//!   construction into the [`CacheResource::Failed`] sentinel instead of an
//!   error.
//! - [`MetricStoreFactory`] lazily drives the factory once per process and
//!   picks the store accordingly: a live cache backs the durable
//!   [`CacheRegistry`][crate::collect::CacheRegistry] (hardened with
//!   [`FaultTolerantCollector`][crate::collect::FaultTolerantCollector]);
//!   the sentinel falls back to the volatile in-process
//!   [`PrometheusRegistry`][crate::collect::PrometheusRegistry].
//!
//! The resource lifecycle is one-way: `Unconstructed → {Live, Failed}` at
//! the first use, then pinned for the process lifetime. A `Failed` resource
//! never becomes `Live` again; a retried construction would be a new
//! factory, not a transition on this one.

use std::fmt::Debug;
use std::sync::Arc;

use log::warn;
use once_cell::sync::OnceCell;

use crate::collect::CacheRegistry;
use crate::collect::Collector;
use crate::collect::FaultTolerantCollector;
use crate::collect::PrometheusRegistry;
use crate::collect::RegistryCollector;
use crate::raw::cache::CacheConnection;
use crate::raw::cache::CacheEndpoint;
use crate::*;

static LOGGING_TARGET: &str = "measurable::store";

/// A cache resource that either came up or didn't.
///
/// `Failed` is a sentinel carrying no capability at all. Nothing is ever
/// invoked on it; the one component that needs to care
/// ([`MetricStoreFactory`]) branches on the variant explicitly, everything
/// else only ever sees a live connection.
#[derive(Debug)]
pub enum CacheResource<C> {
    /// The resource was constructed and is usable.
    Live(C),
    /// Construction failed; the resource is a placeholder.
    Failed,
}

impl<C> CacheResource<C> {
    /// Whether this resource is the failed sentinel.
    pub fn is_failed(&self) -> bool {
        matches!(self, CacheResource::Failed)
    }
}

/// A factory producing cache connections from connection parameters.
///
/// Implemented for free by any `Fn(&CacheEndpoint) -> Result<C>` closure.
pub trait CacheFactory: Send + Sync {
    /// The connection type this factory produces.
    type Conn: CacheConnection;

    /// Construct a connection to `endpoint`.
    fn create(&self, endpoint: &CacheEndpoint) -> Result<Self::Conn>;
}

impl<F, C> CacheFactory for F
where
    F: Fn(&CacheEndpoint) -> Result<C> + Send + Sync,
    C: CacheConnection,
{
    type Conn = C;

    fn create(&self, endpoint: &CacheEndpoint) -> Result<Self::Conn> {
        self(endpoint)
    }
}

/// Wraps a [`CacheFactory`] and substitutes the [`CacheResource::Failed`]
/// sentinel when construction fails on the transport.
///
/// Application construction must never abort just because a cache peer is
/// unreachable at boot: the degraded mode is logged, not raised. Failures
/// outside the transport category (e.g. invalid config) still propagate,
/// those are bugs to fix, not outages to ride out.
#[derive(Debug)]
pub struct FailSafeCacheFactory<F: CacheFactory> {
    inner: F,
}

impl<F: CacheFactory> FailSafeCacheFactory<F> {
    /// Wrap `inner`.
    pub fn new(inner: F) -> Self {
        Self { inner }
    }

    /// Construct the resource, degrading transport failures to the sentinel.
    pub fn create(&self, endpoint: &CacheEndpoint) -> Result<CacheResource<F::Conn>> {
        match self.inner.create(endpoint) {
            Ok(conn) => Ok(CacheResource::Live(conn)),
            Err(err) if err.kind().is_transport() => {
                warn!(
                    target: LOGGING_TARGET,
                    "cache resource at {} is unavailable, metrics degrade to the in-process store: {err}",
                    endpoint.addr()
                );
                Ok(CacheResource::Failed)
            }
            Err(err) => Err(err),
        }
    }
}

/// Selects and memoizes the metrics store for one cache resource.
///
/// The underlying resource is lazily constructed on the first
/// [`collector`][MetricStoreFactory::collector] call and the resulting
/// store is pinned for the lifetime of this factory: exactly one
/// construction attempt, exactly one selection, shared by every caller.
pub struct MetricStoreFactory<F: CacheFactory> {
    factory: FailSafeCacheFactory<F>,
    endpoint: CacheEndpoint,
    fallback: prometheus::Registry,
    collector: OnceCell<Arc<dyn Collector>>,
}

impl<F: CacheFactory> Debug for MetricStoreFactory<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricStoreFactory")
            .field("endpoint", &self.endpoint)
            .field("selected", &self.collector.get().is_some())
            .finish_non_exhaustive()
    }
}

impl<F: CacheFactory> MetricStoreFactory<F>
where
    F::Conn: 'static,
{
    /// Create a factory connecting through `factory` to `endpoint`, with
    /// the process-default prometheus registry as the degraded-mode
    /// fallback.
    pub fn new(factory: F, endpoint: CacheEndpoint) -> Self {
        Self::with_fallback(factory, endpoint, prometheus::default_registry().clone())
    }

    /// Create a factory binding degraded-mode metrics into `fallback`.
    pub fn with_fallback(factory: F, endpoint: CacheEndpoint, fallback: prometheus::Registry) -> Self {
        Self {
            factory: FailSafeCacheFactory::new(factory),
            endpoint,
            fallback,
            collector: OnceCell::new(),
        }
    }

    /// The collector backed by the selected store.
    ///
    /// First call forces resource construction and store selection; later
    /// calls return the same collector.
    pub fn collector(&self) -> Result<Arc<dyn Collector>> {
        self.collector
            .get_or_try_init(|| {
                let collector: Arc<dyn Collector> =
                    match self.factory.create(&self.endpoint)? {
                        CacheResource::Live(conn) => Arc::new(FaultTolerantCollector::new(
                            RegistryCollector::new(Arc::new(CacheRegistry::new(conn))),
                        )),
                        CacheResource::Failed => Arc::new(RegistryCollector::new(Arc::new(
                            PrometheusRegistry::new(&self.fallback),
                        ))),
                    };
                Ok(collector)
            })
            .map(Arc::clone)
    }
}
