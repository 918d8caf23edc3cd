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

//! Decorator instrumenting a key-value cache client.
//!
//! Measured metrics:
//!
//!   - `redis_connection_dial`
//!   - `redis_operation_error`
//!   - `redis_operation_exec_count`
//!   - `redis_operation_exec_time`
//!   - `redis_value_size`

use std::sync::Arc;
use std::time::Instant;

use log::debug;

use crate::collect::Collector;
use crate::collect::MeasureScope;
use crate::probe::LOGGING_TARGET;
use crate::raw::cache::CacheConnection;
use crate::raw::cache::CacheEndpoint;
use crate::raw::cache::CacheValue;
use crate::raw::cache::Command;
use crate::*;

static METRIC_CONNECTION_DIAL: &str = "redis_connection_dial";
static METRIC_OPERATION_ERROR: &str = "redis_operation_error";
static METRIC_OPERATION_EXEC_COUNT: &str = "redis_operation_exec_count";
static METRIC_OPERATION_EXEC_TIME: &str = "redis_operation_exec_time";
static METRIC_VALUE_SIZE: &str = "redis_value_size";

/// Commands dispatched through the generic path but deliberately left
/// unmeasured: they are purely local or administrative and carry no latency
/// or error signal worth reporting. Client-local accessors (options, host,
/// connection state) never go through the command path in the first place.
pub static UNMEASURED_COMMANDS: &[&str] = &["AUTH", "CLOSE", "ECHO", "PING", "SELECT", "SWAPDB"];

/// Wraps a [`CacheConnection`] and measures every command outside
/// [`UNMEASURED_COMMANDS`].
///
/// All commands run through one shared measured path: time the delegated
/// call; always report one exec-count and one exec-time sample labeled
/// `(host, COMMAND)`; count an error (and re-raise it) when the call fails;
/// on success additionally report a rough serialized size of the reply.
/// Connection attempts are a separate signal and get their own dial
/// histogram labeled `(host, success-flag)`.
#[derive(Debug)]
pub struct MeasuredCache<C: CacheConnection> {
    inner: C,
    collector: Arc<dyn Collector>,
}

impl<C: CacheConnection> MeasuredCache<C> {
    /// Wrap `inner`, reporting to `collector`.
    pub fn new(inner: C, collector: Arc<dyn Collector>) -> Self {
        Self { inner, collector }
    }

    fn measure_dial(&mut self, endpoint: &CacheEndpoint, persistent: bool) -> Result<bool> {
        let start = Instant::now();
        let success = if persistent {
            self.inner.persistent_connect(endpoint)?
        } else {
            self.inner.connect(endpoint)?
        };
        let elapsed = start.elapsed().as_secs_f64();

        self.collector.observe_histogram(
            METRIC_CONNECTION_DIAL,
            elapsed,
            &[&endpoint.host, if success { "true" } else { "false" }],
        )?;

        Ok(success)
    }
}

impl<C: CacheConnection> CacheConnection for MeasuredCache<C> {
    fn execute(&mut self, cmd: &Command) -> Result<CacheValue> {
        if UNMEASURED_COMMANDS.contains(&cmd.name()) {
            return self.inner.execute(cmd);
        }

        let host = self.inner.host();
        let collector = self.collector.clone();
        let scope = MeasureScope::start(
            collector.clone(),
            METRIC_OPERATION_EXEC_TIME,
            vec![host.clone(), cmd.name().to_string()],
        )
        .with_counter(METRIC_OPERATION_EXEC_COUNT);

        match self.inner.execute(cmd) {
            Ok(value) => {
                scope.finish()?;

                // A rough, not-really-accurate estimate of the reply size.
                // Estimation failures degrade to a zero-size sample.
                let size = serde_json::to_vec(&value).map(|v| v.len()).unwrap_or(0);
                collector.observe_histogram(METRIC_VALUE_SIZE, size as f64, &[&host])?;

                Ok(value)
            }
            Err(err) => {
                if let Err(e) =
                    collector.increment_counter(METRIC_OPERATION_ERROR, &[&host, cmd.name()])
                {
                    debug!(target: LOGGING_TARGET, "operation error count dropped: {e}");
                }
                Err(err)
            }
        }
    }

    fn connect(&mut self, endpoint: &CacheEndpoint) -> Result<bool> {
        self.measure_dial(endpoint, false)
    }

    fn persistent_connect(&mut self, endpoint: &CacheEndpoint) -> Result<bool> {
        self.measure_dial(endpoint, true)
    }

    fn host(&self) -> String {
        self.inner.host()
    }

    fn is_connected(&self) -> bool {
        self.inner.is_connected()
    }
}
