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

use redis::ConnectionLike;

use crate::raw::cache::CacheConnection;
use crate::raw::cache::CacheEndpoint;
use crate::raw::cache::CacheValue;
use crate::raw::cache::Command;
use crate::*;

/// A [`CacheConnection`] over [redis](https://docs.rs/redis).
///
/// Commands are dispatched generically, so the full protocol surface is
/// available through [`Command`] without per-command glue.
#[derive(Default)]
pub struct RedisCache {
    conn: Option<redis::Connection>,
    host: Option<String>,
}

impl Debug for RedisCache {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisCache")
            .field("host", &self.host)
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}

impl RedisCache {
    /// Create an unconnected client.
    pub fn new() -> Self {
        Self::default()
    }
}

fn format_redis_error(err: redis::RedisError) -> Error {
    let kind = if err.is_timeout() {
        ErrorKind::TimedOut
    } else if err.is_io_error() || err.is_connection_refusal() || err.is_connection_dropped() {
        ErrorKind::ConnectionFailed
    } else {
        ErrorKind::QueryFailed
    };

    Error::new(kind, "redis call failed").set_source(err)
}

fn format_redis_value(value: redis::Value) -> CacheValue {
    match value {
        redis::Value::Nil => CacheValue::Nil,
        redis::Value::Int(v) => CacheValue::Int(v),
        redis::Value::Data(v) => CacheValue::Data(v),
        redis::Value::Bulk(items) => {
            CacheValue::Array(items.into_iter().map(format_redis_value).collect())
        }
        redis::Value::Status(v) => CacheValue::Simple(v),
        redis::Value::Okay => CacheValue::ok(),
    }
}

impl CacheConnection for RedisCache {
    fn execute(&mut self, cmd: &Command) -> Result<CacheValue> {
        let conn = self.conn.as_mut().ok_or_else(|| {
            Error::new(ErrorKind::ConnectionFailed, "client is not connected")
                .with_operation("RedisCache::execute")
                .with_context("command", cmd.name())
        })?;

        let mut request = redis::cmd(cmd.name());
        for arg in cmd.args() {
            request.arg(arg.as_slice());
        }

        let value: redis::Value = request
            .query(conn)
            .map_err(format_redis_error)
            .map_err(|err| err.with_context("command", cmd.name()))?;
        Ok(format_redis_value(value))
    }

    fn connect(&mut self, endpoint: &CacheEndpoint) -> Result<bool> {
        let client = redis::Client::open(format!("redis://{}/", endpoint.addr())).map_err(|err| {
            Error::new(ErrorKind::ConfigInvalid, "endpoint is invalid")
                .with_operation("RedisCache::connect")
                .with_context("endpoint", endpoint.addr())
                .set_source(err)
        })?;

        let conn = match endpoint.timeout {
            Some(timeout) => client.get_connection_with_timeout(timeout),
            None => client.get_connection(),
        }
        .map_err(format_redis_error)
        .map_err(|err| err.with_context("endpoint", endpoint.addr()))?;

        self.conn = Some(conn);
        self.host = Some(endpoint.host.clone());
        Ok(true)
    }

    fn host(&self) -> String {
        self.host.clone().unwrap_or_default()
    }

    fn is_connected(&self) -> bool {
        self.conn.as_ref().map(|c| c.is_open()).unwrap_or(false)
    }
}
