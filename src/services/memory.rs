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
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;

use crate::raw::cache::CacheConnection;
use crate::raw::cache::CacheEndpoint;
use crate::raw::cache::CacheValue;
use crate::raw::cache::Command;
use crate::*;

/// An in-process [`CacheConnection`] speaking a useful subset of the cache
/// protocol.
///
/// Clones share their storage, which makes this backend handy in tests: one
/// handle goes into the component under test, the other stays behind to
/// inspect what was written. It also serves as the always-available backend
/// when no cache peer is configured at all.
#[derive(Debug, Clone, Default)]
pub struct MemoryCache {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<Vec<u8>, Entry>,
    host: Option<String>,
    connected: bool,
}

#[derive(Debug)]
enum Entry {
    Value(Vec<u8>),
    Hash(HashMap<Vec<u8>, Vec<u8>>),
}

impl MemoryCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }
}

fn arg_str(cmd: &Command, index: usize) -> Result<&str> {
    let arg = cmd.args().get(index).ok_or_else(|| {
        Error::new(ErrorKind::InvalidInput, "wrong number of arguments")
            .with_operation("MemoryCache::execute")
            .with_context("command", cmd.name())
    })?;

    std::str::from_utf8(arg).map_err(|err| {
        Error::new(ErrorKind::InvalidInput, "argument is not valid utf-8")
            .with_operation("MemoryCache::execute")
            .with_context("command", cmd.name())
            .set_source(err)
    })
}

fn arg_bytes(cmd: &Command, index: usize) -> Result<Vec<u8>> {
    cmd.args()
        .get(index)
        .cloned()
        .ok_or_else(|| {
            Error::new(ErrorKind::InvalidInput, "wrong number of arguments")
                .with_operation("MemoryCache::execute")
                .with_context("command", cmd.name())
        })
}

fn wrong_type(cmd: &Command) -> Error {
    Error::new(
        ErrorKind::QueryFailed,
        "operation against a key holding the wrong kind of value",
    )
    .with_operation("MemoryCache::execute")
    .with_context("command", cmd.name())
}

/// Format a float the way the protocol does: no trailing fraction for
/// integral values.
fn format_float(value: f64) -> String {
    if value.is_finite() && value == value.trunc() {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

impl Inner {
    fn hash_entry(&mut self, key: Vec<u8>, cmd: &Command) -> Result<&mut HashMap<Vec<u8>, Vec<u8>>> {
        match self.entries.entry(key).or_insert_with(|| Entry::Hash(HashMap::new())) {
            Entry::Hash(hash) => Ok(hash),
            Entry::Value(_) => Err(wrong_type(cmd)),
        }
    }
}

impl CacheConnection for MemoryCache {
    fn execute(&mut self, cmd: &Command) -> Result<CacheValue> {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);

        match cmd.name() {
            "PING" => Ok(CacheValue::Simple("PONG".to_string())),
            "ECHO" => Ok(CacheValue::Data(arg_bytes(cmd, 0)?)),
            "SELECT" => Ok(CacheValue::ok()),
            "FLUSHDB" => {
                inner.entries.clear();
                Ok(CacheValue::ok())
            }
            "GET" => {
                let key = arg_bytes(cmd, 0)?;
                match inner.entries.get(&key) {
                    Some(Entry::Value(v)) => Ok(CacheValue::Data(v.clone())),
                    Some(Entry::Hash(_)) => Err(wrong_type(cmd)),
                    None => Ok(CacheValue::Nil),
                }
            }
            "SET" => {
                let key = arg_bytes(cmd, 0)?;
                let value = arg_bytes(cmd, 1)?;
                inner.entries.insert(key, Entry::Value(value));
                Ok(CacheValue::ok())
            }
            "DEL" => {
                let mut removed = 0;
                for key in cmd.args() {
                    if inner.entries.remove(key).is_some() {
                        removed += 1;
                    }
                }
                Ok(CacheValue::Int(removed))
            }
            "EXISTS" => {
                let key = arg_bytes(cmd, 0)?;
                Ok(CacheValue::Int(inner.entries.contains_key(&key) as i64))
            }
            "HGET" => {
                let key = arg_bytes(cmd, 0)?;
                let field = arg_bytes(cmd, 1)?;
                match inner.entries.get(&key) {
                    Some(Entry::Hash(hash)) => Ok(hash
                        .get(&field)
                        .map(|v| CacheValue::Data(v.clone()))
                        .unwrap_or(CacheValue::Nil)),
                    Some(Entry::Value(_)) => Err(wrong_type(cmd)),
                    None => Ok(CacheValue::Nil),
                }
            }
            "HSET" => {
                let key = arg_bytes(cmd, 0)?;
                let field = arg_bytes(cmd, 1)?;
                let value = arg_bytes(cmd, 2)?;
                let hash = inner.hash_entry(key, cmd)?;
                let created = !hash.contains_key(&field);
                hash.insert(field, value);
                Ok(CacheValue::Int(created as i64))
            }
            "HDEL" => {
                let key = arg_bytes(cmd, 0)?;
                let field = arg_bytes(cmd, 1)?;
                let hash = inner.hash_entry(key, cmd)?;
                Ok(CacheValue::Int(hash.remove(&field).is_some() as i64))
            }
            "HINCRBY" => {
                let key = arg_bytes(cmd, 0)?;
                let field = arg_bytes(cmd, 1)?;
                let delta: i64 = arg_str(cmd, 2)?.parse().map_err(|_| {
                    Error::new(ErrorKind::InvalidInput, "value is not an integer")
                        .with_operation("MemoryCache::execute")
                })?;

                let hash = inner.hash_entry(key, cmd)?;
                let current: i64 = hash
                    .get(&field)
                    .and_then(|v| std::str::from_utf8(v).ok())
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(0);
                let next = current + delta;
                hash.insert(field, next.to_string().into_bytes());
                Ok(CacheValue::Int(next))
            }
            "HINCRBYFLOAT" => {
                let key = arg_bytes(cmd, 0)?;
                let field = arg_bytes(cmd, 1)?;
                let delta: f64 = arg_str(cmd, 2)?.parse().map_err(|_| {
                    Error::new(ErrorKind::InvalidInput, "value is not a valid float")
                        .with_operation("MemoryCache::execute")
                })?;

                let hash = inner.hash_entry(key, cmd)?;
                let current: f64 = hash
                    .get(&field)
                    .and_then(|v| std::str::from_utf8(v).ok())
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(0.0);
                let next = format_float(current + delta);
                hash.insert(field, next.clone().into_bytes());
                Ok(CacheValue::Data(next.into_bytes()))
            }
            _ => Err(Error::new(ErrorKind::Unsupported, "command is not implemented")
                .with_operation("MemoryCache::execute")
                .with_context("command", cmd.name())),
        }
    }

    fn connect(&mut self, endpoint: &CacheEndpoint) -> Result<bool> {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.host = Some(endpoint.host.clone());
        inner.connected = true;
        Ok(true)
    }

    fn host(&self) -> String {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .host
            .clone()
            .unwrap_or_else(|| "memory".to_string())
    }

    fn is_connected(&self) -> bool {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .connected
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_get_set_del() {
        let mut cache = MemoryCache::new();

        assert_eq!(
            cache.execute(&Command::new("get").arg("k")).unwrap(),
            CacheValue::Nil
        );
        cache
            .execute(&Command::new("set").arg("k").arg("v"))
            .unwrap();
        assert_eq!(
            cache.execute(&Command::new("get").arg("k")).unwrap(),
            CacheValue::Data(b"v".to_vec())
        );
        assert_eq!(
            cache.execute(&Command::new("del").arg("k").arg("other")).unwrap(),
            CacheValue::Int(1)
        );
    }

    #[test]
    fn test_hash_increments() {
        let mut cache = MemoryCache::new();

        assert_eq!(
            cache
                .execute(&Command::new("hIncrBy").arg("h").arg("f").arg("2"))
                .unwrap(),
            CacheValue::Int(2)
        );
        assert_eq!(
            cache
                .execute(&Command::new("hIncrBy").arg("h").arg("f").arg("3"))
                .unwrap(),
            CacheValue::Int(5)
        );
        assert_eq!(
            cache
                .execute(&Command::new("hIncrByFloat").arg("h").arg("g").arg("1.5"))
                .unwrap(),
            CacheValue::Data(b"1.5".to_vec())
        );
        assert_eq!(
            cache
                .execute(&Command::new("hIncrByFloat").arg("h").arg("g").arg("2.5"))
                .unwrap(),
            CacheValue::Data(b"4".to_vec())
        );
    }

    #[test]
    fn test_wrong_type_is_rejected() {
        let mut cache = MemoryCache::new();

        cache
            .execute(&Command::new("set").arg("k").arg("v"))
            .unwrap();
        let err = cache
            .execute(&Command::new("hGet").arg("k").arg("f"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::QueryFailed);
    }

    #[test]
    fn test_clones_share_storage() {
        let mut cache = MemoryCache::new();
        let mut other = cache.clone();

        cache
            .execute(&Command::new("set").arg("k").arg("v"))
            .unwrap();
        assert_eq!(
            other.execute(&Command::new("get").arg("k")).unwrap(),
            CacheValue::Data(b"v".to_vec())
        );
    }

    #[test]
    fn test_connect_records_the_host() {
        let mut cache = MemoryCache::new();
        assert_eq!(cache.host(), "memory");
        assert!(!cache.is_connected());

        assert!(cache.connect(&CacheEndpoint::new("cache-1", 6379)).unwrap());
        assert_eq!(cache.host(), "cache-1");
        assert!(cache.is_connected());
    }

    #[test]
    fn test_unsupported_command() {
        let mut cache = MemoryCache::new();
        let err = cache
            .execute(&Command::new("georadius").arg("k"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unsupported);
    }
}
