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

//! Capability contract for key-value cache clients.
//!
//! The cache probe and the durable metric store both talk to the cache
//! through one generic surface: any protocol command can be dispatched via
//! [`CacheConnection::execute`] with a [`Command`] built from the canonical
//! command spelling. Client libraries with per-method APIs adapt onto this
//! surface; method-level aliases are folded back into the canonical command
//! name by [`Command::new`].

use std::fmt::Debug;
use std::time::Duration;

use serde::Serialize;

use crate::*;

/// Method aliases some client libraries expose, mapped back to the protocol
/// command they actually send. Label values must carry the canonical
/// spelling regardless of which alias the caller went through.
static COMMAND_ALIASES: &[(&str, &str)] = &[
    ("DELETE", "DEL"),
    ("GETMULTIPLE", "MGET"),
    ("LGET", "LINDEX"),
    ("LGETRANGE", "LRANGE"),
    ("LREMOVE", "LREM"),
    ("LSIZE", "LLEN"),
    ("RENAMEKEY", "RENAME"),
    ("SCONTAINS", "SISMEMBER"),
    ("SETTIMEOUT", "EXPIRE"),
    ("SGETMEMBERS", "SMEMBERS"),
    ("SREMOVE", "SREM"),
    ("SSIZE", "SCARD"),
    ("SUBSTR", "GETRANGE"),
    ("ZDELETE", "ZREM"),
    ("ZREMOVE", "ZREM"),
    ("ZSIZE", "ZCARD"),
];

/// One cache protocol command, ready for generic dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    name: String,
    args: Vec<Vec<u8>>,
}

impl Command {
    /// Build a command from any method-level spelling.
    ///
    /// The stored name is the canonical uppercased protocol spelling:
    /// `Command::new("lSize")` and `Command::new("LLEN")` are the same
    /// command.
    pub fn new(name: &str) -> Self {
        let upper = name.to_uppercase();
        let canonical = COMMAND_ALIASES
            .iter()
            .find(|(alias, _)| *alias == upper)
            .map(|(_, canonical)| canonical.to_string())
            .unwrap_or(upper);

        Command {
            name: canonical,
            args: Vec::new(),
        }
    }

    /// Append an argument.
    pub fn arg(mut self, arg: impl Into<Vec<u8>>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// The canonical uppercased command name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The command arguments, in order.
    pub fn args(&self) -> &[Vec<u8>] {
        &self.args
    }
}

/// A reply from the cache.
///
/// `Serialize` exists so callers can estimate a reply's rough wire size;
/// it's not a protocol encoding.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CacheValue {
    /// No value, e.g. a missing key.
    Nil,
    /// A boolean reply.
    Bool(bool),
    /// An integer reply.
    Int(i64),
    /// A floating point reply.
    Double(f64),
    /// A binary-safe data reply.
    Data(Vec<u8>),
    /// A simple status reply like `OK`.
    Simple(String),
    /// A multi-value reply.
    Array(Vec<CacheValue>),
}

impl CacheValue {
    /// The conventional `OK` status reply.
    pub fn ok() -> Self {
        CacheValue::Simple("OK".to_string())
    }
}

/// Connection parameters for [`CacheConnection::connect`].
#[derive(Debug, Clone, Default)]
pub struct CacheEndpoint {
    /// Target host, used as a metric label by the probes.
    pub host: String,
    /// Target port.
    pub port: u16,
    /// Connect timeout, client default if unset.
    pub timeout: Option<Duration>,
}

impl CacheEndpoint {
    /// Create an endpoint pointing at `host:port`.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        CacheEndpoint {
            host: host.into(),
            port,
            timeout: None,
        }
    }

    /// The `host:port` address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// A key-value cache client.
///
/// Only the generic pieces the instrumentation layer needs: command
/// dispatch, the connect operations, and the connection-state accessors.
pub trait CacheConnection: Debug + Send {
    /// Dispatch one protocol command.
    fn execute(&mut self, cmd: &Command) -> Result<CacheValue>;

    /// Connect to `endpoint`. Returns whether the connection was
    /// established.
    fn connect(&mut self, endpoint: &CacheEndpoint) -> Result<bool>;

    /// Connect with a connection that outlives this handle, where the
    /// client supports it. Defaults to a plain [`connect`][Self::connect].
    fn persistent_connect(&mut self, endpoint: &CacheEndpoint) -> Result<bool> {
        self.connect(endpoint)
    }

    /// The host this client is bound to, used as a metric label.
    fn host(&self) -> String;

    /// Whether the client currently holds a live connection.
    fn is_connected(&self) -> bool;
}
