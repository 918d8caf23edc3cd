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

//! Capability contracts for the relational-database access chain.
//!
//! These traits describe what the SQL probes require from a driver stack:
//! the standard connect/prepare/execute/commit/rollback surface plus a way
//! to read the connection's target host for labeling. Any driver exposing
//! this surface can be wrapped by
//! [`probe::sql`][crate::probe::sql] without behavior change.

use std::collections::HashMap;

use crate::*;

/// Connection parameters handed to [`Driver::connect`].
#[derive(Debug, Clone, Default)]
pub struct ConnectParams {
    /// Target host, used as a metric label by the probes.
    pub host: String,
    /// Target port.
    pub port: u16,
    /// User to authenticate as.
    pub user: String,
    /// Password to authenticate with.
    pub password: String,
    /// Database (schema) to select after connecting.
    pub database: String,
    /// Driver-specific options.
    pub options: HashMap<String, String>,
}

impl ConnectParams {
    /// Create params pointing at `host`.
    pub fn new(host: impl Into<String>) -> Self {
        ConnectParams {
            host: host.into(),
            ..ConnectParams::default()
        }
    }
}

/// The SQL dialect a driver speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum Platform {
    /// MySQL and compatible servers.
    MySql,
    /// MariaDB servers.
    MariaDb,
    /// PostgreSQL servers.
    Postgres,
    /// SQLite databases.
    Sqlite,
    /// A dialect this crate has no special knowledge of.
    Unknown,
}

/// A single column value.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// SQL NULL.
    Null,
    /// A boolean value.
    Bool(bool),
    /// A signed integer value.
    Int(i64),
    /// A floating point value.
    Float(f64),
    /// A text value.
    Text(String),
    /// A binary value.
    Bytes(Vec<u8>),
}

/// One fetched row.
pub type Row = Vec<SqlValue>;

/// A fully materialized result set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Rows {
    /// Column names, in select order.
    pub columns: Vec<String>,
    /// Fetched rows.
    pub rows: Vec<Row>,
}

impl Rows {
    /// Number of fetched rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the result set is empty.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// A database driver: the factory for connections, plus dialect lookups.
pub trait Driver: Send + Sync + 'static {
    /// The connection type this driver produces.
    type Conn: Connection;

    /// Open a connection to the database described by `params`.
    fn connect(&self, params: &ConnectParams) -> Result<Self::Conn>;

    /// The dialect this driver speaks.
    fn platform(&self) -> Platform;

    /// The dialect to use for a specific reported server version.
    ///
    /// Drivers that don't differentiate by version keep this default. A
    /// wrapper must never claim this capability on behalf of a driver that
    /// doesn't have it.
    fn platform_for_version(&self, version: &str) -> Result<Platform> {
        let _ = version;

        Err(
            Error::new(ErrorKind::Unsupported, "driver is not version aware")
                .with_operation("Driver::platform_for_version"),
        )
    }

    /// The schema (database name) selected by `params`, if any.
    fn database(&self, params: &ConnectParams) -> Option<String> {
        Some(params.database.clone()).filter(|database| !database.is_empty())
    }

    /// The driver's name, e.g. `mysql`.
    fn name(&self) -> &'static str;
}

/// An open database connection.
pub trait Connection: Send {
    /// The prepared statement type this connection produces.
    type Stmt: Statement;

    /// Prepare `sql` for later execution.
    fn prepare(&mut self, sql: &str) -> Result<Self::Stmt>;

    /// Run a parameterized query and materialize its result set.
    fn execute_query(&mut self, sql: &str, params: &[SqlValue]) -> Result<Rows>;

    /// Run a raw query and materialize its result set.
    fn query(&mut self, sql: &str) -> Result<Rows>;

    /// Run a statement and return the number of affected rows.
    fn exec(&mut self, sql: &str) -> Result<u64>;

    /// Start a transaction.
    fn begin_transaction(&mut self) -> Result<()>;

    /// Commit the current transaction.
    fn commit(&mut self) -> Result<()>;

    /// Roll back the current transaction.
    fn roll_back(&mut self) -> Result<()>;

    /// The host this connection is bound to, used as a metric label.
    fn host(&self) -> &str;
}

/// A prepared statement and its result cursor.
pub trait Statement: Send {
    /// Bind `value` to the 1-based placeholder `index`.
    fn bind_value(&mut self, index: usize, value: SqlValue) -> Result<()>;

    /// Execute the statement with the currently bound values.
    fn execute(&mut self) -> Result<()>;

    /// Rows affected by the last execution.
    fn row_count(&self) -> u64;

    /// Number of columns in the result.
    fn column_count(&self) -> usize;

    /// Fetch the next row, `None` once the cursor is exhausted.
    fn fetch_one(&mut self) -> Result<Option<Row>>;

    /// Fetch all remaining rows.
    fn fetch_all(&mut self) -> Result<Rows>;
}
