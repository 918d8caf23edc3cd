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

//! Decorators instrumenting the database access chain: driver, connection
//! and prepared statement.
//!
//! Measured metrics:
//!
//!   - `mysql_connection_dial`
//!   - `mysql_query_execution_time`
//!   - `mysql_query_error`
//!   - `mysql_transaction_pending`
//!   - `mysql_transaction_exec`

use std::sync::Arc;

use log::debug;

use crate::collect::Collector;
use crate::collect::MeasureScope;
use crate::probe::LOGGING_TARGET;
use crate::raw::sql::ConnectParams;
use crate::raw::sql::Connection;
use crate::raw::sql::Driver;
use crate::raw::sql::Platform;
use crate::raw::sql::Row;
use crate::raw::sql::Rows;
use crate::raw::sql::SqlValue;
use crate::raw::sql::Statement;
use crate::*;

static METRIC_CONNECTION_DIAL: &str = "mysql_connection_dial";
static METRIC_QUERY_EXECUTION_TIME: &str = "mysql_query_execution_time";
static METRIC_QUERY_ERROR: &str = "mysql_query_error";
static METRIC_TRANSACTION_PENDING: &str = "mysql_transaction_pending";
static METRIC_TRANSACTION_EXEC: &str = "mysql_transaction_exec";

/// The `prepared` label value for direct connection-level execution.
static LABEL_DIRECT: &str = "false";
/// The `prepared` label value for prepared-statement execution.
static LABEL_PREPARED: &str = "true";

/// Extract the leading SQL keyword used as the `operation` label.
///
/// Only the first few characters of the trimmed query are inspected, so an
/// over-long first token gets truncated rather than scanned to its end.
fn sql_operation(query: &str) -> String {
    let trimmed = query.trim_start_matches(['(', ' ', '\t', '\n', '\r', '\0', '\x0b']);
    let head: String = trimmed.chars().take(15).collect();

    match head.split_whitespace().next() {
        Some(op) => op.to_lowercase(),
        None => "unknown".to_string(),
    }
}

/// Wraps a [`Driver`] and measures connection establishment.
///
/// `connect` is timed and reported as `mysql_connection_dial` labeled by the
/// target host; the produced connection comes back already instrumented as a
/// [`MeasuredConnection`]. Platform and schema lookups pass through
/// untouched, including version-aware platform creation: if the wrapped
/// driver doesn't support it, neither does the wrapper.
pub struct MeasuredDriver<D: Driver> {
    inner: D,
    collector: Arc<dyn Collector>,
}

impl<D: Driver> MeasuredDriver<D> {
    /// Wrap `inner`, reporting to `collector`.
    pub fn new(inner: D, collector: Arc<dyn Collector>) -> Self {
        Self { inner, collector }
    }
}

impl<D: Driver> Driver for MeasuredDriver<D> {
    type Conn = MeasuredConnection<D::Conn>;

    fn connect(&self, params: &ConnectParams) -> Result<Self::Conn> {
        let scope = MeasureScope::start(
            self.collector.clone(),
            METRIC_CONNECTION_DIAL,
            vec![params.host.clone()],
        );
        let conn = self.inner.connect(params)?;
        scope.finish()?;

        let mut conn = MeasuredConnection::new(conn);
        conn.set_collector(self.collector.clone());
        Ok(conn)
    }

    fn platform(&self) -> Platform {
        self.inner.platform()
    }

    fn platform_for_version(&self, version: &str) -> Result<Platform> {
        self.inner.platform_for_version(version)
    }

    fn database(&self, params: &ConnectParams) -> Option<String> {
        self.inner.database(params)
    }

    fn name(&self) -> &'static str {
        self.inner.name()
    }
}

/// Wraps a [`Connection`] and measures query execution and transactions.
///
/// Instrumentation is strictly optional: until
/// [`set_collector`][MeasuredConnection::set_collector] is called every
/// operation is a plain pass-through.
pub struct MeasuredConnection<C: Connection> {
    inner: C,
    collector: Option<Arc<dyn Collector>>,
    host: String,
}

impl<C: Connection> MeasuredConnection<C> {
    /// Wrap `inner` without a collector attached.
    pub fn new(inner: C) -> Self {
        let host = inner.host().to_string();
        Self {
            inner,
            collector: None,
            host,
        }
    }

    /// Attach the collector to report to. Statements prepared afterwards
    /// inherit it.
    pub fn set_collector(&mut self, collector: Arc<dyn Collector>) {
        self.collector = Some(collector);
    }

    fn measure<T>(&mut self, sql: &str, f: impl FnOnce(&mut C) -> Result<T>) -> Result<T> {
        let Some(collector) = self.collector.clone() else {
            return f(&mut self.inner);
        };

        let scope = MeasureScope::start(
            collector.clone(),
            METRIC_QUERY_EXECUTION_TIME,
            vec![
                sql_operation(sql),
                self.host.clone(),
                LABEL_DIRECT.to_string(),
            ],
        );

        match f(&mut self.inner) {
            Ok(v) => {
                scope.finish()?;
                Ok(v)
            }
            Err(err) => {
                if let Err(e) = collector.increment_counter(METRIC_QUERY_ERROR, &[&self.host]) {
                    debug!(target: LOGGING_TARGET, "query error count dropped: {e}");
                }
                Err(err)
            }
        }
    }
}

impl<C: Connection> Connection for MeasuredConnection<C> {
    type Stmt = MeasuredStatement<C::Stmt>;

    fn prepare(&mut self, sql: &str) -> Result<Self::Stmt> {
        let stmt = self.inner.prepare(sql)?;

        Ok(MeasuredStatement {
            inner: stmt,
            collector: self.collector.clone(),
            operation: sql_operation(sql),
            host: self.host.clone(),
        })
    }

    fn execute_query(&mut self, sql: &str, params: &[SqlValue]) -> Result<Rows> {
        self.measure(sql, |c| c.execute_query(sql, params))
    }

    fn query(&mut self, sql: &str) -> Result<Rows> {
        self.measure(sql, |c| c.query(sql))
    }

    fn exec(&mut self, sql: &str) -> Result<u64> {
        self.measure(sql, |c| c.exec(sql))
    }

    fn begin_transaction(&mut self) -> Result<()> {
        if let Some(collector) = &self.collector {
            collector.increment_gauge(METRIC_TRANSACTION_PENDING, &[&self.host])?;
        }

        self.inner.begin_transaction()
    }

    fn commit(&mut self) -> Result<()> {
        let Some(collector) = self.collector.clone() else {
            return self.inner.commit();
        };

        // The transaction stops being pending no matter how the commit ends.
        collector.decrement_gauge(METRIC_TRANSACTION_PENDING, &[&self.host])?;

        match self.inner.commit() {
            Ok(()) => {
                collector.increment_counter(METRIC_TRANSACTION_EXEC, &[&self.host, "success"])?;
                Ok(())
            }
            Err(err) => {
                if let Err(e) =
                    collector.increment_counter(METRIC_TRANSACTION_EXEC, &[&self.host, "fail"])
                {
                    debug!(target: LOGGING_TARGET, "transaction outcome count dropped: {e}");
                }
                Err(err)
            }
        }
    }

    fn roll_back(&mut self) -> Result<()> {
        if let Some(collector) = self.collector.clone() {
            collector.decrement_gauge(METRIC_TRANSACTION_PENDING, &[&self.host])?;
            collector.increment_counter(METRIC_TRANSACTION_EXEC, &[&self.host, "rollback"])?;
        }

        self.inner.roll_back()
    }

    fn host(&self) -> &str {
        self.inner.host()
    }
}

/// Wraps a [`Statement`] and measures its execution.
///
/// Binding, fetch and metadata operations pass through untouched; `execute`
/// reports the same metrics as the connection-level paths with the
/// `prepared` label set to `true`.
pub struct MeasuredStatement<S: Statement> {
    inner: S,
    collector: Option<Arc<dyn Collector>>,
    operation: String,
    host: String,
}

impl<S: Statement> Statement for MeasuredStatement<S> {
    fn bind_value(&mut self, index: usize, value: SqlValue) -> Result<()> {
        self.inner.bind_value(index, value)
    }

    fn execute(&mut self) -> Result<()> {
        let Some(collector) = self.collector.clone() else {
            return self.inner.execute();
        };

        let scope = MeasureScope::start(
            collector.clone(),
            METRIC_QUERY_EXECUTION_TIME,
            vec![
                self.operation.clone(),
                self.host.clone(),
                LABEL_PREPARED.to_string(),
            ],
        );

        match self.inner.execute() {
            Ok(()) => {
                scope.finish()?;
                Ok(())
            }
            Err(err) => {
                if let Err(e) = collector.increment_counter(METRIC_QUERY_ERROR, &[&self.host]) {
                    debug!(target: LOGGING_TARGET, "query error count dropped: {e}");
                }
                Err(err)
            }
        }
    }

    fn row_count(&self) -> u64 {
        self.inner.row_count()
    }

    fn column_count(&self) -> usize {
        self.inner.column_count()
    }

    fn fetch_one(&mut self) -> Result<Option<Row>> {
        self.inner.fetch_one()
    }

    fn fetch_all(&mut self) -> Result<Rows> {
        self.inner.fetch_all()
    }
}
