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

//! Errors returned by measurable.
//!
//! # Examples
//!
//! ```
//! # use measurable::collect::Collector;
//! use measurable::ErrorKind;
//! # fn test(collector: &dyn Collector) {
//! if let Err(e) = collector.increment_counter("mysql_query_error", &["db-1"]) {
//!     if e.kind().is_transport() {
//!         println!("metrics backend unreachable, observation lost")
//!     }
//! }
//! # }
//! ```

use std::backtrace::Backtrace;
use std::backtrace::BacktraceStatus;
use std::fmt;
use std::fmt::Debug;
use std::fmt::Display;
use std::fmt::Formatter;

/// Result that is a wrapper of `Result<T, measurable::Error>`
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// ErrorKind is all kinds of Error of measurable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    /// measurable don't know what happened here, and no actions other than
    /// just returning it back. For example, the backend registry rejected a
    /// metric for a reason we can't classify.
    Unexpected,
    /// Underlying resource doesn't support this operation.
    Unsupported,

    /// The config for a backend or resource is invalid.
    ConfigInvalid,
    /// The remote peer could not be reached or the connection broke mid-call.
    ///
    /// This is the transport category: the fault-tolerant collector discards
    /// it, and the fail-safe cache factory degrades on it.
    ConnectionFailed,
    /// The call did not complete within the resource's deadline.
    ///
    /// Also part of the transport category.
    TimedOut,
    /// The input given to an operation is invalid, e.g. label values whose
    /// count doesn't match the metric's registered cardinality.
    InvalidInput,
    /// The instrumented statement or command was rejected by the resource.
    QueryFailed,
}

impl ErrorKind {
    /// Convert self into static str.
    pub fn into_static(self) -> &'static str {
        self.into()
    }

    /// Whether this kind belongs to the transport-failure category.
    ///
    /// Transport failures are the ones instrumentation must survive: the
    /// metrics pipe being down must never fail the instrumented call.
    pub fn is_transport(&self) -> bool {
        matches!(self, ErrorKind::ConnectionFailed | ErrorKind::TimedOut)
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.into_static())
    }
}

impl From<ErrorKind> for &'static str {
    fn from(v: ErrorKind) -> &'static str {
        match v {
            ErrorKind::Unexpected => "Unexpected",
            ErrorKind::Unsupported => "Unsupported",
            ErrorKind::ConfigInvalid => "ConfigInvalid",
            ErrorKind::ConnectionFailed => "ConnectionFailed",
            ErrorKind::TimedOut => "TimedOut",
            ErrorKind::InvalidInput => "InvalidInput",
            ErrorKind::QueryFailed => "QueryFailed",
        }
    }
}

/// Error is the error struct returned by all measurable functions.
///
/// ## Display
///
/// Error can be displayed in two ways:
///
/// - Via `Display`: like `err.to_string()` or `format!("{err}")`
///
/// Error will be printed in a single line:
///
/// ```shell
/// ConnectionFailed at CacheRegistry::counter, context: { host: cache-1:6379 } => write metric sample, source: broken pipe
/// ```
///
/// - Via `Debug`: like `format!("{err:?}")`
///
/// Error will be printed in multi lines with more details and backtraces (if
/// captured).
pub struct Error {
    kind: ErrorKind,
    message: String,

    operation: &'static str,
    context: Vec<(&'static str, String)>,
    source: Option<anyhow::Error>,
    backtrace: Backtrace,
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if !self.operation.is_empty() {
            write!(f, " at {}", self.operation)?;
        }

        if !self.context.is_empty() {
            write!(f, ", context: {{ ")?;
            write!(
                f,
                "{}",
                self.context
                    .iter()
                    .map(|(k, v)| format!("{k}: {v}"))
                    .collect::<Vec<_>>()
                    .join(", ")
            )?;
            write!(f, " }}")?;
        }

        if !self.message.is_empty() {
            write!(f, " => {}", self.message)?;
        }

        if let Some(source) = &self.source {
            write!(f, ", source: {source}")?;
        }

        Ok(())
    }
}

impl Debug for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        // If alternate has been specified, print the struct-style debug.
        if f.alternate() {
            let mut de = f.debug_struct("Error");
            de.field("kind", &self.kind);
            de.field("message", &self.message);
            de.field("operation", &self.operation);
            de.field("context", &self.context);
            de.field("source", &self.source);
            return de.finish();
        }

        write!(f, "{}", self.kind)?;
        if !self.operation.is_empty() {
            write!(f, " at {}", self.operation)?;
        }
        if !self.message.is_empty() {
            write!(f, " => {}", self.message)?;
        }
        writeln!(f)?;

        if !self.context.is_empty() {
            writeln!(f)?;
            writeln!(f, "Context:")?;
            for (k, v) in self.context.iter() {
                writeln!(f, "   {k}: {v}")?;
            }
        }
        if let Some(source) = &self.source {
            writeln!(f)?;
            writeln!(f, "Source:")?;
            writeln!(f, "   {source:#}")?;
        }
        if self.backtrace.status() == BacktraceStatus::Captured {
            writeln!(f)?;
            writeln!(f, "Backtrace:")?;
            writeln!(f, "{}", self.backtrace)?;
        }

        Ok(())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|v| v.as_ref())
    }
}

impl Error {
    /// Create a new Error with error kind and message.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),

            operation: "",
            context: Vec::default(),
            source: None,
            // `Backtrace::capture()` will check if backtrace has been enabled
            // internally. It's zero cost if backtrace is disabled.
            backtrace: Backtrace::capture(),
        }
    }

    /// Update error's operation.
    ///
    /// # Notes
    ///
    /// If the error already carries an operation, we will push a new context
    /// `(called, operation)`.
    pub fn with_operation(mut self, operation: impl Into<&'static str>) -> Self {
        if !self.operation.is_empty() {
            self.context.push(("called", self.operation.to_string()));
        }

        self.operation = operation.into();
        self
    }

    /// Add more context in error.
    pub fn with_context(mut self, key: &'static str, value: impl ToString) -> Self {
        self.context.push((key, value.to_string()));
        self
    }

    /// Set source for error.
    ///
    /// # Notes
    ///
    /// If the source has been set, we will raise a panic here.
    pub fn set_source(mut self, src: impl Into<anyhow::Error>) -> Self {
        debug_assert!(self.source.is_none(), "the source error has been set");

        self.source = Some(src.into());
        self
    }

    /// Return error's kind.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn generate_error() -> Error {
        Error::new(ErrorKind::ConnectionFailed, "write metric sample")
            .with_operation("CacheRegistry::counter")
            .with_context("host", "cache-1:6379")
    }

    #[test]
    fn test_error_display() {
        let s = format!("{}", generate_error());
        assert_eq!(
            s,
            "ConnectionFailed at CacheRegistry::counter, context: { host: cache-1:6379 } => write metric sample"
        );
    }

    #[test]
    fn test_error_kind_transport() {
        assert!(ErrorKind::ConnectionFailed.is_transport());
        assert!(ErrorKind::TimedOut.is_transport());
        assert!(!ErrorKind::QueryFailed.is_transport());
        assert!(!ErrorKind::Unexpected.is_transport());
    }

    #[test]
    fn test_error_with_operation_twice() {
        let err = generate_error().with_operation("MeasuredCache::execute");
        let s = format!("{err}");
        assert!(s.starts_with("ConnectionFailed at MeasuredCache::execute"));
        assert!(s.contains("called: CacheRegistry::counter"));
    }
}
