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

use std::sync::Arc;
use std::time::Instant;

use log::debug;

use crate::collect::Collector;
use crate::*;

static LOGGING_TARGET: &str = "measurable::collect";

/// A scoped measurement that is emitted exactly once on every exit path.
///
/// Probes start a scope before delegating to the wrapped resource. On the
/// clean path they call [`finish`][MeasureScope::finish], which emits the
/// elapsed-time histogram (and the exec-count counter, if one was attached)
/// and surfaces the emission result. On any other path, an early `?`, an
/// error return, a panic, a cancelled future dropping the scope, the `Drop`
/// impl emits the same measurement best-effort, so the per-operation "always"
/// metrics hold no matter how the operation ends.
pub struct MeasureScope {
    collector: Arc<dyn Collector>,
    histogram: &'static str,
    counter: Option<&'static str>,
    labels: Vec<String>,
    start: Instant,
    finished: bool,
}

impl MeasureScope {
    /// Start measuring. `labels` applies to the histogram and to the
    /// attached counter alike.
    pub fn start(
        collector: Arc<dyn Collector>,
        histogram: &'static str,
        labels: Vec<String>,
    ) -> Self {
        Self {
            collector,
            histogram,
            counter: None,
            labels,
            start: Instant::now(),
            finished: false,
        }
    }

    /// Also increment `counter` by one when the scope emits.
    pub fn with_counter(mut self, counter: &'static str) -> Self {
        self.counter = Some(counter);
        self
    }

    /// Emit the measurement and surface the emission result.
    pub fn finish(mut self) -> Result<()> {
        self.finished = true;
        self.emit()
    }

    fn emit(&self) -> Result<()> {
        let elapsed = self.start.elapsed().as_secs_f64();
        let labels: Vec<&str> = self.labels.iter().map(String::as_str).collect();

        if let Some(counter) = self.counter {
            self.collector.increment_counter(counter, &labels)?;
        }
        self.collector
            .observe_histogram(self.histogram, elapsed, &labels)
    }
}

impl Drop for MeasureScope {
    fn drop(&mut self) {
        if self.finished {
            return;
        }

        if let Err(err) = self.emit() {
            debug!(
                target: LOGGING_TARGET,
                "measurement for {} dropped: {err}", self.histogram
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use pretty_assertions::assert_eq;

    use super::*;

    #[derive(Debug, Default)]
    struct RecordingCollector {
        events: Mutex<Vec<String>>,
    }

    impl Collector for RecordingCollector {
        fn increment_counter_by(&self, name: &str, count: u64, _: &[&str]) -> Result<()> {
            self.events.lock().unwrap().push(format!("counter {name} {count}"));
            Ok(())
        }

        fn increment_gauge_by(&self, _: &str, _: f64, _: &[&str]) -> Result<()> {
            Ok(())
        }

        fn decrement_gauge_by(&self, _: &str, _: f64, _: &[&str]) -> Result<()> {
            Ok(())
        }

        fn observe_histogram(&self, name: &str, _: f64, _: &[&str]) -> Result<()> {
            self.events.lock().unwrap().push(format!("histogram {name}"));
            Ok(())
        }
    }

    #[test]
    fn test_finish_emits_once() {
        let collector = Arc::new(RecordingCollector::default());

        let scope = MeasureScope::start(
            collector.clone(),
            "redis_operation_exec_time",
            vec!["cache-1".to_string(), "GET".to_string()],
        )
        .with_counter("redis_operation_exec_count");
        scope.finish().unwrap();

        let events = collector.events.lock().unwrap();
        assert_eq!(
            *events,
            vec![
                "counter redis_operation_exec_count 1".to_string(),
                "histogram redis_operation_exec_time".to_string(),
            ]
        );
    }

    #[test]
    fn test_drop_emits_once() {
        let collector = Arc::new(RecordingCollector::default());

        {
            let _scope = MeasureScope::start(
                collector.clone(),
                "mysql_query_execution_time",
                vec!["select".to_string()],
            );
            // Dropped without finish, as an error path would.
        }

        let events = collector.events.lock().unwrap();
        assert_eq!(*events, vec!["histogram mysql_query_execution_time".to_string()]);
    }

    #[test]
    fn test_emission_failures_on_drop_are_swallowed() {
        #[derive(Debug)]
        struct BrokenCollector;

        impl Collector for BrokenCollector {
            fn increment_counter_by(&self, _: &str, _: u64, _: &[&str]) -> Result<()> {
                Err(Error::new(ErrorKind::ConnectionFailed, "pipe down"))
            }

            fn increment_gauge_by(&self, _: &str, _: f64, _: &[&str]) -> Result<()> {
                Ok(())
            }

            fn decrement_gauge_by(&self, _: &str, _: f64, _: &[&str]) -> Result<()> {
                Ok(())
            }

            fn observe_histogram(&self, _: &str, _: f64, _: &[&str]) -> Result<()> {
                Err(Error::new(ErrorKind::ConnectionFailed, "pipe down"))
            }
        }

        // Must not panic while unwinding the scope.
        let _scope = MeasureScope::start(
            Arc::new(BrokenCollector),
            "mysql_query_execution_time",
            vec![],
        );
    }
}
