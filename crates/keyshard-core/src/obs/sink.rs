//! Metrics sink boundary.
//!
//! Splitter and reader code MUST NOT depend on obs::metrics directly.
//! All instrumentation flows through MetricsEvent and MetricsSink.
use crate::obs::metrics;
use std::{cell::RefCell, rc::Rc};

thread_local! {
    static SINK_OVERRIDE: RefCell<Option<Rc<dyn MetricsSink>>> = RefCell::new(None);
}

///
/// MetricsEvent
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MetricsEvent<'a> {
    SplitStart {
        entity_path: &'a str,
        shard_count: usize,
        batch_size: usize,
    },
    SplitFinish {
        entity_path: &'a str,
        keys_scanned: u64,
        ranges: u64,
        readers: u64,
    },
    PageFetched {
        entity_path: &'a str,
        rows: u64,
    },
    RowsScanned {
        entity_path: &'a str,
        rows_scanned: u64,
    },
    RowsFiltered {
        entity_path: &'a str,
        rows_filtered: u64,
    },
    ReaderExhausted {
        entity_path: &'a str,
    },
}

///
/// MetricsSink
///

pub trait MetricsSink {
    fn record(&self, event: MetricsEvent<'_>);
}

/// GlobalMetricsSink
/// Default sink that writes into the calling thread's metrics state.
/// Acts as the concrete sink when no scoped override is installed.

pub(crate) struct GlobalMetricsSink;

impl MetricsSink for GlobalMetricsSink {
    fn record(&self, event: MetricsEvent<'_>) {
        match event {
            MetricsEvent::SplitStart { entity_path, .. } => {
                metrics::with_state_mut(|m| {
                    m.ops.split_calls = m.ops.split_calls.saturating_add(1);
                    let entry = m.entities.entry(entity_path.to_string()).or_default();
                    entry.split_calls = entry.split_calls.saturating_add(1);
                });
            }

            MetricsEvent::SplitFinish {
                entity_path,
                keys_scanned,
                ranges,
                readers,
            } => {
                metrics::with_state_mut(|m| {
                    m.ops.split_keys_scanned = m.ops.split_keys_scanned.saturating_add(keys_scanned);
                    m.ops.ranges_emitted = m.ops.ranges_emitted.saturating_add(ranges);
                    m.ops.readers_emitted = m.ops.readers_emitted.saturating_add(readers);
                    let entry = m.entities.entry(entity_path.to_string()).or_default();
                    entry.ranges_emitted = entry.ranges_emitted.saturating_add(ranges);
                });
            }

            MetricsEvent::PageFetched { entity_path, .. } => {
                metrics::with_state_mut(|m| {
                    m.ops.pages_fetched = m.ops.pages_fetched.saturating_add(1);
                    let entry = m.entities.entry(entity_path.to_string()).or_default();
                    entry.pages_fetched = entry.pages_fetched.saturating_add(1);
                });
            }

            MetricsEvent::RowsScanned {
                entity_path,
                rows_scanned,
            } => {
                metrics::with_state_mut(|m| {
                    m.ops.rows_scanned = m.ops.rows_scanned.saturating_add(rows_scanned);
                    let entry = m.entities.entry(entity_path.to_string()).or_default();
                    entry.rows_scanned = entry.rows_scanned.saturating_add(rows_scanned);
                });
            }

            MetricsEvent::RowsFiltered {
                entity_path,
                rows_filtered,
            } => {
                metrics::with_state_mut(|m| {
                    m.ops.rows_filtered = m.ops.rows_filtered.saturating_add(rows_filtered);
                    let entry = m.entities.entry(entity_path.to_string()).or_default();
                    entry.rows_filtered = entry.rows_filtered.saturating_add(rows_filtered);
                });
            }

            MetricsEvent::ReaderExhausted { .. } => {
                metrics::with_state_mut(|m| {
                    m.ops.readers_exhausted = m.ops.readers_exhausted.saturating_add(1);
                });
            }
        }
    }
}

pub(crate) const GLOBAL_METRICS_SINK: GlobalMetricsSink = GlobalMetricsSink;

pub(crate) fn record(event: MetricsEvent<'_>) {
    let sink = SINK_OVERRIDE.with(|cell| cell.borrow().clone());
    match sink {
        Some(sink) => sink.record(event),
        None => GLOBAL_METRICS_SINK.record(event),
    }
}

/// Snapshot the calling thread's metrics state.
#[must_use]
pub fn metrics_report() -> metrics::EventReport {
    metrics::report()
}

/// Reset the calling thread's metrics state.
pub fn metrics_reset_all() {
    metrics::reset_all();
}

/// Run a closure with a temporary metrics sink override on this thread.
pub fn with_metrics_sink<T>(sink: Rc<dyn MetricsSink>, f: impl FnOnce() -> T) -> T {
    struct Guard(Option<Rc<dyn MetricsSink>>);

    impl Drop for Guard {
        fn drop(&mut self) {
            let prev = self.0.take();
            SINK_OVERRIDE.with(|cell| {
                *cell.borrow_mut() = prev;
            });
        }
    }

    let prev = SINK_OVERRIDE.with(|cell| cell.borrow_mut().replace(sink));
    let _guard = Guard(prev);

    f()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[derive(Default)]
    struct CountingSink {
        pages: Cell<u64>,
    }

    impl MetricsSink for CountingSink {
        fn record(&self, event: MetricsEvent<'_>) {
            if matches!(event, MetricsEvent::PageFetched { .. }) {
                self.pages.set(self.pages.get() + 1);
            }
        }
    }

    #[test]
    fn override_captures_events_and_is_restored() {
        let sink = Rc::new(CountingSink::default());

        with_metrics_sink(sink.clone(), || {
            record(MetricsEvent::PageFetched {
                entity_path: "sink_tests::Entity",
                rows: 3,
            });
        });
        assert_eq!(sink.pages.get(), 1);

        assert!(SINK_OVERRIDE.with(|cell| cell.borrow().is_none()));
    }

    #[test]
    fn nested_overrides_restore_the_outer_sink() {
        let outer = Rc::new(CountingSink::default());
        let inner = Rc::new(CountingSink::default());
        let page = MetricsEvent::PageFetched {
            entity_path: "sink_tests::Entity",
            rows: 1,
        };

        with_metrics_sink(outer.clone(), || {
            with_metrics_sink(inner.clone(), || record(page));
            record(page);
        });

        assert_eq!(inner.pages.get(), 1);
        assert_eq!(outer.pages.get(), 1);
    }

    #[test]
    fn global_sink_accumulates_per_entity_counters() {
        let entity_path = "sink_tests::GlobalOnly";
        metrics_reset_all();
        GLOBAL_METRICS_SINK.record(MetricsEvent::RowsScanned {
            entity_path,
            rows_scanned: 4,
        });
        GLOBAL_METRICS_SINK.record(MetricsEvent::RowsFiltered {
            entity_path,
            rows_filtered: 1,
        });

        let report = metrics_report();
        let entry = report
            .entities
            .get(entity_path)
            .expect("entity counters should exist");
        assert_eq!(entry.rows_scanned, 4);
        assert_eq!(entry.rows_filtered, 1);
    }
}
