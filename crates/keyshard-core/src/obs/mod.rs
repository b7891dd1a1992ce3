//! Observability: runtime telemetry (metrics) and sink abstractions.
//!
//! Splitting and reading code never touches the counters directly; every
//! measurement flows through [`MetricsEvent`] and the active [`MetricsSink`].

pub(crate) mod metrics;
pub(crate) mod sink;

// re-exports
pub use metrics::{EntityCounters, EventOps, EventReport, EventState};
pub use sink::{MetricsEvent, MetricsSink, metrics_report, metrics_reset_all, with_metrics_sink};
