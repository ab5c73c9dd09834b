//! Observability infrastructure for the pod monitor
//!
//! Provides:
//! - Prometheus metrics (poll latency, poll outcomes, latest pod totals)
//! - Structured JSON logging with tracing

use crate::models::{AggregatedUsage, Observation, WorkloadIdentity};
use crate::monitor::ObservationSink;
use crate::provider::ProviderError;
use prometheus::{
    register_gauge, register_histogram, register_int_counter, register_int_gauge, Gauge,
    Histogram, IntCounter, IntGauge,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Histogram buckets for metrics API round trips (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<MonitorMetricsInner> = OnceLock::new();

struct MonitorMetricsInner {
    poll_latency_seconds: Histogram,
    polls_total: IntCounter,
    poll_errors_total: IntCounter,
    pod_cpu_cores: Gauge,
    pod_memory_bytes: Gauge,
    pod_containers: IntGauge,
}

impl MonitorMetricsInner {
    fn new() -> Self {
        Self {
            poll_latency_seconds: register_histogram!(
                "k8s_monitor_poll_latency_seconds",
                "Time spent fetching pod metrics from the metrics API",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register poll_latency_seconds"),

            polls_total: register_int_counter!(
                "k8s_monitor_polls_total",
                "Total number of poll cycles completed"
            )
            .expect("Failed to register polls_total"),

            poll_errors_total: register_int_counter!(
                "k8s_monitor_poll_errors_total",
                "Total number of poll cycles that failed to fetch pod metrics"
            )
            .expect("Failed to register poll_errors_total"),

            pod_cpu_cores: register_gauge!(
                "k8s_monitor_pod_cpu_cores",
                "Total CPU usage of the monitored pod in cores"
            )
            .expect("Failed to register pod_cpu_cores"),

            pod_memory_bytes: register_gauge!(
                "k8s_monitor_pod_memory_bytes",
                "Total memory usage of the monitored pod in bytes"
            )
            .expect("Failed to register pod_memory_bytes"),

            pod_containers: register_int_gauge!(
                "k8s_monitor_pod_containers",
                "Number of containers reported in the latest pod metrics"
            )
            .expect("Failed to register pod_containers"),
        }
    }
}

/// Monitor metrics for Prometheus exposition
///
/// This is a lightweight handle to the global metrics instance.
/// Multiple clones share the same underlying metrics.
#[derive(Clone)]
pub struct MonitorMetrics {
    _private: (),
}

impl Default for MonitorMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl MonitorMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(MonitorMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &MonitorMetricsInner {
        GLOBAL_METRICS.get_or_init(MonitorMetricsInner::new)
    }

    pub fn observe_poll_latency(&self, duration_secs: f64) {
        let inner = self.inner();
        inner.poll_latency_seconds.observe(duration_secs);
        inner.polls_total.inc();
    }

    pub fn inc_poll_errors(&self) {
        self.inner().poll_errors_total.inc();
    }

    /// Publish the latest pod totals
    pub fn record_usage(&self, usage: &AggregatedUsage) {
        let inner = self.inner();
        inner.pod_cpu_cores.set(usage.total_cpu.as_f64());
        inner.pod_memory_bytes.set(usage.total_memory.as_f64());
        inner.pod_containers.set(usage.containers as i64);
    }
}

/// Structured logger for monitor events
///
/// Every record carries an `event` field so log pipelines can route on it.
#[derive(Clone)]
pub struct StructuredLogger {
    cluster_context: String,
}

impl StructuredLogger {
    pub fn new(cluster_context: impl Into<String>) -> Self {
        Self {
            cluster_context: cluster_context.into(),
        }
    }

    pub fn log_startup(&self, version: &str, workload: &WorkloadIdentity, interval_secs: u64) {
        info!(
            event = "monitor_started",
            context = %self.cluster_context,
            version = %version,
            pod = %workload.name(),
            namespace = %workload.namespace(),
            interval_secs = interval_secs,
            "Pod monitor started"
        );
    }

    pub fn log_shutdown(&self, workload: &WorkloadIdentity, reason: &str) {
        info!(
            event = "monitor_stopped",
            context = %self.cluster_context,
            pod = %workload.name(),
            namespace = %workload.namespace(),
            reason = %reason,
            "Pod monitor shutting down"
        );
    }
}

impl ObservationSink for StructuredLogger {
    fn observe(&self, observation: &Observation) {
        info!(
            event = "pod_usage",
            context = %self.cluster_context,
            pod = %observation.pod_name,
            namespace = %observation.namespace,
            total_cpu = %observation.usage.total_cpu,
            total_memory = %observation.usage.total_memory,
            containers = observation.usage.containers,
            "Pod metrics"
        );
    }

    fn failure(&self, workload: &WorkloadIdentity, error: &ProviderError, consecutive_failures: u32) {
        warn!(
            event = "pod_usage_failed",
            context = %self.cluster_context,
            pod = %workload.name(),
            namespace = %workload.namespace(),
            error = %error,
            consecutive_failures = consecutive_failures,
            "Getting pod metrics failed, skipping this poll"
        );
    }
}
