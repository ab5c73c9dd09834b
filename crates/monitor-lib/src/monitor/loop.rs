//! Pod monitor loop
//!
//! Waits for the poll interval, fetches a usage snapshot, aggregates it and
//! reports the result, until shutdown is signalled.

use super::{ObservationSink, ShutdownSignal, StopReason};
use crate::health::{components, HealthRegistry};
use crate::models::{Observation, WorkloadIdentity};
use crate::observability::MonitorMetrics;
use crate::provider::{MetricsProvider, ProviderError};
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, info};

/// Default delay between polls
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Default upper bound on a single metrics API request
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Consecutive failures before the provider is reported unhealthy
pub const DEFAULT_UNHEALTHY_AFTER: u32 = 3;

/// Configuration for the monitor loop
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Delay before each poll (default: 5 seconds)
    pub interval: Duration,
    /// Bound on each provider call; `None` waits indefinitely
    pub request_timeout: Option<Duration>,
    /// Failure streak that marks the provider unhealthy; 0 never does
    pub unhealthy_after: u32,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            request_timeout: Some(DEFAULT_REQUEST_TIMEOUT),
            unhealthy_after: DEFAULT_UNHEALTHY_AFTER,
        }
    }
}

/// Polls usage for a single pod until shutdown
pub struct MonitorLoop {
    provider: Arc<dyn MetricsProvider>,
    sink: Arc<dyn ObservationSink>,
    workload: WorkloadIdentity,
    config: MonitorConfig,
    health: Option<HealthRegistry>,
    metrics: Option<MonitorMetrics>,
    consecutive_failures: u32,
}

impl MonitorLoop {
    pub fn new(
        provider: Arc<dyn MetricsProvider>,
        sink: Arc<dyn ObservationSink>,
        workload: WorkloadIdentity,
        config: MonitorConfig,
    ) -> Self {
        Self {
            provider,
            sink,
            workload,
            config,
            health: None,
            metrics: None,
            consecutive_failures: 0,
        }
    }

    pub fn workload(&self) -> &WorkloadIdentity {
        &self.workload
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Run until `shutdown` fires and return why it did
    ///
    /// Shutdown is checked before every wait and wins over a tick that is due
    /// at the same time. A request already in flight runs to completion; its
    /// result is then discarded.
    pub async fn run(mut self, mut shutdown: ShutdownSignal) -> StopReason {
        info!(
            pod = %self.workload.name(),
            namespace = %self.workload.namespace(),
            interval_secs = self.config.interval.as_secs_f64(),
            "Starting pod monitor loop"
        );

        loop {
            tokio::select! {
                biased;
                reason = shutdown.cancelled() => {
                    info!(reason = %reason, "Shutting down pod monitor loop");
                    return reason;
                }
                _ = sleep(self.config.interval) => {}
            }

            let start = Instant::now();
            let result = self.fetch().await;

            if let Some(reason) = shutdown.reason() {
                debug!(
                    succeeded = result.is_ok(),
                    "Discarding poll result, shutdown requested during request"
                );
                info!(reason = %reason, "Shutting down pod monitor loop");
                return reason;
            }

            self.report(&result, start.elapsed()).await;
        }
    }

    /// Poll once without waiting and report the outcome
    pub async fn poll_once(&mut self) -> Result<Observation, ProviderError> {
        let start = Instant::now();
        let result = self.fetch().await;
        self.report(&result, start.elapsed()).await;
        result
    }

    /// Fetch and aggregate one snapshot
    async fn fetch(&self) -> Result<Observation, ProviderError> {
        let request = self.provider.get_usage(&self.workload);
        let snapshot = match self.config.request_timeout {
            Some(limit) => timeout(limit, request)
                .await
                .map_err(|_| ProviderError::Timeout(limit))??,
            None => request.await?,
        };

        let pod_name = if snapshot.pod_name.is_empty() {
            self.workload.name().to_string()
        } else {
            snapshot.pod_name.clone()
        };

        Ok(Observation {
            pod_name,
            namespace: self.workload.namespace().to_string(),
            usage: snapshot.aggregate(),
            timestamp: chrono::Utc::now().timestamp(),
        })
    }

    /// Hand a poll outcome to the sink, metrics and health registry
    async fn report(&mut self, result: &Result<Observation, ProviderError>, elapsed: Duration) {
        if let Some(metrics) = &self.metrics {
            metrics.observe_poll_latency(elapsed.as_secs_f64());
        }

        match result {
            Ok(observation) => {
                if self.consecutive_failures > 0 {
                    info!(
                        failed_polls = self.consecutive_failures,
                        "Pod metrics available again"
                    );
                }
                self.consecutive_failures = 0;

                if let Some(metrics) = &self.metrics {
                    metrics.record_usage(&observation.usage);
                }
                if let Some(health) = &self.health {
                    health.set_healthy(components::METRICS_PROVIDER).await;
                }
                self.sink.observe(observation);
            }
            Err(error) => {
                self.consecutive_failures = self.consecutive_failures.saturating_add(1);

                if let Some(metrics) = &self.metrics {
                    metrics.inc_poll_errors();
                }
                if let Some(health) = &self.health {
                    health
                        .set_failing(
                            components::METRICS_PROVIDER,
                            error.to_string(),
                            self.consecutive_failures,
                            self.config.unhealthy_after,
                        )
                        .await;
                }
                self.sink
                    .failure(&self.workload, error, self.consecutive_failures);
            }
        }
    }
}

/// Builder for the monitor loop
pub struct MonitorLoopBuilder {
    provider: Option<Arc<dyn MetricsProvider>>,
    sink: Option<Arc<dyn ObservationSink>>,
    workload: Option<WorkloadIdentity>,
    config: MonitorConfig,
    health: Option<HealthRegistry>,
    metrics: Option<MonitorMetrics>,
}

impl MonitorLoopBuilder {
    pub fn new() -> Self {
        Self {
            provider: None,
            sink: None,
            workload: None,
            config: MonitorConfig::default(),
            health: None,
            metrics: None,
        }
    }

    pub fn provider(mut self, provider: Arc<dyn MetricsProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn sink(mut self, sink: Arc<dyn ObservationSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn workload(mut self, workload: WorkloadIdentity) -> Self {
        self.workload = Some(workload);
        self
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.config.interval = interval;
        self
    }

    pub fn request_timeout(mut self, request_timeout: Option<Duration>) -> Self {
        self.config.request_timeout = request_timeout;
        self
    }

    pub fn unhealthy_after(mut self, failures: u32) -> Self {
        self.config.unhealthy_after = failures;
        self
    }

    /// Report poll outcomes to a health registry
    pub fn health(mut self, health: HealthRegistry) -> Self {
        self.health = Some(health);
        self
    }

    /// Publish poll outcomes as Prometheus metrics
    pub fn metrics(mut self, metrics: MonitorMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn build(self) -> Result<MonitorLoop> {
        let provider = self
            .provider
            .ok_or_else(|| anyhow::anyhow!("Metrics provider is required"))?;
        let sink = self
            .sink
            .ok_or_else(|| anyhow::anyhow!("Observation sink is required"))?;
        let workload = self
            .workload
            .ok_or_else(|| anyhow::anyhow!("Workload is required"))?;

        if workload.name().is_empty() {
            anyhow::bail!("Pod name must not be empty");
        }
        if self.config.interval.is_zero() {
            anyhow::bail!("Poll interval must be greater than zero");
        }
        if self.config.request_timeout.is_some_and(|t| t.is_zero()) {
            anyhow::bail!("Request timeout must be greater than zero");
        }

        let mut monitor = MonitorLoop::new(provider, sink, workload, self.config);
        monitor.health = self.health;
        monitor.metrics = self.metrics;
        Ok(monitor)
    }
}

impl Default for MonitorLoopBuilder {
    fn default() -> Self {
        Self::new()
    }
}
