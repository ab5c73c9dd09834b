//! k8s-monitor - watch the CPU and memory usage of a Kubernetes Pod
//!
//! Polls the resource metrics API for one pod, sums usage across its
//! containers and logs the totals until interrupted.

mod api;
mod config;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use monitor_lib::{
    health::{components, HealthRegistry},
    shutdown_channel, KubeMetricsProvider, MonitorLoopBuilder, MonitorMetrics, ShutdownHandle,
    StopReason, StructuredLogger, WorkloadIdentity,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const MONITOR_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Log output format
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum LogFormat {
    /// One JSON object per line (default)
    #[default]
    Json,
    /// Human-readable lines
    Text,
}

/// Monitor the CPU and memory usage of a Kubernetes Pod
#[derive(Parser)]
#[command(name = "k8s-monitor")]
#[command(author, version, about = "Monitor the CPU and memory usage of a Kubernetes Pod", long_about = None)]
pub struct Cli {
    /// Name of the pod to monitor
    #[arg(long, short = 'p', env = "K8S_MONITOR_POD")]
    pub pod: String,

    /// Namespace of the pod
    #[arg(long, short = 'n', env = "K8S_MONITOR_NAMESPACE", default_value = "default")]
    pub namespace: String,

    /// Path to kubeconfig file (uses ~/.kube/config if not specified)
    #[arg(long, env = "KUBECONFIG")]
    pub kubeconfig: Option<PathBuf>,

    /// Poll once, print the totals and exit
    #[arg(long)]
    pub once: bool,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Json)]
    pub log_format: LogFormat,
}

fn init_tracing(format: LogFormat) {
    let registry = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")));

    match format {
        LogFormat::Json => registry.with(fmt::layer().json()).init(),
        LogFormat::Text => registry.with(fmt::layer()).init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    let settings = config::MonitorSettings::load()?;
    let workload = WorkloadIdentity::new(cli.pod, cli.namespace);
    info!(pod = %workload.name(), namespace = %workload.namespace(), "Monitor configured");

    let provider = KubeMetricsProvider::from_kubeconfig(cli.kubeconfig.as_deref())
        .await
        .context("Initializing Kubernetes client")?;
    let logger = Arc::new(StructuredLogger::new(provider.context()));

    let health_registry = HealthRegistry::new();
    health_registry.register(components::METRICS_PROVIDER).await;
    let metrics = MonitorMetrics::new();

    let mut monitor = MonitorLoopBuilder::new()
        .provider(Arc::new(provider))
        .sink(logger.clone())
        .workload(workload.clone())
        .interval(settings.interval())
        .request_timeout(settings.request_timeout())
        .unhealthy_after(settings.unhealthy_after)
        .health(health_registry.clone())
        .metrics(metrics)
        .build()?;

    if cli.once {
        monitor
            .poll_once()
            .await
            .with_context(|| format!("Getting pod metrics for {workload}"))?;
        return Ok(());
    }

    logger.log_startup(MONITOR_VERSION, &workload, settings.interval_secs);

    if let Some(port) = settings.listen_port {
        let app_state = Arc::new(api::AppState::new(health_registry.clone()));
        tokio::spawn(async move {
            if let Err(e) = api::serve(port, app_state).await {
                error!(error = %e, "API server failed");
            }
        });
    }

    health_registry.set_ready(true).await;

    let (shutdown, signal) = shutdown_channel();
    tokio::spawn(forward_signals(shutdown));

    let reason = monitor.run(signal).await;
    logger.log_shutdown(&workload, &reason.to_string());

    Ok(())
}

/// Trigger shutdown on the first SIGINT or SIGTERM
async fn forward_signals(shutdown: ShutdownHandle) {
    let reason = wait_for_signal().await;
    shutdown.trigger(reason);
}

#[cfg(unix)]
async fn wait_for_signal() -> StopReason {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut terminate) => {
            tokio::select! {
                reason = interrupted() => reason,
                _ = terminate.recv() => StopReason::Terminated,
            }
        }
        Err(e) => {
            warn!(error = %e, "Failed to listen for SIGTERM");
            interrupted().await
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> StopReason {
    interrupted().await
}

async fn interrupted() -> StopReason {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    StopReason::Interrupted
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::try_parse_from(["k8s-monitor", "--pod", "web-1"]).unwrap();
        assert_eq!(cli.pod, "web-1");
        assert_eq!(cli.namespace, "default");
        assert!(!cli.once);
        assert!(matches!(cli.log_format, LogFormat::Json));
    }

    #[test]
    fn test_cli_short_flags() {
        let cli = Cli::try_parse_from([
            "k8s-monitor",
            "-p",
            "api-0",
            "-n",
            "payments",
            "--once",
            "--log-format",
            "text",
        ])
        .unwrap();
        assert_eq!(cli.pod, "api-0");
        assert_eq!(cli.namespace, "payments");
        assert!(cli.once);
        assert!(matches!(cli.log_format, LogFormat::Text));
    }
}
