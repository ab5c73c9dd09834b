//! Pod usage providers
//!
//! The monitor loop only sees the [`MetricsProvider`] trait. The production
//! implementation reads the Kubernetes resource metrics API; tests plug in
//! scripted providers.

mod metrics_api;

pub use metrics_api::{kubeconfig_path, KubeMetricsProvider, PodMetrics, PodMetricsContainer};

use crate::models::{UsageSnapshot, WorkloadIdentity};
use std::time::Duration;
use thiserror::Error;

pub use async_trait::async_trait;

/// Errors raised while building a provider or fetching usage
#[derive(Debug, Error)]
pub enum ProviderError {
    /// No kubeconfig path could be determined
    #[error("could not locate kubeconfig: KUBECONFIG is unset and no home directory was found")]
    NoKubeconfig,

    /// Kubeconfig could not be read or parsed
    #[error("loading kubeconfig: {0}")]
    Kubeconfig(#[source] kube::config::KubeconfigError),

    /// Kubernetes client could not be constructed
    #[error("building Kubernetes client: {0}")]
    Client(#[source] kube::Error),

    /// The metrics API request failed (unreachable, not found, forbidden, ...)
    #[error("getting pod metrics: {0}")]
    Request(#[source] kube::Error),

    /// The request did not complete within the configured timeout
    #[error("pod metrics request timed out after {0:?}")]
    Timeout(Duration),

    /// The provider could not serve the request for another reason
    #[error("metrics provider unavailable: {0}")]
    Unavailable(String),
}

/// Source of point-in-time pod usage
#[async_trait]
pub trait MetricsProvider: Send + Sync {
    /// Fetch current per-container usage for the given pod
    async fn get_usage(&self, workload: &WorkloadIdentity) -> Result<UsageSnapshot, ProviderError>;
}
