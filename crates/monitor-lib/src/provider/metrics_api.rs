//! Kubernetes resource metrics API provider
//!
//! Reads `metrics.k8s.io/v1beta1` PodMetrics objects served by
//! metrics-server and converts them into [`UsageSnapshot`]s.

use super::{MetricsProvider, ProviderError};
use crate::models::{ContainerUsage, UsageSnapshot, WorkloadIdentity};
use crate::quantity::Quantity;
use async_trait::async_trait;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::NamespaceResourceScope;
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Api, Client, Config, Resource};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const METRICS_API_GROUP: &str = "metrics.k8s.io";
pub const METRICS_API_VERSION: &str = "v1beta1";

const CPU: &str = "cpu";
const MEMORY: &str = "memory";

/// PodMetrics object as served by the resource metrics API
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PodMetrics {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub window: Option<String>,
    #[serde(default)]
    pub containers: Vec<PodMetricsContainer>,
}

/// Usage of a single container inside a PodMetrics object
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PodMetricsContainer {
    pub name: String,
    #[serde(default)]
    pub usage: BTreeMap<String, Quantity>,
}

impl PodMetricsContainer {
    /// Usage for a resource name, zero when the API omitted it
    fn usage_of(&self, resource: &str) -> Quantity {
        self.usage.get(resource).copied().unwrap_or_default()
    }
}

impl From<PodMetrics> for UsageSnapshot {
    fn from(metrics: PodMetrics) -> Self {
        let containers = metrics
            .containers
            .iter()
            .map(|container| ContainerUsage {
                name: container.name.clone(),
                cpu: container.usage_of(CPU),
                memory: container.usage_of(MEMORY),
            })
            .collect();

        UsageSnapshot {
            pod_name: metrics.metadata.name.unwrap_or_default(),
            containers,
        }
    }
}

impl Resource for PodMetrics {
    type DynamicType = ();
    type Scope = NamespaceResourceScope;

    fn kind(_: &()) -> Cow<'_, str> {
        Cow::Borrowed("PodMetrics")
    }

    fn group(_: &()) -> Cow<'_, str> {
        Cow::Borrowed(METRICS_API_GROUP)
    }

    fn version(_: &()) -> Cow<'_, str> {
        Cow::Borrowed(METRICS_API_VERSION)
    }

    fn plural(_: &()) -> Cow<'_, str> {
        Cow::Borrowed("pods")
    }

    fn meta(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn meta_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }
}

/// Metrics provider backed by the Kubernetes API server
#[derive(Clone)]
pub struct KubeMetricsProvider {
    client: Client,
    context: String,
}

impl KubeMetricsProvider {
    pub fn new(client: Client, context: impl Into<String>) -> Self {
        Self {
            client,
            context: context.into(),
        }
    }

    /// Name of the kubeconfig context the client was built from
    pub fn context(&self) -> &str {
        &self.context
    }

    /// Build a provider from a kubeconfig file
    ///
    /// The path resolves from `path_override`, then `KUBECONFIG`, then
    /// `$HOME/.kube/config`. Any failure here is a startup error.
    pub async fn from_kubeconfig(path_override: Option<&Path>) -> Result<Self, ProviderError> {
        let path = kubeconfig_path(path_override)?;
        info!(path = %path.display(), "Loading kubeconfig");

        let kubeconfig = Kubeconfig::read_from(&path).map_err(ProviderError::Kubeconfig)?;
        let context = kubeconfig.current_context.clone().unwrap_or_default();
        let config = Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
            .await
            .map_err(ProviderError::Kubeconfig)?;
        let client_url = config.cluster_url.to_string();
        let client = Client::try_from(config).map_err(ProviderError::Client)?;

        info!(context = %context, cluster_url = %client_url, "Kubernetes client ready");
        Ok(Self::new(client, context))
    }
}

#[async_trait]
impl MetricsProvider for KubeMetricsProvider {
    async fn get_usage(&self, workload: &WorkloadIdentity) -> Result<UsageSnapshot, ProviderError> {
        let api: Api<PodMetrics> = Api::namespaced(self.client.clone(), workload.namespace());
        let metrics = api
            .get(workload.name())
            .await
            .map_err(ProviderError::Request)?;

        debug!(
            pod = %workload.name(),
            namespace = %workload.namespace(),
            containers = metrics.containers.len(),
            window = ?metrics.window,
            "Fetched pod metrics"
        );

        Ok(metrics.into())
    }
}

/// Get kubeconfig path
pub fn kubeconfig_path(override_path: Option<&Path>) -> Result<PathBuf, ProviderError> {
    resolve_kubeconfig_path(
        override_path,
        std::env::var_os("KUBECONFIG"),
        dirs_next::home_dir(),
    )
    .ok_or(ProviderError::NoKubeconfig)
}

fn resolve_kubeconfig_path(
    override_path: Option<&Path>,
    env_value: Option<OsString>,
    home: Option<PathBuf>,
) -> Option<PathBuf> {
    if let Some(path) = override_path {
        return Some(path.to_path_buf());
    }

    if let Some(path) = env_value.filter(|value| !value.is_empty()) {
        return Some(PathBuf::from(path));
    }

    home.map(|home| home.join(".kube").join("config"))
}
