//! Core data models for the pod monitor

use crate::quantity::Quantity;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The single pod watched for the lifetime of the process
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkloadIdentity {
    name: String,
    namespace: String,
}

impl WorkloadIdentity {
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }
}

impl fmt::Display for WorkloadIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Resource usage of one container in the pod
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerUsage {
    pub name: String,
    pub cpu: Quantity,
    pub memory: Quantity,
}

/// Point-in-time usage of every container in a pod
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageSnapshot {
    pub pod_name: String,
    pub containers: Vec<ContainerUsage>,
}

impl UsageSnapshot {
    /// Sum CPU and memory across all containers
    pub fn aggregate(&self) -> AggregatedUsage {
        AggregatedUsage::from_containers(&self.containers)
    }
}

/// Totals derived from a single snapshot
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AggregatedUsage {
    pub total_cpu: Quantity,
    pub total_memory: Quantity,
    pub containers: usize,
}

impl AggregatedUsage {
    pub fn from_containers(containers: &[ContainerUsage]) -> Self {
        let mut usage = Self::default();
        for container in containers {
            usage.total_cpu += container.cpu;
            usage.total_memory += container.memory;
            usage.containers += 1;
        }
        usage
    }
}

/// What the monitor loop reports after a successful poll
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub pod_name: String,
    pub namespace: String,
    pub usage: AggregatedUsage,
    pub timestamp: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn container(name: &str, cpu: &str, memory: &str) -> ContainerUsage {
        ContainerUsage {
            name: name.to_string(),
            cpu: cpu.parse().unwrap(),
            memory: memory.parse().unwrap(),
        }
    }

    #[test]
    fn test_workload_identity_display() {
        let workload = WorkloadIdentity::new("web-1", "default");
        assert_eq!(workload.name(), "web-1");
        assert_eq!(workload.namespace(), "default");
        assert_eq!(workload.to_string(), "default/web-1");
    }

    #[test]
    fn test_aggregate_two_containers() {
        let snapshot = UsageSnapshot {
            pod_name: "web-1".to_string(),
            containers: vec![
                container("app", "100m", "64Mi"),
                container("sidecar", "50m", "32Mi"),
            ],
        };

        let usage = snapshot.aggregate();
        assert_eq!(usage.total_cpu.to_string(), "150m");
        assert_eq!(usage.total_memory.to_string(), "96Mi");
        assert_eq!(usage.containers, 2);
    }

    #[test]
    fn test_aggregate_empty_is_zero() {
        let snapshot = UsageSnapshot {
            pod_name: "web-1".to_string(),
            containers: vec![],
        };

        let usage = snapshot.aggregate();
        assert!(usage.total_cpu.is_zero());
        assert!(usage.total_memory.is_zero());
        assert_eq!(usage.total_cpu.to_string(), "0");
        assert_eq!(usage.total_memory.to_string(), "0");
        assert_eq!(usage.containers, 0);
    }

    #[test]
    fn test_aggregate_mixed_units() {
        let containers = vec![
            container("a", "1", "1Gi"),
            container("b", "250m", "512Mi"),
            container("c", "12345678n", "1000000"),
        ];

        let usage = AggregatedUsage::from_containers(&containers);
        assert_eq!(usage.total_cpu.as_nanos(), 1_262_345_678);
        assert_eq!(usage.total_cpu.to_string(), "1262345678n");
        assert_eq!(
            usage.total_memory.as_nanos(),
            (1_073_741_824i128 + 536_870_912 + 1_000_000) * 1_000_000_000
        );
    }

    #[test]
    fn test_aggregate_order_independent() {
        let containers = vec![
            container("a", "100m", "64Mi"),
            container("b", "3", "1Gi"),
            container("c", "7500u", "100M"),
            container("d", "0", "0"),
        ];
        let expected = AggregatedUsage::from_containers(&containers);

        // Every rotation and the reversal produce the same totals
        for shift in 0..containers.len() {
            let mut rotated = containers.clone();
            rotated.rotate_left(shift);
            assert_eq!(AggregatedUsage::from_containers(&rotated), expected);

            rotated.reverse();
            assert_eq!(AggregatedUsage::from_containers(&rotated), expected);
        }
    }

    #[test]
    fn test_aggregate_matches_elementwise_sum() {
        for len in 0..6usize {
            let containers: Vec<_> = (0..len)
                .map(|i| container(&format!("c{i}"), &format!("{}m", i * 10), &format!("{i}Mi")))
                .collect();

            let usage = AggregatedUsage::from_containers(&containers);
            let cpu_nanos: i128 = (0..len as i128).map(|i| i * 10_000_000).sum();
            let mem_nanos: i128 = (0..len as i128).map(|i| i * 1_048_576 * 1_000_000_000).sum();

            assert_eq!(usage.total_cpu.as_nanos(), cpu_nanos);
            assert_eq!(usage.total_memory.as_nanos(), mem_nanos);
            assert_eq!(usage.containers, len);
        }
    }
}
