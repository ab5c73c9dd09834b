//! Pod resource monitor library
//!
//! This crate provides the core functionality for:
//! - Kubernetes resource quantities with unit-aware arithmetic
//! - Fetching pod usage from the resource metrics API
//! - The periodic, failure-tolerant monitor loop
//! - Health checks and observability

pub mod health;
pub mod models;
pub mod monitor;
pub mod observability;
pub mod provider;
pub mod quantity;

pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use monitor::{
    shutdown_channel, MonitorConfig, MonitorLoop, MonitorLoopBuilder, ObservationSink,
    ShutdownHandle, ShutdownSignal, StopReason,
};
pub use observability::{MonitorMetrics, StructuredLogger};
pub use provider::{KubeMetricsProvider, MetricsProvider, ProviderError};
pub use quantity::{Format, Quantity, QuantityParseError};
