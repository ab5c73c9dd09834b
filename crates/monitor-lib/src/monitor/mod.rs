//! Periodic pod usage monitoring
//!
//! The [`MonitorLoop`] polls a [`MetricsProvider`](crate::provider::MetricsProvider)
//! on a fixed interval, sums container usage, and hands the result to an
//! [`ObservationSink`]. Provider failures are reported and skipped; only the
//! [`ShutdownSignal`] ends the loop.

mod r#loop;
mod shutdown;


pub use r#loop::{
    MonitorConfig, MonitorLoop, MonitorLoopBuilder, DEFAULT_POLL_INTERVAL,
    DEFAULT_REQUEST_TIMEOUT, DEFAULT_UNHEALTHY_AFTER,
};
pub use shutdown::{shutdown_channel, ShutdownHandle, ShutdownSignal, StopReason};

use crate::models::{Observation, WorkloadIdentity};
use crate::provider::ProviderError;

/// Receives the outcome of every poll
pub trait ObservationSink: Send + Sync {
    /// A poll succeeded
    fn observe(&self, observation: &Observation);

    /// A poll failed; the loop carries on with the next tick
    fn failure(&self, workload: &WorkloadIdentity, error: &ProviderError, consecutive_failures: u32);
}
