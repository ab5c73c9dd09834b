//! Cooperative shutdown signalling
//!
//! A [`ShutdownHandle`] records why the process is stopping; every
//! [`ShutdownSignal`] cloned from the pair observes the same reason. The first
//! reason recorded wins.

use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;

/// Why the monitor loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Ctrl-C / SIGINT
    Interrupted,
    /// SIGTERM
    Terminated,
    /// Stopped programmatically
    Requested,
    /// Every handle was dropped without recording a reason
    SignalDropped,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            StopReason::Interrupted => "SIGINT received",
            StopReason::Terminated => "SIGTERM received",
            StopReason::Requested => "shutdown requested",
            StopReason::SignalDropped => "shutdown handle dropped",
        };
        f.write_str(reason)
    }
}

/// Create a connected handle/signal pair
pub fn shutdown_channel() -> (ShutdownHandle, ShutdownSignal) {
    let (tx, rx) = watch::channel(None);
    (ShutdownHandle { tx: Arc::new(tx) }, ShutdownSignal { rx })
}

/// Triggers shutdown
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    tx: Arc<watch::Sender<Option<StopReason>>>,
}

impl ShutdownHandle {
    /// Record a stop reason; later calls are ignored
    pub fn trigger(&self, reason: StopReason) {
        self.tx.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(reason);
            true
        });
    }
}

/// Observes shutdown
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    rx: watch::Receiver<Option<StopReason>>,
}

impl ShutdownSignal {
    /// The recorded reason, if shutdown has been triggered
    pub fn reason(&self) -> Option<StopReason> {
        *self.rx.borrow()
    }

    /// Wait until shutdown is triggered
    ///
    /// Resolves immediately if it already was. If every handle is dropped
    /// first, resolves with [`StopReason::SignalDropped`].
    pub async fn cancelled(&mut self) -> StopReason {
        let observed = self.rx.wait_for(Option::is_some).await.map(|reason| *reason);
        match observed {
            Ok(Some(reason)) => reason,
            Ok(None) | Err(_) => StopReason::SignalDropped,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_signal_starts_untriggered() {
        let (_handle, signal) = shutdown_channel();
        assert_eq!(signal.reason(), None);
    }

    #[tokio::test]
    async fn test_first_reason_wins() {
        let (handle, mut signal) = shutdown_channel();
        handle.trigger(StopReason::Terminated);
        handle.trigger(StopReason::Interrupted);

        assert_eq!(signal.reason(), Some(StopReason::Terminated));
        assert_eq!(signal.cancelled().await, StopReason::Terminated);
    }

    #[tokio::test]
    async fn test_cloned_signals_see_same_reason() {
        let (handle, signal) = shutdown_channel();
        let mut other = signal.clone();

        let waiter = tokio::spawn(async move { other.cancelled().await });
        handle.trigger(StopReason::Requested);

        assert_eq!(waiter.await.unwrap(), StopReason::Requested);
        assert_eq!(signal.reason(), Some(StopReason::Requested));
    }

    #[tokio::test]
    async fn test_dropped_handle_resolves_signal() {
        let (handle, mut signal) = shutdown_channel();
        drop(handle);

        let reason = tokio::time::timeout(Duration::from_secs(1), signal.cancelled())
            .await
            .unwrap();
        assert_eq!(reason, StopReason::SignalDropped);
    }

    #[tokio::test]
    async fn test_reason_survives_handle_drop() {
        let (handle, mut signal) = shutdown_channel();
        handle.trigger(StopReason::Interrupted);
        drop(handle);

        assert_eq!(signal.cancelled().await, StopReason::Interrupted);
    }

    #[test]
    fn test_stop_reason_display() {
        assert_eq!(StopReason::Interrupted.to_string(), "SIGINT received");
        assert_eq!(StopReason::SignalDropped.to_string(), "shutdown handle dropped");
    }
}
