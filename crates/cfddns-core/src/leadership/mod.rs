//! Leadership gates and supervision
//!
//! A [`LeadershipGate`] reports when this replica may reconcile. The
//! [`Supervisor`] turns those transitions into a running or stopped
//! [`Controller`](crate::Controller).
//!
//! Two gates ship with the core:
//!
//! - [`StandaloneGate`]: leader from the start, never loses it. For a single
//!   replica.
//! - [`ChannelGate`]: driven through a [`LeadershipHandle`] by whatever lock
//!   integration the deployment uses.

mod supervisor;

pub use supervisor::Supervisor;

use crate::traits::{LeadershipChange, LeadershipGate};
use std::pin::Pin;
use std::sync::Mutex;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::{Stream, StreamExt};
use tracing::warn;

type ChangeStream = Pin<Box<dyn Stream<Item = LeadershipChange> + Send + 'static>>;

/// Gate for single-replica deployments
#[derive(Debug, Clone, Copy, Default)]
pub struct StandaloneGate;

impl LeadershipGate for StandaloneGate {
    fn watch(&self) -> ChangeStream {
        Box::pin(
            tokio_stream::once(LeadershipChange::Acquired).chain(tokio_stream::pending()),
        )
    }

    fn gate_name(&self) -> &'static str {
        "standalone"
    }
}

/// Gate fed by an external lock integration
///
/// The stream can be taken once; later `watch()` calls yield an empty stream,
/// which the supervisor treats as lost leadership.
#[derive(Debug)]
pub struct ChannelGate {
    rx: Mutex<Option<mpsc::UnboundedReceiver<LeadershipChange>>>,
}

/// Sending side of a [`ChannelGate`]
#[derive(Debug, Clone)]
pub struct LeadershipHandle {
    tx: mpsc::UnboundedSender<LeadershipChange>,
}

impl ChannelGate {
    /// Create a gate and the handle driving it
    pub fn new() -> (Self, LeadershipHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                rx: Mutex::new(Some(rx)),
            },
            LeadershipHandle { tx },
        )
    }
}

impl LeadershipGate for ChannelGate {
    fn watch(&self) -> ChangeStream {
        let rx = match self.rx.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };

        match rx {
            Some(rx) => Box::pin(UnboundedReceiverStream::new(rx)),
            None => {
                warn!("Leadership stream was already taken");
                Box::pin(tokio_stream::empty())
            }
        }
    }

    fn gate_name(&self) -> &'static str {
        "channel"
    }
}

impl LeadershipHandle {
    /// Report that leadership was acquired
    ///
    /// Returns `false` when the gate is gone.
    pub fn acquired(&self) -> bool {
        self.tx.send(LeadershipChange::Acquired).is_ok()
    }

    /// Report that leadership was lost
    ///
    /// Returns `false` when the gate is gone.
    pub fn lost(&self) -> bool {
        self.tx.send(LeadershipChange::Lost).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn standalone_gate_acquires_once_and_holds() {
        let mut changes = StandaloneGate.watch();
        assert_eq!(changes.next().await, Some(LeadershipChange::Acquired));

        let next = tokio::time::timeout(Duration::from_millis(50), changes.next()).await;
        assert!(next.is_err(), "standalone gate must never report a loss");
    }

    #[tokio::test]
    async fn channel_gate_forwards_transitions() {
        let (gate, handle) = ChannelGate::new();
        let mut changes = gate.watch();

        assert!(handle.acquired());
        assert!(handle.lost());
        drop(handle);

        assert_eq!(changes.next().await, Some(LeadershipChange::Acquired));
        assert_eq!(changes.next().await, Some(LeadershipChange::Lost));
        assert_eq!(changes.next().await, None);
    }

    #[tokio::test]
    async fn channel_gate_stream_is_taken_once() {
        let (gate, handle) = ChannelGate::new();
        let _first = gate.watch();
        let mut second = gate.watch();

        handle.acquired();
        assert_eq!(second.next().await, None);
    }
}
