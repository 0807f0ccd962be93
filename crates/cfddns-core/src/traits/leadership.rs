// # Leadership Gate Trait
//
// The gate grants at-most-one-active execution across a fleet of controller
// replicas. Acquiring and renewing the underlying lock is entirely the gate's
// business; the controller only consumes its transitions.
//
// ## Usage
//
// ```rust,ignore
// use cfddns_core::traits::{LeadershipChange, LeadershipGate};
// use tokio_stream::StreamExt;
//
// let mut changes = gate.watch();
// while let Some(change) = changes.next().await {
//     match change {
//         LeadershipChange::Acquired => { /* start reconciling */ }
//         LeadershipChange::Lost => { /* stop after the in-flight cycle */ }
//     }
// }
// ```

use std::pin::Pin;
use tokio_stream::Stream;

/// Edge-triggered leadership transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeadershipChange {
    /// This replica became the leader
    Acquired,
    /// This replica lost leadership
    Lost,
}

/// Trait for leadership gate implementations
///
/// # Behavior
///
/// - Transitions must alternate, starting with `Acquired`
/// - The end of the stream means the gate is gone; the supervisor treats it
///   as a loss of leadership
/// - `watch()` is called once per supervisor run
pub trait LeadershipGate: Send + Sync {
    /// Stream of leadership transitions
    fn watch(&self) -> Pin<Box<dyn Stream<Item = LeadershipChange> + Send + 'static>>;

    /// Gate name (for logging/debugging)
    fn gate_name(&self) -> &'static str;
}
