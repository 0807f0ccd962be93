// # Supervisor
//
// Runs the controller only while this replica holds leadership.
//
// ## Task Model
//
// On `Acquired` the controller is moved into a spawned task together with a
// fresh `CancellationToken`. The task hands the controller back when its loop
// ends, so the last-known addresses and the gauge survive any number of
// leadership changes. On `Lost`, shutdown or the end of the gate stream the
// token is cancelled and the task awaited; the in-flight cycle completes
// before the controller stops.

use crate::engine::Controller;
use crate::error::{Error, Result};
use crate::traits::{LeadershipChange, LeadershipGate};
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

type ControllerTask = JoinHandle<(Controller, Result<()>)>;

/// Controller loop currently running under leadership
struct Leading {
    cancel: CancellationToken,
    task: ControllerTask,
}

/// Starts and stops the controller on leadership transitions
pub struct Supervisor {
    /// Idle controller; `None` while a task owns it
    controller: Option<Controller>,
}

impl Supervisor {
    /// Supervise `controller`
    pub fn new(controller: Controller) -> Self {
        Self {
            controller: Some(controller),
        }
    }

    /// The idle controller, if it is not currently running
    pub fn controller(&self) -> Option<&Controller> {
        self.controller.as_ref()
    }

    /// Take the controller back
    pub fn into_controller(self) -> Option<Controller> {
        self.controller
    }

    /// Follow the gate until `shutdown` fires or the gate goes away
    ///
    /// # Returns
    ///
    /// - `Ok(())`: Shutdown requested or gate stream ended
    /// - `Err(Error)`: The controller stopped on a fatal error; the process
    ///   should exit so another replica can take over
    pub async fn run(
        &mut self,
        gate: &dyn LeadershipGate,
        shutdown: CancellationToken,
    ) -> Result<()> {
        info!("Waiting for leadership via {} gate", gate.gate_name());
        let mut changes = gate.watch();
        let mut leading: Option<Leading> = None;

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    info!("Shutdown requested");
                    return self.stop(leading.take()).await;
                }

                // The loop only ends on its own after a fatal error
                joined = finished(&mut leading) => {
                    return self.reclaim(joined)?;
                }

                change = changes.next() => match change {
                    Some(LeadershipChange::Acquired) => {
                        if leading.is_some() {
                            debug!("Already leading, ignoring duplicate acquisition");
                            continue;
                        }
                        info!("Leadership acquired, starting reconciliation");
                        leading = self.start();
                    }
                    Some(LeadershipChange::Lost) => {
                        if leading.is_none() {
                            debug!("Not leading, ignoring loss");
                            continue;
                        }
                        warn!("Leadership lost, stopping after the current cycle");
                        self.stop(leading.take()).await?;
                    }
                    None => {
                        warn!("Leadership gate closed");
                        return self.stop(leading.take()).await;
                    }
                }
            }
        }
    }

    fn start(&mut self) -> Option<Leading> {
        let Some(mut controller) = self.controller.take() else {
            error!("Controller is not available; leadership ignored");
            return None;
        };

        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let task = tokio::spawn(async move {
            let result = controller.run(token).await;
            (controller, result)
        });

        Some(Leading { cancel, task })
    }

    async fn stop(&mut self, leading: Option<Leading>) -> Result<()> {
        let Some(Leading { cancel, task }) = leading else {
            return Ok(());
        };

        cancel.cancel();
        let joined = task.await;
        self.reclaim(joined)?
    }

    /// Put the controller back and surface its loop result
    fn reclaim(
        &mut self,
        joined: std::result::Result<(Controller, Result<()>), tokio::task::JoinError>,
    ) -> Result<Result<()>> {
        match joined {
            Ok((controller, result)) => {
                self.controller = Some(controller);
                if let Err(e) = &result {
                    error!("Reconciliation ended with a fatal error: {}", e);
                }
                Ok(result)
            }
            Err(e) => Err(Error::Other(format!("Controller task failed: {}", e))),
        }
    }
}

/// Resolve when the leading task ends; pending while not leading
async fn finished(
    leading: &mut Option<Leading>,
) -> std::result::Result<(Controller, Result<()>), tokio::task::JoinError> {
    match leading {
        Some(Leading { task, .. }) => task.await,
        None => std::future::pending().await,
    }
}
