//! Background expiry sweep.
//!
//! Periodically removes session documents whose `_mlttl` has passed. The
//! task runs until its [`CancellationToken`] fires.

use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::store::StoreInner;

/// Handle to a running sweep task.
#[derive(Debug)]
pub struct SweepHandle {
    cancellation: CancellationToken,
    task: JoinHandle<()>,
}

impl SweepHandle {
    /// Ask the task to stop after its current sweep.
    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    /// Whether the task has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop the task and wait for it to exit.
    pub async fn shutdown(self) {
        self.cancellation.cancel();
        if let Err(e) = self.task.await {
            warn!(error = %e, "Session sweep task ended abnormally");
        }
    }
}

/// Spawn the sweep loop on `runtime`.
///
/// The first sweep runs as soon as the runtime schedules the task; each
/// following sweep waits `interval` after the previous one finished,
/// whether or not it succeeded.
pub(crate) fn spawn_sweep_task(
    runtime: &Handle,
    inner: Arc<StoreInner>,
    interval: Duration,
) -> SweepHandle {
    let cancellation = CancellationToken::new();
    let token = cancellation.clone();

    let task = runtime.spawn(async move {
        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                result = inner.prune_sessions() => match result {
                    Ok(0) => debug!("Session sweep: no expired sessions"),
                    Ok(_) => {}
                    Err(e) => warn!(error = %e, "Session sweep failed"),
                },
            }

            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }
        }
        debug!("Session sweep task stopped");
    });

    SweepHandle { cancellation, task }
}
