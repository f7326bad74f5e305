//! Supervised background tasks.
//!
//! Each HA loop runs under a supervisor that catches panics at the top of the
//! loop, logs them and starts the loop again after a short delay. A loop that
//! returns on its own is restarted too. Only shutdown ends supervision.

use crate::observability;
use crate::shutdown::ShutdownCoordinator;
use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

/// Spawn `factory()` under supervision. The handle resolves after shutdown.
pub fn spawn_supervised<F, Fut>(
    name: &'static str,
    shutdown: ShutdownCoordinator,
    restart_delay: Duration,
    factory: F,
) -> JoinHandle<()>
where
    F: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        loop {
            let run = AssertUnwindSafe(factory()).catch_unwind();

            tokio::select! {
                result = run => match result {
                    Ok(()) => warn!(task = name, "Background task exited, restarting"),
                    Err(payload) => error!(
                        task = name,
                        panic = %panic_message(payload.as_ref()),
                        "Background task panicked, restarting"
                    ),
                },
                _ = shutdown.wait_for_shutdown() => {
                    debug!(task = name, "Background task stopped");
                    return;
                }
            }

            observability::record_task_restart(name);
            tokio::select! {
                _ = tokio::time::sleep(restart_delay) => {}
                _ = shutdown.wait_for_shutdown() => return,
            }
        }
    })
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
