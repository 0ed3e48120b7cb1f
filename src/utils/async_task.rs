use tokio::task::JoinHandle;
use tracing::debug;
use tracing::error;

use crate::Result;

/// Spawns a named worker and tracks its handle; a worker ending with an
/// error is logged.
pub(crate) fn spawn_task<F, Fut>(
    name: &str,
    task_fn: F,
    handles: Option<&mut Vec<JoinHandle<()>>>,
) where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: std::future::Future<Output = Result<()>> + Send + 'static,
{
    let name = name.to_string();
    let handle = tokio::spawn(async move {
        match task_fn().await {
            Ok(()) => debug!("spawned task: {name} stopped"),
            Err(e) => error!("spawned task: {name} stopped or encountered an error: {:?}", e),
        }
    });

    if let Some(h) = handles {
        h.push(handle);
    }
}

/// Waits for every tracked task; returns how many panicked or were
/// cancelled.
pub(crate) async fn join_tasks(handles: Vec<JoinHandle<()>>) -> usize {
    let mut failed = 0;
    for handle in handles {
        if let Err(e) = handle.await {
            error!("spawned task did not finish cleanly: {:?}", e);
            failed += 1;
        }
    }
    failed
}
