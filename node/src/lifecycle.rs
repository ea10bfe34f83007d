//! Supervision of the node's background loops.
//!
//! [`BackgroundTasks`] owns the stop broadcast and the join handle of every
//! loop the node spawns. Stopping sends the signal once, then gives each task
//! a grace period to return before aborting it.

use std::future::Future;
use std::time::Duration;

use tokio::signal;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::NodeError;

pub struct BackgroundTasks {
    stop_tx: broadcast::Sender<()>,
    running: Vec<(&'static str, JoinHandle<()>)>,
}

impl BackgroundTasks {
    pub fn new() -> Self {
        let (stop_tx, _) = broadcast::channel(1);
        Self {
            stop_tx,
            running: Vec::new(),
        }
    }

    /// Spawn `task` with a receiver that fires when the node stops.
    pub fn spawn<F, Fut>(&mut self, name: &'static str, task: F)
    where
        F: FnOnce(broadcast::Receiver<()>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(task(self.stop_tx.subscribe()));
        debug!(task = name, "background task spawned");
        self.running.push((name, handle));
    }

    pub fn len(&self) -> usize {
        self.running.len()
    }

    pub fn is_empty(&self) -> bool {
        self.running.is_empty()
    }

    /// Signal every task and wait up to `grace` for each one. Tasks still
    /// running after that are aborted and reported as failures.
    pub async fn stop(&mut self, grace: Duration) -> Result<(), NodeError> {
        // No receivers just means nothing is running.
        let _ = self.stop_tx.send(());
        let mut failed = Vec::new();
        for (name, mut handle) in self.running.drain(..) {
            match tokio::time::timeout(grace, &mut handle).await {
                Ok(Ok(())) => debug!(task = name, "background task exited"),
                Ok(Err(e)) => {
                    warn!(task = name, error = %e, "background task did not exit cleanly");
                    failed.push(format!("{name}: {e}"));
                }
                Err(_) => {
                    handle.abort();
                    warn!(task = name, ?grace, "background task ignored stop, aborted");
                    failed.push(format!("{name}: still running after {grace:?}"));
                }
            }
        }
        if failed.is_empty() {
            Ok(())
        } else {
            Err(NodeError::Task(failed.join("; ")))
        }
    }
}

impl Default for BackgroundTasks {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolve on SIGINT, or SIGTERM where the platform has it.
pub async fn stop_signal() {
    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "SIGTERM handler unavailable, waiting for SIGINT only");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = signal::ctrl_c() => info!("received SIGINT"),
        _ = terminate => info!("received SIGTERM"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn stop_reaches_every_task() {
        let exited = Arc::new(AtomicUsize::new(0));
        let mut tasks = BackgroundTasks::new();
        for name in ["scheduler", "webhook"] {
            let exited = exited.clone();
            tasks.spawn(name, move |mut stop| async move {
                let _ = stop.recv().await;
                exited.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(tasks.len(), 2);

        tasks.stop(Duration::from_secs(5)).await.unwrap();
        assert_eq!(exited.load(Ordering::SeqCst), 2);
        assert!(tasks.is_empty());
    }

    #[tokio::test]
    async fn task_ignoring_stop_is_aborted() {
        let mut tasks = BackgroundTasks::new();
        tasks.spawn("stuck", |_stop| std::future::pending::<()>());
        let err = tasks.stop(Duration::from_millis(20)).await.unwrap_err();
        assert!(matches!(err, NodeError::Task(msg) if msg.starts_with("stuck")));
        assert!(tasks.is_empty());
    }

    #[tokio::test]
    async fn stopping_with_nothing_running_is_fine() {
        let mut tasks = BackgroundTasks::new();
        tasks.stop(Duration::from_millis(1)).await.unwrap();
    }
}
