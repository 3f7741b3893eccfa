//! Concurrent worker loops.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::runner::TaskRunner;

/// N independent claim loops over one [`TaskRunner`].
///
/// Each task is processed inside its own spawned Tokio task, so a panic while
/// populating one asset is logged and the loop carries on. The panicked
/// task's lease expires and it is redelivered.
#[derive(Clone)]
pub struct WorkerPool {
    runner: TaskRunner,
    concurrency: usize,
    poll_interval: Duration,
}

impl WorkerPool {
    pub fn new(runner: TaskRunner, concurrency: usize, poll_interval: Duration) -> Self {
        Self {
            runner,
            concurrency,
            poll_interval,
        }
    }

    /// Spawn the loops. They stop once `cancel` fires and their current task
    /// finishes.
    pub fn spawn(&self, cancel: CancellationToken) -> Vec<JoinHandle<()>> {
        info!(
            concurrency = self.concurrency,
            poll_ms = self.poll_interval.as_millis() as u64,
            "starting population workers"
        );
        (0..self.concurrency)
            .map(|worker_id| {
                let runner = self.runner.clone();
                let cancel = cancel.clone();
                let poll = self.poll_interval;
                tokio::spawn(worker_loop(worker_id, runner, poll, cancel))
            })
            .collect()
    }

    /// Run the pool until `cancel` fires.
    pub async fn run(&self, cancel: CancellationToken) {
        for handle in self.spawn(cancel) {
            if let Err(e) = handle.await {
                error!(error = %e, "population worker loop aborted");
            }
        }
        info!("population workers stopped");
    }
}

async fn worker_loop(
    worker_id: usize,
    runner: TaskRunner,
    poll_interval: Duration,
    cancel: CancellationToken,
) {
    debug!(worker_id, "population worker started");
    while !cancel.is_cancelled() {
        let task_runner = runner.clone();
        let busy = match tokio::spawn(async move { task_runner.run_once().await }).await {
            Ok(Ok(Some(outcome))) => {
                debug!(worker_id, ?outcome, "processed population task");
                true
            }
            Ok(Ok(None)) => false,
            Ok(Err(e)) => {
                error!(worker_id, error = %e, "task queue error");
                false
            }
            Err(e) => {
                error!(worker_id, error = %e, "population task panicked");
                true
            }
        };
        if busy {
            continue;
        }
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(poll_interval) => {}
        }
    }
    debug!(worker_id, "population worker stopped");
}
