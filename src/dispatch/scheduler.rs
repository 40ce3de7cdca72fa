//! Single-threaded cooperative scheduler for suspendable handlers.
//!
//! Other threads only enqueue jobs over a channel; every job runs on the
//! scheduler's own thread, inside a current-thread runtime and a `LocalSet`.

use std::thread;

use futures::future::LocalBoxFuture;
use tokio::sync::mpsc;
use tokio::task::LocalSet;
use tracing::{debug, error, info};

/// Builds the task on the scheduler thread.
pub type Job = Box<dyn FnOnce() -> LocalBoxFuture<'static, ()> + Send + 'static>;

#[derive(Debug)]
pub struct CooperativeScheduler {
    tx: mpsc::UnboundedSender<Job>,
}

impl CooperativeScheduler {
    /// Spawns the scheduler thread.
    ///
    /// The thread drains in-flight tasks and exits once the scheduler is dropped.
    pub fn start() -> std::io::Result<Self> {
        let (tx, mut rx) = mpsc::unbounded_channel::<Job>();
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        thread::Builder::new()
            .name("ice-coop-scheduler".to_string())
            .spawn(move || {
                let local = LocalSet::new();
                local.spawn_local(async move {
                    while let Some(job) = rx.recv().await {
                        tokio::task::spawn_local(job());
                    }
                    debug!("Scheduler queue closed, draining tasks");
                });
                runtime.block_on(local);
                debug!("Scheduler thread exited");
            })?;

        info!("Cooperative scheduler started");
        Ok(Self { tx })
    }

    /// Enqueues `job`. Returns `false` if the scheduler thread is gone, in
    /// which case the job is dropped unrun.
    pub fn schedule(&self, job: Job) -> bool {
        match self.tx.send(job) {
            Ok(()) => true,
            Err(_) => {
                error!("Cooperative scheduler is not running, job dropped");
                false
            }
        }
    }
}
