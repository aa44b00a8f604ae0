//! Worker - pulls tasks, routes them and runs each under a fresh supervisor.
//!
//! # Flow
//! 1. `TaskStream::next` → a decoded `{task, kwargs}` and its message
//! 2. `TaskRouter::route` → a handler (unknown task or bad kwargs: report, skip)
//! 3. `Supervisor::run` → ack on success, report otherwise
//!
//! Shutdown is only observed while waiting for the next message; a task that
//! has started always finishes under its supervisor.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

use super::dispatch::{DispatchedTask, TaskStream};
use super::supervisor::{Completion, Supervisor, SupervisorConfig};
use crate::domain::{NotifyContext, WorkerError};
use crate::ports::Notifier;
use crate::typed::{RouteError, TaskRouter};

/// What happened to one received task.
#[derive(Debug)]
pub enum Processed {
    /// The task ran under supervision.
    Completed { task: String, completion: Completion },
    /// No handler could be built; the message was left for redelivery.
    Unrouted { task: String, error: RouteError },
}

pub struct Worker {
    stream: TaskStream,
    router: Arc<TaskRouter>,
    supervisor: SupervisorConfig,
    notifier: Arc<dyn Notifier>,
}

impl Worker {
    pub fn new(
        stream: TaskStream,
        router: Arc<TaskRouter>,
        supervisor: SupervisorConfig,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            stream,
            router,
            supervisor,
            notifier,
        }
    }

    pub fn supervisor_config(&self) -> SupervisorConfig {
        self.supervisor
    }

    /// Wait for one task and process it.
    pub async fn process_next(&mut self) -> Result<Processed, WorkerError> {
        let dispatched = self.stream.next().await?;
        self.process(dispatched).await
    }

    async fn process(&self, dispatched: DispatchedTask) -> Result<Processed, WorkerError> {
        let DispatchedTask {
            task,
            kwargs,
            message,
        } = dispatched;

        let handler = match self.router.route(&task, kwargs) {
            Ok(handler) => handler,
            Err(err) => {
                let context = NotifyContext::for_message(message.body(), message.attributes());
                self.notifier.notify(&err, &context);
                error!(
                    message_id = message.message_id(),
                    task = %task,
                    error = %err,
                    label = err.as_label(),
                    "failed to route task"
                );
                return Ok(Processed::Unrouted { task, error: err });
            }
        };

        info!(message_id = message.message_id(), task = %task, "starting task");
        let completion = Supervisor::new(message.as_ref(), self.supervisor, self.notifier.as_ref())
            .run(handler.as_ref())
            .await?;
        Ok(Processed::Completed { task, completion })
    }

    /// Process tasks until `shutdown` turns true or its sender is dropped.
    ///
    /// Returns how many tasks were processed. Stops early with an error on a
    /// failing receive or a process-fatal task outcome.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> Result<usize, WorkerError> {
        let mut processed = 0;
        loop {
            if *shutdown.borrow() {
                break;
            }
            let dispatched = tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
                next = self.stream.next() => next?,
            };
            self.process(dispatched).await?;
            processed += 1;
        }
        info!(processed, "worker stopped");
        Ok(processed)
    }
}

/// A set of workers sharing one shutdown signal.
///
/// A worker that stops with an error raises the signal for the whole group,
/// so a fatal task outcome ends consumption everywhere, not just in the
/// worker that hit it.
pub struct WorkerGroup {
    shutdown_tx: watch::Sender<bool>,
    joins: Vec<JoinHandle<Result<usize, WorkerError>>>,
}

impl WorkerGroup {
    /// Spawn one tokio task per worker.
    pub fn spawn(workers: Vec<Worker>) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let joins = workers
            .into_iter()
            .map(|mut worker| {
                let rx = shutdown_rx.clone();
                let stop = shutdown_tx.clone();
                tokio::spawn(async move {
                    let result = worker.run(rx).await;
                    if let Err(err) = &result {
                        error!(
                            error = %err,
                            label = err.as_label(),
                            "worker failed, stopping group"
                        );
                        let _ = stop.send(true);
                    }
                    result
                })
            })
            .collect();
        Self { shutdown_tx, joins }
    }

    pub fn len(&self) -> usize {
        self.joins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.joins.is_empty()
    }

    /// Ask every worker to stop once its current task is done.
    pub fn request_shutdown(&self) {
        // Receivers may already be gone if every worker stopped on an error.
        let _ = self.shutdown_tx.send(true);
    }

    /// Wait for every worker without asking them to stop.
    pub async fn join(self) -> Vec<Result<usize, WorkerError>> {
        let Self { shutdown_tx, joins } = self;
        let mut results = Vec::with_capacity(joins.len());
        for join in joins {
            results.push(join.await.map_err(WorkerError::from).and_then(|r| r));
        }
        drop(shutdown_tx);
        results
    }

    pub async fn shutdown_and_join(self) -> Vec<Result<usize, WorkerError>> {
        self.request_shutdown();
        self.join().await
    }
}
