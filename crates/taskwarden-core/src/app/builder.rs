//! WorkerBuilder - wires router, supervisor timings, polling and notifier into workers.
//!
//! Registration errors surface at `register`; `build` checks that every
//! task named in `expect_tasks` has a route, so a deployment missing a
//! handler fails at startup instead of bouncing messages forever.

use std::sync::Arc;

use super::dispatch::{MAX_WAIT_TIME, PollConfig, TaskStream};
use super::supervisor::SupervisorConfig;
use super::worker::Worker;
use crate::domain::{ConfigError, Kwargs};
use crate::ports::{LogNotifier, Notifier, QueueService};
use crate::typed::{RouteError, Task, TaskHandler, TaskRouter};

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("missing tasks: {0:?}; these tasks were expected but not registered")]
    MissingTasks(Vec<String>),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub struct WorkerBuilder {
    router: TaskRouter,
    expected: Option<Vec<String>>,
    supervisor: SupervisorConfig,
    poll: Option<PollConfig>,
    notifier: Arc<dyn Notifier>,
}

impl WorkerBuilder {
    pub fn new(supervisor: SupervisorConfig) -> Self {
        Self {
            router: TaskRouter::new(),
            expected: None,
            supervisor,
            poll: None,
            notifier: Arc::new(LogNotifier),
        }
    }

    pub fn register<T, F, H>(mut self, factory: F) -> Result<Self, RouteError>
    where
        T: Task,
        F: Fn(T) -> H + Send + Sync + 'static,
        H: TaskHandler + 'static,
    {
        self.router.register::<T, F, H>(factory)?;
        Ok(self)
    }

    pub fn register_raw<F, H>(
        mut self,
        name: impl Into<String>,
        factory: F,
    ) -> Result<Self, RouteError>
    where
        F: Fn(Kwargs) -> H + Send + Sync + 'static,
        H: TaskHandler + 'static,
    {
        self.router.register_raw(name, factory)?;
        Ok(self)
    }

    pub fn expect_tasks(mut self, tasks: &[&str]) -> Self {
        self.expected = Some(tasks.iter().map(|t| t.to_string()).collect());
        self
    }

    /// Receive parameters. Defaults to the longest wait and the supervisor's lease.
    pub fn poll(mut self, poll: PollConfig) -> Self {
        self.poll = Some(poll);
        self
    }

    /// Where failures are reported. Defaults to [`LogNotifier`].
    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// One worker on `queue`.
    pub fn build(self, queue: Arc<dyn QueueService>) -> Result<Worker, BuildError> {
        let mut workers = self.build_many(queue, 1)?;
        workers.pop().ok_or_else(|| {
            BuildError::Config(ConfigError::NotPositive {
                field: "worker count",
            })
        })
    }

    /// `count` workers on `queue` sharing one router.
    pub fn build_many(
        self,
        queue: Arc<dyn QueueService>,
        count: usize,
    ) -> Result<Vec<Worker>, BuildError> {
        if count == 0 {
            return Err(ConfigError::NotPositive {
                field: "worker count",
            }
            .into());
        }
        if let Some(expected) = &self.expected {
            let missing: Vec<String> = expected
                .iter()
                .filter(|task| !self.router.contains(task))
                .cloned()
                .collect();
            if !missing.is_empty() {
                return Err(BuildError::MissingTasks(missing));
            }
        }

        let poll = match self.poll {
            Some(poll) => poll,
            None => default_poll(self.supervisor)?,
        };
        let router = Arc::new(self.router);
        let workers = (0..count)
            .map(|_| {
                let stream = TaskStream::new(queue.clone(), self.notifier.clone(), poll);
                Worker::new(stream, router.clone(), self.supervisor, self.notifier.clone())
            })
            .collect();
        Ok(workers)
    }
}

fn default_poll(supervisor: SupervisorConfig) -> Result<PollConfig, ConfigError> {
    PollConfig::new(MAX_WAIT_TIME, supervisor.lease_timeout())
}
