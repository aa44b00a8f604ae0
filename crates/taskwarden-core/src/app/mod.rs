//! App - the worker and autoscaler built on top of the ports.
//!
//! # Components
//! - **TaskManager**: submit tasks, open task streams
//! - **TaskStream**: receive and decode envelopes, isolating malformed ones
//! - **Supervisor**: lease renewal, hard deadline and liveness for one execution
//! - **Worker** / **WorkerGroup**: route and supervise tasks until shutdown
//! - **WorkerBuilder**: startup wiring and validation
//! - **AutoScaler**: desired count from queue depth

pub mod autoscaler;
pub mod builder;
pub mod dispatch;
pub mod supervisor;
pub mod task_manager;
pub mod worker;

pub use self::autoscaler::{AutoScaler, RuleOutcome};
pub use self::builder::{BuildError, WorkerBuilder};
pub use self::dispatch::{DispatchedTask, MAX_LEASE_TIMEOUT, MAX_WAIT_TIME, PollConfig, TaskStream};
pub use self::supervisor::{Completion, Supervisor, SupervisorConfig};
pub use self::task_manager::{SERVICE_NAME_ATTRIBUTE, TaskManager};
pub use self::worker::{Processed, Worker, WorkerGroup};
