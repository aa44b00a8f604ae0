//! Impls - local stand-ins for the external services, plus reusable handlers.

pub mod command;
pub mod deployment_state;
pub mod local_orchestrator;
pub mod local_queue;
pub mod progress;

pub use self::command::{CommandHandler, CommandSpec};
pub use self::deployment_state::{DEFAULT_STATE_TAG, DeploymentStateProbe};
pub use self::local_orchestrator::LocalOrchestrator;
pub use self::local_queue::{LocalMessage, LocalQueue, LocalQueueRegistry};
pub use self::progress::ProgressCounter;
