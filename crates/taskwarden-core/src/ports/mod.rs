//! Ports - traits for the external services the core talks to.
//!
//! Production clients live outside this crate; `impls` holds the local
//! stand-ins used by tests and the demo binary.

pub mod notifier;
pub mod orchestrator;
pub mod queue;
pub mod service_state;

pub use self::notifier::{LogNotifier, NoopNotifier, Notifier};
pub use self::orchestrator::{Deployment, Orchestrator, RolloutState, ServiceDescription};
pub use self::queue::{
    MessageAttribute, MessageAttributes, QueueConnector, QueueMessage, QueueService, SendReceipt,
};
pub use self::service_state::{AlwaysActive, ServiceStateProbe};
