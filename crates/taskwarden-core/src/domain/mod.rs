//! Domain - data model shared by the worker and the autoscaler.

pub mod attributes;
pub mod context;
pub mod envelope;
pub mod errors;
pub mod rule;

pub use self::attributes::QueueAttributes;
pub use self::context::NotifyContext;
pub use self::envelope::{Kwargs, TaskEnvelope};
pub use self::errors::{
    ConfigError, DecodeError, EncodeError, ServiceError, SubmitError, SupervisorError, WorkError,
    WorkerError,
};
pub use self::rule::{ScalingRule, ServiceState};
