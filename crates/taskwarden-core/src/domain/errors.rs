//! Errors - error taxonomy shared by every component.
//!
//! - [`ConfigError`]: bad timeouts or rules, raised at construction only.
//! - [`ServiceError`]: a queue or orchestration call failed; local to the operation.
//! - [`DecodeError`] / [`EncodeError`]: malformed envelopes.
//! - [`WorkError`]: raised by a task; tagged recoverable or fatal.
//! - [`SupervisorError`]: the outcome of one supervised execution that did not succeed.
//! - [`WorkerError`]: why a worker loop stopped.
//!
//! Only errors where [`SupervisorError::is_fatal`] holds stop consumption.

use std::time::Duration;

use thiserror::Error;

/// Invalid configuration. Never produced at runtime.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{field} must be greater than zero")]
    NotPositive { field: &'static str },

    #[error("renewal interval {renewal:?} is too long to renew the lease timeout {lease:?}")]
    RenewalTooLong { renewal: Duration, lease: Duration },

    #[error("invalid polling wait time {0:?}; must be between 0 and 20 seconds")]
    WaitTimeOutOfRange(Duration),

    #[error("invalid lease timeout {0:?}; must be between 0 and 12 hours")]
    LeaseTimeoutOutOfRange(Duration),

    #[error("scaling rules must be a list, got {0}")]
    RulesNotAList(String),

    #[error("scaling rule must be a mapping, got {0}")]
    RuleNotAMapping(String),

    #[error("rules must specify the {0}")]
    MissingRuleKey(&'static str),

    #[error("unexpected rule key {0}")]
    UnexpectedRuleKey(String),

    #[error("rule key {key} is invalid: {reason}")]
    InvalidRuleValue { key: &'static str, reason: String },

    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// A call to the queue or orchestration service failed.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{operation} failed: {message}")]
    Request {
        operation: &'static str,
        message: String,
    },

    #[error("queue {0} does not exist")]
    QueueNotFound(String),

    #[error("service {service} not found in cluster {cluster}")]
    ServiceNotFound { cluster: String, service: String },

    #[error("queue attribute {name} is not a count: {value:?}")]
    InvalidAttribute { name: String, value: String },
}

impl ServiceError {
    pub fn request(operation: &'static str, message: impl Into<String>) -> Self {
        ServiceError::Request {
            operation,
            message: message.into(),
        }
    }

    /// Short stable label for log fields.
    pub fn as_label(&self) -> &'static str {
        match self {
            ServiceError::Request { .. } => "service_request_failed",
            ServiceError::QueueNotFound(_) => "queue_not_found",
            ServiceError::ServiceNotFound { .. } => "service_not_found",
            ServiceError::InvalidAttribute { .. } => "invalid_queue_attribute",
        }
    }
}

/// A message body that is not a valid task envelope.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("message body is not valid JSON: {0}")]
    Malformed(#[source] serde_json::Error),

    #[error("message body must be a JSON object")]
    NotAnObject,

    #[error("missing required field {0:?}")]
    MissingField(&'static str),

    #[error("field {field:?} must be {expected}")]
    InvalidField {
        field: &'static str,
        expected: &'static str,
    },

    #[error("unexpected field {0:?}")]
    UnexpectedField(String),
}

impl DecodeError {
    pub fn is_missing_field(&self) -> bool {
        matches!(self, DecodeError::MissingField(_))
    }

    pub fn as_label(&self) -> &'static str {
        match self {
            DecodeError::MissingField(_) => "missing_field",
            _ => "decode_error",
        }
    }
}

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("failed to serialize kwargs: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("kwargs must serialize to a JSON object")]
    KwargsNotAnObject,
}

/// Producer-side failure of `submit`.
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error(transparent)]
    Service(#[from] ServiceError),
}

/// Error returned by a task. The variant is the fatality flag.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkError {
    /// Ordinary failure; the message is left for redelivery.
    #[error("task failed: {reason}")]
    Failed { reason: String },

    /// The process must stop consuming.
    #[error("task failed fatally: {reason}")]
    Fatal { reason: String },
}

impl WorkError {
    pub fn failed(reason: impl Into<String>) -> Self {
        WorkError::Failed {
            reason: reason.into(),
        }
    }

    pub fn fatal(reason: impl Into<String>) -> Self {
        WorkError::Fatal {
            reason: reason.into(),
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, WorkError::Fatal { .. })
    }

    pub fn as_label(&self) -> &'static str {
        match self {
            WorkError::Failed { .. } => "task_failed",
            WorkError::Fatal { .. } => "task_fatal",
        }
    }
}

/// Why a supervised execution did not end in acknowledgment.
#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("hit hard deadline {deadline:?} after {elapsed:?}")]
    DeadlineExceeded { deadline: Duration, elapsed: Duration },

    #[error("handler is stuck after {elapsed:?}: neither finished nor making progress")]
    Stuck { elapsed: Duration },

    #[error(transparent)]
    Work(#[from] WorkError),
}

impl SupervisorError {
    /// `true` when the owning process must stop consuming.
    ///
    /// A stuck handler is always fatal; a deadline is never fatal; a task
    /// error carries its own flag.
    pub fn is_fatal(&self) -> bool {
        match self {
            SupervisorError::DeadlineExceeded { .. } => false,
            SupervisorError::Stuck { .. } => true,
            SupervisorError::Work(err) => err.is_fatal(),
        }
    }

    pub fn as_label(&self) -> &'static str {
        match self {
            SupervisorError::DeadlineExceeded { .. } => "deadline_exceeded",
            SupervisorError::Stuck { .. } => "handler_stuck",
            SupervisorError::Work(err) => err.as_label(),
        }
    }
}

/// Why a worker stopped consuming.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// Receiving from the queue failed.
    #[error(transparent)]
    Service(#[from] ServiceError),

    /// A handler was stuck or failed fatally.
    #[error(transparent)]
    Supervisor(#[from] SupervisorError),

    /// The worker's task panicked or was aborted.
    #[error("worker task ended abnormally: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl WorkerError {
    pub fn as_label(&self) -> &'static str {
        match self {
            WorkerError::Service(err) => err.as_label(),
            WorkerError::Supervisor(err) => err.as_label(),
            WorkerError::Join(_) => "worker_join_failed",
        }
    }
}
