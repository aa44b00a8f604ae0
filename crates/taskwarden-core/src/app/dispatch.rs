//! TaskStream - turns queue messages into decoded tasks.
//!
//! Pull-based: nothing is received until the caller asks for the next task.
//! Malformed messages are reported and skipped; they are never acknowledged
//! here, so the queue redelivers them or moves them to its dead-letter queue.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};

use crate::config::PollSettings;
use crate::domain::{ConfigError, DecodeError, Kwargs, NotifyContext, ServiceError, TaskEnvelope};
use crate::ports::{Notifier, QueueMessage, QueueService};

pub const MAX_WAIT_TIME: Duration = Duration::from_secs(20);
pub const MAX_LEASE_TIMEOUT: Duration = Duration::from_secs(12 * 60 * 60);

/// Receive parameters, validated against the queue service's limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    wait_time: Duration,
    lease_timeout: Duration,
}

impl PollConfig {
    /// `wait_time` in `0..=20s`, `lease_timeout` in `0..=12h`.
    pub fn new(wait_time: Duration, lease_timeout: Duration) -> Result<Self, ConfigError> {
        if wait_time > MAX_WAIT_TIME {
            return Err(ConfigError::WaitTimeOutOfRange(wait_time));
        }
        if lease_timeout > MAX_LEASE_TIMEOUT {
            return Err(ConfigError::LeaseTimeoutOutOfRange(lease_timeout));
        }
        Ok(Self {
            wait_time,
            lease_timeout,
        })
    }

    pub fn wait_time(&self) -> Duration {
        self.wait_time
    }

    pub fn lease_timeout(&self) -> Duration {
        self.lease_timeout
    }
}

impl TryFrom<PollSettings> for PollConfig {
    type Error = ConfigError;

    fn try_from(s: PollSettings) -> Result<Self, Self::Error> {
        Self::new(
            Duration::from_secs(s.wait_time_secs),
            Duration::from_secs(s.lease_timeout_secs),
        )
    }
}

/// A decoded task and the message it came from.
pub struct DispatchedTask {
    pub task: String,
    pub kwargs: Kwargs,
    pub message: Box<dyn QueueMessage>,
}

/// Endless sequence of decoded tasks from one queue.
pub struct TaskStream {
    queue: Arc<dyn QueueService>,
    notifier: Arc<dyn Notifier>,
    poll: PollConfig,
    received: VecDeque<Box<dyn QueueMessage>>,
}

impl TaskStream {
    pub fn new(
        queue: Arc<dyn QueueService>,
        notifier: Arc<dyn Notifier>,
        poll: PollConfig,
    ) -> Self {
        Self {
            queue,
            notifier,
            poll,
            received: VecDeque::new(),
        }
    }

    pub fn poll_config(&self) -> PollConfig {
        self.poll
    }

    /// Wait for the next well-formed task.
    ///
    /// Only a failing receive call ends the wait with an error; the caller
    /// is expected to restart the consumer rather than retry in place.
    pub async fn next(&mut self) -> Result<DispatchedTask, ServiceError> {
        loop {
            let Some(message) = self.received.pop_front() else {
                let batch = self
                    .queue
                    .receive(1, self.poll.wait_time, self.poll.lease_timeout)
                    .await?;
                if batch.is_empty() {
                    info!(queue = self.queue.name(), "waiting for work");
                }
                self.received.extend(batch);
                continue;
            };

            match TaskEnvelope::decode(message.body()) {
                Ok(envelope) => {
                    let (task, kwargs) = envelope.into_parts();
                    return Ok(DispatchedTask {
                        task,
                        kwargs,
                        message,
                    });
                }
                Err(err) => self.reject(message.as_ref(), &err),
            }
        }
    }

    fn reject(&self, message: &dyn QueueMessage, err: &DecodeError) {
        let context = NotifyContext::for_message(message.body(), message.attributes());
        self.notifier.notify(err, &context);
        if err.is_missing_field() {
            error!(
                message_id = message.message_id(),
                body = message.body(),
                error = %err,
                "failed to get required field"
            );
        } else {
            error!(
                message_id = message.message_id(),
                body = message.body(),
                error = %err,
                "failed to decode message"
            );
        }
    }
}
