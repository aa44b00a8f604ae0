//! Supervisor - runs one task handler under lease renewal and a hard deadline.
//!
//! # Flow
//! 1. Arm the watchdog for `renewal_interval`, then extend the lease to `lease_timeout`.
//! 2. Poll the handler; each time the watchdog fires:
//!    - past `hard_deadline` → abandon the handler (deadline exceeded)
//!    - handler alive → extend the lease again and re-arm
//!    - otherwise → the handler is stuck
//! 3. Acknowledge on success; otherwise report and leave the message for redelivery.
//!
//! The watchdog shares the handler's task, so it only runs while the handler
//! is suspended at an await point. A blocking call inside the handler delays
//! both renewal and deadline checks until it returns; the deadline is checked
//! once more when the handler returns.

use std::time::Duration;

use serde::Deserialize;
use tokio::time::{Instant, sleep};
use tracing::{debug, error, info, warn};

use crate::config::SupervisorSettings;
use crate::domain::{ConfigError, NotifyContext, ServiceError, SupervisorError};
use crate::ports::{Notifier, QueueMessage};
use crate::typed::TaskHandler;

/// Validated supervisor timings.
///
/// `renewal_interval + 1s < lease_timeout` so a renewal always lands before
/// the lease it renews could expire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "SupervisorSettings")]
pub struct SupervisorConfig {
    lease_timeout: Duration,
    renewal_interval: Duration,
    hard_deadline: Duration,
}

impl SupervisorConfig {
    pub fn new(
        lease_timeout: Duration,
        renewal_interval: Duration,
        hard_deadline: Duration,
    ) -> Result<Self, ConfigError> {
        if renewal_interval.is_zero() {
            return Err(ConfigError::NotPositive {
                field: "renewal interval",
            });
        }
        if lease_timeout.is_zero() {
            return Err(ConfigError::NotPositive {
                field: "lease timeout",
            });
        }
        if hard_deadline.is_zero() {
            return Err(ConfigError::NotPositive {
                field: "hard deadline",
            });
        }
        if renewal_interval + Duration::from_secs(1) >= lease_timeout {
            return Err(ConfigError::RenewalTooLong {
                renewal: renewal_interval,
                lease: lease_timeout,
            });
        }
        Ok(Self {
            lease_timeout,
            renewal_interval,
            hard_deadline,
        })
    }

    pub fn lease_timeout(&self) -> Duration {
        self.lease_timeout
    }

    pub fn renewal_interval(&self) -> Duration {
        self.renewal_interval
    }

    pub fn hard_deadline(&self) -> Duration {
        self.hard_deadline
    }
}

impl TryFrom<SupervisorSettings> for SupervisorConfig {
    type Error = ConfigError;

    fn try_from(s: SupervisorSettings) -> Result<Self, Self::Error> {
        Self::new(
            Duration::from_secs(s.lease_timeout_secs),
            Duration::from_secs(s.renewal_interval_secs),
            Duration::from_secs(s.hard_deadline_secs),
        )
    }
}

/// How a supervised execution ended, when the process may keep consuming.
#[derive(Debug)]
pub enum Completion {
    /// The handler succeeded and the message was deleted.
    Acknowledged,
    /// The handler succeeded but the delete failed; the message will be redelivered.
    AcknowledgeFailed(ServiceError),
    /// The handler failed or ran out of time; the message will be redelivered.
    Failed(SupervisorError),
}

impl Completion {
    pub fn is_acknowledged(&self) -> bool {
        matches!(self, Completion::Acknowledged)
    }
}

/// Supervises one message for one execution.
pub struct Supervisor<'a> {
    message: &'a dyn QueueMessage,
    config: SupervisorConfig,
    notifier: &'a dyn Notifier,
    started: Instant,
}

impl<'a> Supervisor<'a> {
    pub fn new(
        message: &'a dyn QueueMessage,
        config: SupervisorConfig,
        notifier: &'a dyn Notifier,
    ) -> Self {
        Self {
            message,
            config,
            notifier,
            started: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Run `handler` to completion under supervision.
    ///
    /// Returns `Err` only for process-fatal errors (stuck handler, fatal task
    /// error). Those have already been reported; the caller must stop consuming.
    pub async fn run(self, handler: &dyn TaskHandler) -> Result<Completion, SupervisorError> {
        let outcome = self.supervise(handler).await;
        self.release(outcome).await
    }

    async fn supervise(&self, handler: &dyn TaskHandler) -> Result<(), SupervisorError> {
        let watchdog = sleep(self.config.renewal_interval);
        tokio::pin!(watchdog);
        self.extend_lease().await;

        let mut work = handler.execute();
        loop {
            tokio::select! {
                biased;

                result = &mut work => {
                    self.check_deadline()?;
                    return result.map_err(SupervisorError::from);
                }
                () = &mut watchdog => {
                    self.check_deadline()?;
                    if !handler.is_alive() {
                        return Err(SupervisorError::Stuck { elapsed: self.elapsed() });
                    }
                    debug!(
                        message_id = self.message.message_id(),
                        elapsed_ms = self.elapsed().as_millis() as u64,
                        "renewing lease"
                    );
                    self.extend_lease().await;
                    watchdog.as_mut().reset(Instant::now() + self.config.renewal_interval);
                }
            }
        }
    }

    fn check_deadline(&self) -> Result<(), SupervisorError> {
        let elapsed = self.elapsed();
        if elapsed > self.config.hard_deadline {
            return Err(SupervisorError::DeadlineExceeded {
                deadline: self.config.hard_deadline,
                elapsed,
            });
        }
        Ok(())
    }

    /// Extension failures are reported and otherwise ignored; the next tick retries.
    async fn extend_lease(&self) {
        if let Err(err) = self.message.extend_lease(self.config.lease_timeout).await {
            self.report(&err);
            warn!(message_id = self.message.message_id(), error = %err, "failed to extend lease");
        }
    }

    async fn release(
        &self,
        outcome: Result<(), SupervisorError>,
    ) -> Result<Completion, SupervisorError> {
        let message_id = self.message.message_id();
        match outcome {
            Ok(()) => match self.message.acknowledge().await {
                Ok(()) => {
                    info!(
                        message_id,
                        elapsed_ms = self.elapsed().as_millis() as u64,
                        "message done"
                    );
                    Ok(Completion::Acknowledged)
                }
                Err(err) => {
                    self.report(&err);
                    error!(message_id, error = %err, "failed to delete message");
                    Ok(Completion::AcknowledgeFailed(err))
                }
            },
            Err(err) => {
                self.report(&err);
                error!(
                    message_id,
                    error = %err,
                    label = err.as_label(),
                    fatal = err.is_fatal(),
                    "failed for message"
                );
                if err.is_fatal() {
                    Err(err)
                } else {
                    Ok(Completion::Failed(err))
                }
            }
        }
    }

    fn report(&self, err: &(dyn std::error::Error + 'static)) {
        let context = NotifyContext::for_message(self.message.body(), self.message.attributes());
        self.notifier.notify(err, &context);
    }
}
