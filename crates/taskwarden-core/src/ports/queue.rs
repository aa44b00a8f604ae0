//! Queue ports - the message queue as seen by producers, workers and the autoscaler.
//!
//! The queue service owns durability and at-least-once delivery. A received
//! message stays hidden for its lease; if it is not acknowledged before the
//! lease runs out it becomes visible again and is redelivered.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::{QueueAttributes, ServiceError};

/// One received, not yet acknowledged message.
#[async_trait]
pub trait QueueMessage: Send + Sync {
    /// Service-assigned id, used in logs.
    fn message_id(&self) -> &str;

    fn body(&self) -> &str;

    /// Delivery metadata (receive count, sent timestamp, ...).
    fn attributes(&self) -> &BTreeMap<String, String>;

    /// Attributes the producer attached on send.
    fn message_attributes(&self) -> &MessageAttributes;

    /// Reset the lease so the message stays hidden for `timeout` from now.
    async fn extend_lease(&self, timeout: Duration) -> Result<(), ServiceError>;

    /// Delete the message from the queue.
    async fn acknowledge(&self) -> Result<(), ServiceError>;
}

/// A typed message attribute attached by the producer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageAttribute {
    pub data_type: String,
    pub string_value: String,
}

impl MessageAttribute {
    pub fn string(value: impl Into<String>) -> Self {
        Self {
            data_type: "String".to_string(),
            string_value: value.into(),
        }
    }
}

pub type MessageAttributes = BTreeMap<String, MessageAttribute>;

/// Returned by [`QueueService::send`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendReceipt {
    pub message_id: String,
}

/// One named queue.
#[async_trait]
pub trait QueueService: Send + Sync {
    fn name(&self) -> &str;

    /// Receive up to `max` messages, waiting up to `wait_time` for the first.
    ///
    /// Every returned message is leased for `lease_timeout`. An empty vector
    /// means nothing arrived in time.
    async fn receive(
        &self,
        max: usize,
        wait_time: Duration,
        lease_timeout: Duration,
    ) -> Result<Vec<Box<dyn QueueMessage>>, ServiceError>;

    async fn send(
        &self,
        body: String,
        attributes: MessageAttributes,
    ) -> Result<SendReceipt, ServiceError>;

    /// Delete every message in the queue.
    async fn purge(&self) -> Result<(), ServiceError>;

    /// Read current approximate depth.
    async fn attributes(&self) -> Result<QueueAttributes, ServiceError>;
}

/// Resolves queue names to queues.
#[async_trait]
pub trait QueueConnector: Send + Sync {
    async fn queue(&self, name: &str) -> Result<Arc<dyn QueueService>, ServiceError>;
}
