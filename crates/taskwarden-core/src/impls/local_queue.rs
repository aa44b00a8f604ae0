//! LocalQueue - in-memory queues for local runs and integration tests.
//!
//! Messages come out in FIFO order. There is no lease, retry or redelivery:
//! lease extension and acknowledgment are logged no-ops, and a received
//! message is gone from the queue whether or not it is acknowledged.
//!
//! Queues live in an explicit [`LocalQueueRegistry`]; clones of the registry
//! share the same queues, separate registries never do.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::debug;
use ulid::Ulid;

use crate::domain::{QueueAttributes, ServiceError};
use crate::ports::{
    MessageAttributes, QueueConnector, QueueMessage, QueueService, SendReceipt,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Named local queues, shared by handle.
#[derive(Clone, Default)]
pub struct LocalQueueRegistry {
    queues: Arc<Mutex<HashMap<String, Arc<LocalQueue>>>>,
}

impl LocalQueueRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the queue called `name`, creating it on first use.
    pub fn open(&self, name: &str) -> Arc<LocalQueue> {
        lock(&self.queues)
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(LocalQueue::new(name)))
            .clone()
    }

    /// Get the queue called `name` if it was opened before.
    pub fn get(&self, name: &str) -> Option<Arc<LocalQueue>> {
        lock(&self.queues).get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = lock(&self.queues).keys().cloned().collect();
        names.sort();
        names
    }
}

#[async_trait]
impl QueueConnector for LocalQueueRegistry {
    async fn queue(&self, name: &str) -> Result<Arc<dyn QueueService>, ServiceError> {
        match self.get(name) {
            Some(queue) => Ok(queue),
            None => Err(ServiceError::QueueNotFound(name.to_string())),
        }
    }
}

struct LocalEntry {
    id: String,
    body: String,
    message_attributes: MessageAttributes,
    sent_at_millis: i64,
}

pub struct LocalQueue {
    name: String,
    entries: Mutex<VecDeque<LocalEntry>>,
    /// Signalled on every send.
    notify: Notify,
}

impl LocalQueue {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            entries: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
        }
    }

    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.entries).is_empty()
    }

    fn take(&self, max: usize) -> Vec<Box<dyn QueueMessage>> {
        let mut entries = lock(&self.entries);
        let n = max.min(entries.len());
        entries
            .drain(..n)
            .map(|entry| Box::new(LocalMessage::from_entry(entry)) as Box<dyn QueueMessage>)
            .collect()
    }
}

#[async_trait]
impl QueueService for LocalQueue {
    fn name(&self) -> &str {
        &self.name
    }

    async fn receive(
        &self,
        max: usize,
        wait_time: Duration,
        _lease_timeout: Duration,
    ) -> Result<Vec<Box<dyn QueueMessage>>, ServiceError> {
        if max == 0 {
            return Ok(Vec::new());
        }
        let deadline = Instant::now() + wait_time;
        loop {
            // Register interest before looking so a concurrent send is not missed.
            let notified = self.notify.notified();

            let batch = self.take(max);
            if !batch.is_empty() {
                return Ok(batch);
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Ok(Vec::new());
            }
        }
    }

    async fn send(
        &self,
        body: String,
        attributes: MessageAttributes,
    ) -> Result<SendReceipt, ServiceError> {
        let id = Ulid::new().to_string();
        debug!(queue = %self.name, message_id = %id, "local send");
        lock(&self.entries).push_back(LocalEntry {
            id: id.clone(),
            body,
            message_attributes: attributes,
            sent_at_millis: Utc::now().timestamp_millis(),
        });
        self.notify.notify_one();
        Ok(SendReceipt { message_id: id })
    }

    async fn purge(&self) -> Result<(), ServiceError> {
        lock(&self.entries).clear();
        Ok(())
    }

    async fn attributes(&self) -> Result<QueueAttributes, ServiceError> {
        let mut attributes = QueueAttributes::new(self.len() as u64, 0, 0);
        attributes
            .other
            .insert("QueueArn".to_string(), format!("local:{}", self.name));
        Ok(attributes)
    }
}

/// A message taken from a [`LocalQueue`].
pub struct LocalMessage {
    id: String,
    body: String,
    attributes: BTreeMap<String, String>,
    message_attributes: MessageAttributes,
}

impl LocalMessage {
    fn from_entry(entry: LocalEntry) -> Self {
        let attributes = BTreeMap::from([
            ("ApproximateReceiveCount".to_string(), "1".to_string()),
            ("SentTimestamp".to_string(), entry.sent_at_millis.to_string()),
        ]);
        Self {
            id: entry.id,
            body: entry.body,
            attributes,
            message_attributes: entry.message_attributes,
        }
    }
}

#[async_trait]
impl QueueMessage for LocalMessage {
    fn message_id(&self) -> &str {
        &self.id
    }

    fn body(&self) -> &str {
        &self.body
    }

    fn attributes(&self) -> &BTreeMap<String, String> {
        &self.attributes
    }

    fn message_attributes(&self) -> &MessageAttributes {
        &self.message_attributes
    }

    async fn extend_lease(&self, timeout: Duration) -> Result<(), ServiceError> {
        debug!(message_id = %self.id, ?timeout, "local extend_lease is a no-op");
        Ok(())
    }

    async fn acknowledge(&self) -> Result<(), ServiceError> {
        debug!(message_id = %self.id, "local acknowledge is a no-op");
        Ok(())
    }
}
