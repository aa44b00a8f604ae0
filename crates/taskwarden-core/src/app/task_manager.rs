//! TaskManager - submits tasks to a queue and opens task streams on it.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use super::dispatch::{PollConfig, TaskStream};
use crate::domain::{QueueAttributes, ServiceError, SubmitError, TaskEnvelope};
use crate::ports::{MessageAttribute, MessageAttributes, Notifier, QueueService, SendReceipt};
use crate::typed::Task;

/// Message attribute naming the producing service.
pub const SERVICE_NAME_ATTRIBUTE: &str = "service_name";

pub struct TaskManager {
    queue: Arc<dyn QueueService>,
    notifier: Arc<dyn Notifier>,
    service_name: String,
}

impl TaskManager {
    pub fn new(
        queue: Arc<dyn QueueService>,
        notifier: Arc<dyn Notifier>,
        service_name: impl Into<String>,
    ) -> Self {
        Self {
            queue,
            notifier,
            service_name: service_name.into(),
        }
    }

    pub fn queue(&self) -> &Arc<dyn QueueService> {
        &self.queue
    }

    /// Fresh depth counts for the queue.
    pub async fn attributes(&self) -> Result<QueueAttributes, ServiceError> {
        self.queue.attributes().await
    }

    pub async fn purge(&self) -> Result<(), ServiceError> {
        info!(queue = self.queue.name(), "purging queue");
        self.queue.purge().await
    }

    /// Send `task` with `kwargs`, which must serialize to a JSON object.
    pub async fn submit<K>(&self, task: &str, kwargs: &K) -> Result<SendReceipt, SubmitError>
    where
        K: Serialize + ?Sized + Sync,
    {
        let body = TaskEnvelope::from_serializable(task, kwargs)?.encode()?;
        self.send(task, body).await
    }

    /// Send a typed task under its registered name.
    pub async fn submit_task<T: Task>(&self, task: &T) -> Result<SendReceipt, SubmitError> {
        let body = TaskEnvelope::from_serializable(T::NAME, task)?.encode()?;
        self.send(T::NAME, body).await
    }

    async fn send(&self, task: &str, body: String) -> Result<SendReceipt, SubmitError> {
        let attributes = MessageAttributes::from([(
            SERVICE_NAME_ATTRIBUTE.to_string(),
            MessageAttribute::string(self.service_name.as_str()),
        )]);
        let receipt = self.queue.send(body, attributes).await?;
        debug!(queue = self.queue.name(), task, message_id = %receipt.message_id, "submitted");
        Ok(receipt)
    }

    /// A new stream of tasks from the start of whatever the queue holds now.
    pub fn tasks(&self, poll: PollConfig) -> TaskStream {
        TaskStream::new(self.queue.clone(), self.notifier.clone(), poll)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impls::LocalQueueRegistry;
    use crate::testing::RecordingNotifier;
    use chrono::NaiveDate;
    use serde::Deserialize;
    use serde_json::{Value, json};
    use std::time::Duration;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Forecast {
        store: u32,
        day: NaiveDate,
    }

    impl Task for Forecast {
        const NAME: &'static str = "forecast";
    }

    fn manager(registry: &LocalQueueRegistry) -> TaskManager {
        TaskManager::new(
            registry.open("jobs"),
            Arc::new(RecordingNotifier::default()),
            "optimizer",
        )
    }

    fn poll() -> PollConfig {
        PollConfig::new(Duration::from_secs(1), Duration::from_secs(30)).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn submit_round_trips_through_the_stream() {
        let registry = LocalQueueRegistry::new();
        let manager = manager(&registry);
        let kwargs = json!({"date": "2019-01-01", "ids": [1, 2], "nested": {"ok": true}});

        manager.submit("T", &kwargs).await.unwrap();
        let next = manager.tasks(poll()).next().await.unwrap();

        assert_eq!(next.task, "T");
        assert_eq!(Value::Object(next.kwargs), kwargs);
    }

    #[tokio::test]
    async fn submit_tags_the_producing_service() {
        let registry = LocalQueueRegistry::new();
        manager(&registry)
            .submit_task(&Forecast {
                store: 7,
                day: NaiveDate::from_ymd_opt(2019, 1, 1).unwrap(),
            })
            .await
            .unwrap();

        let queue = registry.open("jobs");
        let batch = queue
            .receive(1, Duration::ZERO, Duration::from_secs(30))
            .await
            .unwrap();
        let body: Value = serde_json::from_str(batch[0].body()).unwrap();
        assert_eq!(
            body,
            json!({"task": "forecast", "kwargs": {"day": "2019-01-01", "store": 7}})
        );
        assert_eq!(
            batch[0].message_attributes().get(SERVICE_NAME_ATTRIBUTE),
            Some(&MessageAttribute::string("optimizer"))
        );
    }

    #[tokio::test]
    async fn submit_rejects_non_object_kwargs() {
        let registry = LocalQueueRegistry::new();
        let err = manager(&registry).submit("T", &42).await.unwrap_err();
        assert!(matches!(err, SubmitError::Encode(_)));
        assert!(registry.open("jobs").is_empty());
    }

    #[tokio::test]
    async fn attributes_and_purge() {
        let registry = LocalQueueRegistry::new();
        let manager = manager(&registry);
        manager.submit("a", &json!({})).await.unwrap();
        manager.submit("b", &json!({})).await.unwrap();

        assert_eq!(manager.attributes().await.unwrap().pending, 2);
        manager.purge().await.unwrap();
        assert_eq!(manager.attributes().await.unwrap().total(), 0);
    }
}
