//! Test doubles shared by unit tests.

use std::collections::BTreeMap;
use std::error::Error;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::{NotifyContext, ServiceError};
use crate::ports::{MessageAttributes, Notifier, QueueMessage};

/// Remembers every report.
#[derive(Default)]
pub struct RecordingNotifier {
    reports: Mutex<Vec<(String, NotifyContext)>>,
}

impl RecordingNotifier {
    pub fn reports(&self) -> Vec<(String, NotifyContext)> {
        self.reports.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.reports.lock().unwrap().len()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, error: &(dyn Error + 'static), context: &NotifyContext) {
        self.reports
            .lock()
            .unwrap()
            .push((error.to_string(), context.clone()));
    }
}

/// A message that counts lease extensions and acknowledgments.
pub struct FakeMessage {
    body: String,
    attributes: BTreeMap<String, String>,
    message_attributes: MessageAttributes,
    pub extends: AtomicUsize,
    pub acks: AtomicUsize,
    pub fail_extend: AtomicBool,
    pub fail_ack: AtomicBool,
}

impl FakeMessage {
    pub fn new(body: &str) -> Self {
        Self {
            body: body.to_string(),
            attributes: BTreeMap::from([("ApproximateReceiveCount".to_string(), "1".to_string())]),
            message_attributes: MessageAttributes::new(),
            extends: AtomicUsize::new(0),
            acks: AtomicUsize::new(0),
            fail_extend: AtomicBool::new(false),
            fail_ack: AtomicBool::new(false),
        }
    }

    pub fn extends(&self) -> usize {
        self.extends.load(Ordering::SeqCst)
    }

    pub fn acks(&self) -> usize {
        self.acks.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QueueMessage for FakeMessage {
    fn message_id(&self) -> &str {
        "fake-1"
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

    async fn extend_lease(&self, _timeout: Duration) -> Result<(), ServiceError> {
        self.extends.fetch_add(1, Ordering::SeqCst);
        if self.fail_extend.load(Ordering::SeqCst) {
            return Err(ServiceError::request("ChangeMessageVisibility", "throttled"));
        }
        Ok(())
    }

    async fn acknowledge(&self) -> Result<(), ServiceError> {
        if self.fail_ack.load(Ordering::SeqCst) {
            return Err(ServiceError::request("DeleteMessage", "receipt handle expired"));
        }
        self.acks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
