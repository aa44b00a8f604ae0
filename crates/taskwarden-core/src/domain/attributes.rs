//! QueueAttributes - queue depth as reported by the queue service.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::errors::ServiceError;

pub const PENDING_ATTRIBUTE: &str = "ApproximateNumberOfMessages";
pub const IN_FLIGHT_ATTRIBUTE: &str = "ApproximateNumberOfMessagesNotVisible";
pub const DELAYED_ATTRIBUTE: &str = "ApproximateNumberOfMessagesDelayed";

/// Approximate message counts of one queue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueAttributes {
    /// Visible and waiting to be received.
    pub pending: u64,
    /// Received but not yet acknowledged.
    pub in_flight: u64,
    /// Sent with a delay that has not elapsed.
    pub delayed: u64,
    /// Every other attribute the service reported, untouched.
    #[serde(default)]
    pub other: BTreeMap<String, String>,
}

impl QueueAttributes {
    pub fn new(pending: u64, in_flight: u64, delayed: u64) -> Self {
        Self {
            pending,
            in_flight,
            delayed,
            other: BTreeMap::new(),
        }
    }

    /// Parse the raw string map most queue services return.
    ///
    /// Missing counts read as zero; a count that is not a number is an error.
    pub fn from_raw(raw: &BTreeMap<String, String>) -> Result<Self, ServiceError> {
        let count = |name: &str| -> Result<u64, ServiceError> {
            match raw.get(name) {
                None => Ok(0),
                Some(value) => value
                    .trim()
                    .parse()
                    .map_err(|_| ServiceError::InvalidAttribute {
                        name: name.to_string(),
                        value: value.clone(),
                    }),
            }
        };

        let other = raw
            .iter()
            .filter(|(k, _)| {
                !matches!(
                    k.as_str(),
                    PENDING_ATTRIBUTE | IN_FLIGHT_ATTRIBUTE | DELAYED_ATTRIBUTE
                )
            })
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        Ok(Self {
            pending: count(PENDING_ATTRIBUTE)?,
            in_flight: count(IN_FLIGHT_ATTRIBUTE)?,
            delayed: count(DELAYED_ATTRIBUTE)?,
            other,
        })
    }

    pub fn total(&self) -> u64 {
        self.pending
            .saturating_add(self.in_flight)
            .saturating_add(self.delayed)
    }

    /// Depth per named category, in reporting order.
    pub fn categories(&self) -> [(&'static str, u64); 3] {
        [
            ("pending_jobs", self.pending),
            ("running_jobs", self.in_flight),
            ("scheduled_jobs", self.delayed),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn parses_counts_and_keeps_the_rest() {
        let attrs = QueueAttributes::from_raw(&raw(&[
            (PENDING_ATTRIBUTE, "2"),
            (IN_FLIGHT_ATTRIBUTE, "1"),
            (DELAYED_ATTRIBUTE, "0"),
            ("QueueArn", "arn:aws:sqs:eu-west-1:1:jobs"),
        ]))
        .unwrap();

        assert_eq!(attrs.total(), 3);
        assert_eq!(attrs.other.len(), 1);
        assert_eq!(attrs.categories()[1], ("running_jobs", 1));
    }

    #[test]
    fn missing_counts_are_zero() {
        let attrs = QueueAttributes::from_raw(&raw(&[(PENDING_ATTRIBUTE, "4")])).unwrap();
        assert_eq!(attrs, QueueAttributes::new(4, 0, 0));
    }

    #[test]
    fn rejects_non_numeric_counts() {
        let err = QueueAttributes::from_raw(&raw(&[(DELAYED_ATTRIBUTE, "many")])).unwrap_err();
        assert!(matches!(
            err,
            ServiceError::InvalidAttribute { name, .. } if name == DELAYED_ATTRIBUTE
        ));
    }
}
