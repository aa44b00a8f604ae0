//! NotifyContext - string context attached to every reported error.

use std::collections::BTreeMap;

use serde::Serialize;

/// Diagnostic context passed to a [`Notifier`](crate::ports::Notifier).
///
/// Carries enough to diagnose a failure without re-deriving state: the raw
/// message body and its attributes, or the scaling rule that failed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NotifyContext(BTreeMap<String, String>);

impl NotifyContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Context for a queue message: its body, then each attribute.
    pub fn for_message(body: &str, attributes: &BTreeMap<String, String>) -> Self {
        let mut ctx = Self::new().with("body", body);
        ctx.extend(attributes);
        ctx
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn extend(&mut self, entries: &BTreeMap<String, String>) {
        for (key, value) in entries {
            self.0.insert(key.clone(), value.clone());
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<BTreeMap<String, String>> for NotifyContext {
    fn from(map: BTreeMap<String, String>) -> Self {
        Self(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_context_carries_body_and_attributes() {
        let attributes = BTreeMap::from([
            ("ApproximateReceiveCount".to_string(), "2".to_string()),
            ("SentTimestamp".to_string(), "1546300800000".to_string()),
        ]);
        let ctx = NotifyContext::for_message(r#"{"task":"T""#, &attributes);

        assert_eq!(ctx.get("body"), Some(r#"{"task":"T""#));
        assert_eq!(ctx.get("ApproximateReceiveCount"), Some("2"));
        assert_eq!(ctx.len(), 3);
    }
}
