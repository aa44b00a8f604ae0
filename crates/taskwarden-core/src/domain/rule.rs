//! ScalingRule and ServiceState - the autoscaler's inputs.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::context::NotifyContext;
use super::errors::ConfigError;

pub const QUEUE_NAME: &str = "queue_name";
pub const SERVICE_NAME: &str = "service_name";
pub const CLUSTER_NAME: &str = "cluster_name";
pub const ACTIVE_SIZE: &str = "active_size";

const RULE_KEYS: [&str; 4] = [QUEUE_NAME, SERVICE_NAME, CLUSTER_NAME, ACTIVE_SIZE];

/// One queue to watch and the service that drains it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScalingRule {
    pub queue_name: String,
    pub service_name: String,
    pub cluster_name: String,
    pub active_size: u32,
}

impl ScalingRule {
    pub fn new(
        queue_name: impl Into<String>,
        service_name: impl Into<String>,
        cluster_name: impl Into<String>,
        active_size: u32,
    ) -> Result<Self, ConfigError> {
        if active_size == 0 {
            return Err(ConfigError::NotPositive { field: ACTIVE_SIZE });
        }
        Ok(Self {
            queue_name: queue_name.into(),
            service_name: service_name.into(),
            cluster_name: cluster_name.into(),
            active_size,
        })
    }

    /// Parse one rule declaration.
    ///
    /// The declaration must be an object with exactly the four rule keys; the
    /// first missing key is named in the error.
    pub fn from_value(value: &Value) -> Result<Self, ConfigError> {
        let Value::Object(fields) = value else {
            return Err(ConfigError::RuleNotAMapping(value.to_string()));
        };

        for key in RULE_KEYS {
            if !fields.contains_key(key) {
                return Err(ConfigError::MissingRuleKey(key));
            }
        }
        if let Some(extra) = fields.keys().find(|k| !RULE_KEYS.contains(&k.as_str())) {
            return Err(ConfigError::UnexpectedRuleKey(extra.clone()));
        }

        let text = |key: &'static str| -> Result<String, ConfigError> {
            match fields.get(key) {
                Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.clone()),
                _ => Err(ConfigError::InvalidRuleValue {
                    key,
                    reason: "expected a non-empty string".to_string(),
                }),
            }
        };

        let active_size = fields
            .get(ACTIVE_SIZE)
            .and_then(Value::as_u64)
            .and_then(|n| u32::try_from(n).ok())
            .filter(|n| *n > 0)
            .ok_or_else(|| ConfigError::InvalidRuleValue {
                key: ACTIVE_SIZE,
                reason: "expected a positive integer".to_string(),
            })?;

        Ok(Self {
            queue_name: text(QUEUE_NAME)?,
            service_name: text(SERVICE_NAME)?,
            cluster_name: text(CLUSTER_NAME)?,
            active_size,
        })
    }

    /// Parse a list of rule declarations, failing on the first bad one.
    pub fn list_from_value(value: &Value) -> Result<Vec<Self>, ConfigError> {
        let Value::Array(items) = value else {
            return Err(ConfigError::RulesNotAList(value.to_string()));
        };
        items.iter().map(Self::from_value).collect()
    }

    /// The full rule, as notification context.
    pub fn context(&self) -> NotifyContext {
        NotifyContext::new()
            .with(QUEUE_NAME, self.queue_name.as_str())
            .with(SERVICE_NAME, self.service_name.as_str())
            .with(CLUSTER_NAME, self.cluster_name.as_str())
            .with(ACTIVE_SIZE, self.active_size.to_string())
    }
}

/// Deployment state of a scaled service.
///
/// Only [`ServiceState::Active`] allows the autoscaler to touch the
/// desired count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServiceState {
    Starting,
    Active,
    Stopping,
    Failing,
}

impl ServiceState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceState::Starting => "STARTING",
            ServiceState::Active => "ACTIVE",
            ServiceState::Stopping => "STOPPING",
            ServiceState::Failing => "FAILING",
        }
    }
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown service state {0:?}")]
pub struct UnknownServiceState(pub String);

impl FromStr for ServiceState {
    type Err = UnknownServiceState;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "STARTING" => Ok(ServiceState::Starting),
            "ACTIVE" => Ok(ServiceState::Active),
            "STOPPING" => Ok(ServiceState::Stopping),
            "FAILING" => Ok(ServiceState::Failing),
            _ => Err(UnknownServiceState(s.to_string())),
        }
    }
}
