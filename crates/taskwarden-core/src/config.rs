//! Settings - the on-disk shape of a worker or autoscaler deployment.
//!
//! Settings are plain serde structs with defaults for every field. They are
//! turned into validated runtime configs ([`SupervisorConfig`], [`PollConfig`],
//! [`ScalingRule`]s) before anything starts, so a bad file fails at startup.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::app::{PollConfig, SupervisorConfig};
use crate::domain::{ConfigError, ScalingRule};
use crate::observability::LoggerConfig;

/// Raw supervisor timings, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorSettings {
    pub lease_timeout_secs: u64,
    pub renewal_interval_secs: u64,
    pub hard_deadline_secs: u64,
}

impl Default for SupervisorSettings {
    fn default() -> Self {
        Self {
            lease_timeout_secs: 60,
            renewal_interval_secs: 20,
            hard_deadline_secs: 60 * 60,
        }
    }
}

/// Raw receive parameters, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollSettings {
    pub wait_time_secs: u64,
    pub lease_timeout_secs: u64,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            wait_time_secs: 20,
            lease_timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScalingSettings {
    pub interval_secs: u64,
    /// Rule declarations, validated by [`Settings::scaling_rules`].
    pub rules: Value,
}

impl Default for ScalingSettings {
    fn default() -> Self {
        Self {
            interval_secs: 10,
            rules: Value::Array(Vec::new()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub queue: String,
    /// Attached to every submitted message.
    pub service_name: String,
    pub poll: PollSettings,
    pub supervisor: SupervisorSettings,
    pub scaling: ScalingSettings,
    pub logging: LoggerConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            queue: "tasks".to_string(),
            service_name: "taskwarden".to_string(),
            poll: PollSettings::default(),
            supervisor: SupervisorSettings::default(),
            scaling: ScalingSettings::default(),
            logging: LoggerConfig::default(),
        }
    }
}

impl Settings {
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    pub fn poll_config(&self) -> Result<PollConfig, ConfigError> {
        PollConfig::try_from(self.poll)
    }

    pub fn supervisor_config(&self) -> Result<SupervisorConfig, ConfigError> {
        SupervisorConfig::try_from(self.supervisor)
    }

    pub fn scaling_rules(&self) -> Result<Vec<ScalingRule>, ConfigError> {
        ScalingRule::list_from_value(&self.scaling.rules)
    }

    pub fn scaling_interval(&self) -> Result<Duration, ConfigError> {
        if self.scaling.interval_secs == 0 {
            return Err(ConfigError::NotPositive {
                field: "scaling interval",
            });
        }
        Ok(Duration::from_secs(self.scaling.interval_secs))
    }

    /// Check every section at once.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.poll_config()?;
        self.supervisor_config()?;
        self.scaling_interval()?;
        self.scaling_rules()?;
        Ok(())
    }
}
