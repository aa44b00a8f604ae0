//! Orchestrator port - the container service that runs worker instances.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::ServiceError;

/// Rollout progress of one deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RolloutState {
    InProgress,
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deployment {
    pub id: String,
    /// `PRIMARY` for the newest deployment, `ACTIVE` for ones being replaced.
    pub status: String,
    pub rollout_state: RolloutState,
}

/// Metadata returned by [`Orchestrator::describe_service`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDescription {
    pub arn: String,
    /// `ACTIVE`, `DRAINING` or `INACTIVE`.
    pub status: String,
    pub desired_count: u32,
    pub running_count: u32,
    #[serde(default)]
    pub deployments: Vec<Deployment>,
}

#[async_trait]
pub trait Orchestrator: Send + Sync {
    async fn set_desired_count(
        &self,
        cluster: &str,
        service: &str,
        count: u32,
    ) -> Result<(), ServiceError>;

    async fn describe_service(
        &self,
        cluster: &str,
        service: &str,
    ) -> Result<ServiceDescription, ServiceError>;

    async fn list_tags(&self, resource_arn: &str) -> Result<BTreeMap<String, String>, ServiceError>;
}
