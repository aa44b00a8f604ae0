//! DeploymentStateProbe - derives ServiceState from orchestrator metadata.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::domain::{ScalingRule, ServiceError, ServiceState};
use crate::ports::{Orchestrator, RolloutState, ServiceDescription, ServiceStateProbe};

pub const DEFAULT_STATE_TAG: &str = "taskwarden:state";

/// Blocks scaling while a deployment is rolling out, failing or draining.
///
/// Order of checks:
/// 1. service `DRAINING` or `INACTIVE` → `Stopping`
/// 2. any failed rollout → `Failing`
/// 3. several deployments, or one still rolling out → `Starting`
/// 4. the state tag on the service, when present and valid
/// 5. otherwise `Active`
pub struct DeploymentStateProbe {
    orchestrator: Arc<dyn Orchestrator>,
    state_tag: String,
}

impl DeploymentStateProbe {
    pub fn new(orchestrator: Arc<dyn Orchestrator>) -> Self {
        Self {
            orchestrator,
            state_tag: DEFAULT_STATE_TAG.to_string(),
        }
    }

    pub fn with_state_tag(mut self, tag: impl Into<String>) -> Self {
        self.state_tag = tag.into();
        self
    }
}

fn state_from_description(description: &ServiceDescription) -> Option<ServiceState> {
    if matches!(description.status.as_str(), "DRAINING" | "INACTIVE") {
        return Some(ServiceState::Stopping);
    }
    let deployments = &description.deployments;
    if deployments
        .iter()
        .any(|d| d.rollout_state == RolloutState::Failed)
    {
        return Some(ServiceState::Failing);
    }
    if deployments.len() > 1
        || deployments
            .iter()
            .any(|d| d.rollout_state == RolloutState::InProgress)
    {
        return Some(ServiceState::Starting);
    }
    None
}

#[async_trait]
impl ServiceStateProbe for DeploymentStateProbe {
    async fn state(&self, rule: &ScalingRule) -> Result<ServiceState, ServiceError> {
        let description = self
            .orchestrator
            .describe_service(&rule.cluster_name, &rule.service_name)
            .await?;
        if let Some(state) = state_from_description(&description) {
            return Ok(state);
        }

        let tags = self.orchestrator.list_tags(&description.arn).await?;
        let Some(raw) = tags.get(&self.state_tag) else {
            return Ok(ServiceState::Active);
        };
        match raw.parse::<ServiceState>() {
            Ok(state) => Ok(state),
            Err(err) => {
                warn!(
                    service = %rule.service_name,
                    tag = %self.state_tag,
                    %err,
                    "ignoring state tag"
                );
                Ok(ServiceState::Active)
            }
        }
    }
}
