//! ServiceStateProbe port - whether a service may be scaled right now.

use async_trait::async_trait;

use crate::domain::{ScalingRule, ServiceError, ServiceState};

/// Queried once per rule on every autoscaler pass.
#[async_trait]
pub trait ServiceStateProbe: Send + Sync {
    async fn state(&self, rule: &ScalingRule) -> Result<ServiceState, ServiceError>;
}

/// Never blocks scaling.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysActive;

#[async_trait]
impl ServiceStateProbe for AlwaysActive {
    async fn state(&self, _rule: &ScalingRule) -> Result<ServiceState, ServiceError> {
        Ok(ServiceState::Active)
    }
}
