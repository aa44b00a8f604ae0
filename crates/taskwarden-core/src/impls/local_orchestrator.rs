//! LocalOrchestrator - records desired counts instead of running containers.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tracing::info;

use crate::domain::ServiceError;
use crate::ports::{Orchestrator, ServiceDescription};

type ServiceKey = (String, String);

#[derive(Default)]
struct State {
    desired: HashMap<ServiceKey, u32>,
    updates: Vec<(String, String, u32)>,
    services: HashMap<ServiceKey, ServiceDescription>,
    tags: HashMap<String, BTreeMap<String, String>>,
}

/// In-memory orchestrator.
///
/// `set_desired_count` always succeeds and is recorded. Services must be
/// added with [`LocalOrchestrator::add_service`] before they can be described.
#[derive(Default)]
pub struct LocalOrchestrator {
    state: Mutex<State>,
}

impl LocalOrchestrator {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add_service(&self, cluster: &str, service: &str, description: ServiceDescription) {
        self.state()
            .services
            .insert((cluster.to_string(), service.to_string()), description);
    }

    pub fn set_tags(&self, resource_arn: &str, tags: BTreeMap<String, String>) {
        self.state().tags.insert(resource_arn.to_string(), tags);
    }

    /// Last desired count set for a service.
    pub fn desired_count(&self, cluster: &str, service: &str) -> Option<u32> {
        self.state()
            .desired
            .get(&(cluster.to_string(), service.to_string()))
            .copied()
    }

    /// Every `(cluster, service, count)` update, in call order.
    pub fn updates(&self) -> Vec<(String, String, u32)> {
        self.state().updates.clone()
    }
}

#[async_trait]
impl Orchestrator for LocalOrchestrator {
    async fn set_desired_count(
        &self,
        cluster: &str,
        service: &str,
        count: u32,
    ) -> Result<(), ServiceError> {
        info!(cluster, service, count, "local set_desired_count");
        let mut state = self.state();
        state
            .desired
            .insert((cluster.to_string(), service.to_string()), count);
        state
            .updates
            .push((cluster.to_string(), service.to_string(), count));
        if let Some(description) = state
            .services
            .get_mut(&(cluster.to_string(), service.to_string()))
        {
            description.desired_count = count;
        }
        Ok(())
    }

    async fn describe_service(
        &self,
        cluster: &str,
        service: &str,
    ) -> Result<ServiceDescription, ServiceError> {
        self.state()
            .services
            .get(&(cluster.to_string(), service.to_string()))
            .cloned()
            .ok_or_else(|| ServiceError::ServiceNotFound {
                cluster: cluster.to_string(),
                service: service.to_string(),
            })
    }

    async fn list_tags(
        &self,
        resource_arn: &str,
    ) -> Result<BTreeMap<String, String>, ServiceError> {
        Ok(self
            .state()
            .tags
            .get(resource_arn)
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_updates_in_order() {
        let orchestrator = LocalOrchestrator::new();
        orchestrator.set_desired_count("c", "a", 8).await.unwrap();
        orchestrator.set_desired_count("c", "a", 0).await.unwrap();

        assert_eq!(orchestrator.desired_count("c", "a"), Some(0));
        assert_eq!(orchestrator.updates().len(), 2);
        assert_eq!(orchestrator.desired_count("c", "b"), None);
    }

    #[tokio::test]
    async fn unknown_services_cannot_be_described() {
        let orchestrator = LocalOrchestrator::new();
        let err = orchestrator.describe_service("c", "a").await.unwrap_err();
        assert_eq!(err.as_label(), "service_not_found");
        assert!(orchestrator.list_tags("arn").await.unwrap().is_empty());
    }
}
