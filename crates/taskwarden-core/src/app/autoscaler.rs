//! AutoScaler - sizes services from the depth of the queues they drain.
//!
//! # Flow (one pass, per rule)
//! 1. Ask the state probe; anything but `ACTIVE` skips the rule.
//! 2. Read the queue's pending, in-flight and delayed counts.
//! 3. Set the service's desired count to `active_size` if the total is
//!    positive, else to zero.
//!
//! A failing rule is logged and reported and never stops the pass.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::watch;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, error, info};

use crate::domain::{ConfigError, QueueAttributes, ScalingRule, ServiceError, ServiceState};
use crate::ports::{AlwaysActive, Notifier, Orchestrator, QueueConnector, ServiceStateProbe};

/// What one rule did during a pass.
#[derive(Debug)]
pub enum RuleOutcome {
    Scaled { desired: u32, depth: u64 },
    Skipped(ServiceState),
    Failed(ServiceError),
}

impl RuleOutcome {
    pub fn desired(&self) -> Option<u32> {
        match self {
            RuleOutcome::Scaled { desired, .. } => Some(*desired),
            _ => None,
        }
    }
}

pub struct AutoScaler {
    rules: Vec<ScalingRule>,
    queues: Arc<dyn QueueConnector>,
    orchestrator: Arc<dyn Orchestrator>,
    state_probe: Arc<dyn ServiceStateProbe>,
    notifier: Arc<dyn Notifier>,
}

impl AutoScaler {
    pub fn new(
        rules: Vec<ScalingRule>,
        queues: Arc<dyn QueueConnector>,
        orchestrator: Arc<dyn Orchestrator>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            rules,
            queues,
            orchestrator,
            state_probe: Arc::new(AlwaysActive),
            notifier,
        }
    }

    /// Build from a list of rule declarations, rejecting the first bad one.
    pub fn from_declaration(
        rules: &Value,
        queues: Arc<dyn QueueConnector>,
        orchestrator: Arc<dyn Orchestrator>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, ConfigError> {
        let rules = ScalingRule::list_from_value(rules)?;
        Ok(Self::new(rules, queues, orchestrator, notifier))
    }

    pub fn with_state_probe(mut self, probe: Arc<dyn ServiceStateProbe>) -> Self {
        self.state_probe = probe;
        self
    }

    pub fn rules(&self) -> &[ScalingRule] {
        &self.rules
    }

    /// One pass over every rule, in declaration order.
    pub async fn run_once(&self) -> Vec<RuleOutcome> {
        info!(rules = self.rules.len(), "checking queues and scaling services");
        let mut outcomes = Vec::with_capacity(self.rules.len());
        for rule in &self.rules {
            debug!(?rule, "running rule");
            let outcome = match self.apply(rule).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!(
                        error = %e,
                        label = e.as_label(),
                        queue = %rule.queue_name,
                        cluster = %rule.cluster_name,
                        service = %rule.service_name,
                        "failed to update resources for rule"
                    );
                    self.notifier.notify(&e, &rule.context());
                    RuleOutcome::Failed(e)
                }
            };
            outcomes.push(outcome);
        }
        outcomes
    }

    async fn apply(&self, rule: &ScalingRule) -> Result<RuleOutcome, ServiceError> {
        let state = self.state_probe.state(rule).await?;
        if state != ServiceState::Active {
            info!(
                cluster = %rule.cluster_name,
                service = %rule.service_name,
                %state,
                "service not active; leaving desired count alone"
            );
            return Ok(RuleOutcome::Skipped(state));
        }

        let queue = self.queues.queue(&rule.queue_name).await?;
        let attributes = queue.attributes().await?;
        let depth = attributes.total();
        let desired = if depth > 0 { rule.active_size } else { 0 };

        self.orchestrator
            .set_desired_count(&rule.cluster_name, &rule.service_name, desired)
            .await?;
        info!(
            cluster = %rule.cluster_name,
            service = %rule.service_name,
            desired,
            "setting desired count"
        );
        log_queue_depth(rule, &attributes);

        Ok(RuleOutcome::Scaled { desired, depth })
    }

    /// Run a pass every `period` until `shutdown` turns true or its sender is dropped.
    ///
    /// Returns the number of passes made.
    pub async fn run_every(&self, period: Duration, mut shutdown: watch::Receiver<bool>) -> usize {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut passes = 0;

        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
                _ = ticker.tick() => {}
            }
            self.run_once().await;
            passes += 1;
        }

        info!(passes, "autoscaler stopped");
        passes
    }
}

fn log_queue_depth(rule: &ScalingRule, attributes: &QueueAttributes) {
    for (category, count) in attributes.categories() {
        info!(queue = %rule.queue_name, category, count, "queue_health_monitor");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impls::{LocalOrchestrator, LocalQueueRegistry};
    use crate::ports::{MessageAttributes, QueueService, ServiceDescription};
    use crate::testing::RecordingNotifier;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn rule(queue: &str, service: &str, active_size: u32) -> ScalingRule {
        ScalingRule::new(queue, service, "c", active_size).unwrap()
    }

    async fn fill(registry: &LocalQueueRegistry, queue: &str, n: usize) {
        let queue = registry.open(queue);
        for i in 0..n {
            queue.send(i.to_string(), MessageAttributes::new()).await.unwrap();
        }
    }

    struct Fixture {
        registry: LocalQueueRegistry,
        orchestrator: Arc<LocalOrchestrator>,
        notifier: Arc<RecordingNotifier>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                registry: LocalQueueRegistry::new(),
                orchestrator: Arc::new(LocalOrchestrator::new()),
                notifier: Arc::new(RecordingNotifier::default()),
            }
        }

        fn scaler(&self, rules: Vec<ScalingRule>) -> AutoScaler {
            AutoScaler::new(
                rules,
                Arc::new(self.registry.clone()),
                self.orchestrator.clone(),
                self.notifier.clone(),
            )
        }
    }

    struct FixedState(ServiceState);

    #[async_trait]
    impl ServiceStateProbe for FixedState {
        async fn state(&self, _rule: &ScalingRule) -> Result<ServiceState, ServiceError> {
            Ok(self.0)
        }
    }

    struct RefusingOrchestrator;

    #[async_trait]
    impl Orchestrator for RefusingOrchestrator {
        async fn set_desired_count(&self, _: &str, _: &str, _: u32) -> Result<(), ServiceError> {
            Err(ServiceError::request("UpdateService", "access denied"))
        }

        async fn describe_service(
            &self,
            c: &str,
            s: &str,
        ) -> Result<ServiceDescription, ServiceError> {
            Err(ServiceError::ServiceNotFound {
                cluster: c.to_string(),
                service: s.to_string(),
            })
        }

        async fn list_tags(&self, _: &str) -> Result<BTreeMap<String, String>, ServiceError> {
            Ok(BTreeMap::new())
        }
    }

    #[tokio::test]
    async fn scales_up_when_work_is_waiting() {
        let fx = Fixture::new();
        fill(&fx.registry, "q", 3).await;

        let outcomes = fx.scaler(vec![rule("q", "s", 8)]).run_once().await;

        assert!(matches!(outcomes[0], RuleOutcome::Scaled { desired: 8, depth: 3 }));
        assert_eq!(fx.orchestrator.desired_count("c", "s"), Some(8));
        assert_eq!(fx.notifier.count(), 0);
    }

    #[tokio::test]
    async fn scales_to_zero_when_idle() {
        let fx = Fixture::new();
        fx.registry.open("q");

        let outcomes = fx.scaler(vec![rule("q", "s", 8)]).run_once().await;

        assert_eq!(outcomes[0].desired(), Some(0));
        assert_eq!(fx.orchestrator.updates(), vec![("c".to_string(), "s".to_string(), 0u32)]);
    }

    #[tokio::test]
    async fn inactive_services_are_never_touched() {
        let fx = Fixture::new();
        fill(&fx.registry, "q", 5).await;

        for state in [ServiceState::Starting, ServiceState::Stopping, ServiceState::Failing] {
            let scaler = fx
                .scaler(vec![rule("q", "s", 2)])
                .with_state_probe(Arc::new(FixedState(state)));
            let outcomes = scaler.run_once().await;
            assert!(matches!(outcomes[0], RuleOutcome::Skipped(s) if s == state));
        }
        assert!(fx.orchestrator.updates().is_empty());
    }

    #[tokio::test]
    async fn a_failing_rule_does_not_block_the_next() {
        let fx = Fixture::new();
        fill(&fx.registry, "present", 1).await;

        let outcomes = fx
            .scaler(vec![rule("missing", "a", 4), rule("present", "b", 2)])
            .run_once()
            .await;

        assert!(matches!(
            &outcomes[0],
            RuleOutcome::Failed(ServiceError::QueueNotFound(q)) if q == "missing"
        ));
        assert_eq!(outcomes[1].desired(), Some(2));
        assert_eq!(fx.orchestrator.updates(), vec![("c".to_string(), "b".to_string(), 2u32)]);

        let reports = fx.notifier.reports();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].1.get("queue_name"), Some("missing"));
        assert_eq!(reports[0].1.get("active_size"), Some("4"));
    }

    #[tokio::test]
    async fn orchestrator_failure_is_reported_once() {
        let fx = Fixture::new();
        fill(&fx.registry, "q", 1).await;
        let scaler = AutoScaler::new(
            vec![rule("q", "s", 1)],
            Arc::new(fx.registry.clone()),
            Arc::new(RefusingOrchestrator),
            fx.notifier.clone(),
        );

        let outcomes = scaler.run_once().await;

        assert!(matches!(outcomes[0], RuleOutcome::Failed(ServiceError::Request { .. })));
        assert_eq!(fx.notifier.count(), 1);
        assert!(fx.notifier.reports()[0].0.contains("access denied"));
    }

    #[tokio::test]
    async fn from_declaration_validates_rules() {
        let fx = Fixture::new();
        let queues: Arc<dyn QueueConnector> = Arc::new(fx.registry.clone());

        let err = AutoScaler::from_declaration(
            &json!([{"queue_name": "q", "service_name": "s", "active_size": 1}]),
            queues.clone(),
            fx.orchestrator.clone(),
            fx.notifier.clone(),
        )
        .err()
        .unwrap();
        assert_eq!(err.to_string(), "rules must specify the cluster_name");

        let scaler = AutoScaler::from_declaration(
            &json!([{
                "queue_name": "q",
                "service_name": "s",
                "cluster_name": "c",
                "active_size": 1
            }]),
            queues,
            fx.orchestrator.clone(),
            fx.notifier.clone(),
        )
        .unwrap();
        assert_eq!(scaler.rules().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn run_every_ticks_until_shutdown() {
        let fx = Fixture::new();
        fx.registry.open("q");
        let scaler = fx.scaler(vec![rule("q", "s", 1)]);
        let (tx, rx) = watch::channel(false);

        let (passes, ()) = tokio::join!(scaler.run_every(Duration::from_secs(10), rx), async {
            tokio::time::sleep(Duration::from_secs(25)).await;
            tx.send(true).unwrap();
        });

        // Ticks at 0s, 10s and 20s.
        assert_eq!(passes, 3);
        assert_eq!(fx.orchestrator.updates().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn run_every_stops_when_sender_is_dropped() {
        let fx = Fixture::new();
        let scaler = fx.scaler(Vec::new());
        let (tx, rx) = watch::channel(false);
        drop(tx);

        assert_eq!(scaler.run_every(Duration::from_secs(10), rx).await, 0);
    }
}
