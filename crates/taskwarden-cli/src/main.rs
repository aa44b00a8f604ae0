use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::watch;
use tracing::info;

use taskwarden_core::app::{AutoScaler, TaskManager, WorkerBuilder};
use taskwarden_core::config::Settings;
use taskwarden_core::domain::WorkError;
use taskwarden_core::impls::{
    CommandHandler, CommandSpec, DeploymentStateProbe, LocalOrchestrator, LocalQueueRegistry,
    ProgressCounter,
};
use taskwarden_core::observability::{LoggerFormat, init_logger};
use taskwarden_core::ports::{
    Deployment, LogNotifier, MessageAttributes, QueueService, RolloutState, ServiceDescription,
};
use taskwarden_core::typed::{Task, TaskHandler};

#[derive(Parser, Debug)]
#[command(name = "taskwarden")]
#[command(about = "Supervised queue workers and queue-depth autoscaling", long_about = None)]
struct Cli {
    /// Settings file (JSON); defaults are used when omitted
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log filter, overrides the settings file
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Log format (text|json), overrides the settings file
    #[arg(long, global = true)]
    log_format: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a worker against an in-memory queue
    Demo {
        /// Number of sleep tasks to submit before the stop task
        #[arg(short, long, default_value = "3")]
        tasks: u32,

        /// Milliseconds each sleep task spends per step
        #[arg(long, default_value = "500")]
        step_ms: u64,

        /// Also run this program as a command task
        #[arg(long)]
        program: Option<String>,
    },
    /// Run the autoscaler against in-memory stand-ins
    Scale {
        /// Passes to run; 0 runs until interrupted
        #[arg(short, long, default_value = "1")]
        passes: u32,

        /// Messages to put in every ruled queue first
        #[arg(long, default_value = "0")]
        seed: u32,
    },
}

#[derive(Serialize, Deserialize)]
struct Sleep {
    steps: u32,
    step_ms: u64,
}

impl Task for Sleep {
    const NAME: &'static str = "sleep";
}

struct SleepHandler {
    task: Sleep,
    progress: ProgressCounter,
}

#[async_trait]
impl TaskHandler for SleepHandler {
    async fn execute(&self) -> Result<(), WorkError> {
        for step in 0..self.task.steps {
            tokio::time::sleep(Duration::from_millis(self.task.step_ms)).await;
            self.progress.tick();
            info!(step, "sleep step");
        }
        Ok(())
    }

    fn is_alive(&self) -> bool {
        self.progress.advanced()
    }
}

#[derive(Serialize, Deserialize)]
#[serde(transparent)]
struct RunCommand(CommandSpec);

impl Task for RunCommand {
    const NAME: &'static str = "command";
}

struct StopHandler(Arc<watch::Sender<bool>>);

#[async_trait]
impl TaskHandler for StopHandler {
    async fn execute(&self) -> Result<(), WorkError> {
        info!("stop requested");
        let _ = self.0.send(true);
        Ok(())
    }

    fn is_alive(&self) -> bool {
        true
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut settings = match &cli.config {
        Some(path) => Settings::from_file(path)
            .with_context(|| format!("loading settings from {}", path.display()))?,
        None => Settings::default(),
    };
    if let Some(level) = &cli.log_level {
        settings.logging.level = level.clone();
    }
    if let Some(format) = &cli.log_format {
        settings.logging.format = format.parse::<LoggerFormat>()?;
    }
    init_logger(&settings.logging)?;
    settings.validate().context("invalid settings")?;

    match cli.command {
        Command::Demo {
            tasks,
            step_ms,
            program,
        } => demo(&settings, tasks, step_ms, program).await,
        Command::Scale { passes, seed } => scale(&settings, passes, seed).await,
    }
}

async fn demo(
    settings: &Settings,
    tasks: u32,
    step_ms: u64,
    program: Option<String>,
) -> anyhow::Result<()> {
    let registry = LocalQueueRegistry::new();
    let queue = registry.open(&settings.queue);
    let manager = TaskManager::new(
        queue.clone(),
        Arc::new(LogNotifier),
        settings.service_name.as_str(),
    );

    for i in 0..tasks {
        manager.submit_task(&Sleep { steps: i + 1, step_ms }).await?;
    }
    if let Some(program) = program {
        let spec = CommandSpec {
            program,
            ..CommandSpec::default()
        };
        manager.submit_task(&RunCommand(spec)).await?;
    }
    manager.submit("stop", &json!({})).await?;
    info!(queue = %settings.queue, pending = manager.attributes().await?.pending, "submitted");

    let (tx, rx) = watch::channel(false);
    let tx = Arc::new(tx);
    let mut worker = WorkerBuilder::new(settings.supervisor_config()?)
        .poll(settings.poll_config()?)
        .register::<Sleep, _, _>(|task| SleepHandler {
            task,
            progress: ProgressCounter::new(),
        })?
        .register::<RunCommand, _, _>(|RunCommand(spec)| CommandHandler::new(spec))?
        .register_raw("stop", {
            let tx = tx.clone();
            move |_| StopHandler(tx.clone())
        })?
        .expect_tasks(&[Sleep::NAME, "stop"])
        .build(queue)?;

    tokio::spawn({
        let tx = tx.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("received shutdown signal");
                let _ = tx.send(true);
            }
        }
    });

    let processed = worker.run(rx).await?;
    info!(processed, "demo finished");
    Ok(())
}

async fn scale(settings: &Settings, passes: u32, seed: u32) -> anyhow::Result<()> {
    let rules = settings.scaling_rules()?;
    let registry = LocalQueueRegistry::new();
    let orchestrator = Arc::new(LocalOrchestrator::new());

    for rule in &rules {
        let queue = registry.open(&rule.queue_name);
        for i in 0..seed {
            queue
                .send(
                    json!({"task": "seed", "kwargs": {"n": i}}).to_string(),
                    MessageAttributes::new(),
                )
                .await?;
        }
        orchestrator.add_service(
            &rule.cluster_name,
            &rule.service_name,
            ServiceDescription {
                arn: format!("local:{}/{}", rule.cluster_name, rule.service_name),
                status: "ACTIVE".to_string(),
                desired_count: 0,
                running_count: 0,
                deployments: vec![Deployment {
                    id: "primary".to_string(),
                    status: "PRIMARY".to_string(),
                    rollout_state: RolloutState::Completed,
                }],
            },
        );
    }

    let scaler = AutoScaler::new(
        rules,
        Arc::new(registry.clone()),
        orchestrator.clone(),
        Arc::new(LogNotifier),
    )
    .with_state_probe(Arc::new(DeploymentStateProbe::new(orchestrator.clone())));
    let period = settings.scaling_interval()?;

    if passes == 0 {
        let (tx, rx) = watch::channel(false);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("received shutdown signal");
                let _ = tx.send(true);
            }
        });
        scaler.run_every(period, rx).await;
    } else {
        for pass in 0..passes {
            if pass > 0 {
                tokio::time::sleep(period).await;
            }
            scaler.run_once().await;
        }
    }

    for rule in scaler.rules() {
        info!(
            cluster = %rule.cluster_name,
            service = %rule.service_name,
            desired = ?orchestrator.desired_count(&rule.cluster_name, &rule.service_name),
            "final desired count"
        );
    }
    Ok(())
}
