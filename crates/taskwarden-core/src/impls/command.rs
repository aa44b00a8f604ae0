//! CommandHandler - runs a child process as a unit of work.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::debug;

use crate::domain::WorkError;
use crate::typed::TaskHandler;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    pub cwd: Option<PathBuf>,
}

/// Alive while the child process has not exited.
///
/// The child is killed if the handler's future is dropped, which is what
/// happens when the supervisor abandons it at the hard deadline.
pub struct CommandHandler {
    spec: CommandSpec,
    running: AtomicBool,
}

impl CommandHandler {
    pub fn new(spec: CommandSpec) -> Self {
        Self {
            spec,
            running: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl TaskHandler for CommandHandler {
    async fn execute(&self) -> Result<(), WorkError> {
        let program = &self.spec.program;
        if program.is_empty() {
            return Err(WorkError::failed("program is empty"));
        }

        let mut cmd = Command::new(program);
        cmd.args(&self.spec.args)
            .envs(&self.spec.env)
            .kill_on_drop(true);
        if let Some(cwd) = &self.spec.cwd {
            cmd.current_dir(cwd);
        }

        debug!(%program, args = ?self.spec.args, "spawn");
        let mut child = cmd
            .spawn()
            .map_err(|e| WorkError::fatal(format!("spawn {program}: {e}")))?;
        self.running.store(true, Ordering::Release);

        let status = child.wait().await;
        self.running.store(false, Ordering::Release);
        let status = status.map_err(|e| WorkError::fatal(format!("wait {program}: {e}")))?;

        if status.success() {
            return Ok(());
        }
        match status.code() {
            Some(code) => Err(WorkError::failed(format!("{program} exited with code {code}"))),
            None => Err(WorkError::failed(format!("{program} terminated by signal"))),
        }
    }

    fn is_alive(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}
