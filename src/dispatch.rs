//! Worker dispatch boundary.
//!
//! The core hands a composed prompt to an abstract dispatcher and gets back
//! raw output text. The concrete mechanism (subprocess, remote call,
//! in-process function) lives outside the core.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::error::DispatchError;

/// Abstract worker dispatch.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    /// Dispatch a composed prompt to a worker acting as `agent` and return
    /// the worker's raw output.
    async fn dispatch(&self, agent: &str, prompt: &str) -> Result<String, DispatchError>;
}

/// Dispatches workers as subprocesses.
///
/// Runs the configured command with the agent identity as its single
/// argument, the prompt on stdin, and captures stdout as the raw output.
pub struct CommandDispatcher {
    command: String,
    args: Vec<String>,
}

impl CommandDispatcher {
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
        }
    }
}

#[async_trait]
impl Dispatcher for CommandDispatcher {
    async fn dispatch(&self, agent: &str, prompt: &str) -> Result<String, DispatchError> {
        debug!(agent = agent, command = %self.command, "dispatching worker");

        let mut child = Command::new(&self.command)
            .args(&self.args)
            .arg(agent)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| DispatchError::SpawnFailed(e.to_string()))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(prompt.as_bytes())
                .await
                .map_err(|e| DispatchError::SpawnFailed(e.to_string()))?;
            // Close stdin so the worker sees EOF.
            drop(stdin);
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| DispatchError::SpawnFailed(e.to_string()))?;

        if !output.status.success() {
            return Err(DispatchError::WorkerFailed {
                agent: agent.to_string(),
                status: output.status.to_string(),
            });
        }

        String::from_utf8(output.stdout).map_err(|_| DispatchError::InvalidOutput)
    }
}
