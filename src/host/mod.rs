//! Host command execution
//!
//! Some setup steps are plain commands run on a cluster host (for example
//! fixing permissions on the shared filesystem). They go through
//! [`HostExecutor`] so the outcome is checked like any other remote call.

use crate::error::{OpsError, Result};
use async_trait::async_trait;
use std::fmt;
use std::process::Stdio;
use tokio::process::Command;

#[cfg(test)]
use mockall::automock;

/// A command to run on a host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostCommand {
    /// Program to execute
    pub program: String,
    /// Arguments
    pub args: Vec<String>,
    /// Run as this user through sudo
    pub run_as: Option<String>,
}

impl HostCommand {
    pub fn new(program: &str) -> Self {
        Self {
            program: program.to_string(),
            args: Vec::new(),
            run_as: None,
        }
    }

    pub fn arg(mut self, arg: &str) -> Self {
        self.args.push(arg.to_string());
        self
    }

    pub fn run_as(mut self, user: &str) -> Self {
        self.run_as = Some(user.to_string());
        self
    }

    /// Full argv, including the sudo prefix when running as another user
    pub fn argv(&self) -> Vec<String> {
        let mut argv = Vec::new();
        if let Some(ref user) = self.run_as {
            argv.extend(["sudo".to_string(), "-u".to_string(), user.clone()]);
        }
        argv.push(self.program.clone());
        argv.extend(self.args.iter().cloned());
        argv
    }
}

impl fmt::Display for HostCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.argv().join(" "))
    }
}

/// Exit status and combined output of a host command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostOutput {
    pub status: i32,
    pub output: String,
}

impl HostOutput {
    pub fn success(&self) -> bool {
        self.status == 0
    }
}

/// Runs commands on a host
#[cfg_attr(test, automock)]
#[async_trait]
pub trait HostExecutor: Send + Sync {
    /// Run a command; a non-zero exit is reported in the output, not as an error
    async fn run(&self, command: &HostCommand) -> Result<HostOutput>;
}

/// Run a command and turn a non-zero exit into an error
pub async fn run_checked<H: HostExecutor + ?Sized>(
    executor: &H,
    command: &HostCommand,
) -> Result<HostOutput> {
    let output = executor.run(command).await?;
    if output.success() {
        Ok(output)
    } else {
        Err(OpsError::HostCommand {
            command: command.to_string(),
            status: output.status,
            output: output.output.trim().to_string(),
        })
    }
}

/// Executes commands on the local machine
#[derive(Debug, Clone, Default)]
pub struct LocalExecutor;

#[async_trait]
impl HostExecutor for LocalExecutor {
    async fn run(&self, command: &HostCommand) -> Result<HostOutput> {
        let argv = command.argv();
        tracing::debug!("Running host command: {}", command);

        let output = Command::new(&argv[0])
            .args(&argv[1..])
            .stdin(Stdio::null())
            .output()
            .await?;

        let mut text = String::from_utf8_lossy(&output.stdout).to_string();
        text.push_str(&String::from_utf8_lossy(&output.stderr));

        Ok(HostOutput {
            status: output.status.code().unwrap_or(-1),
            output: text,
        })
    }
}
