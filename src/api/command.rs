//! Waiting on long-running control-plane commands

use super::{ApiCommand, ControlPlane};
use crate::error::{OpsError, Result};
use std::time::Duration;
use tokio::time::Instant;

/// Bounded wait applied to every long-running command
#[derive(Debug, Clone, Copy)]
pub struct CommandWait {
    /// Upper bound on how long a command may run
    pub timeout: Duration,
    /// Delay between status polls
    pub poll_interval: Duration,
}

impl Default for CommandWait {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(600),
            poll_interval: Duration::from_secs(2),
        }
    }
}

impl CommandWait {
    pub fn new(timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            timeout,
            poll_interval,
        }
    }

    /// Wait for a command to finish and return its success flag
    ///
    /// Exceeding the timeout is an error, never a `false`.
    pub async fn wait<C: ControlPlane + ?Sized>(
        &self,
        api: &C,
        command: ApiCommand,
    ) -> Result<bool> {
        Ok(self.finish(api, command).await?.succeeded())
    }

    /// Wait for a command and fail unless it succeeded
    pub async fn require<C: ControlPlane + ?Sized>(
        &self,
        api: &C,
        command: ApiCommand,
    ) -> Result<ApiCommand> {
        let done = self.finish(api, command).await?;
        if done.succeeded() {
            Ok(done)
        } else {
            Err(OpsError::CommandFailed {
                command: done.name.clone(),
                message: done
                    .result_message
                    .clone()
                    .unwrap_or_else(|| "no result message".to_string()),
            })
        }
    }

    async fn finish<C: ControlPlane + ?Sized>(
        &self,
        api: &C,
        mut command: ApiCommand,
    ) -> Result<ApiCommand> {
        let deadline = Instant::now() + self.timeout;

        while command.active {
            let now = Instant::now();
            if now >= deadline {
                return Err(OpsError::Timeout(format!(
                    "command {} ({}) did not finish within {}s",
                    command.name,
                    command.id,
                    self.timeout.as_secs()
                )));
            }

            tokio::time::sleep(self.poll_interval.min(deadline - now)).await;
            tracing::debug!("Polling command {} ({})", command.name, command.id);
            command = api.get_command(command.id).await?;
        }

        Ok(command)
    }
}
