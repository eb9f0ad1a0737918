//! Result reporting
//!
//! Every invocation ends with exactly one report on stdout: either a success
//! carrying the changed flag and the cluster name, or a failure message.

use crate::error::{OpsError, Result};
use serde::{Deserialize, Serialize};
use std::io::Write;

/// Successful action result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    /// True when at least one mutating remote call succeeded
    pub changed: bool,
    /// Cluster the action ran against
    pub cluster: String,
}

impl Outcome {
    pub fn new(changed: bool, cluster: impl Into<String>) -> Self {
        Self {
            changed,
            cluster: cluster.into(),
        }
    }
}

/// Failed action result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    pub failed: bool,
    pub msg: String,
}

/// The single report an invocation produces
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Report {
    Success(Outcome),
    Failure(Failure),
}

impl Report {
    pub fn failure(msg: impl Into<String>) -> Self {
        Report::Failure(Failure {
            failed: true,
            msg: msg.into(),
        })
    }

    /// Exit code for the process
    pub fn exit_code(&self) -> i32 {
        match self {
            Report::Success(_) => 0,
            Report::Failure(_) => 1,
        }
    }

    /// Write the report as one JSON line
    pub fn emit<W: Write>(&self, mut out: W) -> Result<()> {
        serde_json::to_writer(&mut out, self)?;
        writeln!(out)?;
        Ok(())
    }
}

impl From<Result<Outcome>> for Report {
    fn from(result: Result<Outcome>) -> Self {
        match result {
            Ok(outcome) => Report::Success(outcome),
            Err(e) => Report::from(e),
        }
    }
}

impl From<OpsError> for Report {
    fn from(err: OpsError) -> Self {
        Report::failure(err.to_string())
    }
}
