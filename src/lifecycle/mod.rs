//! Cluster lifecycle
//!
//! The orchestrator drives one [`Action`] per invocation against the control
//! plane: resolve the cluster, branch on the requested state, and apply
//! service plans where asked.

pub mod finalize;
pub mod orchestrator;

use crate::api::ControlPlane;
use crate::error::Result;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::info;

pub use orchestrator::{plan_services, Orchestrator};

/// Requested target state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Cluster exists with its hosts and requested services
    Present,
    /// Cluster is deleted
    Absent,
    /// Cluster services are running
    Started,
    /// Cluster services are stopped
    Stopped,
    /// Post-start cross-service setup
    Finalize,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Action::Present => "present",
            Action::Absent => "absent",
            Action::Started => "started",
            Action::Stopped => "stopped",
            Action::Finalize => "finalize",
        };
        write!(f, "{}", s)
    }
}

/// Check the control plane answers, optionally starting the trial licence
pub async fn connect<C: ControlPlane + ?Sized>(api: &C, trial: bool) -> Result<String> {
    let version = api
        .version()
        .await
        .map_err(|e| e.context("Failed to connect to the control plane"))?;
    info!("Connected to control plane version {}", version);

    if trial {
        match api.begin_trial().await {
            Ok(()) => info!("Trial licence started"),
            Err(e) if e.is_already_exists() => info!("Trial licence already active"),
            Err(e) => return Err(e.context("Failed to begin trial")),
        }
    }

    Ok(version)
}
