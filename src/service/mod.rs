//! Service deployment
//!
//! Planners turn a cluster topology into a [`ServiceSpec`] without touching
//! the control plane; [`apply`] then pushes a spec through the control plane.

pub mod apply;
pub mod planner;

use crate::api::ConfigMap;
use crate::error::{OpsError, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;

pub use apply::{apply, ApplyReport};
pub use planner::{DatabaseSettings, FamilySettings, PlanSettings, Topology};

/// Service families the operators know how to deploy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ServiceFamily {
    /// Distributed storage (HDFS)
    #[value(alias = "hdfs")]
    DistributedStorage,
    /// Resource manager (YARN)
    #[value(alias = "yarn")]
    ResourceManager,
    /// Batch workflow engine (Oozie)
    #[value(alias = "oozie")]
    BatchWorkflow,
    /// In-memory compute engine (Spark)
    #[value(alias = "spark")]
    InMemoryCompute,
}

impl ServiceFamily {
    /// Families in dependency order
    pub const ALL: [ServiceFamily; 4] = [
        ServiceFamily::DistributedStorage,
        ServiceFamily::ResourceManager,
        ServiceFamily::BatchWorkflow,
        ServiceFamily::InMemoryCompute,
    ];

    /// Control-plane service type
    pub fn service_type(&self) -> &'static str {
        match self {
            ServiceFamily::DistributedStorage => "HDFS",
            ServiceFamily::ResourceManager => "YARN",
            ServiceFamily::BatchWorkflow => "OOZIE",
            ServiceFamily::InMemoryCompute => "SPARK",
        }
    }

    /// Default service name
    pub fn default_name(&self) -> &'static str {
        self.service_type()
    }

    /// Control-plane role type for a role kind in this family
    pub fn role_type(&self, kind: RoleKind) -> Option<&'static str> {
        use RoleKind::*;
        use ServiceFamily::*;

        match (self, kind) {
            (DistributedStorage, Master) => Some("NAMENODE"),
            (DistributedStorage, Worker) => Some("DATANODE"),
            (ResourceManager, Master) => Some("RESOURCEMANAGER"),
            (ResourceManager, Worker) => Some("NODEMANAGER"),
            (BatchWorkflow, Server) => Some("OOZIE_SERVER"),
            (InMemoryCompute, Master) => Some("SPARK_MASTER"),
            (InMemoryCompute, Worker) => Some("SPARK_WORKER"),
            (InMemoryCompute, Gateway) => Some("GATEWAY"),
            _ => None,
        }
    }

    /// Short tag used in role instance names
    fn role_tag(&self, kind: RoleKind) -> &'static str {
        use RoleKind::*;
        use ServiceFamily::*;

        match (self, kind) {
            (DistributedStorage, Master) => "nn",
            (DistributedStorage, _) => "dn",
            (ResourceManager, Master) => "rm",
            (ResourceManager, _) => "nm",
            (BatchWorkflow, _) => "server",
            (InMemoryCompute, Master) => "sm",
            (InMemoryCompute, Worker) => "sw",
            (InMemoryCompute, _) => "gw",
        }
    }
}

impl fmt::Display for ServiceFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ServiceFamily::DistributedStorage => "distributed-storage",
            ServiceFamily::ResourceManager => "resource-manager",
            ServiceFamily::BatchWorkflow => "batch-workflow",
            ServiceFamily::InMemoryCompute => "in-memory-compute",
        };
        write!(f, "{}", s)
    }
}

/// Kind of role within a service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoleKind {
    Master,
    Worker,
    Gateway,
    Server,
}

impl RoleKind {
    /// Whether a service cannot run without at least one role of this kind
    pub fn is_required(&self) -> bool {
        matches!(self, RoleKind::Master | RoleKind::Server)
    }
}

/// One role instance bound to a host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleInstance {
    /// Unique role name within the service
    pub name: String,
    /// Target hostname
    pub host: String,
}

/// Placement of every role of one type
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RolePlacement {
    /// Role kind
    pub kind: RoleKind,
    /// Control-plane role type
    pub role_type: String,
    /// Role config group the configuration is pushed to
    pub group: String,
    /// Role group configuration
    pub config: ConfigMap,
    /// Role instances in host order
    pub instances: Vec<RoleInstance>,
}

impl RolePlacement {
    /// Target hosts in order
    pub fn hosts(&self) -> Vec<&str> {
        self.instances.iter().map(|i| i.host.as_str()).collect()
    }
}

/// Desired layout of one service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceSpec {
    /// Service family
    pub family: ServiceFamily,
    /// Service name
    pub name: String,
    /// Control-plane service type
    pub service_type: String,
    /// Service-level configuration
    pub config: ConfigMap,
    /// Role placements in application order
    pub placements: Vec<RolePlacement>,
    /// Service commands to run once roles exist
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub post_commands: Vec<String>,
}

impl ServiceSpec {
    /// Placement for a role kind
    pub fn placement(&self, kind: RoleKind) -> Option<&RolePlacement> {
        self.placements.iter().find(|p| p.kind == kind)
    }

    /// Check that every required role has a host
    pub fn validate(&self) -> Result<()> {
        for placement in &self.placements {
            if placement.kind.is_required() && placement.instances.is_empty() {
                return Err(OpsError::Precondition(format!(
                    "{} service {} needs at least one host for its {} role",
                    self.family, self.name, placement.role_type
                )));
            }
        }
        Ok(())
    }
}
