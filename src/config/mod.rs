//! Operator configuration
//!
//! Everything an action needs is read once into [`OperatorConfig`] and passed
//! down explicitly. Values come from a YAML file and are then overridden by
//! command-line flags.

use crate::api::{CmClientConfig, CommandWait};
use crate::cluster::ClusterSpec;
use crate::error::{OpsError, Result};
use crate::service::{DatabaseSettings, FamilySettings, PlanSettings, ServiceFamily, Topology};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default config file name under the user config directory
pub const DEFAULT_CONFIG_FILE: &str = "cmdeploy/config.yaml";

/// Top-level operator configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OperatorConfig {
    pub cluster: ClusterConfig,
    pub control_plane: ControlPlaneConfig,
    pub services: ServicesConfig,
    pub database: DatabaseSettings,
    pub timeouts: TimeoutConfig,
    pub finalize: FinalizeConfig,
    /// Begin the control-plane trial licence before acting
    pub trial: bool,
}

/// Declared cluster
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// Cluster name
    pub name: String,
    /// Full distribution version
    pub full_version: String,
    /// Ordered host inventory
    pub hosts: Vec<String>,
    /// Explicit worker subset
    pub workers: Option<Vec<String>>,
    /// Explicit gateway subset
    pub gateways: Option<Vec<String>>,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            full_version: "5.6.0".to_string(),
            hosts: Vec::new(),
            workers: None,
            gateways: None,
        }
    }
}

/// How to reach the control plane
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlPlaneConfig {
    /// Hostname of the control plane; also registered as a cluster member
    pub host: String,
    pub port: u16,
    pub tls: bool,
    /// API version segment; derived from the cluster's major version when unset
    pub api_version: Option<String>,
    pub username: String,
    pub password: String,
    /// Per-request HTTP timeout in seconds
    pub request_timeout_secs: u64,
}

impl Default for ControlPlaneConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 7180,
            tls: false,
            api_version: None,
            username: "admin".to_string(),
            password: "admin".to_string(),
            request_timeout_secs: 60,
        }
    }
}

/// Service names and per-family overrides
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServicesConfig {
    pub storage: FamilySettings,
    pub resource: FamilySettings,
    pub workflow: FamilySettings,
    pub compute: FamilySettings,
    /// Data warehouse service used during finalize
    pub warehouse: String,
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            storage: FamilySettings::default(),
            resource: FamilySettings::default(),
            workflow: FamilySettings::default(),
            compute: FamilySettings::default(),
            warehouse: "HIVE".to_string(),
        }
    }
}

impl ServicesConfig {
    fn families(&self) -> HashMap<ServiceFamily, FamilySettings> {
        [
            (ServiceFamily::DistributedStorage, self.storage.clone()),
            (ServiceFamily::ResourceManager, self.resource.clone()),
            (ServiceFamily::BatchWorkflow, self.workflow.clone()),
            (ServiceFamily::InMemoryCompute, self.compute.clone()),
        ]
        .into_iter()
        .collect()
    }
}

/// Waits and settle delays, in seconds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Bound on every awaited command
    pub command_secs: u64,
    /// Command status poll interval in milliseconds
    pub poll_interval_ms: u64,
    /// Settle delay after creating a cluster
    pub create_settle_secs: u64,
    /// Settle delay after deleting a cluster
    pub delete_settle_secs: u64,
    /// Settle delay after creating the workflow database
    pub database_settle_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            command_secs: 600,
            poll_interval_ms: 2000,
            create_settle_secs: 10,
            delete_settle_secs: 5,
            database_settle_secs: 30,
        }
    }
}

impl TimeoutConfig {
    pub fn command_wait(&self) -> CommandWait {
        CommandWait::new(
            Duration::from_secs(self.command_secs),
            Duration::from_millis(self.poll_interval_ms),
        )
    }

    pub fn create_settle(&self) -> Duration {
        Duration::from_secs(self.create_settle_secs)
    }

    pub fn delete_settle(&self) -> Duration {
        Duration::from_secs(self.delete_settle_secs)
    }

    pub fn database_settle(&self) -> Duration {
        Duration::from_secs(self.database_settle_secs)
    }

    /// All waits collapsed to zero, for tests
    pub fn immediate() -> Self {
        Self {
            command_secs: 0,
            poll_interval_ms: 0,
            create_settle_secs: 0,
            delete_settle_secs: 0,
            database_settle_secs: 0,
        }
    }
}

/// Post-start setup
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FinalizeConfig {
    /// Shared filesystem path whose permissions are fixed
    pub shared_path: String,
    /// Mode applied to the shared path
    pub shared_path_mode: String,
    /// User the permission change runs as
    pub filesystem_user: String,
    /// Log and continue when a direct command fails instead of aborting
    pub best_effort: bool,
}

impl Default for FinalizeConfig {
    fn default() -> Self {
        Self {
            shared_path: "/user".to_string(),
            shared_path_mode: "775".to_string(),
            filesystem_user: "hdfs".to_string(),
            best_effort: false,
        }
    }
}

/// Command-line values that take precedence over the file
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub name: Option<String>,
    pub full_version: Option<String>,
    pub hosts: Option<Vec<String>>,
    pub workers: Option<Vec<String>>,
    pub gateways: Option<Vec<String>>,
    pub cm_host: Option<String>,
    pub cm_port: Option<u16>,
    pub admin_user: Option<String>,
    pub admin_password: Option<String>,
    pub wait_timeout_secs: Option<u64>,
    /// `None` keeps the file value
    pub trial: Option<bool>,
    pub best_effort: Option<bool>,
}

impl OperatorConfig {
    /// Load from an explicit file, else from the default location if present
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::from_file(p),
            None => match Self::default_path() {
                Some(p) if p.exists() => Self::from_file(&p),
                _ => Ok(Self::default()),
            },
        }
    }

    /// Default config path under the user config directory
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(DEFAULT_CONFIG_FILE))
    }

    /// Parse a config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            OpsError::InvalidConfig(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_yaml(&content)
    }

    /// Parse config from a YAML string
    pub fn from_yaml(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Apply command-line overrides
    pub fn apply(&mut self, overrides: ConfigOverrides) {
        if let Some(name) = overrides.name {
            self.cluster.name = name;
        }
        if let Some(version) = overrides.full_version {
            self.cluster.full_version = version;
        }
        if let Some(hosts) = overrides.hosts {
            self.cluster.hosts = hosts;
        }
        if let Some(workers) = overrides.workers {
            self.cluster.workers = Some(workers);
        }
        if let Some(gateways) = overrides.gateways {
            self.cluster.gateways = Some(gateways);
        }
        if let Some(host) = overrides.cm_host {
            self.control_plane.host = host;
        }
        if let Some(port) = overrides.cm_port {
            self.control_plane.port = port;
        }
        if let Some(user) = overrides.admin_user {
            self.control_plane.username = user;
        }
        if let Some(password) = overrides.admin_password {
            self.control_plane.password = password;
        }
        if let Some(secs) = overrides.wait_timeout_secs {
            self.timeouts.command_secs = secs;
        }
        if let Some(trial) = overrides.trial {
            self.trial = trial;
        }
        if let Some(best_effort) = overrides.best_effort {
            self.finalize.best_effort = best_effort;
        }
    }

    /// API version segment, e.g. `v5` for a 5.x cluster
    pub fn api_version(&self) -> Result<String> {
        if let Some(ref v) = self.control_plane.api_version {
            return Ok(v.clone());
        }

        let major = self
            .cluster
            .full_version
            .split('.')
            .next()
            .filter(|m| !m.is_empty() && m.chars().all(|c| c.is_ascii_digit()))
            .ok_or_else(|| {
                OpsError::InvalidConfig(format!(
                    "cannot derive API version from full version '{}'",
                    self.cluster.full_version
                ))
            })?;

        Ok(format!("v{}", major))
    }

    /// Declared cluster
    pub fn cluster_spec(&self) -> ClusterSpec {
        ClusterSpec {
            name: self.cluster.name.clone(),
            full_version: self.cluster.full_version.clone(),
            hosts: self.cluster.hosts.clone(),
        }
    }

    /// Host layout for the planners
    pub fn topology(&self) -> Topology {
        Topology {
            hosts: self.cluster.hosts.clone(),
            workers: self.cluster.workers.clone(),
            gateways: self.cluster.gateways.clone(),
        }
    }

    /// Planner settings
    pub fn plan_settings(&self) -> PlanSettings {
        PlanSettings {
            control_plane_host: self.control_plane.host.clone(),
            database: self.database.clone(),
            families: self.services.families(),
        }
    }

    /// Service name for a family
    pub fn service_name(&self, family: ServiceFamily) -> String {
        self.plan_settings().service_name(family)
    }

    /// Client connection settings
    pub fn client_config(&self) -> Result<CmClientConfig> {
        Ok(CmClientConfig {
            host: self.control_plane.host.clone(),
            port: self.control_plane.port,
            tls: self.control_plane.tls,
            api_version: self.api_version()?,
            username: self.control_plane.username.clone(),
            password: self.control_plane.password.clone(),
            request_timeout: Duration::from_secs(self.control_plane.request_timeout_secs),
        })
    }
}

/// Split a comma separated host list
pub fn parse_host_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|h| h.trim())
        .filter(|h| !h.is_empty())
        .map(|h| h.to_string())
        .collect()
}
