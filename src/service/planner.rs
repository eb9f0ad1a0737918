//! Service deployment planners
//!
//! Every planner is a pure function of the topology and settings: the same
//! host lists always produce the same roles, names and ordinals.

use super::{RoleInstance, RoleKind, RolePlacement, ServiceFamily, ServiceSpec};
use crate::api::ConfigMap;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Oozie server heap size used by the reference deployment
const WORKFLOW_SERVER_HEAP: &str = "207881018";

/// Share-lib upload issued after the workflow server exists
const WORKFLOW_SHARELIB_COMMAND: &str = "installOozieShareLib";

/// Host layout of the cluster
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Topology {
    /// Ordered host inventory; the first host carries master roles
    pub hosts: Vec<String>,
    /// Explicit worker subset
    #[serde(default)]
    pub workers: Option<Vec<String>>,
    /// Explicit gateway subset
    #[serde(default)]
    pub gateways: Option<Vec<String>>,
}

impl Topology {
    pub fn new(hosts: Vec<String>) -> Self {
        Self {
            hosts,
            workers: None,
            gateways: None,
        }
    }

    /// Host carrying the storage master
    pub fn storage_master(&self) -> Option<&str> {
        self.hosts.first().map(|h| h.as_str())
    }

    /// Storage workers: the declared subset or every host after the first
    pub fn storage_workers(&self) -> Vec<String> {
        match &self.workers {
            Some(workers) => workers.clone(),
            None => self.hosts.iter().skip(1).cloned().collect(),
        }
    }

    /// Gateways: the declared subset or every host
    pub fn gateway_hosts(&self) -> Vec<String> {
        self.gateways.clone().unwrap_or_else(|| self.hosts.clone())
    }
}

/// Backing database for the workflow engine
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    /// Database host; the control-plane host when unset
    pub host: Option<String>,
    pub name: String,
    pub user: String,
    pub password: String,
    /// Database type, e.g. `mysql`
    pub kind: String,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            host: None,
            name: "oozie".to_string(),
            user: "oozie".to_string(),
            password: "temp".to_string(),
            kind: "mysql".to_string(),
        }
    }
}

/// Per-family overrides
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FamilySettings {
    /// Service name; the family default when unset
    pub name: Option<String>,
    /// Extra service-level configuration
    pub config: ConfigMap,
    /// Extra role group configuration keyed by role type
    pub role_config: BTreeMap<String, ConfigMap>,
}

/// Cross-service linkage and overrides shared by every planner
#[derive(Debug, Clone, Default)]
pub struct PlanSettings {
    /// Control-plane host, the default database host
    pub control_plane_host: String,
    /// Workflow engine database
    pub database: DatabaseSettings,
    /// Per-family overrides
    pub families: HashMap<ServiceFamily, FamilySettings>,
}

impl PlanSettings {
    /// Service name for a family
    pub fn service_name(&self, family: ServiceFamily) -> String {
        self.families
            .get(&family)
            .and_then(|f| f.name.clone())
            .unwrap_or_else(|| family.default_name().to_string())
    }

    fn overrides(&self, family: ServiceFamily) -> Option<&FamilySettings> {
        self.families.get(&family)
    }
}

impl ServiceFamily {
    /// Build the desired layout of this family's service
    pub fn plan(&self, topology: &Topology, settings: &PlanSettings) -> Result<ServiceSpec> {
        let mut builder = SpecBuilder::new(*self, settings);

        match self {
            ServiceFamily::DistributedStorage => {
                builder.single(RoleKind::Master, topology.storage_master(), ConfigMap::new());
                builder.numbered(RoleKind::Worker, &topology.storage_workers(), ConfigMap::new());
            }
            ServiceFamily::ResourceManager => {
                builder.link(
                    "hdfs_service",
                    settings.service_name(ServiceFamily::DistributedStorage),
                );
                // Co-located with the storage master.
                builder.single(RoleKind::Master, topology.storage_master(), ConfigMap::new());
                builder.numbered(RoleKind::Worker, &topology.storage_workers(), ConfigMap::new());
            }
            ServiceFamily::BatchWorkflow => {
                builder.link(
                    "mapreduce_yarn_service",
                    settings.service_name(ServiceFamily::ResourceManager),
                );
                builder.single(
                    RoleKind::Server,
                    topology.hosts.first().map(|h| h.as_str()),
                    workflow_server_config(settings),
                );
                builder.post_command(WORKFLOW_SHARELIB_COMMAND);
            }
            ServiceFamily::InMemoryCompute => {
                builder.link(
                    "hdfs_service",
                    settings.service_name(ServiceFamily::DistributedStorage),
                );
                builder.single(
                    RoleKind::Master,
                    topology.hosts.first().map(|h| h.as_str()),
                    ConfigMap::new(),
                );
                builder.numbered(RoleKind::Worker, &topology.storage_workers(), ConfigMap::new());
                builder.numbered(RoleKind::Gateway, &topology.gateway_hosts(), ConfigMap::new());
            }
        }

        let spec = builder.build();
        spec.validate()?;
        Ok(spec)
    }
}

fn workflow_server_config(settings: &PlanSettings) -> ConfigMap {
    let db = &settings.database;
    let host = db
        .host
        .clone()
        .unwrap_or_else(|| settings.control_plane_host.clone());

    [
        ("oozie_java_heapsize", WORKFLOW_SERVER_HEAP.to_string()),
        ("oozie_database_host", host),
        ("oozie_database_name", db.name.clone()),
        ("oozie_database_password", db.password.clone()),
        ("oozie_database_type", db.kind.clone()),
        ("oozie_database_user", db.user.clone()),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect()
}

/// Accumulates placements for one service
struct SpecBuilder<'a> {
    family: ServiceFamily,
    name: String,
    config: ConfigMap,
    placements: Vec<RolePlacement>,
    post_commands: Vec<String>,
    overrides: Option<&'a FamilySettings>,
}

impl<'a> SpecBuilder<'a> {
    fn new(family: ServiceFamily, settings: &'a PlanSettings) -> Self {
        Self {
            family,
            name: settings.service_name(family),
            config: ConfigMap::new(),
            placements: Vec::new(),
            post_commands: Vec::new(),
            overrides: settings.overrides(family),
        }
    }

    fn link(&mut self, key: &str, service: String) {
        self.config.insert(key.to_string(), service);
    }

    fn post_command(&mut self, command: &str) {
        self.post_commands.push(command.to_string());
    }

    /// One unnumbered role, e.g. `HDFS-nn`
    fn single(&mut self, kind: RoleKind, host: Option<&str>, config: ConfigMap) {
        let instances = host
            .map(|h| RoleInstance {
                name: format!("{}-{}", self.name, self.family.role_tag(kind)),
                host: h.to_string(),
            })
            .into_iter()
            .collect();
        self.push(kind, config, instances);
    }

    /// One role per host, numbered from 1 in host order, e.g. `SPARK-sw-2`
    fn numbered(&mut self, kind: RoleKind, hosts: &[String], config: ConfigMap) {
        let tag = self.family.role_tag(kind);
        let instances = hosts
            .iter()
            .enumerate()
            .map(|(i, h)| RoleInstance {
                name: format!("{}-{}-{}", self.name, tag, i + 1),
                host: h.clone(),
            })
            .collect();
        self.push(kind, config, instances);
    }

    fn push(&mut self, kind: RoleKind, mut config: ConfigMap, instances: Vec<RoleInstance>) {
        let role_type = self
            .family
            .role_type(kind)
            .unwrap_or("UNKNOWN")
            .to_string();

        if let Some(extra) = self.overrides.and_then(|o| o.role_config.get(&role_type)) {
            config.extend(extra.clone());
        }

        self.placements.push(RolePlacement {
            kind,
            group: format!("{}-{}-BASE", self.name, role_type),
            role_type,
            config,
            instances,
        });
    }

    fn build(mut self) -> ServiceSpec {
        if let Some(o) = self.overrides {
            self.config.extend(o.config.clone());
        }

        ServiceSpec {
            family: self.family,
            service_type: self.family.service_type().to_string(),
            name: self.name,
            config: self.config,
            placements: self.placements,
            post_commands: self.post_commands,
        }
    }
}
