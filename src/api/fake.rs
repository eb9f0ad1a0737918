//! In-memory control plane that records every call

use super::types::{ApiCluster, ApiCommand, ApiRoleConfigGroup, ConfigMap};
use super::ControlPlane;
use crate::error::{OpsError, RemoteCode, Result};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

/// Recorded role instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeRole {
    pub name: String,
    pub role_type: String,
    pub host: String,
}

/// Recorded service
#[derive(Debug, Clone, Default)]
pub struct FakeService {
    pub service_type: String,
    pub config: ConfigMap,
    pub groups: BTreeMap<String, ConfigMap>,
    pub roles: Vec<FakeRole>,
}

/// Recorded cluster
#[derive(Debug, Clone, Default)]
pub struct FakeCluster {
    pub full_version: String,
    pub hosts: Vec<String>,
    pub services: BTreeMap<String, FakeService>,
}

struct Injected {
    op: String,
    nth: usize,
    code: Option<RemoteCode>,
    message: String,
}

#[derive(Default)]
struct FakeState {
    clusters: HashMap<String, FakeCluster>,
    calls: Vec<String>,
    counts: HashMap<String, usize>,
    failures: Vec<Injected>,
    failed_commands: Vec<String>,
    next_command: u64,
}

/// Control plane double used by orchestrator tests
#[derive(Default)]
pub struct FakeControlPlane {
    state: Mutex<FakeState>,
}

impl FakeControlPlane {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an existing cluster
    pub fn with_cluster(self, name: &str, hosts: &[&str]) -> Self {
        self.state.lock().unwrap().clusters.insert(
            name.to_string(),
            FakeCluster {
                full_version: "5.6.0".to_string(),
                hosts: hosts.iter().map(|h| h.to_string()).collect(),
                services: BTreeMap::new(),
            },
        );
        self
    }

    /// Seed an existing service on an existing cluster
    pub fn with_service(self, cluster: &str, name: &str, service_type: &str) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            let cluster = state.clusters.get_mut(cluster).expect("seed the cluster first");
            cluster.services.insert(
                name.to_string(),
                FakeService {
                    service_type: service_type.to_string(),
                    ..Default::default()
                },
            );
        }
        self
    }

    /// Fail the `nth` (1-based) call of `op`
    pub fn fail_nth(self, op: &str, nth: usize, code: Option<RemoteCode>, message: &str) -> Self {
        self.state.lock().unwrap().failures.push(Injected {
            op: op.to_string(),
            nth,
            code,
            message: message.to_string(),
        });
        self
    }

    /// Make the command returned by `op` finish unsuccessfully
    pub fn fail_command(self, op: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .failed_commands
            .push(op.to_string());
        self
    }

    /// Every call in order, formatted as `op arg arg...`
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Calls that change remote state
    pub fn mutating_calls(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| {
                !(c.starts_with("get_") || c.starts_with("list_") || c.starts_with("version"))
            })
            .collect()
    }

    /// Number of times `op` was called
    pub fn count(&self, op: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .counts
            .get(op)
            .copied()
            .unwrap_or(0)
    }

    pub fn cluster(&self, name: &str) -> Option<FakeCluster> {
        self.state.lock().unwrap().clusters.get(name).cloned()
    }

    fn enter(&self, op: &str, args: &[&str]) -> Result<()> {
        let mut state = self.state.lock().unwrap();

        let mut line = op.to_string();
        for arg in args {
            line.push(' ');
            line.push_str(arg);
        }
        state.calls.push(line);

        let count = {
            let c = state.counts.entry(op.to_string()).or_insert(0);
            *c += 1;
            *c
        };

        if let Some(f) = state.failures.iter().find(|f| f.op == op && f.nth == count) {
            // Same shape as a 404 from the REST client.
            if f.code == Some(RemoteCode::NotFound) {
                return Err(OpsError::NotFound(f.message.clone()));
            }
            return Err(OpsError::remote(f.code, f.message.clone()));
        }
        Ok(())
    }

    fn command(&self, op: &str) -> ApiCommand {
        let mut state = self.state.lock().unwrap();
        state.next_command += 1;
        let success = !state.failed_commands.iter().any(|o| o == op);

        ApiCommand {
            id: state.next_command,
            name: op.to_string(),
            start_time: None,
            end_time: None,
            active: false,
            success: Some(success),
            result_message: Some(if success { "ok" } else { "failed" }.to_string()),
        }
    }

    fn with_service_mut<T>(
        &self,
        cluster: &str,
        service: &str,
        f: impl FnOnce(&mut FakeService) -> T,
    ) -> Result<T> {
        let mut state = self.state.lock().unwrap();
        let svc = state
            .clusters
            .get_mut(cluster)
            .ok_or_else(|| OpsError::NotFound(format!("Cluster '{}' not found.", cluster)))?
            .services
            .get_mut(service)
            .ok_or_else(|| OpsError::NotFound(format!("Service '{}' not found.", service)))?;
        Ok(f(svc))
    }
}

#[async_trait]
impl ControlPlane for FakeControlPlane {
    async fn version(&self) -> Result<String> {
        self.enter("version", &[])?;
        Ok("5.6.0".to_string())
    }

    async fn begin_trial(&self) -> Result<()> {
        self.enter("begin_trial", &[])
    }

    async fn get_cluster(&self, name: &str) -> Result<ApiCluster> {
        self.enter("get_cluster", &[name])?;
        let state = self.state.lock().unwrap();
        state
            .clusters
            .get(name)
            .map(|c| ApiCluster {
                name: name.to_string(),
                full_version: Some(c.full_version.clone()),
                display_name: None,
            })
            .ok_or_else(|| OpsError::NotFound(format!("Cluster '{}' not found.", name)))
    }

    async fn create_cluster(&self, name: &str, full_version: &str) -> Result<ApiCluster> {
        self.enter("create_cluster", &[name, full_version])?;
        let mut state = self.state.lock().unwrap();
        if state.clusters.contains_key(name) {
            return Err(OpsError::remote(
                Some(RemoteCode::AlreadyExists),
                format!("Cluster '{}' already exists.", name),
            ));
        }
        state.clusters.insert(
            name.to_string(),
            FakeCluster {
                full_version: full_version.to_string(),
                ..Default::default()
            },
        );
        Ok(ApiCluster {
            name: name.to_string(),
            full_version: Some(full_version.to_string()),
            display_name: None,
        })
    }

    async fn delete_cluster(&self, name: &str) -> Result<()> {
        self.enter("delete_cluster", &[name])?;
        self.state
            .lock()
            .unwrap()
            .clusters
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| OpsError::NotFound(format!("Cluster '{}' not found.", name)))
    }

    async fn list_cluster_hosts(&self, cluster: &str) -> Result<Vec<String>> {
        self.enter("list_cluster_hosts", &[cluster])?;
        let state = self.state.lock().unwrap();
        state
            .clusters
            .get(cluster)
            .map(|c| c.hosts.clone())
            .ok_or_else(|| OpsError::NotFound(format!("Cluster '{}' not found.", cluster)))
    }

    async fn add_hosts(&self, cluster: &str, hostnames: &[String]) -> Result<()> {
        let mut args = vec![cluster];
        args.extend(hostnames.iter().map(|h| h.as_str()));
        self.enter("add_hosts", &args)?;

        let mut state = self.state.lock().unwrap();
        let c = state
            .clusters
            .get_mut(cluster)
            .ok_or_else(|| OpsError::NotFound(format!("Cluster '{}' not found.", cluster)))?;
        c.hosts.extend(hostnames.iter().cloned());
        Ok(())
    }

    async fn start_cluster(&self, cluster: &str) -> Result<ApiCommand> {
        self.enter("start_cluster", &[cluster])?;
        Ok(self.command("start_cluster"))
    }

    async fn stop_cluster(&self, cluster: &str) -> Result<ApiCommand> {
        self.enter("stop_cluster", &[cluster])?;
        Ok(self.command("stop_cluster"))
    }

    async fn create_service(&self, cluster: &str, name: &str, service_type: &str) -> Result<()> {
        self.enter("create_service", &[cluster, name, service_type])?;
        let mut state = self.state.lock().unwrap();
        let c = state
            .clusters
            .get_mut(cluster)
            .ok_or_else(|| OpsError::NotFound(format!("Cluster '{}' not found.", cluster)))?;
        if c.services.contains_key(name) {
            return Err(OpsError::remote(
                Some(RemoteCode::AlreadyExists),
                format!("Service with name '{}' already exists.", name),
            ));
        }
        c.services.insert(
            name.to_string(),
            FakeService {
                service_type: service_type.to_string(),
                ..Default::default()
            },
        );
        Ok(())
    }

    async fn update_service_config(
        &self,
        cluster: &str,
        service: &str,
        config: &ConfigMap,
    ) -> Result<()> {
        self.enter("update_service_config", &[cluster, service])?;
        let config = config.clone();
        self.with_service_mut(cluster, service, |s| s.config.extend(config))
    }

    async fn get_role_config_group(
        &self,
        cluster: &str,
        service: &str,
        group: &str,
    ) -> Result<ApiRoleConfigGroup> {
        self.enter("get_role_config_group", &[cluster, service, group])?;
        // Base groups exist as soon as the service does.
        self.with_service_mut(cluster, service, |s| {
            s.groups.entry(group.to_string()).or_default();
        })?;
        Ok(ApiRoleConfigGroup {
            name: group.to_string(),
            role_type: String::new(),
            base: true,
            display_name: None,
        })
    }

    async fn create_role_config_group(
        &self,
        cluster: &str,
        service: &str,
        group: &str,
        role_type: &str,
    ) -> Result<ApiRoleConfigGroup> {
        self.enter("create_role_config_group", &[cluster, service, group, role_type])?;
        self.with_service_mut(cluster, service, |s| {
            s.groups.entry(group.to_string()).or_default();
        })?;
        Ok(ApiRoleConfigGroup {
            name: group.to_string(),
            role_type: role_type.to_string(),
            base: false,
            display_name: None,
        })
    }

    async fn update_role_group_config(
        &self,
        cluster: &str,
        service: &str,
        group: &str,
        config: &ConfigMap,
    ) -> Result<()> {
        self.enter("update_role_group_config", &[cluster, service, group])?;
        let config = config.clone();
        self.with_service_mut(cluster, service, |s| {
            s.groups.entry(group.to_string()).or_default().extend(config)
        })
    }

    async fn create_role(
        &self,
        cluster: &str,
        service: &str,
        role_name: &str,
        role_type: &str,
        hostname: &str,
    ) -> Result<()> {
        self.enter("create_role", &[cluster, service, role_name, role_type, hostname])?;
        let exists = self.with_service_mut(cluster, service, |s| {
            s.roles.iter().any(|r| r.name == role_name)
        })?;
        if exists {
            return Err(OpsError::remote(
                Some(RemoteCode::AlreadyExists),
                format!("Role with name '{}' already exists.", role_name),
            ));
        }
        self.with_service_mut(cluster, service, |s| {
            s.roles.push(FakeRole {
                name: role_name.to_string(),
                role_type: role_type.to_string(),
                host: hostname.to_string(),
            })
        })
    }

    async fn start_service(&self, cluster: &str, service: &str) -> Result<ApiCommand> {
        self.enter("start_service", &[cluster, service])?;
        Ok(self.command("start_service"))
    }

    async fn stop_service(&self, cluster: &str, service: &str) -> Result<ApiCommand> {
        self.enter("stop_service", &[cluster, service])?;
        Ok(self.command("stop_service"))
    }

    async fn service_command(
        &self,
        cluster: &str,
        service: &str,
        command: &str,
    ) -> Result<ApiCommand> {
        self.enter("service_command", &[cluster, service, command])?;
        Ok(self.command(command))
    }

    async fn deploy_client_config(&self, cluster: &str) -> Result<ApiCommand> {
        self.enter("deploy_client_config", &[cluster])?;
        Ok(self.command("deploy_client_config"))
    }

    async fn get_command(&self, id: u64) -> Result<ApiCommand> {
        self.enter("get_command", &[])?;
        Err(OpsError::NotFound(format!("Command {} not found.", id)))
    }
}
