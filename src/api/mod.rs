//! Control-plane API
//!
//! This module defines the capability set the operators consume from the
//! cluster manager, the REST client implementing it, and the helpers used to
//! wait on long-running commands.

pub mod client;
pub mod command;
pub mod types;

#[cfg(test)]
pub mod fake;

use crate::error::Result;
use async_trait::async_trait;

#[cfg(test)]
use mockall::automock;

pub use client::{CmClient, CmClientConfig};
pub use command::CommandWait;
pub use types::{ApiCluster, ApiCommand, ApiRoleConfigGroup, ConfigMap};

/// Operations the operators need from the control plane
///
/// Lookups of missing objects fail with an error for which
/// [`OpsError::is_not_found`](crate::error::OpsError::is_not_found) holds.
/// Every other failure is a remote call failure carrying the server message.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// Fetch the control-plane version; doubles as a connectivity check
    async fn version(&self) -> Result<String>;

    /// Begin the trial licence
    async fn begin_trial(&self) -> Result<()>;

    /// Look up a cluster by name
    async fn get_cluster(&self, name: &str) -> Result<ApiCluster>;

    /// Create a cluster
    async fn create_cluster(&self, name: &str, full_version: &str) -> Result<ApiCluster>;

    /// Delete a cluster
    async fn delete_cluster(&self, name: &str) -> Result<()>;

    /// Hostnames currently registered with a cluster
    async fn list_cluster_hosts(&self, cluster: &str) -> Result<Vec<String>>;

    /// Register hosts with a cluster
    async fn add_hosts(&self, cluster: &str, hostnames: &[String]) -> Result<()>;

    /// Start every service in the cluster
    async fn start_cluster(&self, cluster: &str) -> Result<ApiCommand>;

    /// Stop every service in the cluster
    async fn stop_cluster(&self, cluster: &str) -> Result<ApiCommand>;

    /// Create a service of the given type
    async fn create_service(&self, cluster: &str, name: &str, service_type: &str) -> Result<()>;

    /// Push service-level configuration
    async fn update_service_config(
        &self,
        cluster: &str,
        service: &str,
        config: &ConfigMap,
    ) -> Result<()>;

    /// Fetch a role config group
    async fn get_role_config_group(
        &self,
        cluster: &str,
        service: &str,
        group: &str,
    ) -> Result<ApiRoleConfigGroup>;

    /// Create a role config group for a role type
    async fn create_role_config_group(
        &self,
        cluster: &str,
        service: &str,
        group: &str,
        role_type: &str,
    ) -> Result<ApiRoleConfigGroup>;

    /// Push role config group configuration
    async fn update_role_group_config(
        &self,
        cluster: &str,
        service: &str,
        group: &str,
        config: &ConfigMap,
    ) -> Result<()>;

    /// Create one role instance bound to a host
    async fn create_role(
        &self,
        cluster: &str,
        service: &str,
        role_name: &str,
        role_type: &str,
        hostname: &str,
    ) -> Result<()>;

    /// Start a single service
    async fn start_service(&self, cluster: &str, service: &str) -> Result<ApiCommand>;

    /// Stop a single service
    async fn stop_service(&self, cluster: &str, service: &str) -> Result<ApiCommand>;

    /// Issue a named service command (e.g. `hdfsCreateTmpDir`)
    async fn service_command(
        &self,
        cluster: &str,
        service: &str,
        command: &str,
    ) -> Result<ApiCommand>;

    /// Deploy client configuration to every cluster host
    async fn deploy_client_config(&self, cluster: &str) -> Result<ApiCommand>;

    /// Re-read a command by id
    async fn get_command(&self, id: u64) -> Result<ApiCommand>;
}
