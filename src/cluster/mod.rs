//! Cluster identity and lookup
//!
//! A [`ClusterSpec`] is the caller's declaration of a cluster; a
//! [`ClusterHandle`] is what the resolver hands back when the control plane
//! knows a cluster by that name.

pub mod resolver;

use crate::api::ApiCluster;
use crate::error::{OpsError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

pub use resolver::resolve;

/// Declared cluster
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterSpec {
    /// Cluster name, unique within the control plane
    pub name: String,
    /// Full distribution version
    pub full_version: String,
    /// Ordered host inventory
    pub hosts: Vec<String>,
}

impl ClusterSpec {
    /// Reject a spec that cannot be sent to the control plane
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(OpsError::Precondition(
                "The cluster name is required for this module".to_string(),
            ));
        }
        Ok(())
    }

    /// Hosts to register: the inventory plus the control-plane host
    ///
    /// Order follows the inventory with the control-plane host last;
    /// duplicates are dropped.
    pub fn member_hosts(&self, control_plane_host: &str) -> Vec<String> {
        let mut seen = BTreeSet::new();
        self.hosts
            .iter()
            .map(|h| h.trim())
            .chain(std::iter::once(control_plane_host.trim()))
            .filter(|h| !h.is_empty())
            .filter(|h| seen.insert(h.to_string()))
            .map(|h| h.to_string())
            .collect()
    }
}

/// Cluster confirmed to exist at resolution time
///
/// The cluster may be deleted by another actor at any moment, so every
/// operation through a handle stays fallible.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterHandle {
    name: String,
}

impl ClusterHandle {
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl From<ApiCluster> for ClusterHandle {
    fn from(cluster: ApiCluster) -> Self {
        Self { name: cluster.name }
    }
}

impl fmt::Display for ClusterHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}
