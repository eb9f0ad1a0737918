//! cmdeploy - declarative lifecycle operators for managed Hadoop clusters
//!
//! cmdeploy drives a cluster-management control plane over its REST API to
//! bring a named cluster to a requested state:
//!
//! - Cluster creation with host registration, and deletion
//! - Cluster-wide start and stop through long-running commands
//! - Service deployment from pure role-placement plans
//! - Post-start setup across services
//!
//! Every action is idempotent where the control plane allows it, and ends
//! with a single success or failure report.

pub mod api;
pub mod cluster;
pub mod config;
pub mod error;
pub mod host;
pub mod lifecycle;
pub mod report;
pub mod service;

pub use error::{OpsError, Result};
