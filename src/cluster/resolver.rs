//! Cluster lookup

use super::ClusterHandle;
use crate::api::ControlPlane;
use crate::error::Result;

/// Look up a cluster by name
///
/// `Ok(None)` means the control plane does not know the cluster. Any other
/// failure is surfaced with the remote message and is not inspected further.
pub async fn resolve<C: ControlPlane + ?Sized>(
    api: &C,
    name: &str,
) -> Result<Option<ClusterHandle>> {
    match api.get_cluster(name).await {
        Ok(cluster) => Ok(Some(ClusterHandle::from(cluster))),
        Err(e) if e.is_not_found() => {
            tracing::debug!("Cluster {} does not exist", name);
            Ok(None)
        }
        Err(e) => Err(e.context("Failed to get cluster")),
    }
}
