use super::Action;
use crate::api::{CommandWait, ControlPlane};
use crate::cluster::{resolve, ClusterHandle, ClusterSpec};
use crate::config::OperatorConfig;
use crate::error::{OpsError, Result};
use crate::host::HostExecutor;
use crate::report::Outcome;
use crate::service::{self, ServiceFamily, ServiceSpec};
use tracing::{debug, info, warn};

/// Drives lifecycle actions for one declared cluster
pub struct Orchestrator<'a, C: ?Sized, H: ?Sized> {
    pub(super) api: &'a C,
    pub(super) host: &'a H,
    pub(super) config: &'a OperatorConfig,
}

impl<'a, C, H> Orchestrator<'a, C, H>
where
    C: ControlPlane + ?Sized,
    H: HostExecutor + ?Sized,
{
    pub fn new(api: &'a C, host: &'a H, config: &'a OperatorConfig) -> Self {
        Self { api, host, config }
    }

    /// Run one action; `services` only matters for [`Action::Present`]
    pub async fn run(&self, action: Action, services: &[ServiceFamily]) -> Result<Outcome> {
        info!("Ensuring cluster is {}", action);
        match action {
            Action::Present => self.ensure_present(services).await,
            Action::Absent => self.ensure_absent().await,
            Action::Started => self.start().await,
            Action::Stopped => self.stop().await,
            Action::Finalize => self.finalize().await,
        }
    }

    /// Plan the requested families without touching the control plane
    pub fn plan(&self, services: &[ServiceFamily]) -> Result<Vec<ServiceSpec>> {
        plan_services(self.config, services)
    }

    /// Create the cluster if missing, then deploy the requested services
    pub async fn ensure_present(&self, services: &[ServiceFamily]) -> Result<Outcome> {
        let spec = self.spec()?;
        let plans = self.plan(services)?;

        let (handle, mut changed) = match resolve(self.api, &spec.name).await? {
            Some(handle) => {
                info!("Cluster {} already exists", handle);
                (handle, false)
            }
            None => self.create(&spec).await?,
        };

        changed |= self.apply_all(&handle, &plans).await?;
        Ok(Outcome::new(changed, handle.name()))
    }

    /// Delete the cluster; a missing cluster is a precondition failure
    pub async fn ensure_absent(&self) -> Result<Outcome> {
        let spec = self.spec()?;
        let handle = self.existing(&spec).await?;

        info!("Deleting cluster {}", handle);
        match self.api.delete_cluster(handle.name()).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                warn!("Cluster {} was deleted concurrently", handle);
                return Ok(Outcome::new(false, handle.name()));
            }
            Err(e) => return Err(e.context("Failed to delete cluster")),
        }

        tokio::time::sleep(self.config.timeouts.delete_settle()).await;
        Ok(Outcome::new(true, handle.name()))
    }

    /// Start every service on the cluster
    pub async fn start(&self) -> Result<Outcome> {
        let spec = self.spec()?;
        let handle = self.existing(&spec).await?;

        info!("Starting cluster {}", handle);
        let cmd = self
            .api
            .start_cluster(handle.name())
            .await
            .map_err(|e| e.context("Failed to start cluster"))?;
        self.wait().require(self.api, cmd).await?;

        Ok(Outcome::new(false, handle.name()))
    }

    /// Stop every service on the cluster
    pub async fn stop(&self) -> Result<Outcome> {
        let spec = self.spec()?;
        let handle = self.existing(&spec).await?;

        info!("Stopping cluster {}", handle);
        let cmd = self
            .api
            .stop_cluster(handle.name())
            .await
            .map_err(|e| e.context("Failed to stop cluster"))?;
        self.wait().require(self.api, cmd).await?;

        Ok(Outcome::new(false, handle.name()))
    }

    /// Deploy services onto an existing cluster
    pub async fn deploy(&self, services: &[ServiceFamily]) -> Result<Outcome> {
        let spec = self.spec()?;
        let plans = self.plan(services)?;
        let handle = self.existing(&spec).await?;

        let changed = self.apply_all(&handle, &plans).await?;
        Ok(Outcome::new(changed, handle.name()))
    }

    pub(super) fn spec(&self) -> Result<ClusterSpec> {
        let spec = self.config.cluster_spec();
        spec.validate()?;
        Ok(spec)
    }

    pub(super) fn wait(&self) -> CommandWait {
        self.config.timeouts.command_wait()
    }

    pub(super) async fn existing(&self, spec: &ClusterSpec) -> Result<ClusterHandle> {
        resolve(self.api, &spec.name)
            .await?
            .ok_or_else(|| OpsError::Precondition("Cluster does not exist.".to_string()))
    }

    /// Create the cluster and register its hosts; the flag is true when
    /// anything was mutated
    async fn create(&self, spec: &ClusterSpec) -> Result<(ClusterHandle, bool)> {
        if spec.hosts.is_empty() {
            return Err(OpsError::Precondition(
                "At least one host is required to create a cluster".to_string(),
            ));
        }

        info!("Creating cluster {} ({})", spec.name, spec.full_version);
        let (handle, created) = match self
            .api
            .create_cluster(&spec.name, &spec.full_version)
            .await
        {
            Ok(cluster) => (ClusterHandle::from(cluster), true),
            Err(e) if e.is_already_exists() => {
                warn!("Cluster {} was created concurrently, reusing it", spec.name);
                (self.existing(spec).await?, false)
            }
            Err(e) => return Err(e.context("Failed to build cluster")),
        };

        let added = self.register_hosts(&handle, spec).await?;

        if created {
            tokio::time::sleep(self.config.timeouts.create_settle()).await;
        }
        Ok((handle, created || added))
    }

    /// Add the members the cluster does not know yet; true when hosts were added
    async fn register_hosts(&self, handle: &ClusterHandle, spec: &ClusterSpec) -> Result<bool> {
        let wanted = spec.member_hosts(&self.config.control_plane.host);
        let present = self
            .api
            .list_cluster_hosts(handle.name())
            .await
            .map_err(|e| e.context("Failed to list cluster hosts"))?;

        let missing: Vec<String> = wanted
            .into_iter()
            .filter(|h| !present.contains(h))
            .collect();

        if missing.is_empty() {
            debug!("All hosts already registered with {}", handle);
            return Ok(false);
        }

        info!("Adding hosts to {}: {}", handle, missing.join(", "));
        self.api
            .add_hosts(handle.name(), &missing)
            .await
            .map_err(|e| e.context("Failed to add hosts to cluster"))?;
        Ok(true)
    }

    async fn apply_all(&self, handle: &ClusterHandle, plans: &[ServiceSpec]) -> Result<bool> {
        let wait = self.wait();
        let mut changed = false;

        for plan in plans {
            let report = service::apply(self.api, handle, plan, &wait).await?;
            debug!(
                "Service {}: {} mutations, {} already present",
                plan.name, report.mutations, report.already_present
            );
            changed |= report.changed();
        }

        Ok(changed)
    }
}

/// Plan the requested families in dependency order
pub fn plan_services(config: &OperatorConfig, services: &[ServiceFamily]) -> Result<Vec<ServiceSpec>> {
    let topology = config.topology();
    let settings = config.plan_settings();

    ordered(services)
        .into_iter()
        .map(|family| family.plan(&topology, &settings))
        .collect()
}

/// Requested families in dependency order, without duplicates
fn ordered(services: &[ServiceFamily]) -> Vec<ServiceFamily> {
    ServiceFamily::ALL
        .iter()
        .copied()
        .filter(|f| services.contains(f))
        .collect()
}
