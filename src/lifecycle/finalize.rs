//! Post-start setup across services
//!
//! Runs once the cluster is up: scratch and warehouse directories, the
//! workflow engine database, client configuration, and permissions on the
//! shared filesystem path. Steps run strictly in order.

use super::Orchestrator;
use crate::api::ControlPlane;
use crate::error::Result;
use crate::host::{run_checked, HostCommand, HostExecutor};
use crate::report::Outcome;
use crate::service::ServiceFamily;
use tracing::{info, warn};

const CREATE_TMP_DIR: &str = "hdfsCreateTmpDir";
const CREATE_WAREHOUSE: &str = "hiveCreateHiveWarehouse";
const CREATE_WORKFLOW_DB: &str = "createOozieDb";

impl<'a, C, H> Orchestrator<'a, C, H>
where
    C: ControlPlane + ?Sized,
    H: HostExecutor + ?Sized,
{
    /// Finish cross-service setup on a running cluster
    pub async fn finalize(&self) -> Result<Outcome> {
        let spec = self.spec()?;
        let handle = self.existing(&spec).await?;
        let cluster = handle.name();

        let storage = self.config.service_name(ServiceFamily::DistributedStorage);
        let workflow = self.config.service_name(ServiceFamily::BatchWorkflow);
        let warehouse = self.config.services.warehouse.as_str();

        info!("Creating scratch directory on {}", storage);
        self.run_service_command(cluster, &storage, CREATE_TMP_DIR).await?;

        info!("Creating warehouse directory on {}", warehouse);
        let result = self.run_service_command(cluster, warehouse, CREATE_WAREHOUSE).await;
        self.tolerate("create warehouse directory", result)?;

        self.rebuild_workflow_db(cluster, &workflow).await?;

        info!("Deploying client configuration for {}", cluster);
        let cmd = self
            .api
            .deploy_client_config(cluster)
            .await
            .map_err(|e| e.context("Failed to deploy client configs"))?;
        self.wait().require(self.api, cmd).await?;

        let fs = &self.config.finalize;
        let chmod = HostCommand::new("hadoop")
            .arg("fs")
            .arg("-chmod")
            .arg(&fs.shared_path_mode)
            .arg(&fs.shared_path)
            .run_as(&fs.filesystem_user);
        info!("Running {}", chmod);
        let result = run_checked(self.host, &chmod).await;
        self.tolerate("set shared path permissions", result)?;

        Ok(Outcome::new(true, cluster))
    }

    /// Stop the workflow engine, create its database, and start it again
    async fn rebuild_workflow_db(&self, cluster: &str, workflow: &str) -> Result<()> {
        info!("Stopping {} to create its database", workflow);
        let cmd = self
            .api
            .stop_service(cluster, workflow)
            .await
            .map_err(|e| e.context(&format!("Failed to stop {}", workflow)))?;
        self.wait().require(self.api, cmd).await?;

        let result = self.run_service_command(cluster, workflow, CREATE_WORKFLOW_DB).await;
        self.tolerate("create workflow database", result)?;

        tokio::time::sleep(self.config.timeouts.database_settle()).await;

        info!("Starting {}", workflow);
        let cmd = self
            .api
            .start_service(cluster, workflow)
            .await
            .map_err(|e| e.context(&format!("Failed to start {}", workflow)))?;
        self.wait().require(self.api, cmd).await?;

        Ok(())
    }

    async fn run_service_command(&self, cluster: &str, service: &str, command: &str) -> Result<()> {
        let cmd = self
            .api
            .service_command(cluster, service, command)
            .await
            .map_err(|e| e.context(&format!("Failed to run {} on {}", command, service)))?;
        self.wait().require(self.api, cmd).await?;
        Ok(())
    }

    /// In best-effort mode a failed step is logged and skipped
    fn tolerate<T>(&self, step: &str, result: Result<T>) -> Result<()> {
        match result {
            Ok(_) => Ok(()),
            Err(e) if self.config.finalize.best_effort => {
                warn!("Failed to {}, continuing: {}", step, e);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}
