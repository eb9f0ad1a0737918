//! Plan application
//!
//! A plan is applied as a sequence of independent remote mutations. There is
//! no rollback: when a step fails, everything before it stays in place and
//! the error is returned.

use super::ServiceSpec;
use crate::api::{CommandWait, ControlPlane};
use crate::cluster::ClusterHandle;
use crate::error::Result;
use tracing::{info, warn};

/// What an application changed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyReport {
    /// Mutating calls that succeeded
    pub mutations: usize,
    /// Objects that already existed and were left alone
    pub already_present: usize,
}

impl ApplyReport {
    pub fn changed(&self) -> bool {
        self.mutations > 0
    }
}

/// Apply a service plan to a cluster
pub async fn apply<C: ControlPlane + ?Sized>(
    api: &C,
    cluster: &ClusterHandle,
    spec: &ServiceSpec,
    wait: &CommandWait,
) -> Result<ApplyReport> {
    let cluster = cluster.name();
    let mut report = ApplyReport::default();

    info!(
        "Deploying {} service {} on cluster {}",
        spec.family, spec.name, cluster
    );

    match api
        .create_service(cluster, &spec.name, &spec.service_type)
        .await
    {
        Ok(()) => report.mutations += 1,
        Err(e) if e.is_already_exists() => {
            warn!("Service {} already exists, reusing it", spec.name);
            report.already_present += 1;
        }
        Err(e) => return Err(e.context(&format!("Failed to create service {}", spec.name))),
    }

    api.update_service_config(cluster, &spec.name, &spec.config)
        .await
        .map_err(|e| e.context(&format!("Failed to configure service {}", spec.name)))?;
    report.mutations += 1;

    for placement in &spec.placements {
        match api
            .get_role_config_group(cluster, &spec.name, &placement.group)
            .await
        {
            Ok(_) => {}
            Err(e) if e.is_not_found() => {
                info!("Creating role config group {}", placement.group);
                api.create_role_config_group(
                    cluster,
                    &spec.name,
                    &placement.group,
                    &placement.role_type,
                )
                .await
                .map_err(|e| {
                    e.context(&format!("Failed to create role config group {}", placement.group))
                })?;
                report.mutations += 1;
            }
            Err(e) => {
                return Err(e.context(&format!(
                    "Failed to get role config group {}",
                    placement.group
                )))
            }
        }

        api.update_role_group_config(cluster, &spec.name, &placement.group, &placement.config)
            .await
            .map_err(|e| {
                e.context(&format!("Failed to configure role config group {}", placement.group))
            })?;
        report.mutations += 1;

        for role in &placement.instances {
            match api
                .create_role(cluster, &spec.name, &role.name, &placement.role_type, &role.host)
                .await
            {
                Ok(()) => {
                    info!("Created role {} on {}", role.name, role.host);
                    report.mutations += 1;
                }
                Err(e) if e.is_already_exists() => {
                    warn!("Role {} already exists", role.name);
                    report.already_present += 1;
                }
                Err(e) => {
                    return Err(e.context(&format!(
                        "Failed to create role {} on {}",
                        role.name, role.host
                    )))
                }
            }
        }
    }

    for command in &spec.post_commands {
        info!("Running {} on service {}", command, spec.name);
        let issued = api
            .service_command(cluster, &spec.name, command)
            .await
            .map_err(|e| e.context(&format!("Failed to run {}", command)))?;
        wait.require(api, issued).await?;
        report.mutations += 1;
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::fake::FakeControlPlane;
    use crate::api::ApiCluster;
    use crate::error::{OpsError, RemoteCode};
    use crate::service::{PlanSettings, RoleKind, ServiceFamily, Topology};

    fn handle(name: &str) -> ClusterHandle {
        ClusterHandle::from(ApiCluster {
            name: name.to_string(),
            full_version: None,
            display_name: None,
        })
    }

    fn plan(family: ServiceFamily, hosts: &[&str]) -> ServiceSpec {
        let topology = Topology::new(hosts.iter().map(|h| h.to_string()).collect());
        family.plan(&topology, &PlanSettings::default()).unwrap()
    }

    #[tokio::test]
    async fn test_apply_storage_plan() {
        let api = FakeControlPlane::new().with_cluster("demo", &["h1", "h2", "h3"]);
        let spec = plan(ServiceFamily::DistributedStorage, &["h1", "h2", "h3"]);

        let report = apply(&api, &handle("demo"), &spec, &CommandWait::default())
            .await
            .unwrap();
        assert!(report.changed());

        let cluster = api.cluster("demo").unwrap();
        let hdfs = &cluster.services["HDFS"];
        assert_eq!(hdfs.service_type, "HDFS");
        let roles: Vec<(&str, &str)> = hdfs
            .roles
            .iter()
            .map(|r| (r.name.as_str(), r.host.as_str()))
            .collect();
        assert_eq!(
            roles,
            vec![("HDFS-nn", "h1"), ("HDFS-dn-1", "h2"), ("HDFS-dn-2", "h3")]
        );
        assert!(hdfs.groups.contains_key("HDFS-NAMENODE-BASE"));
        assert!(hdfs.groups.contains_key("HDFS-DATANODE-BASE"));
    }

    #[tokio::test]
    async fn test_apply_order() {
        let api = FakeControlPlane::new().with_cluster("demo", &["h1", "h2"]);
        let spec = plan(ServiceFamily::DistributedStorage, &["h1", "h2"]);

        apply(&api, &handle("demo"), &spec, &CommandWait::default())
            .await
            .unwrap();

        assert_eq!(
            api.calls(),
            vec![
                "create_service demo HDFS HDFS",
                "update_service_config demo HDFS",
                "get_role_config_group demo HDFS HDFS-NAMENODE-BASE",
                "update_role_group_config demo HDFS HDFS-NAMENODE-BASE",
                "create_role demo HDFS HDFS-nn NAMENODE h1",
                "get_role_config_group demo HDFS HDFS-DATANODE-BASE",
                "update_role_group_config demo HDFS HDFS-DATANODE-BASE",
                "create_role demo HDFS HDFS-dn-1 DATANODE h2",
            ]
        );
    }

    #[tokio::test]
    async fn test_partial_application_is_kept() {
        let api = FakeControlPlane::new()
            .with_cluster("demo", &["h1", "h2", "h3", "h4", "h5"])
            .fail_nth(
                "create_role",
                3,
                Some(RemoteCode::Server),
                "Host h3 is decommissioned",
            );
        let spec = plan(
            ServiceFamily::DistributedStorage,
            &["h1", "h2", "h3", "h4", "h5"],
        );
        assert_eq!(
            spec.placements
                .iter()
                .map(|p| p.instances.len())
                .sum::<usize>(),
            5
        );

        let result = apply(&api, &handle("demo"), &spec, &CommandWait::default()).await;
        match result {
            Err(OpsError::Remote { message, .. }) => {
                assert!(message.contains("HDFS-dn-2"));
                assert!(message.contains("decommissioned"));
            }
            other => panic!("Expected remote failure, got {:?}", other),
        }

        let roles: Vec<String> = api.cluster("demo").unwrap().services["HDFS"]
            .roles
            .iter()
            .map(|r| r.name.clone())
            .collect();
        assert_eq!(roles, vec!["HDFS-nn", "HDFS-dn-1"]);
        assert_eq!(api.count("create_role"), 3);
    }

    #[tokio::test]
    async fn test_existing_service_is_reused() {
        let api = FakeControlPlane::new()
            .with_cluster("demo", &["h1"])
            .with_service("demo", "HDFS", "HDFS");
        let spec = plan(ServiceFamily::DistributedStorage, &["h1"]);

        let report = apply(&api, &handle("demo"), &spec, &CommandWait::default())
            .await
            .unwrap();
        assert_eq!(report.already_present, 1);

        let again = apply(&api, &handle("demo"), &spec, &CommandWait::default())
            .await
            .unwrap();
        // service and the single master role
        assert_eq!(again.already_present, 2);
    }

    #[tokio::test]
    async fn test_missing_group_is_created() {
        let api = FakeControlPlane::new()
            .with_cluster("demo", &["h1"])
            .fail_nth(
                "get_role_config_group",
                1,
                Some(RemoteCode::NotFound),
                "Role config group not found",
            );
        let spec = plan(ServiceFamily::DistributedStorage, &["h1"]);

        apply(&api, &handle("demo"), &spec, &CommandWait::default())
            .await
            .unwrap();

        assert_eq!(api.count("create_role_config_group"), 1);
        assert!(api
            .calls()
            .contains(&"create_role_config_group demo HDFS HDFS-NAMENODE-BASE NAMENODE".to_string()));
    }

    #[tokio::test]
    async fn test_post_commands_run_and_must_succeed() {
        let api = FakeControlPlane::new()
            .with_cluster("demo", &["h1"])
            .fail_command("installOozieShareLib");
        let spec = plan(ServiceFamily::BatchWorkflow, &["h1"]);
        assert!(spec.placement(RoleKind::Server).is_some());

        let result = apply(&api, &handle("demo"), &spec, &CommandWait::default()).await;
        assert!(matches!(result, Err(OpsError::CommandFailed { .. })));
        assert_eq!(api.count("service_command"), 1);
    }
}
