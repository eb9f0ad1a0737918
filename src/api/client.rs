//! REST client for the cluster-manager API

use super::types::{
    ApiCluster, ApiCommand, ApiConfigList, ApiHost, ApiHostRef, ApiList, ApiRole,
    ApiRoleConfigGroup, ApiService, ApiVersionInfo, ConfigMap,
};
use super::ControlPlane;
use crate::error::{OpsError, RemoteCode, Result};
use async_trait::async_trait;
use reqwest::{Client as HttpClient, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

/// Connection settings for the control plane
#[derive(Debug, Clone)]
pub struct CmClientConfig {
    /// Control-plane hostname
    pub host: String,
    /// HTTP port
    pub port: u16,
    /// Use https
    pub tls: bool,
    /// API version path segment, e.g. `v5`
    pub api_version: String,
    /// Admin username
    pub username: String,
    /// Admin password
    pub password: String,
    /// Per-request timeout
    pub request_timeout: Duration,
}

impl CmClientConfig {
    /// Base URL every API path is joined onto
    pub fn base_url(&self) -> String {
        let scheme = if self.tls { "https" } else { "http" };
        format!(
            "{}://{}:{}/api/{}",
            scheme, self.host, self.port, self.api_version
        )
    }
}

/// Control-plane client speaking the cluster-manager REST API
#[derive(Debug, Clone)]
pub struct CmClient {
    /// Base URL including the API version
    base_url: Url,
    /// HTTP client
    http: HttpClient,
    /// Admin username
    username: String,
    /// Admin password
    password: String,
}

impl CmClient {
    /// Create a new client
    pub fn new(config: &CmClientConfig) -> Result<Self> {
        Self::with_base_url(config.base_url(), config)
    }

    /// Create a client against an explicit base URL
    pub fn with_base_url(base_url: impl Into<String>, config: &CmClientConfig) -> Result<Self> {
        let base_url = base_url.into();
        let parsed = Url::parse(&base_url).map_err(|e| {
            OpsError::InvalidConfig(format!("invalid control-plane URL {}: {}", base_url, e))
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(OpsError::InvalidConfig(format!(
                "control-plane URL must start with http:// or https://, got: {}",
                base_url
            )));
        }

        let http = HttpClient::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            base_url: parsed,
            http,
            username: config.username.clone(),
            password: config.password.clone(),
        })
    }

    /// Append path segments to the base URL, percent-encoding each one
    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                OpsError::InvalidConfig(format!(
                    "control-plane URL cannot take a path: {}",
                    self.base_url
                ))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn with_auth(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.basic_auth(&self.username, Some(&self.password))
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response> {
        let response = self.with_auth(builder).send().await?;
        let status = response.status();

        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = extract_message(&body).unwrap_or_else(|| format!("HTTP {}", status));
        let code = RemoteCode::from_status(status.as_u16(), &body);

        if code == RemoteCode::NotFound {
            return Err(OpsError::NotFound(message));
        }

        Err(OpsError::remote(Some(code), message))
    }

    async fn get<T: DeserializeOwned>(&self, path: &[&str]) -> Result<T> {
        let url = self.url(path)?;
        debug!("GET {}", url);
        let response = self.send(self.http.get(url)).await?;
        Ok(response.json::<T>().await?)
    }

    async fn post<B: Serialize, T: DeserializeOwned>(&self, path: &[&str], body: &B) -> Result<T> {
        let url = self.url(path)?;
        debug!("POST {}", url);
        let response = self.send(self.http.post(url).json(body)).await?;
        Ok(response.json::<T>().await?)
    }

    async fn post_empty<T: DeserializeOwned>(&self, path: &[&str]) -> Result<T> {
        let url = self.url(path)?;
        debug!("POST {}", url);
        let response = self.send(self.http.post(url)).await?;
        Ok(response.json::<T>().await?)
    }

    async fn put<B: Serialize>(&self, path: &[&str], body: &B) -> Result<()> {
        let url = self.url(path)?;
        debug!("PUT {}", url);
        self.send(self.http.put(url).json(body)).await?;
        Ok(())
    }

    async fn delete(&self, path: &[&str]) -> Result<()> {
        let url = self.url(path)?;
        debug!("DELETE {}", url);
        self.send(self.http.delete(url)).await?;
        Ok(())
    }

    /// Resolve a hostname to the control plane's host identifier
    async fn host_ref(&self, hostname: &str) -> Result<ApiHostRef> {
        let hosts: ApiList<ApiHost> = self.get(&["hosts"]).await?;
        hosts
            .items
            .into_iter()
            .find(|h| h.hostname == hostname)
            .map(|h| ApiHostRef {
                host_id: h.host_id,
                hostname: Some(h.hostname),
            })
            .ok_or_else(|| {
                OpsError::remote(
                    Some(RemoteCode::NotFound),
                    format!("host {} is not known to the control plane", hostname),
                )
            })
    }
}

/// Pull the `message` field out of an API error body
fn extract_message(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }

    match serde_json::from_str::<serde_json::Value>(trimmed) {
        Ok(value) => Some(
            value
                .get("message")
                .and_then(|m| m.as_str())
                .map(|m| m.to_string())
                .unwrap_or_else(|| trimmed.to_string()),
        ),
        Err(_) => Some(trimmed.to_string()),
    }
}

#[async_trait]
impl ControlPlane for CmClient {
    async fn version(&self) -> Result<String> {
        let info: ApiVersionInfo = self.get(&["cm", "version"]).await?;
        Ok(info.version)
    }

    async fn begin_trial(&self) -> Result<()> {
        let url = self.url(&["cm", "trial", "begin"])?;
        debug!("POST {}", url);
        self.send(self.http.post(url)).await?;
        Ok(())
    }

    async fn get_cluster(&self, name: &str) -> Result<ApiCluster> {
        self.get(&["clusters", name]).await
    }

    async fn create_cluster(&self, name: &str, full_version: &str) -> Result<ApiCluster> {
        let body = ApiList::of(vec![ApiCluster {
            name: name.to_string(),
            full_version: Some(full_version.to_string()),
            display_name: None,
        }]);

        let created: ApiList<ApiCluster> = self.post(&["clusters"], &body).await?;
        created
            .items
            .into_iter()
            .next()
            .ok_or_else(|| OpsError::remote(None, "cluster creation returned no cluster"))
    }

    async fn delete_cluster(&self, name: &str) -> Result<()> {
        self.delete(&["clusters", name]).await
    }

    async fn list_cluster_hosts(&self, cluster: &str) -> Result<Vec<String>> {
        let refs: ApiList<ApiHostRef> = self.get(&["clusters", cluster, "hosts"]).await?;
        let all: ApiList<ApiHost> = self.get(&["hosts"]).await?;

        Ok(refs
            .items
            .iter()
            .filter_map(|r| {
                r.hostname.clone().or_else(|| {
                    all.items
                        .iter()
                        .find(|h| h.host_id == r.host_id)
                        .map(|h| h.hostname.clone())
                })
            })
            .collect())
    }

    async fn add_hosts(&self, cluster: &str, hostnames: &[String]) -> Result<()> {
        let mut refs = Vec::with_capacity(hostnames.len());
        for hostname in hostnames {
            refs.push(self.host_ref(hostname).await?);
        }

        let _: ApiList<ApiHostRef> = self
            .post(&["clusters", cluster, "hosts"], &ApiList::of(refs))
            .await?;
        Ok(())
    }

    async fn start_cluster(&self, cluster: &str) -> Result<ApiCommand> {
        self.post_empty(&["clusters", cluster, "commands", "start"])
            .await
    }

    async fn stop_cluster(&self, cluster: &str) -> Result<ApiCommand> {
        self.post_empty(&["clusters", cluster, "commands", "stop"])
            .await
    }

    async fn create_service(&self, cluster: &str, name: &str, service_type: &str) -> Result<()> {
        let body = ApiList::of(vec![ApiService {
            name: name.to_string(),
            service_type: service_type.to_string(),
        }]);

        let _: ApiList<ApiService> = self
            .post(&["clusters", cluster, "services"], &body)
            .await?;
        Ok(())
    }

    async fn update_service_config(
        &self,
        cluster: &str,
        service: &str,
        config: &ConfigMap,
    ) -> Result<()> {
        self.put(
            &["clusters", cluster, "services", service, "config"],
            &ApiConfigList::from(config),
        )
        .await
    }

    async fn get_role_config_group(
        &self,
        cluster: &str,
        service: &str,
        group: &str,
    ) -> Result<ApiRoleConfigGroup> {
        self.get(&[
            "clusters",
            cluster,
            "services",
            service,
            "roleConfigGroups",
            group,
        ])
        .await
    }

    async fn create_role_config_group(
        &self,
        cluster: &str,
        service: &str,
        group: &str,
        role_type: &str,
    ) -> Result<ApiRoleConfigGroup> {
        let body = ApiList::of(vec![ApiRoleConfigGroup {
            name: group.to_string(),
            role_type: role_type.to_string(),
            base: false,
            display_name: None,
        }]);

        let created: ApiList<ApiRoleConfigGroup> = self
            .post(
                &["clusters", cluster, "services", service, "roleConfigGroups"],
                &body,
            )
            .await?;

        created
            .items
            .into_iter()
            .next()
            .ok_or_else(|| OpsError::remote(None, "role config group creation returned nothing"))
    }

    async fn update_role_group_config(
        &self,
        cluster: &str,
        service: &str,
        group: &str,
        config: &ConfigMap,
    ) -> Result<()> {
        self.put(
            &[
                "clusters",
                cluster,
                "services",
                service,
                "roleConfigGroups",
                group,
                "config",
            ],
            &ApiConfigList::from(config),
        )
        .await
    }

    async fn create_role(
        &self,
        cluster: &str,
        service: &str,
        role_name: &str,
        role_type: &str,
        hostname: &str,
    ) -> Result<()> {
        let host_ref = self.host_ref(hostname).await?;
        let body = ApiList::of(vec![ApiRole {
            name: role_name.to_string(),
            role_type: role_type.to_string(),
            host_ref,
        }]);

        let _: ApiList<ApiRole> = self
            .post(
                &["clusters", cluster, "services", service, "roles"],
                &body,
            )
            .await?;
        Ok(())
    }

    async fn start_service(&self, cluster: &str, service: &str) -> Result<ApiCommand> {
        self.service_command(cluster, service, "start").await
    }

    async fn stop_service(&self, cluster: &str, service: &str) -> Result<ApiCommand> {
        self.service_command(cluster, service, "stop").await
    }

    async fn service_command(
        &self,
        cluster: &str,
        service: &str,
        command: &str,
    ) -> Result<ApiCommand> {
        self.post_empty(&["clusters", cluster, "services", service, "commands", command])
            .await
    }

    async fn deploy_client_config(&self, cluster: &str) -> Result<ApiCommand> {
        self.post_empty(&["clusters", cluster, "commands", "deployClientConfig"])
            .await
    }

    async fn get_command(&self, id: u64) -> Result<ApiCommand> {
        let id = id.to_string();
        self.get(&["commands", id.as_str()]).await
    }
}
