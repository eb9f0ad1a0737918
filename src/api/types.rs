//! Wire types for the cluster-manager REST API

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Configuration key/value pairs pushed to services and role groups
pub type ConfigMap = BTreeMap<String, String>;

/// Generic `{"items": [...]}` envelope used by every list endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiList<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
}

impl<T> ApiList<T> {
    pub fn of(items: Vec<T>) -> Self {
        Self { items }
    }
}

/// Cluster as known by the control plane
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiCluster {
    /// Cluster name
    pub name: String,
    /// Full distribution version
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_version: Option<String>,
    /// Display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

/// Host registered with the control plane
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiHost {
    /// Opaque host identifier
    pub host_id: String,
    /// Hostname
    pub hostname: String,
    /// IP address
    #[serde(default)]
    pub ip_address: Option<String>,
}

/// Reference to a host by identifier
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiHostRef {
    pub host_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
}

/// Service definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiService {
    pub name: String,
    #[serde(rename = "type")]
    pub service_type: String,
}

/// Role instance definition
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiRole {
    pub name: String,
    #[serde(rename = "type")]
    pub role_type: String,
    pub host_ref: ApiHostRef,
}

/// A single configuration entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiConfig {
    pub name: String,
    pub value: String,
}

/// Configuration list body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfigList {
    pub items: Vec<ApiConfig>,
}

impl From<&ConfigMap> for ApiConfigList {
    fn from(map: &ConfigMap) -> Self {
        Self {
            items: map
                .iter()
                .map(|(name, value)| ApiConfig {
                    name: name.clone(),
                    value: value.clone(),
                })
                .collect(),
        }
    }
}

/// Role config group
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiRoleConfigGroup {
    pub name: String,
    pub role_type: String,
    #[serde(default)]
    pub base: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

/// Long-running command handle
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiCommand {
    /// Command ID
    pub id: u64,
    /// Command name
    pub name: String,
    /// Start time
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    /// End time, unset while active
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    /// Whether the command is still running
    #[serde(default)]
    pub active: bool,
    /// Final outcome, unset while active
    #[serde(default)]
    pub success: Option<bool>,
    /// Outcome message
    #[serde(default)]
    pub result_message: Option<String>,
}

impl ApiCommand {
    /// Whether the command finished successfully
    pub fn succeeded(&self) -> bool {
        !self.active && self.success.unwrap_or(false)
    }
}

/// Control-plane version information
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiVersionInfo {
    pub version: String,
    #[serde(default)]
    pub build_timestamp: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_deserialization() {
        let json = r#"{
            "id": 42,
            "name": "Start",
            "startTime": "2016-03-01T10:00:00.000Z",
            "active": false,
            "success": true,
            "resultMessage": "All services successfully started."
        }"#;

        let cmd: ApiCommand = serde_json::from_str(json).unwrap();
        assert_eq!(cmd.id, 42);
        assert!(cmd.succeeded());
        assert!(cmd.end_time.is_none());
    }

    #[test]
    fn test_active_command_is_not_success() {
        let json = r#"{"id": 1, "name": "Stop", "active": true}"#;
        let cmd: ApiCommand = serde_json::from_str(json).unwrap();
        assert!(!cmd.succeeded());
    }

    #[test]
    fn test_config_list_from_map() {
        let mut map = ConfigMap::new();
        map.insert("hdfs_service".to_string(), "HDFS".to_string());
        let list = ApiConfigList::from(&map);
        let json = serde_json::to_value(&list).unwrap();
        assert_eq!(json["items"][0]["name"], "hdfs_service");
        assert_eq!(json["items"][0]["value"], "HDFS");
    }

    #[test]
    fn test_role_serialization() {
        let role = ApiRole {
            name: "SPARK-sm".to_string(),
            role_type: "SPARK_MASTER".to_string(),
            host_ref: ApiHostRef {
                host_id: "abc".to_string(),
                hostname: None,
            },
        };
        let json = serde_json::to_value(&role).unwrap();
        assert_eq!(json["type"], "SPARK_MASTER");
        assert_eq!(json["hostRef"]["hostId"], "abc");
    }
}
