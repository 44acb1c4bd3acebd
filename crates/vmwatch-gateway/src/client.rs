//! REST client for the Yandex Cloud Compute API
//!
//! Implements the `InstanceGateway` trait over the public compute endpoints:
//! fetch instance, list instances in a folder, start instance.

use crate::auth::{Credentials, DEFAULT_IAM_URL};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;
use vmwatch_core::{Error, Instance, InstanceGateway, InstanceId, InstanceStatus, Result};

/// Compute service endpoint of the public cloud
pub const DEFAULT_COMPUTE_URL: &str = "https://compute.api.cloud.yandex.net";

/// Page size for folder listings
const LIST_PAGE_SIZE: u32 = 1000;

/// Gateway endpoint and timeout configuration
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Compute service base URL
    pub compute_url: String,
    /// IAM service base URL
    pub iam_url: String,
    /// Per-request timeout
    pub request_timeout: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            compute_url: DEFAULT_COMPUTE_URL.to_string(),
            iam_url: DEFAULT_IAM_URL.to_string(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Yandex Cloud Compute gateway
pub struct ComputeGateway {
    config: GatewayConfig,
    client: reqwest::Client,
    token: String,
}

impl ComputeGateway {
    /// Create a gateway and resolve the IAM token for the given credentials
    pub async fn connect(config: GatewayConfig, credentials: Credentials) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        let token = credentials.resolve_iam_token(&client, &config.iam_url).await?;

        Ok(Self {
            config,
            client,
            token,
        })
    }

    fn instance_url(&self, id: &InstanceId) -> String {
        format!(
            "{}/compute/v1/instances/{}",
            self.config.compute_url.trim_end_matches('/'),
            id
        )
    }

    async fn read_error_body(response: reqwest::Response) -> String {
        response.text().await.unwrap_or_else(|_| "<no body>".to_string())
    }
}

#[async_trait]
impl InstanceGateway for ComputeGateway {
    async fn get_instance(&self, id: &InstanceId) -> Result<Instance> {
        let url = self.instance_url(id);
        debug!("Fetching instance: {}", url);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(Error::not_found(id.to_string()));
        }
        if !response.status().is_success() {
            let status = response.status();
            let body = Self::read_error_body(response).await;
            return Err(Error::gateway(format!(
                "get instance {} failed: {} {}",
                id, status, body
            )));
        }

        let wire: WireInstance = response.json().await?;
        Ok(wire.into_instance())
    }

    async fn list_instances(&self, folder_id: &str) -> Result<Vec<Instance>> {
        let base_url = format!(
            "{}/compute/v1/instances",
            self.config.compute_url.trim_end_matches('/')
        );

        let mut instances = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self
                .client
                .get(&base_url)
                .bearer_auth(&self.token)
                .query(&[("folderId", folder_id)])
                .query(&[("pageSize", LIST_PAGE_SIZE)]);
            if let Some(ref token) = page_token {
                request = request.query(&[("pageToken", token)]);
            }

            debug!("Listing instances in folder {}", folder_id);
            let response = request.send().await?;

            if !response.status().is_success() {
                let status = response.status();
                let body = Self::read_error_body(response).await;
                return Err(Error::gateway(format!(
                    "list instances in {} failed: {} {}",
                    folder_id, status, body
                )));
            }

            let page: ListInstancesResponse = response.json().await?;
            instances.extend(page.instances.into_iter().map(WireInstance::into_instance));

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        Ok(instances)
    }

    async fn start_instance(&self, instance: &Instance) -> Result<()> {
        let url = format!("{}:start", self.instance_url(&instance.id));
        debug!("Starting instance: {}", url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(Error::not_found(instance.id.to_string()));
        }
        if !response.status().is_success() {
            let status = response.status();
            let body = Self::read_error_body(response).await;
            return Err(Error::gateway(format!(
                "start instance {} failed: {} {}",
                instance.id, status, body
            )));
        }

        // The API answers with a long-running operation object. The command
        // was accepted; the next reconciliation round observes the result.
        let operation: WireOperation = response.json().await?;
        debug!(
            "Start of {} accepted (operation {})",
            instance.id, operation.id
        );

        Ok(())
    }
}

/// Instance as returned by the compute API
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireInstance {
    id: String,
    #[serde(default)]
    folder_id: Option<String>,
    #[serde(default)]
    name: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    labels: HashMap<String, String>,
    #[serde(default)]
    scheduling_policy: Option<WireSchedulingPolicy>,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireSchedulingPolicy {
    #[serde(default)]
    preemptible: bool,
}

impl WireInstance {
    fn into_instance(self) -> Instance {
        Instance {
            id: InstanceId::new(self.id),
            name: self.name,
            status: self
                .status
                .parse::<InstanceStatus>()
                .unwrap_or(InstanceStatus::Unspecified),
            preemptible: self.scheduling_policy.map_or(false, |p| p.preemptible),
            labels: self.labels,
            folder_id: self.folder_id,
            created_at: self.created_at,
        }
    }
}

/// Folder listing page
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListInstancesResponse {
    #[serde(default)]
    instances: Vec<WireInstance>,
    #[serde(default)]
    next_page_token: Option<String>,
}

/// Long-running operation envelope
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireOperation {
    #[serde(default)]
    id: String,
    #[serde(default)]
    #[allow(unused)]
    description: String,
    #[serde(default)]
    #[allow(unused)]
    done: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    const INSTANCE_JSON: &str = r#"{
        "id": "fhm1abcdef0123456789",
        "folderId": "b1gafdpppaiaiu2a4444",
        "createdAt": "2023-09-14T08:42:17Z",
        "name": "preemptible-worker-1",
        "zoneId": "ru-central1-a",
        "platformId": "standard-v3",
        "status": "STOPPED",
        "labels": {
            "automation": "keep_vm_up"
        },
        "schedulingPolicy": {
            "preemptible": true
        }
    }"#;

    #[test]
    fn test_wire_instance_deserialization() {
        let wire: WireInstance = serde_json::from_str(INSTANCE_JSON).unwrap();
        let instance = wire.into_instance();

        assert_eq!(instance.id.as_str(), "fhm1abcdef0123456789");
        assert_eq!(instance.name, "preemptible-worker-1");
        assert_eq!(instance.status, InstanceStatus::Stopped);
        assert!(instance.preemptible);
        assert_eq!(instance.label("automation"), Some("keep_vm_up"));
        assert_eq!(instance.folder_id.as_deref(), Some("b1gafdpppaiaiu2a4444"));
        assert!(instance.created_at.is_some());
    }

    #[test]
    fn test_wire_instance_defaults() {
        // Non-preemptible instances often omit schedulingPolicy entirely
        let wire: WireInstance =
            serde_json::from_str(r#"{"id": "fhm2", "name": "db", "status": "RUNNING"}"#).unwrap();
        let instance = wire.into_instance();

        assert!(!instance.preemptible);
        assert!(instance.labels.is_empty());
        assert_eq!(instance.status, InstanceStatus::Running);
    }

    #[test]
    fn test_wire_instance_unknown_status() {
        let wire: WireInstance =
            serde_json::from_str(r#"{"id": "fhm3", "status": "HIBERNATED"}"#).unwrap();
        assert_eq!(wire.into_instance().status, InstanceStatus::Unspecified);
    }

    #[test]
    fn test_list_response_deserialization() {
        let json = format!(
            r#"{{"instances": [{}], "nextPageToken": "abc"}}"#,
            INSTANCE_JSON
        );
        let page: ListInstancesResponse = serde_json::from_str(&json).unwrap();
        assert_eq!(page.instances.len(), 1);
        assert_eq!(page.next_page_token.as_deref(), Some("abc"));

        let empty: ListInstancesResponse = serde_json::from_str("{}").unwrap();
        assert!(empty.instances.is_empty());
        assert!(empty.next_page_token.is_none());
    }

    #[test]
    fn test_operation_deserialization() {
        let operation: WireOperation = serde_json::from_str(
            r#"{"id": "fv4abc", "description": "Start instance", "done": false}"#,
        )
        .unwrap();
        assert_eq!(operation.id, "fv4abc");
    }
}
