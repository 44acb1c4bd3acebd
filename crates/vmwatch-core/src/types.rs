//! Core type definitions for vmwatch

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Unique identifier for a compute instance
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstanceId(String);

impl InstanceId {
    /// Create a new InstanceId from a string
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the string representation of the InstanceId
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for InstanceId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for InstanceId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Lifecycle status of a compute instance as reported by the cloud API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InstanceStatus {
    /// Status missing or not recognized
    #[serde(rename = "STATUS_UNSPECIFIED")]
    Unspecified,
    /// Resources are being allocated for the instance
    Provisioning,
    /// The instance is running normally
    Running,
    /// The instance is being stopped
    Stopping,
    /// The instance is stopped (the only state remediation acts on)
    Stopped,
    /// The instance is being started
    Starting,
    /// The instance is being restarted
    Restarting,
    /// The instance is being updated
    Updating,
    /// An error occurred with the instance
    Error,
    /// The instance crashed
    Crashed,
    /// The instance is being deleted
    Deleting,
}

impl InstanceStatus {
    /// Check if the instance is running
    pub fn is_running(&self) -> bool {
        matches!(self, InstanceStatus::Running)
    }

    /// Check if the instance is stopped and therefore actionable
    pub fn is_stopped(&self) -> bool {
        matches!(self, InstanceStatus::Stopped)
    }

    /// Check if the instance is between stable states.
    /// Transitional instances are never remediated.
    pub fn is_transitioning(&self) -> bool {
        matches!(
            self,
            InstanceStatus::Provisioning
                | InstanceStatus::Stopping
                | InstanceStatus::Starting
                | InstanceStatus::Restarting
                | InstanceStatus::Updating
                | InstanceStatus::Deleting
        )
    }

    /// Wire name used by the compute API
    pub fn as_str(&self) -> &'static str {
        match self {
            InstanceStatus::Unspecified => "STATUS_UNSPECIFIED",
            InstanceStatus::Provisioning => "PROVISIONING",
            InstanceStatus::Running => "RUNNING",
            InstanceStatus::Stopping => "STOPPING",
            InstanceStatus::Stopped => "STOPPED",
            InstanceStatus::Starting => "STARTING",
            InstanceStatus::Restarting => "RESTARTING",
            InstanceStatus::Updating => "UPDATING",
            InstanceStatus::Error => "ERROR",
            InstanceStatus::Crashed => "CRASHED",
            InstanceStatus::Deleting => "DELETING",
        }
    }
}

impl std::str::FromStr for InstanceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "PROVISIONING" => Ok(InstanceStatus::Provisioning),
            "RUNNING" => Ok(InstanceStatus::Running),
            "STOPPING" => Ok(InstanceStatus::Stopping),
            "STOPPED" => Ok(InstanceStatus::Stopped),
            "STARTING" => Ok(InstanceStatus::Starting),
            "RESTARTING" => Ok(InstanceStatus::Restarting),
            "UPDATING" => Ok(InstanceStatus::Updating),
            "ERROR" => Ok(InstanceStatus::Error),
            "CRASHED" => Ok(InstanceStatus::Crashed),
            "DELETING" => Ok(InstanceStatus::Deleting),
            "STATUS_UNSPECIFIED" => Ok(InstanceStatus::Unspecified),
            _ => Err(format!("Unknown instance status: {}", s)),
        }
    }
}

impl fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Read-only snapshot of a compute instance.
///
/// Snapshots are fetched fresh from the gateway every reconciliation round
/// and never outlive one round's logic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    /// Instance identifier assigned by the cloud provider
    pub id: InstanceId,

    /// Display name
    pub name: String,

    /// Current lifecycle status
    pub status: InstanceStatus,

    /// Whether the provider may reclaim this instance at any time
    pub preemptible: bool,

    /// Instance labels (keys unique)
    pub labels: HashMap<String, String>,

    /// Folder the instance belongs to
    pub folder_id: Option<String>,

    /// Creation timestamp reported by the API
    pub created_at: Option<DateTime<Utc>>,
}

impl Instance {
    /// Create a new instance snapshot with required fields
    pub fn new(
        id: impl Into<InstanceId>,
        name: impl Into<String>,
        status: InstanceStatus,
        preemptible: bool,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            status,
            preemptible,
            labels: HashMap::new(),
            folder_id: None,
            created_at: None,
        }
    }

    /// Builder pattern for optional fields
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    pub fn with_folder_id(mut self, folder_id: impl Into<String>) -> Self {
        self.folder_id = Some(folder_id.into());
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    /// Look up a label value by key
    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }
}

impl fmt::Display for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (id: {})", self.name, self.id)
    }
}

/// The set of instances the watchdog is responsible for in one round,
/// keyed by the instance identifier the API returned.
///
/// Invariant: every member is preemptible.
pub type TargetSet = HashMap<InstanceId, Instance>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instance_id_creation() {
        let id = InstanceId::new("efqwe123qwe123qwe123");
        assert_eq!(id.as_str(), "efqwe123qwe123qwe123");
        assert_eq!(id.to_string(), "efqwe123qwe123qwe123");

        let from_str: InstanceId = "abc".into();
        assert_ne!(id, from_str);
    }

    #[test]
    fn test_status_parsing() {
        assert_eq!(
            "RUNNING".parse::<InstanceStatus>().unwrap(),
            InstanceStatus::Running
        );
        assert_eq!(
            "stopped".parse::<InstanceStatus>().unwrap(),
            InstanceStatus::Stopped
        );
        assert!("HIBERNATING".parse::<InstanceStatus>().is_err());
    }

    #[test]
    fn test_status_predicates() {
        assert!(InstanceStatus::Stopped.is_stopped());
        assert!(!InstanceStatus::Stopping.is_stopped());

        assert!(InstanceStatus::Running.is_running());

        assert!(InstanceStatus::Starting.is_transitioning());
        assert!(InstanceStatus::Provisioning.is_transitioning());
        assert!(!InstanceStatus::Stopped.is_transitioning());
        assert!(!InstanceStatus::Running.is_transitioning());

        // Error states are neither stopped nor transitioning: not actionable
        assert!(!InstanceStatus::Crashed.is_stopped());
        assert!(!InstanceStatus::Crashed.is_transitioning());
    }

    #[test]
    fn test_status_wire_roundtrip() {
        for status in [
            InstanceStatus::Provisioning,
            InstanceStatus::Running,
            InstanceStatus::Stopped,
            InstanceStatus::Crashed,
        ] {
            assert_eq!(status.as_str().parse::<InstanceStatus>().unwrap(), status);
        }
    }

    #[test]
    fn test_instance_labels() {
        let instance = Instance::new("ef1", "worker-1", InstanceStatus::Running, true)
            .with_label("automation", "keep_vm_up")
            .with_folder_id("b1gafdpppaiaiu2a4444");

        assert_eq!(instance.label("automation"), Some("keep_vm_up"));
        assert_eq!(instance.label("missing"), None);
        assert_eq!(instance.folder_id.as_deref(), Some("b1gafdpppaiaiu2a4444"));
        assert_eq!(instance.to_string(), "worker-1 (id: ef1)");
    }
}
