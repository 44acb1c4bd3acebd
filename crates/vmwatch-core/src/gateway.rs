//! Gateway interface to the cloud compute API
//!
//! The reconciliation core only ever talks to the cloud through the
//! `InstanceGateway` trait: fetch one instance, list a folder, start an
//! instance. Concrete implementations live in their own crate; a mock
//! implementation is provided here for tests.

use crate::{Instance, InstanceId, InstanceStatus, Result};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Capability-style interface to the compute API
#[async_trait]
pub trait InstanceGateway: Send + Sync {
    /// Fetch a single instance by id.
    /// Returns `Error::NotFound` when the id does not resolve.
    async fn get_instance(&self, id: &InstanceId) -> Result<Instance>;

    /// List all instances in a folder
    async fn list_instances(&self, folder_id: &str) -> Result<Vec<Instance>>;

    /// Issue a start command for an instance.
    /// Success means the command was accepted, not that the instance is
    /// already running; the next round observes the result.
    async fn start_instance(&self, instance: &Instance) -> Result<()>;
}

/// Mock gateway for tests and development
///
/// Holds a seedable instance table, supports fetch/start failure injection
/// per id, and records every start call so tests can assert on exactly
/// which instances were acted on.
pub struct MockInstanceGateway {
    instances: Arc<RwLock<HashMap<InstanceId, Instance>>>,
    fetch_failures: Arc<RwLock<HashSet<InstanceId>>>,
    start_failures: Arc<RwLock<HashSet<InstanceId>>>,
    start_calls: Arc<RwLock<Vec<InstanceId>>>,
}

impl MockInstanceGateway {
    pub fn new() -> Self {
        Self {
            instances: Arc::new(RwLock::new(HashMap::new())),
            fetch_failures: Arc::new(RwLock::new(HashSet::new())),
            start_failures: Arc::new(RwLock::new(HashSet::new())),
            start_calls: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Seed the gateway with instances
    pub async fn with_instances(self, instances: Vec<Instance>) -> Self {
        {
            let mut table = self.instances.write().await;
            for instance in instances {
                table.insert(instance.id.clone(), instance);
            }
        }
        self
    }

    /// Insert or replace a single instance
    pub async fn insert(&self, instance: Instance) {
        self.instances
            .write()
            .await
            .insert(instance.id.clone(), instance);
    }

    /// Overwrite the status of a seeded instance
    pub async fn set_status(&self, id: &InstanceId, status: InstanceStatus) {
        if let Some(instance) = self.instances.write().await.get_mut(id) {
            instance.status = status;
        }
    }

    /// Make fetches of the given id fail with a gateway error
    pub async fn fail_fetch(&self, id: impl Into<InstanceId>) {
        self.fetch_failures.write().await.insert(id.into());
    }

    /// Make start commands for the given id fail
    pub async fn fail_start(&self, id: impl Into<InstanceId>) {
        self.start_failures.write().await.insert(id.into());
    }

    /// All start calls issued so far, in call order
    pub async fn start_calls(&self) -> Vec<InstanceId> {
        self.start_calls.read().await.clone()
    }
}

impl Default for MockInstanceGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl InstanceGateway for MockInstanceGateway {
    async fn get_instance(&self, id: &InstanceId) -> Result<Instance> {
        if self.fetch_failures.read().await.contains(id) {
            return Err(crate::Error::gateway(format!(
                "injected fetch failure for {}",
                id
            )));
        }

        self.instances
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| crate::Error::not_found(id.to_string()))
    }

    async fn list_instances(&self, folder_id: &str) -> Result<Vec<Instance>> {
        let instances = self.instances.read().await;
        Ok(instances
            .values()
            .filter(|i| i.folder_id.as_deref().map_or(true, |f| f == folder_id))
            .cloned()
            .collect())
    }

    async fn start_instance(&self, instance: &Instance) -> Result<()> {
        self.start_calls.write().await.push(instance.id.clone());

        if self.start_failures.read().await.contains(&instance.id) {
            return Err(crate::Error::gateway(format!(
                "injected start failure for {}",
                instance.id
            )));
        }

        // Mirror the cloud: an accepted start moves the instance out of STOPPED
        if let Some(stored) = self.instances.write().await.get_mut(&instance.id) {
            stored.status = InstanceStatus::Starting;
        }

        Ok(())
    }
}
