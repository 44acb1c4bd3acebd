//! Remediation dispatch
//!
//! Issues one independent start action per stopped instance. All dispatches
//! of a round run concurrently and the round completes only once every one
//! of them has resolved; a single failure never aborts its siblings or the
//! iteration.

use futures::future::join_all;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info};
use vmwatch_core::{Instance, InstanceGateway};

/// Per-instance result of one dispatch round
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemediationOutcome {
    /// The instance was not stopped; no start command was issued
    Skipped,
    /// The start command was accepted by the gateway
    Started,
    /// The start command failed; retried implicitly on the next round
    Failed(String),
}

impl RemediationOutcome {
    pub fn is_started(&self) -> bool {
        matches!(self, RemediationOutcome::Started)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, RemediationOutcome::Failed(_))
    }
}

impl fmt::Display for RemediationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemediationOutcome::Skipped => write!(f, "skipped"),
            RemediationOutcome::Started => write!(f, "started"),
            RemediationOutcome::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

/// Dispatch start actions for every instance in the input, concurrently,
/// and wait for all of them at a single barrier.
///
/// Outcomes are returned in input order.
pub async fn dispatch(
    gateway: &Arc<dyn InstanceGateway>,
    instances: &[Instance],
) -> Vec<RemediationOutcome> {
    let tasks = instances
        .iter()
        .map(|instance| remediate(gateway.as_ref(), instance));
    debug!("Created {} tasks for checkout instance state", instances.len());

    join_all(tasks).await
}

async fn remediate(gateway: &dyn InstanceGateway, instance: &Instance) -> RemediationOutcome {
    if !instance.status.is_stopped() {
        // Idempotence guard: never start a running or transitioning instance
        debug!(
            "Unsuitable instance state: {}. Skipping...",
            instance.status.as_str().to_lowercase()
        );
        return RemediationOutcome::Skipped;
    }

    info!("Instance {} stopped. Starting...", instance);
    match gateway.start_instance(instance).await {
        Ok(()) => {
            info!("Instance {} has been started", instance.name);
            RemediationOutcome::Started
        }
        Err(err) => {
            error!("Instance {} has NOT been started: {}", instance.name, err);
            RemediationOutcome::Failed(err.to_string())
        }
    }
}
