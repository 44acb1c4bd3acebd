//! The reconciliation loop
//!
//! Drives resolve → aggregate → dispatch → sleep rounds forever. The only
//! exit paths are an empty initial target set (clean shutdown, there is
//! nothing to watch) and signal-driven termination.

use crate::remediation::{dispatch, RemediationOutcome};
use crate::selector::{SelectionStrategy, TargetSelector};
use crate::status::{StatusSnapshot, StatusTracker};
use crate::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use vmwatch_core::{Instance, InstanceGateway, WatchdogConfig};

/// Watchdog for preemptible instances
pub struct Watchdog {
    gateway: Arc<dyn InstanceGateway>,
    selector: TargetSelector,
    status: StatusTracker,
    interval: Duration,
}

impl Watchdog {
    /// Create a watchdog from configuration. The selection strategy is
    /// decided here, once, from the configuration shape.
    pub fn new(config: &WatchdogConfig, gateway: Arc<dyn InstanceGateway>) -> Self {
        let strategy = SelectionStrategy::from_config(config);
        let selector = TargetSelector::new(gateway.clone(), strategy);

        Self {
            gateway,
            selector,
            status: StatusTracker::new(),
            interval: config.interval(),
        }
    }

    /// Replace the status tracker (tests inject pre-seeded state)
    pub fn with_status_tracker(mut self, status: StatusTracker) -> Self {
        self.status = status;
        self
    }

    /// Run the watchdog until the initial target set turns out empty or a
    /// termination signal arrives.
    pub async fn run(&mut self) -> Result<()> {
        info!("Watchdog is STARTED, pid {}", std::process::id());
        info!(
            "CONF: [checkout interval set to {} seconds, instances are watched using {}]",
            self.interval.as_secs(),
            self.selector.strategy()
        );

        let initial = self.selector.resolve().await;
        if initial.is_empty() {
            // Nothing to watch is a valid end state, not an error
            info!("Instance list is empty, shutting down watchdog");
            return Ok(());
        }

        let watched: Vec<(String, String)> = initial
            .values()
            .map(|i| (i.id.to_string(), i.name.clone()))
            .collect();
        info!("Instance list to watch: {:?}", watched);

        tokio::select! {
            _ = self.reconcile_forever() => {}
            _ = wait_for_termination() => {
                info!("FINISHED: caught signal, shutting down, pid {}", std::process::id());
            }
        }

        Ok(())
    }

    /// One reconciliation round: resolve the target set, log its status
    /// histogram if it changed, and start every stopped member.
    pub async fn run_round(&mut self) -> Vec<RemediationOutcome> {
        let targets = self.selector.resolve().await;

        let snapshot = StatusSnapshot::summarize(&targets);
        self.status.log_if_changed(&snapshot);

        let stopped: Vec<Instance> = targets
            .into_values()
            .filter(|i| i.status.is_stopped())
            .collect();
        if stopped.is_empty() {
            return Vec::new();
        }

        debug!("Preparing tasks...");
        let outcomes = dispatch(&self.gateway, &stopped).await;
        debug!("Tasks completed. Sleeping...");
        outcomes
    }

    /// The active selector (tests inspect the shrinking explicit list)
    pub fn selector(&self) -> &TargetSelector {
        &self.selector
    }

    async fn reconcile_forever(&mut self) {
        loop {
            self.run_round().await;
            // Fixed gap from round end to next resolve, not a fixed rate:
            // the cycle time grows with gateway latency.
            tokio::time::sleep(self.interval).await;
        }
    }
}

/// Wait for termination signals (SIGTERM, SIGINT)
#[cfg(unix)]
async fn wait_for_termination() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    let mut sigint = signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");

    tokio::select! {
        _ = sigterm.recv() => {
            info!("Received SIGTERM");
        }
        _ = sigint.recv() => {
            info!("Received SIGINT");
        }
    }
}

/// Wait for termination signals (non-unix: Ctrl+C only)
#[cfg(not(unix))]
async fn wait_for_termination() {
    let _ = tokio::signal::ctrl_c().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use vmwatch_core::{AuthConfig, AuthType, InstanceId, InstanceStatus, MockInstanceGateway};

    fn explicit_config(ids: &[&str]) -> WatchdogConfig {
        WatchdogConfig {
            auth: AuthConfig {
                auth_type: AuthType::Iam,
                token: Some("t1.token".to_string()),
                sa_key_file: None,
            },
            instances: ids.iter().map(|s| s.to_string()).collect(),
            ..WatchdogConfig::default()
        }
    }

    fn label_config(go: Option<&str>) -> WatchdogConfig {
        WatchdogConfig {
            auth: AuthConfig {
                auth_type: AuthType::Iam,
                token: Some("t1.token".to_string()),
                sa_key_file: None,
            },
            folder_id: Some("folder-1".to_string()),
            label_go_value: go.map(str::to_string),
            ..WatchdogConfig::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_initial_set_exits_cleanly() {
        // All configured ids are invalid: resolve drops them all
        let mock = Arc::new(MockInstanceGateway::new());
        let gateway: Arc<dyn InstanceGateway> = mock.clone();

        let config = explicit_config(&["ghost-1", "ghost-2"]);
        let mut watchdog = Watchdog::new(&config, gateway);

        let result = tokio::time::timeout(Duration::from_secs(300), watchdog.run()).await;
        assert!(result.expect("run() must return, not loop").is_ok());

        // No loop iteration ran: nothing was ever started
        assert!(mock.start_calls().await.is_empty());
    }

    #[tokio::test]
    async fn test_explicit_end_to_end() {
        let mock = Arc::new(
            MockInstanceGateway::new()
                .with_instances(vec![
                    Instance::new("ef-a", "worker-a", InstanceStatus::Stopped, true),
                    Instance::new("ef-b", "database-b", InstanceStatus::Running, false),
                ])
                .await,
        );
        let gateway: Arc<dyn InstanceGateway> = mock.clone();

        let config = explicit_config(&["ef-a", "ef-b"]);
        let mut watchdog = Watchdog::new(&config, gateway);

        // Round one: B is dropped as non-preemptible, A is started
        let outcomes = watchdog.run_round().await;
        assert_eq!(outcomes, vec![RemediationOutcome::Started]);
        assert_eq!(mock.start_calls().await, vec![InstanceId::new("ef-a")]);

        match watchdog.selector().strategy() {
            SelectionStrategy::Explicit { ids } => {
                assert_eq!(ids, &vec![InstanceId::new("ef-a")]);
            }
            _ => unreachable!(),
        }

        // Round two: the target set has stabilized to {A}; A is now
        // starting (the mock reflects the accepted command), so nothing
        // is dispatched.
        let outcomes = watchdog.run_round().await;
        assert!(outcomes.is_empty());
        assert_eq!(mock.start_calls().await.len(), 1);
    }

    #[tokio::test]
    async fn test_label_query_end_to_end() {
        let mock = Arc::new(
            MockInstanceGateway::new()
                .with_instances(vec![
                    Instance::new("ef-1", "keeper", InstanceStatus::Stopped, true)
                        .with_label("automation", "keep_vm_up")
                        .with_folder_id("folder-1"),
                    Instance::new("ef-2", "other", InstanceStatus::Running, true)
                        .with_label("automation", "other")
                        .with_folder_id("folder-1"),
                ])
                .await,
        );
        let gateway: Arc<dyn InstanceGateway> = mock.clone();

        let config = label_config(Some("keep_vm_up"));
        let mut watchdog = Watchdog::new(&config, gateway);

        let outcomes = watchdog.run_round().await;

        // Only the matching stopped instance was started; the non-matching
        // one never received a start call.
        assert_eq!(outcomes, vec![RemediationOutcome::Started]);
        assert_eq!(mock.start_calls().await, vec![InstanceId::new("ef-1")]);
    }

    #[tokio::test]
    async fn test_round_skips_dispatch_when_nothing_stopped() {
        let mock = Arc::new(
            MockInstanceGateway::new()
                .with_instances(vec![Instance::new(
                    "ef-1",
                    "worker",
                    InstanceStatus::Running,
                    true,
                )])
                .await,
        );
        let gateway: Arc<dyn InstanceGateway> = mock.clone();

        let config = explicit_config(&["ef-1"]);
        let mut watchdog = Watchdog::new(&config, gateway);

        assert!(watchdog.run_round().await.is_empty());
        assert!(mock.start_calls().await.is_empty());
    }

    #[tokio::test]
    async fn test_failed_start_retried_next_round() {
        let mock = Arc::new(
            MockInstanceGateway::new()
                .with_instances(vec![Instance::new(
                    "ef-1",
                    "worker",
                    InstanceStatus::Stopped,
                    true,
                )])
                .await,
        );
        mock.fail_start("ef-1").await;
        let gateway: Arc<dyn InstanceGateway> = mock.clone();

        let config = explicit_config(&["ef-1"]);
        let mut watchdog = Watchdog::new(&config, gateway);

        let outcomes = watchdog.run_round().await;
        assert!(outcomes[0].is_failed());

        // The next scheduled round is the implicit retry
        let outcomes = watchdog.run_round().await;
        assert!(outcomes[0].is_failed());
        assert_eq!(mock.start_calls().await.len(), 2);
    }
}
