//! Target set resolution
//!
//! Resolves the set of instances the watchdog is responsible for. Exactly
//! one of two strategies is active for the process lifetime, decided once at
//! startup from the configuration shape: an explicit id list, or a
//! label-filtered folder query.

use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, warn};
use vmwatch_core::{InstanceGateway, InstanceId, TargetSet, WatchdogConfig};

/// Selection strategy, chosen once at construction and never re-evaluated
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionStrategy {
    /// Watch exactly the configured instance ids.
    ///
    /// The list only ever shrinks: ids that fail to fetch or turn out to be
    /// non-preemptible are dropped permanently for the process lifetime.
    Explicit { ids: Vec<InstanceId> },

    /// Watch all preemptible instances in a folder, optionally narrowed by
    /// one label filter. A set `go_value` keeps only instances whose
    /// `label_name` equals it and makes `no_go_value` irrelevant; otherwise
    /// a set `no_go_value` excludes matching instances.
    LabelQuery {
        folder_id: String,
        label_name: String,
        go_value: Option<String>,
        no_go_value: Option<String>,
    },
}

impl SelectionStrategy {
    /// Decide the strategy from the configuration shape: a non-empty
    /// explicit instance list wins over the label query.
    pub fn from_config(config: &WatchdogConfig) -> Self {
        if config.uses_explicit_instances() {
            Self::Explicit {
                ids: config
                    .instances
                    .iter()
                    .map(|id| InstanceId::new(id.clone()))
                    .collect(),
            }
        } else {
            Self::LabelQuery {
                folder_id: config.folder_id.clone().unwrap_or_default(),
                label_name: config.label_name.clone(),
                go_value: config.label_go_value.clone(),
                no_go_value: config.label_no_go_value.clone(),
            }
        }
    }
}

impl fmt::Display for SelectionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectionStrategy::Explicit { ids } => {
                write!(f, "explicit list of {} instances", ids.len())
            }
            SelectionStrategy::LabelQuery {
                label_name,
                go_value,
                no_go_value,
                ..
            } => match (go_value, no_go_value) {
                (Some(go), _) => write!(f, "label '{}', value '(+) {}'", label_name, go),
                (None, Some(no_go)) => {
                    write!(f, "label '{}', value '(-) {}'", label_name, no_go)
                }
                (None, None) => write!(f, "all preemptible instances in folder"),
            },
        }
    }
}

/// Resolves the current target set through the gateway
pub struct TargetSelector {
    gateway: Arc<dyn InstanceGateway>,
    strategy: SelectionStrategy,
}

impl TargetSelector {
    pub fn new(gateway: Arc<dyn InstanceGateway>, strategy: SelectionStrategy) -> Self {
        Self { gateway, strategy }
    }

    /// The active strategy (reflects any ids dropped so far)
    pub fn strategy(&self) -> &SelectionStrategy {
        &self.strategy
    }

    /// Resolve the target set for this round.
    ///
    /// Never fails as a whole: per-instance failures are logged and the
    /// instance is excluded. The invariant on the returned set is that every
    /// member is preemptible.
    pub async fn resolve(&mut self) -> TargetSet {
        match &mut self.strategy {
            SelectionStrategy::Explicit { ids } => {
                Self::resolve_explicit(self.gateway.as_ref(), ids).await
            }
            SelectionStrategy::LabelQuery {
                folder_id,
                label_name,
                go_value,
                no_go_value,
            } => {
                Self::resolve_label_query(
                    self.gateway.as_ref(),
                    folder_id,
                    label_name,
                    go_value.as_deref(),
                    no_go_value.as_deref(),
                )
                .await
            }
        }
    }

    async fn resolve_explicit(
        gateway: &dyn InstanceGateway,
        ids: &mut Vec<InstanceId>,
    ) -> TargetSet {
        debug!("Validating {} configured instances...", ids.len());

        let mut targets = TargetSet::new();
        let mut kept = Vec::with_capacity(ids.len());

        for id in std::mem::take(ids) {
            match gateway.get_instance(&id).await {
                Ok(instance) if instance.preemptible => {
                    kept.push(id);
                    targets.insert(instance.id.clone(), instance);
                }
                Ok(instance) => {
                    warn!(
                        "removing instance {} from watch list, as it's not preemptible",
                        instance
                    );
                }
                Err(err) => {
                    error!("removing instance {} from watch list: {}", id, err);
                }
            }
        }

        *ids = kept;
        targets
    }

    async fn resolve_label_query(
        gateway: &dyn InstanceGateway,
        folder_id: &str,
        label_name: &str,
        go_value: Option<&str>,
        no_go_value: Option<&str>,
    ) -> TargetSet {
        let listed = match gateway.list_instances(folder_id).await {
            Ok(listed) => listed,
            Err(err) => {
                // A failed listing yields an empty round; the next round
                // re-lists from scratch.
                error!("listing instances in folder {} failed: {}", folder_id, err);
                return TargetSet::new();
            }
        };

        listed
            .into_iter()
            .filter(|i| i.preemptible)
            .filter(|i| match (go_value, no_go_value) {
                // go wins: deny-list value is ignored entirely when both are set
                (Some(go), _) => i.label(label_name) == Some(go),
                (None, Some(no_go)) => i.label(label_name) != Some(no_go),
                (None, None) => true,
            })
            .map(|i| (i.id.clone(), i))
            .collect()
    }
}
