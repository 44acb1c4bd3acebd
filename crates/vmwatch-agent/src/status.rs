//! Status aggregation and change-aware logging
//!
//! Summarizes a target set into a per-status histogram and logs it only when
//! it differs from the previously logged one. This is the sole noise-control
//! mechanism: the loop runs every interval, the statistics line appears only
//! on change.

use std::collections::BTreeMap;
use std::fmt;
use tracing::info;
use vmwatch_core::{InstanceStatus, TargetSet};

/// Histogram of instance statuses for one round.
///
/// Backed by an ordered map so the canonical string form is stable for
/// content-equal snapshots regardless of iteration order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StatusSnapshot(BTreeMap<InstanceStatus, usize>);

impl StatusSnapshot {
    /// Count instances per status value. Pure function of the target set.
    pub fn summarize(targets: &TargetSet) -> Self {
        let mut counts = BTreeMap::new();
        for instance in targets.values() {
            *counts.entry(instance.status).or_insert(0) += 1;
        }
        Self(counts)
    }

    /// Number of instances with the given status
    pub fn count(&self, status: InstanceStatus) -> usize {
        self.0.get(&status).copied().unwrap_or(0)
    }

    /// Canonical string form used for change comparison
    pub fn canonical(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for StatusSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (status, count)) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "'{}': {}", status, count)?;
        }
        write!(f, "}}")
    }
}

/// Retains the last logged snapshot form across rounds.
///
/// Owned by the watchdog loop and passed explicitly, never a global, so
/// tests can inject an empty or pre-seeded state. Initialized empty, which
/// guarantees the first real snapshot is always logged.
#[derive(Debug, Default)]
pub struct StatusTracker {
    last_logged: String,
}

impl StatusTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-seed the retained form (tests)
    pub fn with_last_logged(last_logged: impl Into<String>) -> Self {
        Self {
            last_logged: last_logged.into(),
        }
    }

    /// Log the snapshot at info level if its canonical form differs from the
    /// last logged one. Returns whether a line was emitted.
    pub fn log_if_changed(&mut self, snapshot: &StatusSnapshot) -> bool {
        let canonical = snapshot.canonical();
        if canonical == self.last_logged {
            return false;
        }

        info!("VM statistics: {}", canonical);
        self.last_logged = canonical;
        true
    }
}
