//! Reconciliation planning
//!
//! Turns a local and a remote inventory into the three ordered stages of a
//! pass. Planning is pure; [`SyncFolder`](crate::SyncFolder) executes the plan.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use crate::filter::FileFilter;
use crate::fingerprint::{Fingerprint, FingerprintMode};
use crate::remote::RemoteInventory;

/// Toggles for the stages of a reconciliation pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileStages {
    pub upload_missing: bool,
    /// Never runs in archive mode
    pub remove_orphaned: bool,
    pub update_changed: bool,
}

impl Default for ReconcileStages {
    fn default() -> Self {
        Self {
            upload_missing: true,
            remove_orphaned: true,
            update_changed: true,
        }
    }
}

/// Everything the planner looks at
pub struct PlanInput<'a> {
    pub root: &'a Path,
    /// Local fingerprints keyed by absolute path
    pub local: &'a HashMap<PathBuf, Fingerprint>,
    pub remote: &'a RemoteInventory,
    /// Root-relative paths known to be uploaded from persisted identifiers
    pub seeded: &'a HashSet<PathBuf>,
    pub filter: &'a FileFilter,
    pub mode: FingerprintMode,
    pub stages: ReconcileStages,
    pub archive: bool,
}

/// Actions of one pass, each list sorted by path
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcilePlan {
    /// Absolute local paths to create remotely
    pub uploads: Vec<PathBuf>,
    /// Absolute local paths whose remote object has no local counterpart
    pub removals: Vec<PathBuf>,
    /// Absolute local paths paired with the baseline reported by the remote
    pub baselines: Vec<(PathBuf, Fingerprint)>,
}

impl ReconcilePlan {
    pub fn is_empty(&self) -> bool {
        self.uploads.is_empty() && self.removals.is_empty() && self.baselines.is_empty()
    }
}

pub fn plan_reconcile(input: &PlanInput<'_>) -> ReconcilePlan {
    let mut plan = ReconcilePlan::default();

    if input.stages.upload_missing {
        for path in input.local.keys() {
            let Ok(relative) = path.strip_prefix(input.root) else {
                continue;
            };
            if !input.filter.is_eligible(path) {
                continue;
            }
            if !input.remote.contains(relative) && !input.seeded.contains(relative) {
                plan.uploads.push(path.clone());
            }
        }
        plan.uploads.sort();
    }

    if input.stages.remove_orphaned && !input.archive {
        for (relative, _) in input.remote.iter() {
            let local = input.root.join(relative);
            if input.filter.is_eligible(&local) && !input.local.contains_key(&local) {
                plan.removals.push(local);
            }
        }
        plan.removals.sort();
    }

    if input.stages.update_changed {
        for path in input.local.keys() {
            let Ok(relative) = path.strip_prefix(input.root) else {
                continue;
            };
            if !input.filter.is_eligible(path) {
                continue;
            }
            let Some(object) = input.remote.get(relative) else {
                continue;
            };
            let baseline = match input.mode {
                FingerprintMode::Size => Some(Fingerprint::from_size(object.size)),
                FingerprintMode::Content(_) => object.fingerprint.clone().map(Fingerprint::new),
            };
            if let Some(baseline) = baseline {
                plan.baselines.push((path.clone(), baseline));
            }
        }
        plan.baselines.sort_by(|a, b| a.0.cmp(&b.0));
    }

    plan
}
