//! Unit tests for reconciliation planning

use crate::diff::{plan_reconcile, PlanInput, ReconcilePlan, ReconcileStages};
use crate::filter::{FileFilter, FilterOptions};
use crate::fingerprint::{Fingerprint, FingerprintMode};
use crate::remote::RemoteInventory;
use rstest::*;
use siasync_core::{RemoteObject, RemotePath};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

const ROOT: &str = "/sync/root";

struct Fixture {
    root: PathBuf,
    local: HashMap<PathBuf, Fingerprint>,
    remote: RemoteInventory,
    seeded: HashSet<PathBuf>,
    filter: FileFilter,
    mode: FingerprintMode,
    stages: ReconcileStages,
    archive: bool,
}

impl Fixture {
    fn with_local(mut self, relative: &str, size: u64) -> Self {
        self.local
            .insert(self.root.join(relative), Fingerprint::from_size(size));
        self
    }

    fn with_remote(mut self, relative: &str, size: u64, fingerprint: Option<&str>) -> Self {
        let prefix = RemotePath::new("siasync").unwrap();
        let mut objects: Vec<RemoteObject> = self.remote.iter().map(|(_, o)| o.clone()).collect();
        objects.push(RemoteObject {
            path: prefix.join_relative(Path::new(relative)).unwrap(),
            size,
            fingerprint: fingerprint.map(str::to_string),
        });
        self.remote = RemoteInventory::from_objects(&prefix, objects);
        self
    }

    fn plan(&self) -> ReconcilePlan {
        plan_reconcile(&PlanInput {
            root: &self.root,
            local: &self.local,
            remote: &self.remote,
            seeded: &self.seeded,
            filter: &self.filter,
            mode: self.mode,
            stages: self.stages,
            archive: self.archive,
        })
    }

    fn abs(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }
}

#[fixture]
fn size_mode() -> Fixture {
    Fixture {
        root: PathBuf::from(ROOT),
        local: HashMap::new(),
        remote: RemoteInventory::default(),
        seeded: HashSet::new(),
        filter: FileFilter::default(),
        mode: FingerprintMode::Size,
        stages: ReconcileStages::default(),
        archive: false,
    }
}

#[rstest]
fn test_missing_files_are_uploaded(size_mode: Fixture) {
    let fx = size_mode
        .with_local("b.txt", 1)
        .with_local("a.txt", 1)
        .with_local("docs/c.txt", 1)
        .with_remote("docs/c.txt", 1, None);

    let plan = fx.plan();
    assert_eq!(plan.uploads, vec![fx.abs("a.txt"), fx.abs("b.txt")]);
    assert!(plan.removals.is_empty());
}

#[rstest]
fn test_orphans_are_removed(size_mode: Fixture) {
    let fx = size_mode
        .with_local("a.txt", 1)
        .with_remote("a.txt", 1, None)
        .with_remote("gone.txt", 4, None);

    let plan = fx.plan();
    assert!(plan.uploads.is_empty());
    assert_eq!(plan.removals, vec![fx.abs("gone.txt")]);
}

#[rstest]
fn test_archive_never_removes(mut size_mode: Fixture) {
    size_mode.archive = true;
    let fx = size_mode.with_remote("gone.txt", 4, None);

    assert!(fx.plan().removals.is_empty());
}

#[rstest]
fn test_ineligible_remote_objects_are_left_alone(mut size_mode: Fixture) {
    size_mode.filter = FileFilter::new(FilterOptions::from_comma_lists("txt", ""));
    let fx = size_mode
        .with_remote("photo.jpg", 10, None)
        .with_remote("notes.txt", 10, None);

    assert_eq!(fx.plan().removals, vec![fx.abs("notes.txt")]);
}

#[rstest]
fn test_seeded_paths_count_as_uploaded(mut size_mode: Fixture) {
    size_mode.seeded.insert(PathBuf::from("a.txt"));
    let fx = size_mode.with_local("a.txt", 1).with_local("b.txt", 1);

    assert_eq!(fx.plan().uploads, vec![fx.abs("b.txt")]);
}

#[rstest]
fn test_size_mode_baseline_is_remote_size(size_mode: Fixture) {
    let fx = size_mode
        .with_local("a.txt", 150)
        .with_remote("a.txt", 100, None);

    let plan = fx.plan();
    assert_eq!(
        plan.baselines,
        vec![(fx.abs("a.txt"), Fingerprint::from_size(100))]
    );
}

#[rstest]
fn test_content_mode_needs_remote_fingerprint(mut size_mode: Fixture) {
    size_mode.mode = FingerprintMode::default();
    let fx = size_mode
        .with_local("a.txt", 1)
        .with_local("b.txt", 1)
        .with_remote("a.txt", 1, Some("abc123"))
        .with_remote("b.txt", 1, None);

    let plan = fx.plan();
    assert_eq!(plan.baselines, vec![(fx.abs("a.txt"), Fingerprint::new("abc123"))]);
}

#[rstest]
fn test_disabled_stages_plan_nothing(mut size_mode: Fixture) {
    size_mode.stages = ReconcileStages {
        upload_missing: false,
        remove_orphaned: false,
        update_changed: false,
    };
    let fx = size_mode
        .with_local("new.txt", 1)
        .with_local("same.txt", 1)
        .with_remote("same.txt", 2, None)
        .with_remote("orphan.txt", 1, None);

    assert!(fx.plan().is_empty());
}

#[rstest]
fn test_in_sync_tree_plans_no_mutations(size_mode: Fixture) {
    let fx = size_mode
        .with_local("a.txt", 3)
        .with_local("docs/b.txt", 4)
        .with_remote("a.txt", 3, None)
        .with_remote("docs/b.txt", 4, None);

    let plan = fx.plan();
    assert!(plan.uploads.is_empty());
    assert!(plan.removals.is_empty());
    assert_eq!(plan.baselines.len(), 2);
}
