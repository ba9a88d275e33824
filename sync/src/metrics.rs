//! Counters for one reconciliation pass

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// Outcome of a reconciliation pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassReport {
    /// Unique pass identifier
    pub session_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Files uploaded by the upload-missing stage
    pub uploaded: usize,
    /// Remote objects removed by the remove-orphaned stage
    pub removed: usize,
    /// Files re-uploaded by the update-changed stage
    pub updated: usize,
    /// Ineligible or vanished files
    pub skipped: usize,
    /// Per-file failures
    pub failed: usize,
    /// Paths still waiting for a confirmed upload, sorted
    pub pending: Vec<PathBuf>,
}

impl Default for PassReport {
    fn default() -> Self {
        Self::new()
    }
}

impl PassReport {
    pub fn new() -> Self {
        Self {
            session_id: Uuid::new_v4(),
            started_at: Utc::now(),
            finished_at: None,
            uploaded: 0,
            removed: 0,
            updated: 0,
            skipped: 0,
            failed: 0,
            pending: Vec::new(),
        }
    }

    pub fn finish(&mut self, pending: impl IntoIterator<Item = PathBuf>) {
        let mut pending: Vec<PathBuf> = pending.into_iter().collect();
        pending.sort();
        self.pending = pending;
        self.finished_at = Some(Utc::now());
    }

    pub fn duration(&self) -> Option<chrono::Duration> {
        self.finished_at.map(|finished| finished - self.started_at)
    }

    /// Number of remote mutations the pass performed
    pub fn mutations(&self) -> usize {
        self.uploaded + self.removed + self.updated
    }

    pub fn is_clean(&self) -> bool {
        self.failed == 0 && self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_report_is_clean() {
        let report = PassReport::new();
        assert!(report.is_clean());
        assert_eq!(report.mutations(), 0);
        assert!(report.duration().is_none());
    }

    #[test]
    fn test_finish_sorts_pending() {
        let mut report = PassReport::new();
        report.uploaded = 2;
        report.failed = 1;
        report.finish(vec![PathBuf::from("b.txt"), PathBuf::from("a.txt")]);

        assert_eq!(report.pending, vec![PathBuf::from("a.txt"), PathBuf::from("b.txt")]);
        assert!(!report.is_clean());
        assert!(report.duration().is_some());
        assert_eq!(report.mutations(), 2);
    }

    #[test]
    fn test_report_serializes() {
        let report = PassReport::new();
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["uploaded"], 0);
        assert!(json["session_id"].is_string());
    }
}
