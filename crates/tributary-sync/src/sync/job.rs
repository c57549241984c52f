//! Sync job record and state machine
//!
//! `PENDING → IN_PROGRESS → { COMPLETED, FAILED }`. The job is created
//! pending by the caller, owned exclusively by the orchestrator for the run,
//! and immutable once terminal. Counters accumulated before a failure are
//! preserved: a failed sync reads as a partially-progressed job, not a no-op.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::warn;
use uuid::Uuid;

use tributary_common::SyncError;

use super::change::Classification;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncJobStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl SyncJobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncJobStatus::Pending => "pending",
            SyncJobStatus::InProgress => "in_progress",
            SyncJobStatus::Completed => "completed",
            SyncJobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SyncJobStatus::Completed | SyncJobStatus::Failed)
    }
}

/// One execution instance of a sync, with counters and terminal status.
///
/// Serializable as-is: a clone of this struct is the read-only snapshot
/// exposed to status pollers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncJob {
    pub id: Uuid,
    pub sync_id: Uuid,
    pub status: SyncJobStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
    pub chunks_detected: i64,
    pub chunks_inserted: i64,
    pub chunks_updated: i64,
    pub chunks_deleted: i64,
    pub chunks_skipped: i64,
    pub error: Option<String>,
}

impl SyncJob {
    pub fn new(sync_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            sync_id,
            status: SyncJobStatus::Pending,
            started_at: None,
            completed_at: None,
            failed_at: None,
            chunks_detected: 0,
            chunks_inserted: 0,
            chunks_updated: 0,
            chunks_deleted: 0,
            chunks_skipped: 0,
            error: None,
        }
    }

    /// Begin draining the stream.
    pub fn start(&mut self) {
        if self.guard_terminal("start") {
            return;
        }
        self.status = SyncJobStatus::InProgress;
        self.started_at = Some(Utc::now());
    }

    /// Record one classified entity. Detected counts every classification;
    /// exactly one of inserted/updated/skipped also increments.
    pub fn record(&mut self, classification: Classification) {
        if self.guard_terminal("record") {
            return;
        }
        self.chunks_detected += 1;
        match classification {
            Classification::Insert => self.chunks_inserted += 1,
            Classification::Update => self.chunks_updated += 1,
            Classification::Skip => self.chunks_skipped += 1,
        }
    }

    /// Record the end-of-run delete sweep. Deletes are not "detected":
    /// nothing was emitted for them this run.
    pub fn record_deleted(&mut self, count: i64) {
        if self.guard_terminal("record_deleted") {
            return;
        }
        self.chunks_deleted += count;
    }

    pub fn complete(&mut self) {
        if self.guard_terminal("complete") {
            return;
        }
        self.status = SyncJobStatus::Completed;
        self.completed_at = Some(Utc::now());
    }

    pub fn fail(&mut self, error: &SyncError) {
        if self.guard_terminal("fail") {
            return;
        }
        self.status = SyncJobStatus::Failed;
        self.failed_at = Some(Utc::now());
        self.error = Some(error.summary());
    }

    fn guard_terminal(&self, op: &str) -> bool {
        if self.status.is_terminal() {
            warn!(job_id = %self.id, op, "ignoring transition on terminal job");
            true
        } else {
            false
        }
    }
}

/// Read-only view of a running job, updated at batch granularity.
#[derive(Debug, Clone)]
pub struct JobMonitor {
    rx: watch::Receiver<SyncJob>,
}

impl JobMonitor {
    pub(crate) fn new(rx: watch::Receiver<SyncJob>) -> Self {
        Self { rx }
    }

    /// Latest published snapshot. Snapshots are published whole, so a reader
    /// never observes a torn counter set.
    pub fn snapshot(&self) -> SyncJob {
        self.rx.borrow().clone()
    }

    /// Wait for the next published snapshot.
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_counters() {
        let mut job = SyncJob::new(Uuid::new_v4());
        assert_eq!(job.status, SyncJobStatus::Pending);

        job.start();
        assert_eq!(job.status, SyncJobStatus::InProgress);
        assert!(job.started_at.is_some());

        job.record(Classification::Insert);
        job.record(Classification::Update);
        job.record(Classification::Skip);
        job.record_deleted(2);

        assert_eq!(job.chunks_detected, 3);
        assert_eq!(job.chunks_inserted, 1);
        assert_eq!(job.chunks_updated, 1);
        assert_eq!(job.chunks_skipped, 1);
        assert_eq!(job.chunks_deleted, 2);

        job.complete();
        assert_eq!(job.status, SyncJobStatus::Completed);
        assert!(job.completed_at.is_some());
    }

    #[test]
    fn test_terminal_jobs_are_immutable() {
        let mut job = SyncJob::new(Uuid::new_v4());
        job.start();
        job.record(Classification::Insert);
        job.fail(&SyncError::Cancelled);

        let failed_at = job.failed_at;
        job.record(Classification::Insert);
        job.complete();

        assert_eq!(job.status, SyncJobStatus::Failed);
        assert_eq!(job.chunks_inserted, 1);
        assert_eq!(job.failed_at, failed_at);
    }

    #[test]
    fn test_failure_preserves_partial_counters() {
        let mut job = SyncJob::new(Uuid::new_v4());
        job.start();
        for _ in 0..5 {
            job.record(Classification::Insert);
        }
        job.fail(&SyncError::Upstream {
            status: Some(502),
            detail: "bad gateway".to_string(),
        });

        assert_eq!(job.chunks_inserted, 5);
        assert_eq!(job.chunks_detected, 5);
        let error = job.error.unwrap();
        assert!(error.contains("502"));
        assert!(!error.contains('\n'));
    }

    #[test]
    fn test_deletes_are_not_detected() {
        let mut job = SyncJob::new(Uuid::new_v4());
        job.start();
        job.record_deleted(4);
        assert_eq!(job.chunks_deleted, 4);
        assert_eq!(job.chunks_detected, 0);
    }
}
