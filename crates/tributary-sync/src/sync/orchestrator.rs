//! Sync orchestrator
//!
//! Drives one connector's stream through the change detector, forwards
//! classified operations to the destination, and owns the job record for the
//! duration of the run. Retry never happens at this level: a run either
//! completes or fails, and per-request retry lives in the call wrapper.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info, trace};
use uuid::Uuid;

use tributary_common::{Result, SyncError};

use crate::config::SyncSettings;
use crate::connectors::{generate, Connector, DeletionPolicy, EntityStream};
use crate::entities::Entity;

use super::change::{ChangeDetector, Classification, HashStore};
use super::destination::{Destination, IndexOp};
use super::job::{JobMonitor, SyncJob};

/// Create a cancellation pair for [`SyncOrchestrator::run`]. Sending `true`
/// stops the run at its next suspension point.
pub fn cancel_channel() -> (watch::Sender<bool>, watch::Receiver<bool>) {
    watch::channel(false)
}

enum RunOutcome {
    StreamEnded,
    Cancelled,
    Fatal(SyncError),
}

/// One sync run. Sole writer of its job's counters and status.
pub struct SyncOrchestrator {
    detector: ChangeDetector,
    destination: Arc<dyn Destination>,
    settings: SyncSettings,
    job: SyncJob,
    publisher: watch::Sender<SyncJob>,
    processed: usize,
}

impl SyncOrchestrator {
    /// Build an orchestrator for one run and hand back the monitor used to
    /// poll job snapshots.
    pub fn new(
        sync_id: Uuid,
        store: Arc<dyn HashStore>,
        destination: Arc<dyn Destination>,
        settings: SyncSettings,
    ) -> (Self, JobMonitor) {
        let job = SyncJob::new(sync_id);
        let (publisher, rx) = watch::channel(job.clone());
        (
            Self {
                detector: ChangeDetector::new(store, sync_id),
                destination,
                settings,
                job,
                publisher,
                processed: 0,
            },
            JobMonitor::new(rx),
        )
    }

    /// Drain the connector to completion (or failure/cancellation) and return
    /// the terminal job.
    pub async fn run(
        mut self,
        connector: Box<dyn Connector>,
        mut cancel: watch::Receiver<bool>,
    ) -> SyncJob {
        let source = connector.name();
        let deletion_policy = connector.deletion_policy();

        self.job.start();
        self.publish();
        info!(job_id = %self.job.id, sync_id = %self.job.sync_id, source, "sync started");

        let mut stream = generate(connector, self.settings.channel_capacity);
        let outcome = self.drain(&mut stream, &mut cancel).await;

        match outcome {
            RunOutcome::StreamEnded => match stream.finish().await {
                Ok(()) => self.finalize(deletion_policy).await,
                Err(err) => self.job.fail(&err),
            },
            RunOutcome::Cancelled => {
                stream.cancel();
                let _ = stream.finish().await;
                self.job.fail(&SyncError::Cancelled);
            },
            RunOutcome::Fatal(err) => {
                stream.cancel();
                let _ = stream.finish().await;
                self.job.fail(&err);
            },
        }

        self.publish();
        info!(
            job_id = %self.job.id,
            status = self.job.status.as_str(),
            detected = self.job.chunks_detected,
            inserted = self.job.chunks_inserted,
            updated = self.job.chunks_updated,
            deleted = self.job.chunks_deleted,
            skipped = self.job.chunks_skipped,
            "sync finished"
        );
        self.job
    }

    async fn drain(
        &mut self,
        stream: &mut EntityStream,
        cancel: &mut watch::Receiver<bool>,
    ) -> RunOutcome {
        let mut cancel_open = true;
        loop {
            tokio::select! {
                biased;
                changed = cancel.changed(), if cancel_open => {
                    match changed {
                        Ok(()) if *cancel.borrow_and_update() => return RunOutcome::Cancelled,
                        Ok(()) => {},
                        // Sender dropped: cancellation can no longer arrive.
                        Err(_) => cancel_open = false,
                    }
                },
                maybe = stream.next() => {
                    match maybe {
                        Some(entity) => {
                            if let Err(err) = self.process(&entity).await {
                                return RunOutcome::Fatal(err);
                            }
                        },
                        None => return RunOutcome::StreamEnded,
                    }
                },
            }
        }
    }

    async fn process(&mut self, entity: &Entity) -> Result<()> {
        if !entity.is_indexable() {
            trace!(entity_id = %entity.entity_id, "hierarchy record, not tracked");
            return Ok(());
        }

        let hash = entity.content_hash();
        let classification = self.detector.classify(&entity.entity_id, &hash).await?;
        match classification {
            Classification::Insert => {
                self.destination.upsert(IndexOp::Insert, entity).await?;
            },
            Classification::Update => {
                self.destination.upsert(IndexOp::Update, entity).await?;
            },
            Classification::Skip => {
                trace!(entity_id = %entity.entity_id, "content unchanged");
            },
        }
        self.job.record(classification);

        self.processed += 1;
        if self.processed % self.settings.publish_every == 0 {
            self.publish();
        }
        Ok(())
    }

    /// Successful stream end: run the delete sweep (full-enumeration sources
    /// only), then mark the job completed.
    async fn finalize(&mut self, deletion_policy: DeletionPolicy) {
        if deletion_policy == DeletionPolicy::FullEnumeration {
            match self.detector.sweep().await {
                Ok(stale) if stale.is_empty() => {},
                Ok(stale) => {
                    debug!(count = stale.len(), "sweeping entities deleted upstream");
                    if let Err(err) = self.destination.delete(self.job.sync_id, &stale).await {
                        self.job.fail(&err);
                        return;
                    }
                    self.job.record_deleted(stale.len() as i64);
                },
                Err(err) => {
                    self.job.fail(&err);
                    return;
                },
            }
        } else {
            debug!(
                job_id = %self.job.id,
                "incremental source: skipping delete sweep"
            );
        }
        self.job.complete();
    }

    /// Publish a whole-job snapshot; readers never see a torn counter set.
    fn publish(&self) {
        self.publisher.send_replace(self.job.clone());
    }
}
