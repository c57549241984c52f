//! Connector framework
//!
//! A connector adapts one external source into the normalized entity stream:
//! it authenticates, paginates, and emits [`Entity`] values through an
//! [`EntitySink`]. [`generate`] turns a connector into a lazy, finite,
//! non-restartable stream: the producer runs as its own task, the consumer
//! pulls from a bounded channel, and backpressure suspends the producer at
//! its next network call.
//!
//! Failure semantics, uniform across sources:
//!
//! - a malformed record is logged and skipped; the stream continues
//! - a structural failure (auth expired, connection refused, retry
//!   exhaustion) propagates out of [`Connector::run`] and terminates the
//!   stream

pub mod discord;
pub mod dixa;
pub mod http;
pub mod intercom;
pub mod postgres;

use async_trait::async_trait;
use futures::channel::mpsc;
use futures::{SinkExt, StreamExt};
use tokio::task::JoinHandle;
use tracing::{debug, error};

use tributary_common::{Result, SyncError};

use crate::entities::Entity;

/// What the absence of a previously seen entity means for this source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletionPolicy {
    /// Every run emits the complete live set; anything untouched at the end
    /// of a run has been deleted upstream.
    FullEnumeration,
    /// Runs emit deltas; untouched entities are left alone.
    Incremental,
}

/// A source adapter producing the normalized entity stream.
#[async_trait]
pub trait Connector: Send {
    /// Short source label used in logs and job records, e.g. `"discord"`.
    fn name(&self) -> &'static str;

    /// Deletion semantics for this source. All shipped connectors enumerate
    /// their full live set per run.
    fn deletion_policy(&self) -> DeletionPolicy {
        DeletionPolicy::FullEnumeration
    }

    /// Produce the full entity stream for one sync run.
    ///
    /// Called at most once per connector instance; cursor state is owned by
    /// the connector and not reusable across runs.
    async fn run(&mut self, out: &mut EntitySink) -> Result<()>;
}

/// Producer-side handle for emitting entities into the stream.
pub struct EntitySink {
    tx: mpsc::Sender<Entity>,
}

impl EntitySink {
    /// Emit one entity, suspending on backpressure.
    ///
    /// Fails with [`SyncError::Cancelled`] once the consumer has dropped the
    /// stream, which unwinds the producer at its next emission.
    pub async fn emit(&mut self, entity: Entity) -> Result<()> {
        self.tx
            .send(entity)
            .await
            .map_err(|_| SyncError::Cancelled)
    }
}

/// Consumer side of a running connector: the entity stream plus the
/// producer's terminal result.
pub struct EntityStream {
    rx: Option<mpsc::Receiver<Entity>>,
    handle: JoinHandle<Result<()>>,
}

impl EntityStream {
    /// Pull the next entity; `None` once the producer is done (or after
    /// [`cancel`](Self::cancel)).
    pub async fn next(&mut self) -> Option<Entity> {
        match self.rx.as_mut() {
            Some(rx) => rx.next().await,
            None => None,
        }
    }

    /// Stop consuming. The producer observes the closed channel at its next
    /// emission and unwinds.
    pub fn cancel(&mut self) {
        if let Some(mut rx) = self.rx.take() {
            rx.close();
        }
    }

    /// Await the producer's terminal result. Call after the stream is
    /// exhausted or cancelled.
    pub async fn finish(self) -> Result<()> {
        drop(self.rx);
        match self.handle.await {
            Ok(result) => result,
            Err(err) => Err(SyncError::Upstream {
                status: None,
                detail: format!("connector task panicked: {err}"),
            }),
        }
    }
}

/// Spawn a connector as a cooperative producer and return its stream.
///
/// One producer task per run; pages of the same connector are fetched
/// strictly sequentially because the producer is a single task whose cursor
/// state feeds each request from the previous response.
pub fn generate(mut connector: Box<dyn Connector>, capacity: usize) -> EntityStream {
    let (tx, rx) = mpsc::channel(capacity);
    let source = connector.name();
    let handle = tokio::spawn(async move {
        let mut sink = EntitySink { tx };
        let result = connector.run(&mut sink).await;
        match &result {
            Ok(()) => debug!(source, "connector stream complete"),
            Err(SyncError::Cancelled) => debug!(source, "connector stream cancelled"),
            Err(err) => error!(source, error = %err, "connector stream terminated"),
        }
        result
    });
    EntityStream {
        rx: Some(rx),
        handle,
    }
}
