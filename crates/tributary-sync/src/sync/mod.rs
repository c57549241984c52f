//! Sync run lifecycle
//!
//! One [`SyncOrchestrator`] per run: it drains a connector's entity stream
//! through the [`ChangeDetector`], forwards classified operations to the
//! [`Destination`], and is the sole writer of the run's [`SyncJob`].

pub mod change;
pub mod destination;
pub mod job;
pub mod orchestrator;
pub mod store_pg;

pub use change::{ChangeDetector, Classification, HashStore, MemoryHashStore};
pub use destination::{Destination, IndexOp, LogDestination};
pub use job::{JobMonitor, SyncJob, SyncJobStatus};
pub use orchestrator::{cancel_channel, SyncOrchestrator};
pub use store_pg::PostgresHashStore;
