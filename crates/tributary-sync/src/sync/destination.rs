//! Indexing destination interface
//!
//! The index that consumes classified operations is an external collaborator.
//! It is expected to be idempotent under retry of the same operation for the
//! same entity id.

use async_trait::async_trait;
use tracing::info;
use uuid::Uuid;

use tributary_common::Result;

use crate::entities::Entity;

/// Operation attached to an upserted entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexOp {
    Insert,
    Update,
}

#[async_trait]
pub trait Destination: Send + Sync {
    /// Apply an insert or update for one entity.
    async fn upsert(&self, op: IndexOp, entity: &Entity) -> Result<()>;

    /// Remove entities deleted upstream, identified by id.
    async fn delete(&self, sync_id: Uuid, entity_ids: &[String]) -> Result<()>;
}

/// Stand-in destination that logs every operation. Useful for dry runs and
/// as the CLI default when no index is wired up.
#[derive(Default)]
pub struct LogDestination;

impl LogDestination {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Destination for LogDestination {
    async fn upsert(&self, op: IndexOp, entity: &Entity) -> Result<()> {
        info!(
            op = ?op,
            entity_id = %entity.entity_id,
            content_len = entity.content.len(),
            "index upsert"
        );
        Ok(())
    }

    async fn delete(&self, sync_id: Uuid, entity_ids: &[String]) -> Result<()> {
        info!(%sync_id, count = entity_ids.len(), "index delete");
        Ok(())
    }
}
