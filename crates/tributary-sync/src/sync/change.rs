//! Content-hash change detection
//!
//! The detector compares each incoming entity's content hash against the
//! recorded hash for `(sync_id, entity_id)` and classifies it:
//!
//! 1. no prior record → `Insert`, hash recorded
//! 2. prior record, hash differs → `Update`, hash recorded
//! 3. prior record, hash equal → `Skip`, no write
//! 4. after the stream ends, records untouched this run are deleted
//!
//! The touched set plus the sweep's complement exactly partitions every
//! previously known record for the sync — no record is silently orphaned.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use uuid::Uuid;

use tributary_common::{Result, SyncError};

/// How the orchestrator should treat one classified entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Insert,
    Update,
    Skip,
}

/// External persistence for `(sync_id, entity_id) → content_hash` records.
///
/// Reads and writes failing here are fatal for the run. The read-then-write
/// sequence needs per-`(sync_id, entity_id)` exclusion only if multiple
/// producers could race on one entity; a single connector's sequential
/// stream satisfies that by construction.
#[async_trait]
pub trait HashStore: Send + Sync {
    async fn get(&self, sync_id: Uuid, entity_id: &str) -> Result<Option<String>>;

    async fn put(&self, sync_id: Uuid, entity_id: &str, hash: &str) -> Result<()>;

    /// Remove every record for `sync_id` whose entity id is not in `touched`,
    /// returning the removed ids.
    async fn delete_untouched(
        &self,
        sync_id: Uuid,
        touched: &HashSet<String>,
    ) -> Result<Vec<String>>;
}

/// In-memory hash store for tests and single-shot runs.
#[derive(Default)]
pub struct MemoryHashStore {
    records: Mutex<HashMap<(Uuid, String), String>>,
}

impl MemoryHashStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<(Uuid, String), String>>> {
        self.records
            .lock()
            .map_err(|_| SyncError::HashStore("hash store mutex poisoned".into()))
    }
}

#[async_trait]
impl HashStore for MemoryHashStore {
    async fn get(&self, sync_id: Uuid, entity_id: &str) -> Result<Option<String>> {
        Ok(self.lock()?.get(&(sync_id, entity_id.to_string())).cloned())
    }

    async fn put(&self, sync_id: Uuid, entity_id: &str, hash: &str) -> Result<()> {
        self.lock()?
            .insert((sync_id, entity_id.to_string()), hash.to_string());
        Ok(())
    }

    async fn delete_untouched(
        &self,
        sync_id: Uuid,
        touched: &HashSet<String>,
    ) -> Result<Vec<String>> {
        let mut records = self.lock()?;
        let stale: Vec<String> = records
            .keys()
            .filter(|(id, entity_id)| *id == sync_id && !touched.contains(entity_id))
            .map(|(_, entity_id)| entity_id.clone())
            .collect();
        for entity_id in &stale {
            records.remove(&(sync_id, entity_id.clone()));
        }
        Ok(stale)
    }
}

/// Per-run change detector. Owns the touched set; never writes the job.
pub struct ChangeDetector {
    store: Arc<dyn HashStore>,
    sync_id: Uuid,
    touched: HashSet<String>,
}

impl ChangeDetector {
    pub fn new(store: Arc<dyn HashStore>, sync_id: Uuid) -> Self {
        Self {
            store,
            sync_id,
            touched: HashSet::new(),
        }
    }

    /// Classify one entity by its content hash, recording the hash for
    /// inserts and updates.
    pub async fn classify(&mut self, entity_id: &str, hash: &str) -> Result<Classification> {
        let prior = self.store.get(self.sync_id, entity_id).await?;
        self.touched.insert(entity_id.to_string());

        match prior {
            None => {
                self.store.put(self.sync_id, entity_id, hash).await?;
                Ok(Classification::Insert)
            },
            Some(prior) if prior != hash => {
                self.store.put(self.sync_id, entity_id, hash).await?;
                Ok(Classification::Update)
            },
            Some(_) => Ok(Classification::Skip),
        }
    }

    /// End-of-run sweep: remove and return every record not touched this run.
    pub async fn sweep(&self) -> Result<Vec<String>> {
        self.store
            .delete_untouched(self.sync_id, &self.touched)
            .await
    }

    pub fn touched(&self) -> &HashSet<String> {
        &self.touched
    }
}
