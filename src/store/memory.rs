use crate::entity::Entity;
use crate::errors::DbError;
use crate::types::{EntityId, Properties};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use super::clock::CreationClock;
use super::scan::{ScanIter, TypeEntries};
use super::wal::EntityLog;
use super::{EntityScan, EntityStore, ScanRange};

pub const DEFAULT_SCAN_BATCH: usize = 256;

/// Per-type state. `writer` serializes puts of one type; readers only take
/// the `entries` read lock, so a put waiting on a disk flush never blocks them.
#[derive(Default)]
struct TypeShard {
    writer: Mutex<()>,
    entries: Arc<RwLock<TypeEntries>>,
}

/// In-memory entity store with an optional write-ahead log for durability.
pub struct MemoryStore {
    clock: CreationClock,
    types: RwLock<HashMap<String, Arc<TypeShard>>>,
    by_id: RwLock<HashMap<EntityId, Arc<Entity>>>,
    log: Option<Mutex<EntityLog>>,
    open: Arc<AtomicBool>,
    scan_batch: usize,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Volatile store; nothing survives the process.
    #[must_use]
    pub fn new() -> Self {
        Self {
            clock: CreationClock::new(),
            types: RwLock::new(HashMap::new()),
            by_id: RwLock::new(HashMap::new()),
            log: None,
            open: Arc::new(AtomicBool::new(true)),
            scan_batch: DEFAULT_SCAN_BATCH,
        }
    }

    /// Store backed by an entity log at `path`, replaying what is already there.
    ///
    /// # Errors
    /// Returns an error if the log cannot be opened or is corrupt.
    pub fn open(path: &Path, sync_writes: bool) -> Result<Self, DbError> {
        let (log, entities) = EntityLog::open(path, sync_writes)?;
        log::info!("opening entity store at {}", log.path().display());
        let store = Self { log: Some(Mutex::new(log)), ..Self::new() };
        for entity in entities {
            store.clock.observe(entity.created);
            store.index(Arc::new(entity));
        }
        Ok(store)
    }

    #[must_use]
    pub fn with_scan_batch(mut self, batch: usize) -> Self {
        self.scan_batch = batch.max(1);
        self
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    fn ensure_open(&self) -> Result<(), DbError> {
        if self.is_open() {
            Ok(())
        } else {
            Err(DbError::StoreUnavailable("store is closed".into()))
        }
    }

    fn shard_for(&self, entity_type: &str) -> Arc<TypeShard> {
        if let Some(s) = self.types.read().get(entity_type) {
            return s.clone();
        }
        self.types.write().entry(entity_type.to_string()).or_default().clone()
    }

    fn index(&self, entity: Arc<Entity>) {
        let shard = self.shard_for(&entity.entity_type);
        shard.entries.write().insert(entity.sort_key(), entity.clone());
        self.by_id.write().insert(entity.id, entity);
    }
}

impl EntityStore for MemoryStore {
    fn put(&self, entity_type: &str, properties: Properties) -> Result<Arc<Entity>, DbError> {
        self.ensure_open()?;
        if entity_type.is_empty() {
            return Err(DbError::InvalidArgument("entity type must not be empty".into()));
        }
        let shard = self.shard_for(entity_type);
        // Timestamp, log append and insert run under the type's writer lock so
        // that scans never see a later timestamp before an earlier one. The
        // entries lock is held only for the insert.
        let writer = shard.writer.lock();
        let entity = Arc::new(Entity {
            id: EntityId::new(),
            entity_type: entity_type.to_string(),
            created: self.clock.next(),
            properties,
        });
        if let Some(log) = &self.log
            && let Err(e) = log.lock().append(&entity)
        {
            log::error!("entity log append failed for {}: {e}", entity.id);
            return Err(DbError::StoreUnavailable(e.to_string()));
        }
        shard.entries.write().insert(entity.sort_key(), entity.clone());
        drop(writer);
        self.by_id.write().insert(entity.id, entity.clone());
        log::debug!("put {} {} created={}", entity_type, entity.id, entity.created);
        Ok(entity)
    }

    fn get(&self, id: &EntityId) -> Result<Arc<Entity>, DbError> {
        self.ensure_open()?;
        self.by_id.read().get(id).cloned().ok_or_else(|| DbError::NotFound(id.to_string()))
    }

    fn scan_by_type(&self, entity_type: &str, range: ScanRange) -> Result<EntityScan<'_>, DbError> {
        self.ensure_open()?;
        let entries = self.types.read().get(entity_type).map(|s| s.entries.clone());
        Ok(Box::new(ScanIter::new(entries, range, self.scan_batch, self.open.clone())))
    }

    fn count(&self, entity_type: &str) -> Result<usize, DbError> {
        self.ensure_open()?;
        Ok(self.types.read().get(entity_type).map_or(0, |s| s.entries.read().len()))
    }

    fn close(&self) {
        if self.open.swap(false, Ordering::AcqRel) {
            log::info!("entity store closed");
        }
    }
}
