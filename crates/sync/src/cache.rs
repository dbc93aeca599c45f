//! Keyed in-memory store of server-owned entities.
//!
//! The cache never merges partial fields: [`EntityCache::upsert`] always
//! replaces the whole entity, trusting the last full write. This avoids
//! field-level merge conflicts entirely — the server echo or a forced
//! reload is the only reconciliation mechanism.

use std::collections::HashMap;

use callsheet_core::types::{DbId, Timestamp};
use callsheet_core::{Project, Shot};

/// An entity that can live in an [`EntityCache`].
pub trait CachedEntity: Clone {
    /// Stable server-issued id, unique within the collection.
    fn id(&self) -> DbId;

    /// Stamp the local modification time as part of an optimistic write.
    fn touch(&mut self, now: Timestamp);
}

impl CachedEntity for Project {
    fn id(&self) -> DbId {
        self.id
    }

    fn touch(&mut self, now: Timestamp) {
        self.updated_at = now;
    }
}

impl CachedEntity for Shot {
    fn id(&self) -> DbId {
        self.id
    }

    fn touch(&mut self, now: Timestamp) {
        self.updated_at = now;
    }
}

/// In-memory keyed store for one collection of entities.
///
/// Owned exclusively by its store; consumers read snapshots and issue
/// intents, they never hold references into the cache.
#[derive(Debug, Clone)]
pub struct EntityCache<T> {
    entries: HashMap<DbId, T>,
}

impl<T: CachedEntity> EntityCache<T> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Look up one entity by id.
    pub fn get(&self, id: DbId) -> Option<&T> {
        self.entries.get(&id)
    }

    /// Insert or replace a complete entity. No field merging.
    pub fn upsert(&mut self, entity: T) {
        self.entries.insert(entity.id(), entity);
    }

    /// Remove an entity. Returns the removed value, if present.
    pub fn remove(&mut self, id: DbId) -> Option<T> {
        self.entries.remove(&id)
    }

    /// Drop everything and install a freshly-loaded collection.
    pub fn replace_all(&mut self, entities: Vec<T>) {
        self.entries.clear();
        for entity in entities {
            self.entries.insert(entity.id(), entity);
        }
    }

    /// All cached entities, ordered by id for determinism.
    pub fn snapshot(&self) -> Vec<T> {
        let mut all: Vec<T> = self.entries.values().cloned().collect();
        all.sort_by_key(|e| e.id());
        all
    }

    /// All cached ids, in no particular order.
    pub fn ids(&self) -> Vec<DbId> {
        self.entries.keys().copied().collect()
    }

    pub fn contains(&self, id: DbId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl<T: CachedEntity> Default for EntityCache<T> {
    fn default() -> Self {
        Self::new()
    }
}
