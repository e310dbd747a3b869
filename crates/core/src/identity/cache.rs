//! Read-through identity cache
//!
//! Reads take a shared lock on the kind's map and return immediately on a
//! hit. Misses, evictions and deletes serialize on a per-kind async mutex so
//! that a concurrent resolve can never repopulate an entry that is being
//! evicted, and duplicate first-use misses collapse into one durable insert.
//! Durable storage stays the authority: the map is only populated after the
//! store has confirmed the key.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use mtr_domain::{validate_identifier, EntityKind, MtrError, Pk, Resolved, Result};
use parking_lot::RwLock;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

use super::ports::IdentityStore;

#[derive(Default)]
struct KindShard {
    entries: RwLock<HashMap<String, Pk>>,
    write_lock: Mutex<()>,
}

impl KindShard {
    fn get(&self, id: &str) -> Option<Pk> {
        self.entries.read().get(id).copied()
    }

    fn put(&self, id: &str, pk: Pk) {
        self.entries.write().insert(id.to_owned(), pk);
    }

    fn remove(&self, id: &str) -> bool {
        self.entries.write().remove(id).is_some()
    }

    fn len(&self) -> usize {
        self.entries.read().len()
    }
}

/// Cache counters
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    creates: AtomicU64,
    evictions: AtomicU64,
}

impl CacheStats {
    fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    fn record_create(&self) {
        self.creates.fetch_add(1, Ordering::Relaxed);
    }

    fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CacheStatsSnapshot {
        CacheStatsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            creates: self.creates.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`CacheStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStatsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub creates: u64,
    pub evictions: u64,
}

impl CacheStatsSnapshot {
    /// Fraction of lookups answered from memory.
    #[allow(clippy::cast_precision_loss)]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Identity cache owned by the engine context and injected into services.
pub struct IdentityCache {
    store: Arc<dyn IdentityStore>,
    shards: [KindShard; EntityKind::ALL.len()],
    stats: CacheStats,
}

impl IdentityCache {
    pub fn new(store: Arc<dyn IdentityStore>) -> Self {
        Self {
            store,
            shards: std::array::from_fn(|_| KindShard::default()),
            stats: CacheStats::default(),
        }
    }

    fn shard(&self, kind: EntityKind) -> &KindShard {
        &self.shards[kind.index()]
    }

    /// Resolve `id` to its surrogate key, creating the identity on first
    /// use.
    ///
    /// # Errors
    /// `Validation` for a malformed identifier; storage errors propagate and
    /// leave the cache untouched.
    #[instrument(skip(self))]
    pub async fn resolve(&self, kind: EntityKind, id: &str) -> Result<Resolved> {
        validate_identifier(kind, id)?;
        let shard = self.shard(kind);

        if let Some(pk) = shard.get(id) {
            self.stats.record_hit();
            return Ok(Resolved::Found(pk));
        }
        self.stats.record_miss();

        let _guard = shard.write_lock.lock().await;

        // Another caller may have filled the entry while we waited.
        if let Some(pk) = shard.get(id) {
            return Ok(Resolved::Found(pk));
        }

        let op = || format!("resolve {kind} {id:?}");

        if let Some(pk) = self.store.find(kind, id).await.map_err(|e| e.context(op()))? {
            shard.put(id, pk);
            return Ok(Resolved::Found(pk));
        }

        let inserted = self.store.insert(kind, id).await.map_err(|e| e.context(op()))?;
        let pk = self.store.find(kind, id).await.map_err(|e| e.context(op()))?.ok_or_else(|| {
            MtrError::Internal(format!("{}: row missing after insert", op()))
        })?;
        shard.put(id, pk);

        if inserted {
            self.stats.record_create();
            info!(%pk, "identity created");
            Ok(Resolved::Created(pk))
        } else {
            debug!(%pk, "lost insert race; using existing identity");
            Ok(Resolved::Found(pk))
        }
    }

    /// Resolve without creating.
    ///
    /// # Errors
    /// `NotFound` when no identity exists for `id`.
    #[instrument(skip(self))]
    pub async fn lookup(&self, kind: EntityKind, id: &str) -> Result<Pk> {
        validate_identifier(kind, id)?;
        let shard = self.shard(kind);

        if let Some(pk) = shard.get(id) {
            self.stats.record_hit();
            return Ok(pk);
        }
        self.stats.record_miss();

        let _guard = shard.write_lock.lock().await;
        if let Some(pk) = shard.get(id) {
            return Ok(pk);
        }
        let found = self
            .store
            .find(kind, id)
            .await
            .map_err(|e| e.context(format!("lookup {kind} {id:?}")))?;
        match found {
            Some(pk) => {
                shard.put(id, pk);
                Ok(pk)
            }
            None => Err(MtrError::NotFound(format!("{kind} {id:?}"))),
        }
    }

    /// Drop the cache entry for `id`, if any.
    ///
    /// Takes the kind's write lock so an in-flight resolve cannot
    /// resurrect the entry afterwards.
    pub async fn evict(&self, kind: EntityKind, id: &str) -> bool {
        let shard = self.shard(kind);
        let _guard = shard.write_lock.lock().await;
        let removed = shard.remove(id);
        if removed {
            self.stats.record_eviction();
            debug!(%kind, id, "identity evicted");
        }
        removed
    }

    /// Delete the durable identity and evict it.
    ///
    /// # Errors
    /// `NotFound` if the identity does not exist; storage errors propagate
    /// and leave the cache entry in place.
    #[instrument(skip(self))]
    pub async fn delete(&self, kind: EntityKind, id: &str) -> Result<()> {
        validate_identifier(kind, id)?;
        let shard = self.shard(kind);
        let _guard = shard.write_lock.lock().await;

        let deleted = self
            .store
            .delete(kind, id)
            .await
            .map_err(|e| e.context(format!("delete {kind} {id:?}")))?;

        if shard.remove(id) {
            self.stats.record_eviction();
        }

        if deleted {
            info!("identity deleted");
            Ok(())
        } else {
            Err(MtrError::NotFound(format!("{kind} {id:?}")))
        }
    }

    /// Number of cached entries for `kind`.
    pub fn cached(&self, kind: EntityKind) -> usize {
        self.shard(kind).len()
    }

    pub fn stats(&self) -> CacheStatsSnapshot {
        self.stats.snapshot()
    }
}
