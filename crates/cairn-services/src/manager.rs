//! Search-group manager. Owns every locally held group.
//!
//! Groups live in a `DashMap` keyed by group key, each in its own
//! `Arc<Mutex<_>>` slot. Callers clone the `Arc` out and release the shard
//! before locking, so the map's lock covers only a lookup, insert or
//! removal and never group work or disk I/O. Work on one group never waits
//! on another.
//!
//! A slot removed while a caller waited on its lock is flagged; the caller
//! looks the key up again and gets whatever replaced it.
//!
//! `clear_all` must not interleave with any per-group operation. Every
//! operation holds a shared epoch guard for its whole duration and
//! `clear_all` takes it exclusively.
//!
//! Records read back from disk are held to the same TTL as live groups: an
//! idle record counts as absent and is deleted, and stale members are
//! dropped before the group is handed out.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard};
use std::time::Duration;

use cairn_core::{GroupSnapshot, OverlayKey, SgError};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::searchgroup::Searchgroup;
use crate::store::GroupStore;

struct Slot {
    group: Searchgroup,
    /// Set, under the slot lock, once the group has left the map.
    removed: bool,
}

type SharedSlot = Arc<Mutex<Slot>>;

fn new_slot(group: Searchgroup) -> SharedSlot {
    Arc::new(Mutex::new(Slot {
        group,
        removed: false,
    }))
}

fn lock_slot(slot: &SharedSlot) -> MutexGuard<'_, Slot> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct SearchGroupManager {
    groups: DashMap<OverlayKey, SharedSlot>,
    epoch: RwLock<()>,
    store: Option<GroupStore>,
    /// Idle limit for records loaded from disk. `u64::MAX` keeps them all.
    ttl_ms: u64,
}

impl Default for SearchGroupManager {
    fn default() -> Self {
        Self::new()
    }
}

impl SearchGroupManager {
    /// A manager with no persistence.
    pub fn new() -> Self {
        Self {
            groups: DashMap::new(),
            epoch: RwLock::new(()),
            store: None,
            ttl_ms: u64::MAX,
        }
    }

    /// A manager backed by an on-disk group database. Groups are loaded
    /// lazily on first reference.
    pub fn with_store(store: GroupStore) -> Self {
        Self {
            store: Some(store),
            ..Self::new()
        }
    }

    /// Expire records loaded from disk after `ttl` idle. Use the sweeper's
    /// TTL so a group is judged the same in memory and on disk.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl_ms = ttl.as_millis() as u64;
        self
    }

    pub fn store(&self) -> Option<&GroupStore> {
        self.store.as_ref()
    }

    /// Run `f` on a group under its lock: the one in memory, else the one
    /// on disk, else a new empty group stamped with `now`. Concurrent
    /// callers with the same key always share one instance.
    ///
    /// `f` must not call back into the manager for another group.
    pub fn with_group<R>(
        &self,
        key: &OverlayKey,
        now: u64,
        f: impl FnOnce(&mut Searchgroup) -> R,
    ) -> Result<R, SgError> {
        if key.is_empty() {
            return Err(SgError::UnspecifiedGroup);
        }
        let _epoch = self.read_epoch();
        loop {
            let slot = match self.lookup(key, now)? {
                Some(slot) => slot,
                None => self.insert_new(key, now),
            };
            let mut guard = lock_slot(&slot);
            if guard.removed {
                continue;
            }
            return Ok(f(&mut guard.group));
        }
    }

    /// Like `with_group`, but never creates: `Ok(None)` if the group is
    /// neither in memory nor on disk.
    pub fn with_existing<R>(
        &self,
        key: &OverlayKey,
        now: u64,
        f: impl FnOnce(&mut Searchgroup) -> R,
    ) -> Result<Option<R>, SgError> {
        if key.is_empty() {
            return Err(SgError::UnspecifiedGroup);
        }
        let _epoch = self.read_epoch();
        loop {
            let Some(slot) = self.lookup(key, now)? else {
                return Ok(None);
            };
            let mut guard = lock_slot(&slot);
            if guard.removed {
                continue;
            }
            return Ok(Some(f(&mut guard.group)));
        }
    }

    /// Remove one group from memory and disk. No-op if absent.
    pub fn remove(&self, key: &OverlayKey) -> bool {
        self.remove_if(key, |_| true)
    }

    /// Remove a group only if `pred` holds for it. The check and the removal
    /// happen under the group's lock, so a group refreshed concurrently is
    /// never removed on stale information.
    pub fn remove_if(&self, key: &OverlayKey, pred: impl FnOnce(&Searchgroup) -> bool) -> bool {
        let _epoch = self.read_epoch();
        let Some(slot) = self.live_slot(key) else {
            return false;
        };
        let mut guard = lock_slot(&slot);
        if guard.removed || !pred(&guard.group) {
            return false;
        }
        guard.removed = true;
        // Record first: once the key leaves the map a lookup goes to disk.
        if let Some(store) = &self.store {
            if let Err(e) = store.remove(key) {
                tracing::warn!(group = %key.short(), error = %e, "failed to remove persisted group");
            }
        }
        self.groups.remove_if(key, |_, current| Arc::ptr_eq(current, &slot));
        true
    }

    /// Drop every group, in memory and on disk. Waits for in-flight group
    /// operations to finish and holds off new ones until done.
    pub fn clear_all(&self) -> usize {
        let _epoch = self.epoch.write().unwrap_or_else(PoisonError::into_inner);
        let cleared = self.groups.len();
        self.groups.clear();
        if let Some(store) = &self.store {
            if let Err(e) = store.clear() {
                tracing::warn!(error = %e, "failed to erase persisted groups");
            }
        }
        tracing::info!(cleared, "search groups reset");
        cleared
    }

    /// Write a group through to disk. Best-effort: failures are logged and
    /// the in-memory state stays authoritative.
    pub fn persist(&self, group: &Searchgroup) {
        if let Some(store) = &self.store {
            if let Err(e) = store.save(group) {
                tracing::warn!(group = %group.key().short(), error = %e, "failed to persist group");
            }
        }
    }

    /// Read a group from disk as of `now`. `Ok(None)` without a store, a
    /// record, or when the record has been idle past the TTL, in which case
    /// it is deleted.
    pub fn load(&self, key: &OverlayKey, now: u64) -> Result<Option<Searchgroup>, SgError> {
        let Some(store) = &self.store else {
            return Ok(None);
        };
        let loaded = store.load(key).map_err(|e| {
            tracing::warn!(group = %key.short(), error = %e, "failed to load group");
            SgError::Storage(e.to_string())
        })?;
        let Some(mut group) = loaded else {
            return Ok(None);
        };

        if group.is_expired(now, self.ttl_ms) {
            tracing::debug!(
                group = %key.short(),
                last_used = group.last_time_of_use(),
                "expired group record discarded"
            );
            self.discard_record(key);
            return Ok(None);
        }
        let stale = group.expire_subscribers(now, self.ttl_ms);
        if stale > 0 {
            tracing::debug!(group = %key.short(), stale, "stale members dropped on load");
        }
        Ok(Some(group))
    }

    /// Drop stale members of a live group and persist it if anything went.
    pub fn expire_subscribers(&self, key: &OverlayKey, now: u64, ttl_ms: u64) -> usize {
        let _epoch = self.read_epoch();
        let Some(slot) = self.live_slot(key) else {
            return 0;
        };
        let mut guard = lock_slot(&slot);
        if guard.removed {
            return 0;
        }
        let removed = guard.group.expire_subscribers(now, ttl_ms);
        if removed > 0 {
            self.persist(&guard.group);
        }
        removed
    }

    /// Delete the record of a group that is not in memory if it has been
    /// idle longer than `ttl_ms`. Returns the member count it held.
    pub fn expire_record(&self, key: &OverlayKey, now: u64, ttl_ms: u64) -> Option<usize> {
        let store = self.store.as_ref()?;
        let _epoch = self.read_epoch();
        if self.groups.contains_key(key) {
            return None;
        }
        let group = match store.load(key) {
            Ok(Some(group)) => group,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(group = %key.short(), error = %e, "unreadable group record left in place");
                return None;
            }
        };
        if !group.is_expired(now, ttl_ms) {
            return None;
        }
        self.discard_record(key).then_some(group.len())
    }

    /// Number of groups in memory.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn contains(&self, key: &OverlayKey) -> bool {
        self.groups.contains_key(key)
    }

    pub fn keys(&self) -> Vec<OverlayKey> {
        self.groups.iter().map(|e| *e.key()).collect()
    }

    /// Snapshot of one in-memory group.
    pub fn snapshot(&self, key: &OverlayKey) -> Option<GroupSnapshot> {
        let _epoch = self.read_epoch();
        let slot = self.live_slot(key)?;
        let guard = lock_slot(&slot);
        (!guard.removed).then(|| guard.group.snapshot())
    }

    /// Snapshots of every in-memory group, sorted by key.
    pub fn snapshots(&self) -> Vec<GroupSnapshot> {
        let mut keys = self.keys();
        keys.sort();
        keys.iter().filter_map(|k| self.snapshot(k)).collect()
    }

    /// Total members across in-memory groups.
    pub fn subscriber_count(&self) -> usize {
        let _epoch = self.read_epoch();
        let slots: Vec<SharedSlot> = self.groups.iter().map(|e| e.value().clone()).collect();
        slots
            .iter()
            .map(|slot| {
                let guard = lock_slot(slot);
                if guard.removed { 0 } else { guard.group.len() }
            })
            .sum()
    }

    /// The in-memory slot for `key`, without touching disk.
    fn live_slot(&self, key: &OverlayKey) -> Option<SharedSlot> {
        self.groups.get(key).map(|slot| slot.value().clone())
    }

    /// The in-memory slot for `key`, else one loaded from disk. Disk I/O
    /// happens outside the map lock; if another caller wins the insert race
    /// the loaded copy is dropped.
    fn lookup(&self, key: &OverlayKey, now: u64) -> Result<Option<SharedSlot>, SgError> {
        if let Some(slot) = self.live_slot(key) {
            return Ok(Some(slot));
        }
        let Some(group) = self.load(key, now)? else {
            return Ok(None);
        };
        let slot = self
            .groups
            .entry(*key)
            .or_insert_with(|| {
                tracing::debug!(group = %key.short(), subscribers = group.len(), "group loaded");
                new_slot(group)
            })
            .value()
            .clone();
        Ok(Some(slot))
    }

    fn insert_new(&self, key: &OverlayKey, now: u64) -> SharedSlot {
        self.groups
            .entry(*key)
            .or_insert_with(|| {
                tracing::debug!(group = %key.short(), "group created");
                new_slot(Searchgroup::new(*key, now))
            })
            .value()
            .clone()
    }

    /// Unlink a group's record, but only while the group is not in memory:
    /// a live group owns its record. The shard stays locked across the
    /// unlink so no load can slip in between.
    fn discard_record(&self, key: &OverlayKey) -> bool {
        let Some(store) = &self.store else {
            return false;
        };
        let entry = self.groups.entry(*key);
        if !matches!(entry, Entry::Vacant(_)) {
            return false;
        }
        let discarded = match store.remove(key) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(group = %key.short(), error = %e, "failed to discard expired group");
                false
            }
        };
        drop(entry);
        discarded
    }

    fn read_epoch(&self) -> RwLockReadGuard<'_, ()> {
        self.epoch.read().unwrap_or_else(PoisonError::into_inner)
    }
}
