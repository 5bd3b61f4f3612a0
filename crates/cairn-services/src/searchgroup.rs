//! One topic-scoped search group: its members and usage metadata.
//!
//! A `Searchgroup` is plain data. Concurrency is handled by the manager,
//! which wraps each group in its own lock; everything here assumes
//! exclusive access.

use cairn_core::{GroupSnapshot, OverlayKey};
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::subscriber::Subscriber;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Searchgroup {
    key: OverlayKey,
    /// Insertion-ordered, no two entries for the same (key, address, port).
    subscribers: Vec<Subscriber>,
    /// Unix ms. Only ever advances.
    last_time_of_use: u64,
    /// How many nodes are expected to hold a replica of this group.
    replication_radius: u32,
}

/// What a replicate merge changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    pub added: usize,
    pub removed: usize,
    /// The snapshot carried no subscribers; only metadata was updated.
    pub metadata_only: bool,
}

impl Searchgroup {
    pub fn new(key: OverlayKey, now: u64) -> Self {
        Self {
            key,
            subscribers: Vec::new(),
            last_time_of_use: now,
            replication_radius: 0,
        }
    }

    pub fn key(&self) -> &OverlayKey {
        &self.key
    }

    pub fn subscribers(&self) -> &[Subscriber] {
        &self.subscribers
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    pub fn last_time_of_use(&self) -> u64 {
        self.last_time_of_use
    }

    pub fn replication_radius(&self) -> u32 {
        self.replication_radius
    }

    pub fn set_replication_radius(&mut self, radius: u32) {
        self.replication_radius = radius;
    }

    /// Insert `sub` unless a subscriber with the same (key, address, port)
    /// is already present. Returns false and leaves the group untouched on
    /// a duplicate; the rejected value is dropped.
    pub fn add_subscriber(&mut self, sub: Subscriber) -> bool {
        if self.subscribers.iter().any(|s| s.same_peer(&sub)) {
            return false;
        }
        self.subscribers.push(sub);
        true
    }

    /// Advance `last_seen` of an existing member. Returns false if absent.
    pub fn refresh_subscriber(&mut self, key: &OverlayKey, address: &str, port: u16, now: u64) -> bool {
        match self
            .subscribers
            .iter_mut()
            .find(|s| s.is(key, address, port))
        {
            Some(sub) => {
                sub.touch(now);
                true
            }
            None => false,
        }
    }

    /// Up to `n` distinct members, drawn uniformly without replacement.
    /// Each call draws independently. With `n >= len()` every member is
    /// returned, in no particular order.
    pub fn random_peer_selection(&self, n: usize) -> Vec<Subscriber> {
        let mut rng = rand::thread_rng();
        self.subscribers
            .choose_multiple(&mut rng, n)
            .cloned()
            .collect()
    }

    /// Set the last-use time. Returns false (and changes nothing) if `now`
    /// is earlier than the stored value.
    pub fn set_last_time_of_use(&mut self, now: u64) -> bool {
        if now < self.last_time_of_use {
            return false;
        }
        self.last_time_of_use = now;
        true
    }

    /// Idle for longer than `ttl_ms` as of `now`.
    pub fn is_expired(&self, now: u64, ttl_ms: u64) -> bool {
        now.saturating_sub(self.last_time_of_use) > ttl_ms
    }

    /// Drop members not refreshed within `ttl_ms`. Returns how many went.
    pub fn expire_subscribers(&mut self, now: u64, ttl_ms: u64) -> usize {
        let before = self.subscribers.len();
        self.subscribers.retain(|s| !s.is_stale(now, ttl_ms));
        before - self.subscribers.len()
    }

    /// Merge a replica push into this group.
    ///
    /// Members are unioned with `add_subscriber` semantics, so redelivery is
    /// harmless; a member already present counts as seen at `now`. A full
    /// snapshot (`is_diff == false`) additionally drops
    /// local members the snapshot does not list. A snapshot with no members
    /// only updates the replication radius.
    pub fn merge(&mut self, snapshot: &GroupSnapshot, is_diff: bool, now: u64) -> MergeOutcome {
        self.replication_radius = snapshot.replication_radius;
        if snapshot.subscribers.is_empty() {
            return MergeOutcome {
                metadata_only: true,
                ..MergeOutcome::default()
            };
        }

        let mut outcome = MergeOutcome::default();
        for record in &snapshot.subscribers {
            if self.add_subscriber(Subscriber::from_record(record, now)) {
                outcome.added += 1;
            } else {
                self.refresh_subscriber(&record.key, &record.address, record.port, now);
            }
        }

        if !is_diff {
            let before = self.subscribers.len();
            self.subscribers.retain(|s| {
                snapshot
                    .subscribers
                    .iter()
                    .any(|r| s.is(&r.key, &r.address, r.port))
            });
            outcome.removed = before - self.subscribers.len();
        }

        self.set_last_time_of_use(snapshot.last_time_of_use);
        outcome
    }

    pub fn snapshot(&self) -> GroupSnapshot {
        GroupSnapshot {
            group_key: self.key,
            subscribers: self.subscribers.iter().map(Subscriber::to_record).collect(),
            replication_radius: self.replication_radius,
            last_time_of_use: self.last_time_of_use,
        }
    }

    /// Collapse duplicate members, keeping the first occurrence. Used on
    /// records read back from disk.
    pub(crate) fn dedupe(&mut self) {
        let subs = std::mem::take(&mut self.subscribers);
        for sub in subs {
            self.add_subscriber(sub);
        }
    }
}
