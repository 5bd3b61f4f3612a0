//! Sweeper: evicts idle groups and stale subscribers.
//!
//! One TTL governs both: a group unused for longer than `group_ttl` is
//! removed, and inside surviving groups any subscriber not refreshed within
//! the same window is dropped.
//!
//! Loaded groups are checked in memory. Groups that exist only on disk are
//! checked by reading their records, so nothing outlives the TTL just
//! because no one asked for it since a restart.
//!
//! Runs on two triggers: `maybe_sweep` after each successful subscribe
//! (skipped unless `sweep_interval` has passed since the last sweep), and
//! the periodic `run` loop.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use cairn_core::config::SearchGroupConfig;
use tokio::sync::broadcast;

use crate::manager::SearchGroupManager;
use crate::now_ms;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepStats {
    pub groups_removed: usize,
    pub subscribers_removed: usize,
}

impl SweepStats {
    pub fn is_empty(&self) -> bool {
        self.groups_removed == 0 && self.subscribers_removed == 0
    }
}

pub struct Sweeper {
    manager: Arc<SearchGroupManager>,
    ttl_ms: u64,
    interval_ms: u64,
    /// Unix ms of the last completed sweep.
    last_sweep: AtomicU64,
}

impl Sweeper {
    pub fn new(manager: Arc<SearchGroupManager>, config: &SearchGroupConfig) -> Self {
        Self::with_policy(manager, config.group_ttl(), config.sweep_interval())
    }

    pub fn with_policy(manager: Arc<SearchGroupManager>, ttl: Duration, interval: Duration) -> Self {
        Self {
            manager,
            ttl_ms: ttl.as_millis() as u64,
            interval_ms: interval.as_millis() as u64,
            last_sweep: AtomicU64::new(0),
        }
    }

    pub fn ttl_ms(&self) -> u64 {
        self.ttl_ms
    }

    pub fn sweep(&self) -> SweepStats {
        self.sweep_at(now_ms())
    }

    /// Evict everything idle as of `now`, in memory and on disk. Idempotent.
    pub fn sweep_at(&self, now: u64) -> SweepStats {
        let ttl = self.ttl_ms;
        let mut stats = SweepStats::default();
        for key in self.manager.keys() {
            let mut members = 0;
            let expired = self.manager.remove_if(&key, |group| {
                members = group.len();
                group.is_expired(now, ttl)
            });
            if expired {
                stats.groups_removed += 1;
                stats.subscribers_removed += members;
            } else {
                stats.subscribers_removed += self.manager.expire_subscribers(&key, now, ttl);
            }
        }

        // Stale members of records left on disk are dropped when loaded.
        if let Some(store) = self.manager.store() {
            for key in store.keys() {
                if let Some(members) = self.manager.expire_record(&key, now, ttl) {
                    stats.groups_removed += 1;
                    stats.subscribers_removed += members;
                }
            }
        }
        self.last_sweep.fetch_max(now, Ordering::AcqRel);

        if !stats.is_empty() {
            tracing::info!(
                groups = stats.groups_removed,
                subscribers = stats.subscribers_removed,
                remaining = self.manager.len(),
                "swept idle search groups"
            );
        }
        stats
    }

    /// Opportunistic sweep: runs only if a full interval has passed since
    /// the last one, and only in one caller when several race.
    pub fn maybe_sweep_at(&self, now: u64) -> Option<SweepStats> {
        let last = self.last_sweep.load(Ordering::Acquire);
        if now.saturating_sub(last) < self.interval_ms {
            return None;
        }
        if self
            .last_sweep
            .compare_exchange(last, now, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return None;
        }
        Some(self.sweep_at(now))
    }

    /// Periodic sweep loop. Returns when `shutdown` fires.
    pub async fn run(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) {
        let mut interval = tokio::time::interval(Duration::from_millis(self.interval_ms.max(1)));
        // The first tick completes immediately; skip it so startup does not sweep.
        interval.tick().await;
        tracing::info!(interval_ms = self.interval_ms, ttl_ms = self.ttl_ms, "sweeper starting");

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    tracing::info!("sweeper shutting down");
                    return;
                }

                _ = interval.tick() => {
                    let sweeper = self.clone();
                    // Sweeping takes blocking locks and may touch disk.
                    if let Err(e) = tokio::task::spawn_blocking(move || sweeper.sweep()).await {
                        tracing::warn!(error = %e, "sweep task failed");
                    }
                }
            }
        }
    }
}
