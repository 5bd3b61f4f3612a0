//! Overlay node: binds the search-group RPCs to the manager and sweeper.
//!
//! Construction is side-effect free. `start` spawns the background work
//! (periodic sweep, vnode watcher) and returns a handle that stops it.

use std::sync::Arc;

use cairn_core::config::SearchGroupConfig;
use cairn_core::{
    GroupSnapshot, OverlayKey, PeerRecord, ReplicateRequest, ReplicateResponse, Status,
    SubscribeRequest, SubscribeResponse,
};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::manager::SearchGroupManager;
use crate::routing::{RoutingNode, VnodeEvent};
use crate::searchgroup::Searchgroup;
use crate::service::SearchGroupRpc;
use crate::subscriber::Subscriber;
use crate::sweeper::Sweeper;
use crate::now_ms;

pub struct OverlayNode {
    routing: Arc<dyn RoutingNode>,
    manager: Arc<SearchGroupManager>,
    sweeper: Arc<Sweeper>,
    max_returned_peers: usize,
}

impl OverlayNode {
    pub fn new(
        config: &SearchGroupConfig,
        routing: Arc<dyn RoutingNode>,
        manager: Arc<SearchGroupManager>,
    ) -> Self {
        let sweeper = Arc::new(Sweeper::new(manager.clone(), config));
        Self {
            routing,
            manager,
            sweeper,
            max_returned_peers: config.max_returned_peers.max(1),
        }
    }

    pub fn manager(&self) -> &Arc<SearchGroupManager> {
        &self.manager
    }

    pub fn sweeper(&self) -> &Arc<Sweeper> {
        &self.sweeper
    }

    pub fn routing(&self) -> &Arc<dyn RoutingNode> {
        &self.routing
    }

    pub fn max_returned_peers(&self) -> usize {
        self.max_returned_peers
    }

    /// Group placement follows the virtual nodes, so everything held
    /// locally is dropped when they change.
    pub fn reset_vnodes_dependent(&self) -> usize {
        self.manager.clear_all()
    }

    /// Spawn the sweep loop and the vnode watcher. Must be called from
    /// inside a tokio runtime.
    pub fn start(self: &Arc<Self>) -> NodeHandle {
        if !self.routing.has_persistent_data() {
            tracing::info!("no persistent vnode data, resetting search groups");
            self.reset_vnodes_dependent();
        }

        let (shutdown_tx, _) = broadcast::channel::<()>(1);

        let sweep_task = tokio::spawn(self.sweeper.clone().run(shutdown_tx.subscribe()));

        let vnode_task = {
            let node = self.clone();
            let events = self.routing.subscribe_vnode_events();
            let shutdown = shutdown_tx.subscribe();
            tokio::spawn(async move { node.watch_vnodes(events, shutdown).await })
        };

        let keys = self.routing.node_keys();
        tracing::info!(
            node = %keys.first().map(OverlayKey::short).unwrap_or_default(),
            vnodes = keys.len().saturating_sub(1),
            addr = %self.routing.net_address(),
            "overlay node started"
        );

        NodeHandle {
            shutdown_tx,
            tasks: vec![sweep_task, vnode_task],
        }
    }

    async fn watch_vnodes(
        self: Arc<Self>,
        mut events: broadcast::Receiver<VnodeEvent>,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    tracing::info!("vnode watcher shutting down");
                    return;
                }

                event = events.recv() => {
                    match event {
                        Ok(VnodeEvent::Regenerated { generation }) => {
                            tracing::info!(generation, "vnodes regenerated, dropping search groups");
                        }
                        Err(broadcast::error::RecvError::Lagged(missed)) => {
                            tracing::warn!(missed, "missed vnode events, dropping search groups");
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            tracing::debug!("vnode event source closed");
                            return;
                        }
                    }
                    let node = self.clone();
                    if let Err(e) = tokio::task::spawn_blocking(move || node.reset_vnodes_dependent()).await {
                        tracing::warn!(error = %e, "search group reset failed");
                    }
                }
            }
        }
    }

    /// Subscribe handler with an explicit clock.
    pub fn subscribe_at(&self, req: &SubscribeRequest, now: u64) -> SubscribeResponse {
        if req.group_key.is_empty() {
            tracing::debug!(sender = %req.sender_key.short(), "subscribe without group key");
            return SubscribeResponse::failed(Status::UnspecifiedGroup);
        }

        // An undisclosed sender is only asking who is there.
        let subscribe = !req.sender_addr.is_unspecified();

        let joined = self.manager.with_group(&req.group_key, now, |sg| {
            let peers: Vec<PeerRecord> = if sg.len() > self.max_returned_peers {
                sg.random_peer_selection(self.max_returned_peers)
                    .iter()
                    .map(Subscriber::to_record)
                    .collect()
            } else {
                sg.subscribers().iter().map(Subscriber::to_record).collect()
            };

            if subscribe {
                let sub = Subscriber::new(req.sender_key, &req.sender_addr, now);
                if sg.add_subscriber(sub) {
                    tracing::debug!(
                        group = %req.group_key.short(),
                        peer = %req.sender_key.short(),
                        addr = %req.sender_addr,
                        members = sg.len(),
                        "subscriber joined"
                    );
                } else {
                    sg.refresh_subscriber(
                        &req.sender_key,
                        &req.sender_addr.host,
                        req.sender_addr.port,
                        now,
                    );
                }
            }

            sg.set_last_time_of_use(now);
            self.manager.persist(sg);
            peers
        });
        let peers = match joined {
            Ok(peers) => peers,
            Err(e) => {
                tracing::warn!(group = %req.group_key.short(), error = %e, "subscribe failed to find group");
                return SubscribeResponse::failed(Status::from(&e));
            }
        };

        self.sweeper.maybe_sweep_at(now);

        SubscribeResponse {
            peers,
            status: Status::Ok,
        }
    }

    /// Replicate handler with an explicit clock.
    ///
    /// Groups are merged one at a time. A malformed group is skipped and
    /// reported; the rest of the push is still applied.
    pub fn replicate_at(&self, req: &ReplicateRequest, now: u64) -> ReplicateResponse {
        if req.sender_addr.is_unspecified() {
            tracing::debug!(sender = %req.sender_key.short(), "replicate from undisclosed sender rejected");
            return ReplicateResponse {
                status: Status::InvalidReplication,
            };
        }
        if req.owner_key.is_empty() {
            tracing::debug!(sender = %req.sender_key.short(), "replicate without owner rejected");
            return ReplicateResponse {
                status: Status::InvalidReplication,
            };
        }

        let mut status = Status::Ok;
        let mut merged = 0usize;
        for snapshot in &req.groups {
            match self.merge_snapshot(snapshot, req.is_diff, now) {
                Ok(()) => merged += 1,
                Err(s) => {
                    if status.is_ok() {
                        status = s;
                    }
                }
            }
        }

        tracing::debug!(
            owner = %req.owner_key.short(),
            sender = %req.sender_addr,
            groups = req.groups.len(),
            merged,
            diff = req.is_diff,
            ?status,
            "replication applied"
        );
        ReplicateResponse { status }
    }

    fn merge_snapshot(&self, snapshot: &GroupSnapshot, is_diff: bool, now: u64) -> Result<(), Status> {
        if let Err(reason) = validate_snapshot(snapshot) {
            tracing::debug!(group = %snapshot.group_key.short(), reason, "malformed snapshot");
            return Err(Status::InvalidReplication);
        }

        let merge = |sg: &mut Searchgroup| {
            let outcome = sg.merge(snapshot, is_diff, now);
            self.manager.persist(sg);
            outcome
        };
        // Metadata-only pushes never create a group.
        let outcome = if snapshot.subscribers.is_empty() {
            match self.manager.with_existing(&snapshot.group_key, now, merge) {
                Ok(Some(outcome)) => outcome,
                Ok(None) => return Ok(()),
                Err(e) => return Err(Status::from(&e)),
            }
        } else {
            self.manager
                .with_group(&snapshot.group_key, now, merge)
                .map_err(|e| Status::from(&e))?
        };

        tracing::trace!(
            group = %snapshot.group_key.short(),
            added = outcome.added,
            removed = outcome.removed,
            metadata_only = outcome.metadata_only,
            "snapshot merged"
        );
        Ok(())
    }
}

fn validate_snapshot(snapshot: &GroupSnapshot) -> Result<(), &'static str> {
    if snapshot.group_key.is_empty() {
        return Err("empty group key");
    }
    if snapshot
        .subscribers
        .iter()
        .any(|s| s.address.trim().is_empty())
    {
        return Err("subscriber without address");
    }
    Ok(())
}

impl SearchGroupRpc for OverlayNode {
    fn subscribe(&self, req: &SubscribeRequest) -> SubscribeResponse {
        self.subscribe_at(req, now_ms())
    }

    fn replicate(&self, req: &ReplicateRequest) -> ReplicateResponse {
        self.replicate_at(req, now_ms())
    }
}

/// Handle to a started node's background tasks.
pub struct NodeHandle {
    shutdown_tx: broadcast::Sender<()>,
    tasks: Vec<JoinHandle<()>>,
}

impl NodeHandle {
    /// Signal the background tasks and wait for them to exit.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
        for task in self.tasks {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "node task ended abnormally");
            }
        }
        tracing::info!("overlay node stopped");
    }
}
