//! Cairn integration test harness.
//!
//! Each test starts a full node in-process: routing, group manager,
//! background tasks, and the HTTP surface on an ephemeral loopback port.
//! Tests drive it over HTTP exactly as peers and cairn-ctl would.
//!
//!   cargo test --test integration

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde_json::Value;

use cairn_api::ApiState;
use cairn_core::config::SearchGroupConfig;
use cairn_core::{
    NetworkAddress, OverlayKey, ReplicateRequest, ReplicateResponse, SubscribeRequest,
    SubscribeResponse,
};
use cairn_services::{GroupStore, NodeHandle, OverlayNode, SearchGroupManager, StaticRouting};

mod lifecycle;
mod replicate;
mod status;
mod subscribe;

// ── Harness ───────────────────────────────────────────────────────────────────

static DIR_COUNTER: AtomicU64 = AtomicU64::new(0);

/// A fresh scratch directory under the system temp dir.
pub fn temp_dir(tag: &str) -> PathBuf {
    let id = DIR_COUNTER.fetch_add(1, Ordering::Relaxed);
    let dir = std::env::temp_dir().join(format!(
        "cairn-it-{}-{}-{}",
        tag,
        std::process::id(),
        id
    ));
    let _ = std::fs::remove_dir_all(&dir);
    dir
}

pub fn test_config() -> SearchGroupConfig {
    SearchGroupConfig {
        max_returned_peers: 20,
        sweep_interval_secs: 60,
        group_ttl_secs: 3600,
        persist: false,
        ..SearchGroupConfig::default()
    }
}

pub struct TestNode {
    pub port: u16,
    pub node: Arc<OverlayNode>,
    pub routing: Arc<StaticRouting>,
    shutdown_tx: tokio::sync::broadcast::Sender<()>,
    server: tokio::task::JoinHandle<Result<()>>,
    handle: NodeHandle,
}

impl TestNode {
    /// Start a node without persistence.
    pub async fn start(config: SearchGroupConfig) -> Result<Self> {
        Self::start_with(config, SearchGroupManager::new(), false).await
    }

    /// Start a node whose group database lives in `root`. `persistent_vnodes`
    /// is what the routing layer reports about its own state.
    pub async fn start_persistent(
        config: SearchGroupConfig,
        root: &Path,
        persistent_vnodes: bool,
    ) -> Result<Self> {
        let store = GroupStore::new(root)?;
        let manager = SearchGroupManager::with_store(store).with_ttl(config.group_ttl());
        Self::start_with(config, manager, persistent_vnodes).await
    }

    async fn start_with(
        config: SearchGroupConfig,
        manager: SearchGroupManager,
        persistent_vnodes: bool,
    ) -> Result<Self> {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let port = listener.local_addr()?.port();

        let routing = Arc::new(
            StaticRouting::new(
                OverlayKey::from_name("it-node"),
                NetworkAddress::new("127.0.0.1", port),
                2,
            )
            .with_persistent_data(persistent_vnodes),
        );
        let node = Arc::new(OverlayNode::new(&config, routing.clone(), Arc::new(manager)));
        let handle = node.start();

        let (shutdown_tx, _) = tokio::sync::broadcast::channel::<()>(4);
        let state = ApiState::new(node.clone(), routing.clone(), shutdown_tx.clone());
        let server = tokio::spawn(cairn_api::serve_on(listener, state));

        Ok(Self {
            port,
            node,
            routing,
            shutdown_tx,
            server,
            handle,
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://127.0.0.1:{}{}", self.port, path)
    }

    pub fn address(&self) -> NetworkAddress {
        NetworkAddress::new("127.0.0.1", self.port)
    }

    pub async fn get(&self, path: &str) -> Result<Value> {
        let resp = reqwest::get(self.url(path))
            .await
            .with_context(|| format!("GET {path}"))?;
        if !resp.status().is_success() {
            bail!("GET {path} returned {}", resp.status());
        }
        Ok(resp.json().await?)
    }

    pub async fn get_status_code(&self, path: &str) -> Result<u16> {
        Ok(reqwest::get(self.url(path)).await?.status().as_u16())
    }

    pub async fn post(&self, path: &str) -> Result<Value> {
        let resp = reqwest::Client::new()
            .post(self.url(path))
            .send()
            .await
            .with_context(|| format!("POST {path}"))?;
        Ok(resp.json().await?)
    }

    pub async fn subscribe(&self, req: &SubscribeRequest) -> Result<SubscribeResponse> {
        let resp = reqwest::Client::new()
            .post(self.url("/rpc/subscribe"))
            .json(req)
            .send()
            .await?;
        Ok(resp.json().await?)
    }

    pub async fn replicate(&self, req: &ReplicateRequest) -> Result<ReplicateResponse> {
        let resp = reqwest::Client::new()
            .post(self.url("/rpc/replicate"))
            .json(req)
            .send()
            .await?;
        Ok(resp.json().await?)
    }

    /// Stop the API server and background tasks.
    pub async fn stop(self) -> Result<()> {
        let _ = self.shutdown_tx.send(());
        tokio::time::timeout(Duration::from_secs(5), self.server)
            .await
            .context("API server did not stop")???;
        self.handle.shutdown().await;
        Ok(())
    }
}

/// A subscribe from peer `name` listening on `port`.
pub fn join_req(node: &TestNode, group: &str, name: &str, port: u16) -> SubscribeRequest {
    SubscribeRequest {
        recipient_key: node.routing.node_key(),
        recipient_addr: node.address(),
        sender_key: OverlayKey::from_name(name),
        sender_addr: NetworkAddress::new("10.1.0.1", port),
        group_key: OverlayKey::from_name(group),
    }
}

/// A subscribe that only asks who is in `group`.
pub fn query_req(node: &TestNode, group: &str) -> SubscribeRequest {
    SubscribeRequest {
        recipient_key: node.routing.node_key(),
        recipient_addr: node.address(),
        sender_key: OverlayKey::from_name("asker"),
        sender_addr: NetworkAddress::unspecified(),
        group_key: OverlayKey::from_name(group),
    }
}

/// Poll `check` until it holds or `attempts` run out.
pub async fn wait_until(attempts: usize, mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..attempts {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    check()
}
