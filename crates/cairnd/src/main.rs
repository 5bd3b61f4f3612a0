//! cairnd — Cairn search-group overlay daemon.

use std::sync::Arc;

use anyhow::{Context, Result};

use cairn_core::config::CairnConfig;
use cairn_core::{NetworkAddress, OverlayKey};
use cairn_services::{GroupStore, OverlayNode, SearchGroupManager, StaticRouting};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Load config
    if let Err(e) = CairnConfig::write_default_if_missing() {
        tracing::warn!(error = %e, "failed to write default config");
    }
    // A missing file means defaults; a file that fails to parse or validate
    // stops startup.
    let config = Arc::new(CairnConfig::load().context("invalid configuration")?);
    tracing::info!(
        host = %config.node.listen_host,
        port = config.node.api_port,
        "cairnd starting"
    );

    // Identity. A configured key yields the same vnodes every run, so the
    // group database from a previous run is still placed correctly.
    let (node_key, persistent) = if config.node.node_key.is_empty() {
        (OverlayKey::random(), false)
    } else {
        let key: OverlayKey = config
            .node
            .node_key
            .parse()
            .context("invalid node_key in config")?;
        (key, true)
    };
    tracing::info!(node_key = %node_key, persistent, "node identity ready");

    let address = NetworkAddress::new(config.node.listen_host.clone(), config.node.api_port);
    let routing = Arc::new(
        StaticRouting::new(node_key, address, config.node.vnodes).with_persistent_data(persistent),
    );

    // Group database
    let sg_config = &config.searchgroups;
    let manager = if sg_config.persist {
        let store = GroupStore::new(&sg_config.storage_path)?;
        tracing::info!(
            root = %sg_config.storage_path.display(),
            records = store.count(),
            "group store initialized"
        );
        SearchGroupManager::with_store(store).with_ttl(sg_config.group_ttl())
    } else {
        SearchGroupManager::new()
    };

    let node = Arc::new(OverlayNode::new(sg_config, routing.clone(), Arc::new(manager)));
    let handle = node.start();

    // ── Shutdown channel ─────────────────────────────────────────────────────
    let (shutdown_tx, _) = tokio::sync::broadcast::channel::<()>(1);

    {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("shutdown signal received");
            let _ = shutdown.send(());
        });
    }

    // ── API ──────────────────────────────────────────────────────────────────
    let api_task = {
        let state = cairn_api::ApiState::new(node.clone(), routing, shutdown_tx.clone());
        let host = config.node.listen_host.clone();
        let port = config.node.api_port;
        tokio::spawn(async move {
            if let Err(e) = cairn_api::serve(state, &host, port).await {
                tracing::error!(error = %e, "API server failed");
            }
        })
    };

    // ── Wait for exit ────────────────────────────────────────────────────────
    let mut shutdown_rx = shutdown_tx.subscribe();

    tokio::select! {
        _ = shutdown_rx.recv() => tracing::info!("shutting down"),
        r = api_task           => tracing::error!("API task exited: {:?}", r),
    }

    handle.shutdown().await;
    Ok(())
}
