use crate::*;
use cairn_services::{Searchgroup, Subscriber};

/// Regenerating vnodes drops every group held by the node.
#[tokio::test]
async fn test_regenerate_clears_groups() {
    let node = TestNode::start(test_config()).await.unwrap();
    node.subscribe(&join_req(&node, "a", "alice", 7001)).await.unwrap();
    node.subscribe(&join_req(&node, "b", "bob", 7002)).await.unwrap();
    assert_eq!(node.node.manager().len(), 2);

    let resp = node.post("/api/vnodes/regenerate").await.unwrap();
    assert_eq!(resp["generation"], 1);

    let manager = node.node.manager().clone();
    assert!(
        wait_until(100, || manager.is_empty()).await,
        "groups survived vnode regeneration"
    );

    node.stop().await.unwrap();
}

/// Groups survive a restart when the routing layer kept its vnodes.
#[tokio::test]
async fn test_groups_persist_across_restart() {
    let root = temp_dir("persist");
    let mut config = test_config();
    config.persist = true;

    let node = TestNode::start_persistent(config.clone(), &root, true).await.unwrap();
    node.subscribe(&join_req(&node, "durable", "alice", 7001)).await.unwrap();
    node.stop().await.unwrap();

    let node = TestNode::start_persistent(config, &root, true).await.unwrap();
    assert!(node.node.manager().is_empty(), "groups load lazily");
    let resp = node.subscribe(&query_req(&node, "durable")).await.unwrap();
    assert_eq!(resp.peers.len(), 1);
    assert_eq!(resp.peers[0].key, OverlayKey::from_name("alice"));

    node.stop().await.unwrap();
    let _ = std::fs::remove_dir_all(root);
}

/// Records left idle on disk past the TTL neither come back on lookup nor
/// outlive a sweep, even if nobody loads them.
#[tokio::test]
async fn test_idle_records_expire_after_restart() {
    let root = temp_dir("idle");
    let store = GroupStore::new(&root).unwrap();
    for name in ["forgotten", "revisited"] {
        let mut group = Searchgroup::new(OverlayKey::from_name(name), 1_000);
        group.add_subscriber(Subscriber::new(
            OverlayKey::from_name("ghost"),
            &NetworkAddress::new("10.1.0.9", 7009),
            1_000,
        ));
        store.save(&group).unwrap();
    }

    let mut config = test_config();
    config.persist = true;
    let node = TestNode::start_persistent(config, &root, true).await.unwrap();

    let revisited = OverlayKey::from_name("revisited");
    let code = node
        .get_status_code(&format!("/api/groups/{}", revisited.to_hex()))
        .await
        .unwrap();
    assert_eq!(code, 404);
    assert!(!store.has(&revisited));

    let resp = node.post("/api/sweep").await.unwrap();
    assert_eq!(resp["groups_removed"], 1);
    assert_eq!(resp["subscribers_removed"], 1);
    assert!(!store.has(&OverlayKey::from_name("forgotten")));

    let status = node.get("/api/status").await.unwrap();
    assert_eq!(status["persisted_groups"], 0);
    assert_eq!(status["groups"], 0);

    node.stop().await.unwrap();
    let _ = std::fs::remove_dir_all(root);
}

/// Without persistent vnode state, the stored group database is stale and
/// is erased at startup.
#[tokio::test]
async fn test_fresh_vnodes_reset_store() {
    let root = temp_dir("reset");
    let mut config = test_config();
    config.persist = true;

    let node = TestNode::start_persistent(config.clone(), &root, true).await.unwrap();
    node.subscribe(&join_req(&node, "stale", "alice", 7001)).await.unwrap();
    node.stop().await.unwrap();

    let node = TestNode::start_persistent(config, &root, false).await.unwrap();
    let resp = node.subscribe(&query_req(&node, "stale")).await.unwrap();
    assert!(resp.peers.is_empty());

    node.stop().await.unwrap();
    let _ = std::fs::remove_dir_all(root);
}

/// POST /api/daemon/shutdown stops the API server.
#[tokio::test]
async fn test_shutdown_endpoint() {
    let node = TestNode::start(test_config()).await.unwrap();
    let resp = node.post("/api/daemon/shutdown").await.unwrap();
    assert_eq!(resp["message"], "Shutdown initiated");
    node.stop().await.unwrap();
}
