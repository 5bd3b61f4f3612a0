use crate::*;

/// /api/status reflects identity and group counts.
#[tokio::test]
async fn test_status_shape() {
    let node = TestNode::start(test_config()).await.unwrap();
    node.subscribe(&join_req(&node, "a", "alice", 7001)).await.unwrap();
    node.subscribe(&join_req(&node, "b", "alice", 7001)).await.unwrap();

    let status = node.get("/api/status").await.unwrap();
    assert_eq!(status["node_key"], OverlayKey::from_name("it-node").to_hex());
    assert_eq!(status["groups"], 2);
    assert_eq!(status["subscribers"], 2);
    assert_eq!(status["vnodes"].as_array().map(Vec::len), Some(2));
    assert_eq!(status["vnode_generation"], 0);
    assert!(status["persisted_groups"].is_null());
    assert_eq!(status["max_returned_peers"], 20);
    assert_eq!(status["group_ttl_secs"], 3600);

    node.stop().await.unwrap();
}

/// /api/groups lists held groups; /api/groups/{key} inspects one.
#[tokio::test]
async fn test_groups_listing_and_inspect() {
    let node = TestNode::start(test_config()).await.unwrap();
    node.subscribe(&join_req(&node, "topic", "alice", 7001)).await.unwrap();

    let list = node.get("/api/groups").await.unwrap();
    let groups = list["groups"].as_array().unwrap();
    assert_eq!(groups.len(), 1);
    let key = OverlayKey::from_name("topic").to_hex();
    assert_eq!(groups[0]["group_key"], key.as_str());
    assert_eq!(groups[0]["subscribers"], 1);

    let one = node.get(&format!("/api/groups/{key}")).await.unwrap();
    assert_eq!(one["subscribers"][0]["port"], 7001);

    let missing = OverlayKey::from_name("nothing").to_hex();
    assert_eq!(
        node.get_status_code(&format!("/api/groups/{missing}")).await.unwrap(),
        404
    );
    assert_eq!(node.get_status_code("/api/groups/not-hex").await.unwrap(), 400);

    node.stop().await.unwrap();
}

/// A manual sweep with nothing idle removes nothing.
#[tokio::test]
async fn test_manual_sweep() {
    let node = TestNode::start(test_config()).await.unwrap();
    node.subscribe(&join_req(&node, "fresh", "alice", 7001)).await.unwrap();

    let resp = node.post("/api/sweep").await.unwrap();
    assert_eq!(resp["groups_removed"], 0);
    assert_eq!(resp["subscribers_removed"], 0);
    assert_eq!(resp["remaining"], 1);

    node.stop().await.unwrap();
}
