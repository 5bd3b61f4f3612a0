use crate::*;
use cairn_core::{GroupSnapshot, PeerRecord, Status};

fn replicate_req(node: &TestNode, groups: Vec<GroupSnapshot>, is_diff: bool) -> ReplicateRequest {
    ReplicateRequest {
        recipient_key: node.routing.node_key(),
        recipient_addr: node.address(),
        sender_key: OverlayKey::from_name("owner"),
        sender_addr: NetworkAddress::new("10.2.0.1", 9100),
        owner_key: OverlayKey::from_name("owner"),
        groups,
        is_diff,
    }
}

fn record(name: &str, port: u16) -> PeerRecord {
    PeerRecord {
        key: OverlayKey::from_name(name),
        address: "10.2.0.5".to_string(),
        port,
    }
}

/// Members pushed by a replica owner are served to later subscribers.
#[tokio::test]
async fn test_replicated_members_are_served() {
    let node = TestNode::start(test_config()).await.unwrap();

    let snap = GroupSnapshot {
        group_key: OverlayKey::from_name("mirrored"),
        subscribers: vec![record("r1", 1), record("r2", 2)],
        replication_radius: 3,
        last_time_of_use: 0,
    };
    let resp = node
        .replicate(&replicate_req(&node, vec![snap], true))
        .await
        .unwrap();
    assert_eq!(resp.status, Status::Ok);

    let query = node.subscribe(&query_req(&node, "mirrored")).await.unwrap();
    assert_eq!(query.peers.len(), 2);

    let group = node.get(&format!("/api/groups/{}", OverlayKey::from_name("mirrored"))).await.unwrap();
    assert_eq!(group["replication_radius"], 3);

    node.stop().await.unwrap();
}

/// Replaying the same diff changes nothing.
#[tokio::test]
async fn test_replicate_diff_idempotent() {
    let node = TestNode::start(test_config()).await.unwrap();
    let snap = GroupSnapshot {
        group_key: OverlayKey::from_name("g"),
        subscribers: vec![record("r1", 1)],
        replication_radius: 1,
        last_time_of_use: 0,
    };
    let req = replicate_req(&node, vec![snap], true);
    node.replicate(&req).await.unwrap();
    node.replicate(&req).await.unwrap();

    let snap = node
        .node
        .manager()
        .snapshot(&OverlayKey::from_name("g"))
        .unwrap();
    assert_eq!(snap.subscribers.len(), 1);

    node.stop().await.unwrap();
}

/// A malformed group fails the push status but not the rest of it.
#[tokio::test]
async fn test_replicate_malformed_group() {
    let node = TestNode::start(test_config()).await.unwrap();
    let bad = GroupSnapshot {
        group_key: OverlayKey::EMPTY,
        subscribers: vec![record("r1", 1)],
        replication_radius: 1,
        last_time_of_use: 0,
    };
    let good = GroupSnapshot {
        group_key: OverlayKey::from_name("fine"),
        subscribers: vec![record("r2", 2)],
        replication_radius: 1,
        last_time_of_use: 0,
    };
    let resp = node
        .replicate(&replicate_req(&node, vec![bad, good], true))
        .await
        .unwrap();
    assert_eq!(resp.status, Status::InvalidReplication);
    assert!(node.node.manager().contains(&OverlayKey::from_name("fine")));
    assert_eq!(node.node.manager().len(), 1);

    node.stop().await.unwrap();
}

/// An undisclosed sender may not push replicas.
#[tokio::test]
async fn test_replicate_requires_sender() {
    let node = TestNode::start(test_config()).await.unwrap();
    let mut req = replicate_req(&node, vec![], true);
    req.sender_addr = NetworkAddress::unspecified();
    let resp = node.replicate(&req).await.unwrap();
    assert_eq!(resp.status, Status::InvalidReplication);

    node.stop().await.unwrap();
}
