use std::collections::HashSet;

use crate::*;
use cairn_core::Status;

/// Two peers join a topic; each sees those who came before.
#[tokio::test]
async fn test_subscribe_returns_prior_members() {
    let node = TestNode::start(test_config()).await.unwrap();

    let first = node.subscribe(&join_req(&node, "rust", "alice", 7001)).await.unwrap();
    assert_eq!(first.status, Status::Ok);
    assert!(first.peers.is_empty(), "first joiner should see nobody");

    let second = node.subscribe(&join_req(&node, "rust", "bob", 7002)).await.unwrap();
    assert_eq!(second.status, Status::Ok);
    assert_eq!(second.peers.len(), 1);
    assert_eq!(second.peers[0].key, OverlayKey::from_name("alice"));
    assert_eq!(second.peers[0].port, 7001);

    let query = node.subscribe(&query_req(&node, "rust")).await.unwrap();
    let keys: HashSet<_> = query.peers.iter().map(|p| p.key).collect();
    assert_eq!(
        keys,
        HashSet::from([OverlayKey::from_name("alice"), OverlayKey::from_name("bob")])
    );

    node.stop().await.unwrap();
}

/// A subscribe with an all-zero group key is refused and creates nothing.
#[tokio::test]
async fn test_subscribe_empty_group_rejected() {
    let node = TestNode::start(test_config()).await.unwrap();

    let mut req = join_req(&node, "ignored", "alice", 7001);
    req.group_key = OverlayKey::EMPTY;
    let resp = node.subscribe(&req).await.unwrap();
    assert_eq!(resp.status, Status::UnspecifiedGroup);
    assert!(resp.peers.is_empty());
    assert!(node.node.manager().is_empty());

    node.stop().await.unwrap();
}

/// A wire request whose group key is an empty string gets a status, not a
/// decode error.
#[tokio::test]
async fn test_subscribe_blank_group_key_gets_status() {
    let node = TestNode::start(test_config()).await.unwrap();

    let mut body = serde_json::to_value(join_req(&node, "ignored", "alice", 7001)).unwrap();
    body["group_key"] = serde_json::Value::from("");
    let resp = reqwest::Client::new()
        .post(node.url("/rpc/subscribe"))
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let resp: SubscribeResponse = resp.json().await.unwrap();
    assert_eq!(resp.status, Status::UnspecifiedGroup);
    assert!(node.node.manager().is_empty());

    node.stop().await.unwrap();
}

/// Replies never exceed the configured cap, and draw distinct members.
#[tokio::test]
async fn test_subscribe_reply_capped() {
    let mut config = test_config();
    config.max_returned_peers = 4;
    let node = TestNode::start(config).await.unwrap();

    for i in 0..12u16 {
        let name = format!("peer-{i}");
        node.subscribe(&join_req(&node, "busy", &name, 8000 + i))
            .await
            .unwrap();
    }

    let resp = node.subscribe(&query_req(&node, "busy")).await.unwrap();
    assert_eq!(resp.peers.len(), 4);
    let distinct: HashSet<_> = resp.peers.iter().map(|p| p.port).collect();
    assert_eq!(distinct.len(), 4);

    let snap = node
        .node
        .manager()
        .snapshot(&OverlayKey::from_name("busy"))
        .unwrap();
    assert_eq!(snap.subscribers.len(), 12, "query must not join");

    node.stop().await.unwrap();
}

/// Concurrent joins over HTTP all land in the group.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_subscribes() {
    let node = Arc::new(TestNode::start(test_config()).await.unwrap());

    let mut tasks = Vec::new();
    for i in 0..24u16 {
        let node = node.clone();
        tasks.push(tokio::spawn(async move {
            let req = join_req(&node, "crowd", &format!("p{i}"), 9000 + i);
            node.subscribe(&req).await.unwrap().status
        }));
    }
    for t in tasks {
        assert_eq!(t.await.unwrap(), Status::Ok);
    }

    let snap = node
        .node
        .manager()
        .snapshot(&OverlayKey::from_name("crowd"))
        .unwrap();
    assert_eq!(snap.subscribers.len(), 24);

    let node = Arc::try_unwrap(node).ok().expect("tasks done");
    node.stop().await.unwrap();
}
