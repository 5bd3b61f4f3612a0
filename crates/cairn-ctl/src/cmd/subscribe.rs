//! Subscribe and query commands. These drive the peer RPC directly.

use anyhow::{Context, Result};
use cairn_core::{NetworkAddress, OverlayKey, SubscribeRequest, SubscribeResponse};

use super::http::{post_json_body, rpc_url};
use super::resolve_group;
use super::status::fetch_status;

/// Join `group` as the peer at `as_addr`.
pub async fn cmd_subscribe(port: u16, group: &str, as_addr: &str) -> Result<()> {
    let addr = NetworkAddress::parse(as_addr)
        .with_context(|| format!("invalid --as address: {}", as_addr))?;
    // The peer's identity is derived from its address so repeated runs
    // refresh the same membership.
    let sender_key = OverlayKey::from_name(&addr.to_string());
    let resp = send(port, group, sender_key, addr).await?;
    print_peers(group, &resp);
    Ok(())
}

/// Ask who is in `group` without joining it.
pub async fn cmd_query(port: u16, group: &str) -> Result<()> {
    let resp = send(port, group, OverlayKey::random(), NetworkAddress::unspecified()).await?;
    print_peers(group, &resp);
    Ok(())
}

async fn send(
    port: u16,
    group: &str,
    sender_key: OverlayKey,
    sender_addr: NetworkAddress,
) -> Result<SubscribeResponse> {
    let status = fetch_status(port).await?;
    let recipient_key: OverlayKey = status
        .node_key
        .parse()
        .context("daemon reported an invalid node key")?;
    let recipient_addr = NetworkAddress::parse(&status.address).unwrap_or_default();

    let req = SubscribeRequest {
        recipient_key,
        recipient_addr,
        sender_key,
        sender_addr,
        group_key: resolve_group(group),
    };
    post_json_body(&format!("{}/subscribe", rpc_url(port)), &req).await
}

fn print_peers(group: &str, resp: &SubscribeResponse) {
    if !resp.status.is_ok() {
        println!("Request rejected: {:?} (code {})", resp.status, resp.status.code());
        return;
    }
    if resp.peers.is_empty() {
        println!("No other peers in '{}' yet.", group);
        return;
    }

    println!("═══════════════════════════════════════");
    println!("  Peers in '{}' ({})", group, resp.peers.len());
    println!("═══════════════════════════════════════");
    for p in &resp.peers {
        println!("  ┌─ {}", p.key);
        println!("  └─ addr : {}", p.net_address());
    }
}
