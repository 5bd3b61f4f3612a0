//! Daemon status, sweep, vnode regeneration, shutdown commands.

use anyhow::Result;
use serde::Deserialize;

use super::http::{base_url, get_json, post_json};

#[derive(Deserialize)]
pub struct StatusResponse {
    pub node_key: String,
    pub address: String,
    vnodes: Vec<String>,
    vnode_generation: u64,
    groups: usize,
    subscribers: usize,
    persisted_groups: Option<usize>,
    max_returned_peers: usize,
    group_ttl_secs: u64,
    uptime_secs: u64,
}

pub async fn fetch_status(port: u16) -> Result<StatusResponse> {
    get_json(&format!("{}/status", base_url(port))).await
}

pub async fn cmd_status(port: u16) -> Result<()> {
    let resp = fetch_status(port).await?;

    println!("═══════════════════════════════════════");
    println!("  Cairn Node Status");
    println!("═══════════════════════════════════════");
    println!("  Node key         : {}", resp.node_key);
    println!("  Address          : {}", resp.address);
    println!("  Uptime           : {}s", resp.uptime_secs);
    println!("  Search groups    : {}", resp.groups);
    println!("  Subscribers      : {}", resp.subscribers);
    match resp.persisted_groups {
        Some(n) => println!("  Persisted groups : {}", n),
        None => println!("  Persisted groups : (persistence off)"),
    }
    println!("  Max peers/reply  : {}", resp.max_returned_peers);
    println!("  Group TTL        : {}s", resp.group_ttl_secs);

    println!(
        "\n  Virtual nodes (generation {}):",
        resp.vnode_generation
    );
    if resp.vnodes.is_empty() {
        println!("  (none)");
    }
    for (i, v) in resp.vnodes.iter().enumerate() {
        let corner = if i + 1 == resp.vnodes.len() { "└─" } else { "├─" };
        println!("  {} {}", corner, v);
    }

    Ok(())
}

pub async fn cmd_sweep(port: u16) -> Result<()> {
    #[derive(Deserialize)]
    struct SweepResponse {
        groups_removed: usize,
        subscribers_removed: usize,
        remaining: usize,
    }

    let resp: SweepResponse = post_json(&format!("{}/sweep", base_url(port))).await?;
    println!(
        "Swept {} groups and {} subscribers; {} groups remain.",
        resp.groups_removed, resp.subscribers_removed, resp.remaining
    );
    Ok(())
}

pub async fn cmd_regenerate(port: u16) -> Result<()> {
    #[derive(Deserialize)]
    struct RegenerateResponse {
        generation: u64,
        vnodes: Vec<String>,
    }

    let resp: RegenerateResponse =
        post_json(&format!("{}/vnodes/regenerate", base_url(port))).await?;
    println!(
        "Virtual nodes regenerated (generation {}, {} keys). Search groups will be dropped.",
        resp.generation,
        resp.vnodes.len()
    );
    Ok(())
}

pub async fn cmd_shutdown(port: u16) -> Result<()> {
    #[derive(Deserialize)]
    struct ShutdownResponse {
        message: String,
    }

    let resp: ShutdownResponse = post_json(&format!("{}/daemon/shutdown", base_url(port))).await?;
    println!("{}", resp.message);
    Ok(())
}
