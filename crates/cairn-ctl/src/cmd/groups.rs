//! Search-group listing and inspection commands.

use anyhow::Result;
use cairn_core::GroupSnapshot;
use serde::Deserialize;

use super::http::{base_url, get_json};
use super::resolve_group;

#[derive(Deserialize)]
struct GroupsResponse {
    groups: Vec<GroupSummary>,
}

#[derive(Deserialize)]
struct GroupSummary {
    group_key: String,
    subscribers: usize,
    replication_radius: u32,
    last_time_of_use: u64,
}

pub async fn cmd_groups(port: u16) -> Result<()> {
    let resp: GroupsResponse = get_json(&format!("{}/groups", base_url(port))).await?;

    if resp.groups.is_empty() {
        println!("No search groups held.");
        return Ok(());
    }

    println!("═══════════════════════════════════════");
    println!("  Search Groups ({})", resp.groups.len());
    println!("═══════════════════════════════════════");

    for g in &resp.groups {
        println!("  ┌─ {}", g.group_key);
        println!("  │  subscribers : {}", g.subscribers);
        println!("  │  radius      : {}", g.replication_radius);
        println!("  └─ last used   : {}", g.last_time_of_use);
    }

    Ok(())
}

pub async fn cmd_group(port: u16, group: &str) -> Result<()> {
    let key = resolve_group(group);
    let snap: GroupSnapshot = get_json(&format!("{}/groups/{}", base_url(port), key)).await?;

    println!("═══════════════════════════════════════");
    println!("  Group {}", snap.group_key);
    println!("═══════════════════════════════════════");
    println!("  Radius      : {}", snap.replication_radius);
    println!("  Last used   : {}", snap.last_time_of_use);
    println!("  Subscribers : {}", snap.subscribers.len());

    for s in &snap.subscribers {
        println!("  ┌─ {}", s.key);
        println!("  └─ addr : {}", s.net_address());
    }

    Ok(())
}
