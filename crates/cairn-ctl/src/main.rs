//! cairn-ctl — command-line interface for the Cairn daemon.

mod cmd;

use anyhow::{Context, Result};

use cmd::groups::{cmd_group, cmd_groups};
use cmd::status::{cmd_regenerate, cmd_shutdown, cmd_status, cmd_sweep};
use cmd::subscribe::{cmd_query, cmd_subscribe};

const DEFAULT_PORT: u16 = 9100;

fn print_usage() {
    println!("Usage: cairn-ctl [--port <port>] <command>");
    println!();
    println!("Commands:");
    println!("  status                          Show node identity, vnodes, and group stats");
    println!("  groups                          List locally held search groups");
    println!("  group <topic|key>               Show one group's subscribers");
    println!("  subscribe <topic|key> --as <host:port>");
    println!("                                  Join a group and list its peers");
    println!("  query <topic|key>               List a group's peers without joining");
    println!("  sweep                           Evict idle groups and subscribers now");
    println!("  regenerate                      Regenerate virtual nodes (drops all groups)");
    println!("  shutdown                        Stop the daemon");
    println!();
    println!("Options:");
    println!("  --port <port>   API port (default: {})", DEFAULT_PORT);
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    // Parse --port and --as options
    let mut port = DEFAULT_PORT;
    let mut as_addr: Option<String> = None;
    let mut remaining: Vec<&str> = Vec::new();
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--port" => {
                i += 1;
                port = args
                    .get(i)
                    .context("--port requires a value")?
                    .parse()
                    .context("--port must be a number")?;
            }
            "--as" => {
                i += 1;
                as_addr = Some(args.get(i).context("--as requires <host:port>")?.clone());
            }
            other => remaining.push(other),
        }
        i += 1;
    }

    match remaining.as_slice() {
        ["status"] | [] => cmd_status(port).await,
        ["groups"] => cmd_groups(port).await,
        ["group", group] => cmd_group(port, group).await,
        ["subscribe", group] => {
            let as_addr = as_addr.context("subscribe requires --as <host:port>")?;
            cmd_subscribe(port, group, &as_addr).await
        }
        ["query", group] => cmd_query(port, group).await,
        ["sweep"] => cmd_sweep(port).await,
        ["regenerate"] => cmd_regenerate(port).await,
        ["shutdown"] => cmd_shutdown(port).await,
        ["help"] | ["--help"] | ["-h"] => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {}", other.join(" "));
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    }
}
