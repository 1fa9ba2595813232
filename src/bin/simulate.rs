//! Outbound queue simulation harness.
//!
//! Wires an in-memory transport to an `OutboundQueue` and drives a handful of
//! announce/transaction messages through it, printing the final state.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use clap::Parser;
use outbound_queue::{
    JsonFormatter, MsgType, NodeRole, NodeType, Origin, OutboundQueue, Peers, QueueConfig, SystemClock,
};
use parking_lot::Mutex;
use tracing::info;

#[derive(Parser)]
#[command(name = "simulate", version, about = "Outbound queue simulation")]
struct Args {
    /// Local node role: core, relay, edge-behind-nat, edge-exchange, edge-p2p
    #[arg(short, long, default_value = "core")]
    role: String,

    /// Number of core peers to seed the gossip bucket with
    #[arg(long, default_value_t = 3)]
    core_peers: u32,

    /// Number of relay peers to seed the gossip bucket with
    #[arg(long, default_value_t = 2)]
    relay_peers: u32,

    /// How many announce messages to enqueue
    #[arg(long, default_value_t = 5)]
    announcements: u32,
}

#[derive(Debug, thiserror::Error)]
enum SendError {
    #[error("peer {0} is unreachable")]
    Unreachable(u64),
}

/// A transport that always succeeds except for one hardcoded unreachable
/// peer, recording every delivery it makes.
struct InMemoryTransport {
    delivered: Mutex<HashMap<u64, u64>>,
}

impl outbound_queue::Transport<u64, String> for InMemoryTransport {
    type Value = ();
    type Error = SendError;

    fn send(&self, payload: &String, dest: &u64) -> Result<(), SendError> {
        if *dest == 999 {
            return Err(SendError::Unreachable(*dest));
        }
        *self.delivered.lock().entry(*dest).or_insert(0) += 1;
        info!(dest, payload, "delivered");
        Ok(())
    }
}

fn parse_role(s: &str) -> NodeRole {
    match s {
        "core" => NodeRole::Core,
        "relay" => NodeRole::Relay,
        "edge-behind-nat" => NodeRole::EdgeBehindNat,
        "edge-exchange" => NodeRole::EdgeExchange,
        "edge-p2p" => NodeRole::EdgeP2p,
        other => {
            tracing::warn!(role = other, "unknown role, defaulting to core");
            NodeRole::Core
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("outbound_queue=info".parse().unwrap()),
        )
        .init();

    let args = Args::parse();
    let role = parse_role(&args.role);

    info!("════════════════════════════════════════════════════════════");
    info!("  Outbound queue simulation — role: {:?}", role);
    info!("════════════════════════════════════════════════════════════");

    let transport = InMemoryTransport {
        delivered: Mutex::new(HashMap::new()),
    };

    let queue = OutboundQueue::new(role, transport, QueueConfig::default(), Arc::new(SystemClock));
    queue.dequeue_thread();

    let core_ids: Vec<u64> = (1..=args.core_peers as u64).collect();
    let relay_ids: Vec<u64> = (100..100 + args.relay_peers as u64).collect();
    queue.update_peers_bucket("gossip", |p| {
        *p = Peers::merge(&Peers::simple(NodeType::Core, core_ids.clone()), &Peers::simple(NodeType::Relay, relay_ids.clone()));
    });

    let next_height = AtomicU64::new(1);
    for _ in 0..args.announcements {
        let height = next_height.fetch_add(1, Ordering::SeqCst);
        let payload = format!("header-{height}");
        match queue
            .enqueue_sync(MsgType::AnnounceBlockHeader, Origin::Sender, payload)
            .await
        {
            Ok(results) => info!(height, delivered = results.len(), "announce round complete"),
            Err(e) => tracing::error!(height, error = %e, "announce round failed"),
        }
    }

    let snapshot = queue.dump_state(&JsonFormatter);
    println!("{snapshot}");

    queue.wait_shutdown().await;
}
