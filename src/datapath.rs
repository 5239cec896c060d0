//! Wires the five components together into a running node.
//!
//! Plays the role of the teacher crate's `server::runner::run_server`
//! (load config, install tracing, construct the crypto block, construct and
//! run the server) but assembles five pieces instead of one, in the
//! dependency order spec.md §2 lays out: crypto, routing table, tunnel
//! side, socket side, bridge and supervisor.

use std::net::SocketAddr;
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use tokio_util::sync::CancellationToken;

use crate::bridge;
use crate::buffer::Pool;
use crate::config::{self, watch::ConfigWatcher};
use crate::crypto;
use crate::error::StartupError;
use crate::router::kernel::ShellRouteInstaller;
use crate::router::RoutingTable;
use crate::socket::SocketSide;
use crate::supervisor::Supervisor;
use crate::tunnel::TunnelSide;
use crate::{Result, TUN_DEVICE_NAME};

const BUFFER_POOL_SIZE: usize = 2048;

/// Loads `config_path`, resolves local identity, brings up every component,
/// and runs until `cancel` fires.
pub async fn run(config_path: &str, cancel: CancellationToken) -> Result<()> {
    let cfg = config::load(config_path).map_err(|e| StartupError::Config(e.to_string()))?;

    if !cfg.server.insecure && cfg.crypto.is_none() {
        return Err(StartupError::Crypto("crypto config is required when server.insecure is false".into()).into());
    }

    let local_node = config::local_node(&cfg).map_err(|e| StartupError::Identity(e.to_string()))?;
    let local_name = local_node.name.clone();
    tracing::info!("resolved local node identity: {local_name}");

    let private_addresses: Vec<_> = config::local_private_addresses(local_node).into_values().collect();

    let pool = Arc::new(Pool::new(BUFFER_POOL_SIZE));

    // `insecure` gates crypto unconditionally, independent of whether a
    // `[crypto]` block happens to be present (mirrors the original's
    // `if !s.Insecure { ... }` gate): a stale `[crypto]` section left in an
    // `insecure = true` config must not cause packets to be encrypted.
    let cipher_state = Arc::new(ArcSwapOption::from(if cfg.server.insecure {
        None
    } else {
        match &cfg.crypto {
            Some(crypto_cfg) => {
                let cipher =
                    crypto::new_cipher(crypto_cfg.kind, &crypto_cfg.key).map_err(|e| StartupError::Crypto(e.to_string()))?;
                Some(Arc::from(cipher))
            }
            None => None,
        }
    }));

    let routing_table = Arc::new(RoutingTable::new(TUN_DEVICE_NAME, Arc::new(ShellRouteInstaller::new())));
    let initial_irb = config::derive_irb(&cfg, &local_name);
    routing_table.update(&crate::router::Irb::new(), &initial_irb);

    let tunnel = TunnelSide::open(
        TUN_DEVICE_NAME,
        crate::tunnel::DEFAULT_QUEUES,
        cfg.server.mtu,
        &private_addresses,
        pool.clone(),
        cancel.clone(),
    )
    .await
    .map_err(|e| StartupError::Tunnel(e.to_string()))?;

    let bind_addr: SocketAddr = parse_bind_address(&cfg.server.address).map_err(StartupError::SocketBind)?;
    let socket = SocketSide::bind(
        bind_addr,
        cfg.server.max_workers,
        std::time::Duration::from_secs(cfg.server.keepalive),
        routing_table.clone(),
        cipher_state.clone(),
        pool.clone(),
        cancel.clone(),
    )
    .await
    .map_err(|e| StartupError::SocketBind(e.to_string()))?;

    tokio::spawn(bridge::run_inbound(socket.read_rx, tunnel.write_tx, cancel.clone()));
    tokio::spawn(bridge::run_outbound(tunnel.read_rx, socket.write_tx, cancel.clone()));

    let supervisor = Supervisor::new(config_path, local_name, routing_table, cipher_state, initial_irb);
    match ConfigWatcher::new(config_path) {
        Ok(mut watcher) => {
            // `watcher` must outlive the supervisor loop: dropping it stops
            // the `notify` watch and drops the `mpsc::Sender` its callback
            // holds, which would make `changes.recv()` return `None`
            // immediately and the supervisor would exit. Move the whole
            // watcher into the spawned task and borrow its receiver, rather
            // than handing the receiver off on its own.
            let supervisor_cancel = cancel.clone();
            tokio::spawn(async move {
                supervisor.run(&mut watcher.changes, supervisor_cancel).await;
            });
        }
        Err(e) => tracing::warn!("config watch disabled: {e}"),
    }

    cancel.cancelled().await;
    tracing::info!("datapath shutting down");
    Ok(())
}

/// `host:port`, defaulting the host to `0.0.0.0` for the `:PORT` shorthand
/// the config shape allows (spec.md §6's `address` default is `:8085`).
fn parse_bind_address(address: &str) -> std::result::Result<SocketAddr, String> {
    let normalized = if let Some(port) = address.strip_prefix(':') {
        format!("0.0.0.0:{port}")
    } else {
        address.to_string()
    };
    normalized.parse().map_err(|e| format!("invalid server address {address}: {e}"))
}
