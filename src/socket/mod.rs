//! SO_REUSEPORT UDP worker pool.
//!
//! No direct analogue in the teacher crate, which listens on a single
//! `TcpListener`; grounded on the `socket2` reuse-port dance from
//! `other_examples`' Nyx transport (`UdpPool::bind`: build with
//! `socket2::Socket`, set `SO_REUSEPORT`/`SO_REUSEADDR`, bind, hand off to
//! `tokio::net::UdpSocket::from_std`), repeated M times so the kernel
//! load-balances inbound flows across the pool by 4-tuple hash per spec.md
//! §4.4.
//!
//! The write side is drained by all M workers. A single
//! `tokio::sync::mpsc::Receiver` only supports one consumer, so sharing it
//! behind an `Arc<Mutex<..>>` held across `.recv().await` would serialize
//! every writer onto whichever one task currently holds the lock, undercutting
//! the M-worker parallelism spec.md §4.4 describes. `async_channel` (already
//! in the pack via `paritytech-polkadot-sdk`'s networking crates) gives a
//! cheaply cloneable MPMC receiver instead, so every writer awaits its own
//! handle with no lock.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwapOption;
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::buffer::{PacketBuffer, Pool};
use crate::crypto::Cipher;
use crate::router::RoutingTable;

pub const DEFAULT_WORKERS: usize = 10;
const CHANNEL_CAPACITY: usize = 1000;

/// Cipher state shared by every socket worker, hot-swappable by the
/// supervisor on config reload. `None` means insecure mode: packets cross
/// the wire unencrypted.
pub type CipherState = ArcSwapOption<dyn Cipher>;

pub struct SocketSide {
    pub read_rx: mpsc::Receiver<PacketBuffer>,
    pub write_tx: async_channel::Sender<PacketBuffer>,
}

impl SocketSide {
    /// Binds `workers` UDP sockets to `addr` with SO_REUSEPORT and spawns a
    /// reader/writer task pair per worker.
    pub async fn bind(
        addr: SocketAddr,
        workers: usize,
        keepalive: Duration,
        routing_table: Arc<RoutingTable>,
        cipher: Arc<CipherState>,
        pool: Arc<Pool>,
        cancel: CancellationToken,
    ) -> crate::Result<Self> {
        let (read_tx, read_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (write_tx, write_rx) = async_channel::bounded(CHANNEL_CAPACITY);

        for worker_id in 0..workers.max(1) {
            let socket = Arc::new(bind_reuseport(addr, keepalive)?);

            tokio::spawn(run_reader(
                worker_id,
                socket.clone(),
                read_tx.clone(),
                cipher.clone(),
                pool.clone(),
                cancel.clone(),
            ));
            tokio::spawn(run_writer(
                worker_id,
                socket,
                write_rx.clone(),
                routing_table.clone(),
                cipher.clone(),
                pool.clone(),
                addr.port(),
                cancel.clone(),
            ));
        }

        Ok(Self { read_rx, write_tx })
    }
}

fn bind_reuseport(addr: SocketAddr, keepalive: Duration) -> crate::Result<UdpSocket> {
    let domain = Domain::for_address(addr);
    let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))
        .map_err(|e| format!("failed to create socket: {e}"))?;

    socket
        .set_reuse_address(true)
        .map_err(|e| format!("failed to set SO_REUSEADDR: {e}"))?;
    // MUST be set before bind: this is what lets M workers share one port
    // with kernel-side flow hashing (spec.md §4.4).
    socket
        .set_reuse_port(true)
        .map_err(|e| format!("failed to set SO_REUSEPORT: {e}"))?;
    socket.bind(&addr.into()).map_err(|e| format!("failed to bind {addr}: {e}"))?;
    socket.set_nonblocking(true).map_err(|e| format!("failed to set nonblocking: {e}"))?;

    // Carried over from the source's `net.ListenConfig.KeepAlive`: on a
    // connectionless UDP socket SO_KEEPALIVE has no observable effect, but
    // the knob is still set from config for parity with the wire-level
    // config schema (spec.md §6).
    if !keepalive.is_zero() {
        let _ = socket.set_keepalive(true);
    }

    let std_socket: std::net::UdpSocket = socket.into();
    UdpSocket::from_std(std_socket).map_err(|e| format!("failed to adopt socket into tokio: {e}").into())
}

async fn run_reader(
    worker_id: usize,
    socket: Arc<UdpSocket>,
    read_tx: mpsc::Sender<PacketBuffer>,
    cipher: Arc<CipherState>,
    pool: Arc<Pool>,
    cancel: CancellationToken,
) {
    loop {
        let mut buf = pool.acquire();
        tokio::select! {
            _ = cancel.cancelled() => return,
            result = socket.recv_from(buf.full_capacity_mut()) => {
                let (n, _src) = match result {
                    Ok(v) => v,
                    Err(e) => {
                        tracing::warn!("socket worker {worker_id}: recv error: {e}");
                        pool.release(buf);
                        continue;
                    }
                };
                buf.set_len(n);

                if let Some(cipher) = cipher.load_full() {
                    match cipher.decrypt(buf.as_slice()) {
                        Ok(plain) => buf.copy_from(&plain),
                        Err(e) => {
                            tracing::debug!("socket worker {worker_id}: decrypt failed: {e}");
                            pool.release(buf);
                            continue;
                        }
                    }
                }

                if read_tx.try_send(buf).is_err() {
                    tracing::debug!("socket worker {worker_id}: read queue full, dropping packet");
                }
            }
        }
    }
}

async fn run_writer(
    worker_id: usize,
    socket: Arc<UdpSocket>,
    write_rx: async_channel::Receiver<PacketBuffer>,
    routing_table: Arc<RoutingTable>,
    cipher: Arc<CipherState>,
    pool: Arc<Pool>,
    port: u16,
    cancel: CancellationToken,
) {
    loop {
        let buf = tokio::select! {
            _ = cancel.cancelled() => return,
            buf = write_rx.recv() => buf,
        };
        let Ok(buf) = buf else { return };

        let header = match crate::header::parse(buf.as_slice()) {
            Ok(h) => h,
            Err(e) => {
                tracing::debug!("socket worker {worker_id}: bad packet header: {e}");
                pool.release(buf);
                continue;
            }
        };

        let Some(next_hop) = routing_table.lookup(header.dst) else {
            tracing::debug!("socket worker {worker_id}: no route for {}", header.dst);
            pool.release(buf);
            continue;
        };

        let dest = SocketAddr::new(next_hop, port);

        let send_result = if let Some(cipher) = cipher.load_full() {
            match cipher.encrypt(buf.as_slice()) {
                Ok(ciphertext) => socket.send_to(&ciphertext, dest).await,
                Err(e) => {
                    tracing::warn!("socket worker {worker_id}: encrypt failed: {e}");
                    pool.release(buf);
                    continue;
                }
            }
        } else {
            socket.send_to(buf.as_slice(), dest).await
        };

        if let Err(e) = send_result {
            tracing::warn!("socket worker {worker_id}: send to {dest} failed: {e}");
        }
        pool.release(buf);
    }
}
