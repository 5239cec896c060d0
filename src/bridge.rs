//! Cross bridge between the tunnel and socket sides.
//!
//! spec.md §4.5: two independent forwarders, each blocking on its
//! downstream send so a saturated direction stalls without affecting the
//! other. No teacher analogue — the teacher wires its device and connection
//! managers together inline inside `server::server::Server`; this pulls that
//! wiring out into its own pair of tasks so each direction's backpressure is
//! isolated.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::buffer::PacketBuffer;

/// Forwards `sock_read_queue -> tun_write_queue`: decrypted packets arriving
/// from peers, headed for the local tunnel device.
pub async fn run_inbound(
    mut sock_read_rx: mpsc::Receiver<PacketBuffer>,
    tun_write_tx: async_channel::Sender<PacketBuffer>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            buf = sock_read_rx.recv() => {
                let Some(buf) = buf else { return };
                if tun_write_tx.send(buf).await.is_err() {
                    return;
                }
            }
        }
    }
}

/// Forwards `tun_read_queue -> sock_write_queue`: plaintext packets read off
/// the local tunnel device, headed for a peer.
pub async fn run_outbound(
    mut tun_read_rx: mpsc::Receiver<PacketBuffer>,
    sock_write_tx: async_channel::Sender<PacketBuffer>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            buf = tun_read_rx.recv() => {
                let Some(buf) = buf else { return };
                if sock_write_tx.send(buf).await.is_err() {
                    return;
                }
            }
        }
    }
}
