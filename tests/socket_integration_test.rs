//! End-to-end exercise of the socket side over real loopback UDP sockets:
//! a [`SocketSide`] talking to a plain `tokio::net::UdpSocket` standing in
//! for a peer, with GCM encryption on the wire, following the teacher
//! crate's `tests/peer_integration_test.rs` style of driving real sockets
//! rather than mocking the network layer.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwapOption;
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;

use radvpn::buffer::Pool;
use radvpn::crypto::{self, CipherKind};
use radvpn::router::kernel::NullRouteInstaller;
use radvpn::router::RoutingTable;
use radvpn::socket::SocketSide;

const TEST_KEY: &str = "000102030405060708090a0b0c0d0e0f";

fn ipv4_packet(dst: [u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut buf = vec![0u8; 20 + payload.len()];
    buf[0] = 0x45; // version 4, IHL 5
    buf[12..16].copy_from_slice(&[10, 0, 9, 9]); // arbitrary source
    buf[16..20].copy_from_slice(&dst);
    buf[20..].copy_from_slice(payload);
    buf
}

#[tokio::test]
async fn socket_side_encrypts_outbound_and_decrypts_inbound() {
    let cancel = CancellationToken::new();

    // A bare UDP socket standing in for a remote peer.
    let peer_socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let peer_ip: IpAddr = peer_socket.local_addr().unwrap().ip();

    let routing_table = Arc::new(RoutingTable::new("radvpn", Arc::new(NullRouteInstaller)));
    routing_table.add("10.0.1.0/24".parse().unwrap(), peer_ip).unwrap();

    let cipher = crypto::new_cipher(CipherKind::Gcm, TEST_KEY).unwrap();
    let cipher_state = Arc::new(ArcSwapOption::from(Some(Arc::from(cipher))));
    let verify_cipher = crypto::new_cipher(CipherKind::Gcm, TEST_KEY).unwrap();

    let pool = Arc::new(Pool::new(4));

    let mut socket_side = SocketSide::bind(
        "127.0.0.1:0".parse().unwrap(),
        1,
        Duration::from_secs(10),
        routing_table.clone(),
        cipher_state.clone(),
        pool.clone(),
        cancel.clone(),
    )
    .await
    .unwrap();

    // Outbound: push a plaintext IP packet destined for 10.0.1.42 (inside
    // the routed prefix) into the write queue; the writer must look up the
    // peer, encrypt, and send it to `peer_socket`.
    let mut buf = pool.acquire();
    buf.copy_from(&ipv4_packet([10, 0, 1, 42], b"outbound payload"));
    socket_side.write_tx.send(buf).await.unwrap();

    let mut recv_buf = vec![0u8; 2048];
    let (n, socket_side_addr) = tokio::time::timeout(Duration::from_secs(2), peer_socket.recv_from(&mut recv_buf))
        .await
        .expect("peer did not receive the encrypted datagram")
        .unwrap();

    let plaintext = verify_cipher.decrypt(&recv_buf[..n]).expect("datagram must decrypt with the shared key");
    assert_eq!(&plaintext[20..], b"outbound payload");
    assert_eq!(&plaintext[16..20], &[10, 0, 1, 42]);

    // Inbound: the peer sends an encrypted datagram back, to the address it
    // just observed the outbound datagram arrive from; SocketSide must
    // decrypt it and surface the plaintext on the read queue.
    let reply = ipv4_packet([10, 0, 0, 5], b"inbound payload");
    let ciphertext = verify_cipher.encrypt(&reply).unwrap();
    peer_socket.send_to(&ciphertext, socket_side_addr).await.unwrap();

    let delivered = tokio::time::timeout(Duration::from_secs(2), socket_side.read_rx.recv())
        .await
        .expect("socket side did not deliver the decrypted inbound packet")
        .expect("read channel closed unexpectedly");
    assert_eq!(delivered.as_slice(), reply.as_slice());

    cancel.cancel();
}
