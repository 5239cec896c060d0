//! End-to-end scenarios spanning more than one module: the cross bridge
//! ferrying buffers between the tunnel and socket sides, and a routing
//! table wired up the way `datapath::run` assembles it.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use radvpn::bridge;
use radvpn::buffer::Pool;
use radvpn::router::kernel::NullRouteInstaller;
use radvpn::router::RoutingTable;

#[tokio::test]
async fn cross_bridge_forwards_inbound_direction() {
    let (sock_read_tx, sock_read_rx) = tokio::sync::mpsc::channel(8);
    let (tun_write_tx, tun_write_rx) = async_channel::bounded(8);
    let cancel = tokio_util::sync::CancellationToken::new();

    let handle = tokio::spawn(bridge::run_inbound(sock_read_rx, tun_write_tx, cancel.clone()));

    let pool = Pool::new(1);
    let mut buf = pool.acquire();
    buf.copy_from(b"hello from a peer");
    sock_read_tx.send(buf).await.unwrap();

    let forwarded = tokio::time::timeout(Duration::from_secs(1), tun_write_rx.recv())
        .await
        .expect("forwarded buffer did not arrive within the timeout")
        .expect("channel closed unexpectedly");
    assert_eq!(forwarded.as_slice(), b"hello from a peer");

    cancel.cancel();
    handle.await.unwrap();
}

#[tokio::test]
async fn cross_bridge_forwards_outbound_direction() {
    let (tun_read_tx, tun_read_rx) = tokio::sync::mpsc::channel(8);
    let (sock_write_tx, sock_write_rx) = async_channel::bounded(8);
    let cancel = tokio_util::sync::CancellationToken::new();

    let handle = tokio::spawn(bridge::run_outbound(tun_read_rx, sock_write_tx, cancel.clone()));

    let pool = Pool::new(1);
    let mut buf = pool.acquire();
    buf.copy_from(b"hello from the local tunnel");
    tun_read_tx.send(buf).await.unwrap();

    let forwarded = tokio::time::timeout(Duration::from_secs(1), sock_write_rx.recv())
        .await
        .expect("forwarded buffer did not arrive within the timeout")
        .expect("channel closed unexpectedly");
    assert_eq!(forwarded.as_slice(), b"hello from the local tunnel");

    cancel.cancel();
    handle.await.unwrap();
}

#[test]
fn routing_table_mirrors_irb_updates_end_to_end() {
    let table = RoutingTable::new("radvpn", Arc::new(NullRouteInstaller));

    let mut old_irb = radvpn::router::Irb::new();
    let mut new_irb = radvpn::router::Irb::new();

    let peer_a: IpAddr = "192.168.55.10".parse().unwrap();
    new_irb.insert(peer_a, vec!["10.0.1.0/24".parse().unwrap()]);

    table.update(&old_irb, &new_irb);
    assert_eq!(table.lookup("10.0.1.42".parse().unwrap()), Some(peer_a));
    assert_eq!(table.lookup("10.0.9.1".parse().unwrap()), None);

    old_irb = new_irb;
    let empty_irb = radvpn::router::Irb::new();
    table.update(&old_irb, &empty_irb);
    assert_eq!(table.lookup("10.0.1.42".parse().unwrap()), None);
}
