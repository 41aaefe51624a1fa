//! end-to-end exercise of the dhcpv4 socket loop over real loopback UDP:
//! client datagrams in, dispatcher-built replies out. Unicast only -- this
//! drives the dispatcher/allocator/lease-manager chain through the wire
//! codec, not the kernel's broadcast delivery path.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use dhcproto::{Decodable, Decoder, Encodable};
use dhcproto::v4;
use mac_address::MacAddress;
use sqlx::SqlitePool;
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;

use dhcpd_core::{
    model::Options,
    options_cache::OptionsCache,
    server::UdpServer,
    store::{sqlite::SqliteStore, Store},
};

async fn spawn_server(opts: Options) -> (SocketAddr, Arc<dyn Store>, CancellationToken) {
    let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
    let store: Arc<dyn Store> = Arc::new(SqliteStore::from_pool(pool).await.unwrap());
    store.options_create(&opts).await.unwrap();
    let cache = Arc::new(OptionsCache::new());

    let udp = UdpServer::bind("127.0.0.1:0".parse().unwrap(), None).unwrap();
    let addr = udp.local_addr().unwrap();
    let token = CancellationToken::new();
    tokio::spawn(udp.serve(Arc::clone(&store), cache, token.clone()));
    // give the accept loop a moment to start polling
    tokio::time::sleep(Duration::from_millis(20)).await;
    (addr, store, token)
}

fn narrow_range_options() -> Options {
    let mut opts = Options::bootstrap_default();
    opts.range_start_ip = "10.1.1.10".parse().unwrap();
    opts.range_end_ip = "10.1.1.20".parse().unwrap();
    opts
}

fn discover(xid: u32, chaddr: &[u8; 6]) -> v4::Message {
    let mut msg = v4::Message::new_with_id(
        xid,
        Ipv4Addr::UNSPECIFIED,
        Ipv4Addr::UNSPECIFIED,
        Ipv4Addr::UNSPECIFIED,
        Ipv4Addr::UNSPECIFIED,
        chaddr,
    );
    msg.opts_mut()
        .insert(v4::DhcpOption::MessageType(v4::MessageType::Discover));
    msg
}

fn request(xid: u32, chaddr: &[u8; 6]) -> v4::Message {
    let mut msg = v4::Message::new_with_id(
        xid,
        Ipv4Addr::UNSPECIFIED,
        Ipv4Addr::UNSPECIFIED,
        Ipv4Addr::UNSPECIFIED,
        Ipv4Addr::UNSPECIFIED,
        chaddr,
    );
    msg.opts_mut()
        .insert(v4::DhcpOption::MessageType(v4::MessageType::Request));
    msg
}

async fn roundtrip(client: &UdpSocket, server: SocketAddr, msg: &v4::Message) -> v4::Message {
    let bytes = msg.to_vec().unwrap();
    client.send_to(&bytes, server).await.unwrap();

    let mut buf = vec![0u8; 1 << 16];
    let (len, _) = tokio::time::timeout(Duration::from_secs(2), client.recv_from(&mut buf))
        .await
        .expect("server did not reply in time")
        .unwrap();
    v4::Message::decode(&mut Decoder::new(&buf[..len])).unwrap()
}

#[tokio::test]
async fn discover_then_request_yields_stable_lease() {
    let (server_addr, store, token) = spawn_server(narrow_range_options()).await;
    let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let chaddr = [0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0x01];

    let offer = roundtrip(&client, server_addr, &discover(0x1234, &chaddr)).await;
    assert_eq!(offer.opts().msg_type(), Some(v4::MessageType::Offer));
    assert_eq!(offer.opcode(), v4::Opcode::BootReply);
    assert_eq!(offer.xid(), 0x1234);
    let yiaddr = offer.yiaddr();
    assert!(yiaddr >= "10.1.1.10".parse().unwrap() && yiaddr <= "10.1.1.20".parse().unwrap());

    let mac = MacAddress::new(chaddr);
    let lease = store.lease_find_by_mac(mac).await.unwrap().unwrap();
    assert_eq!(lease.assigned_addr, yiaddr);
    let first_expiry = lease.expires;

    tokio::time::sleep(Duration::from_millis(1100)).await;

    let ack = roundtrip(&client, server_addr, &request(0x5678, &chaddr)).await;
    assert_eq!(ack.opts().msg_type(), Some(v4::MessageType::Ack));
    assert_eq!(ack.opcode(), v4::Opcode::BootReply);
    assert_eq!(ack.yiaddr(), yiaddr);

    let renewed = store.lease_find_by_mac(mac).await.unwrap().unwrap();
    assert_eq!(renewed.assigned_addr, yiaddr);
    assert!(renewed.expires >= first_expiry);
    assert_eq!(store.lease_list().await.unwrap().len(), 1);

    token.cancel();
}

#[tokio::test]
async fn release_frees_the_address_for_reallocation() {
    let (server_addr, store, token) = spawn_server(narrow_range_options()).await;
    let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let chaddr = [0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0x02];

    let offer = roundtrip(&client, server_addr, &discover(1, &chaddr)).await;
    assert_eq!(offer.opts().msg_type(), Some(v4::MessageType::Offer));

    let mut release = request(2, &chaddr);
    release
        .opts_mut()
        .insert(v4::DhcpOption::MessageType(v4::MessageType::Release));

    let bytes = release.to_vec().unwrap();
    client.send_to(&bytes, server_addr).await.unwrap();
    // RELEASE gets no reply; give the server a moment to process it
    tokio::time::sleep(Duration::from_millis(100)).await;

    let mac = MacAddress::new(chaddr);
    assert!(store.lease_find_by_mac(mac).await.unwrap().is_none());

    token.cancel();
}
