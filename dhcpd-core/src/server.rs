//! UDP receive loop: decode → [`Dispatcher`] → encode (§6)
//!
//! grounded on `tools/dhcp-loadtest/src/transport/udp_v4.rs`'s socket2 bind
//! (`SO_BINDTODEVICE` via `bind_device`, non-blocking, broadcast-enabled)
//! rather than the teacher's `unix-udp-sock`/`Server<T>` framework, which
//! exists to support v4+v6 plus third-party plugin composition this server
//! doesn't need.

use std::net::SocketAddr;
use std::os::fd::{FromRawFd, IntoRawFd};
use std::sync::Arc;

use dhcproto::{Decodable, Decoder, Encodable};
use socket2::{Domain, Socket, Type};
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    dispatcher::{Dispatcher, Outcome},
    error::Error,
    options_cache::OptionsCache,
    store::Store,
};

/// binds a UDP socket and drives the dispatcher for every received datagram
#[derive(Debug)]
pub struct UdpServer {
    socket: UdpSocket,
}

impl UdpServer {
    /// bind `addr`, optionally restricting the socket to a single interface
    pub fn bind(addr: SocketAddr, interface: Option<&str>) -> Result<Self, Error> {
        let socket = Socket::new(Domain::for_address(addr), Type::DGRAM, None)
            .map_err(|err| Error::Fatal(format!("creating udp socket: {err}")))?;
        socket
            .set_nonblocking(true)
            .map_err(|err| Error::Fatal(format!("setting udp socket nonblocking: {err}")))?;
        socket
            .set_broadcast(true)
            .map_err(|err| Error::Fatal(format!("enabling udp broadcast: {err}")))?;
        socket
            .set_reuse_address(true)
            .map_err(|err| Error::Fatal(format!("enabling udp reuseaddr: {err}")))?;

        if let Some(iface) = interface {
            socket
                .bind_device(Some(iface.as_bytes()))
                .map_err(|err| Error::Fatal(format!("binding to interface {iface:?}: {err}")))?;
        }

        socket
            .bind(&addr.into())
            .map_err(|err| Error::Fatal(format!("binding udp socket to {addr}: {err}")))?;

        let std_socket = unsafe { std::net::UdpSocket::from_raw_fd(socket.into_raw_fd()) };
        let socket = UdpSocket::from_std(std_socket)
            .map_err(|err| Error::Fatal(format!("adopting udp socket into tokio: {err}")))?;

        info!(%addr, ?interface, "dhcp udp socket bound");
        Ok(UdpServer { socket })
    }

    /// the address this server's socket is actually bound to (useful when
    /// binding to port 0 for tests)
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// receive datagrams until `token` is cancelled, dispatching each on its
    /// own task so a slow Store call for one client never delays another's
    /// reply (§5: "parallel... one task per packet or a worker pool")
    pub async fn serve(
        self,
        store: Arc<dyn Store>,
        cache: Arc<OptionsCache>,
        token: CancellationToken,
    ) {
        let socket = Arc::new(self.socket);
        let mut buf = vec![0u8; 1 << 16];
        loop {
            let (len, peer) = tokio::select! {
                _ = token.cancelled() => {
                    debug!("udp server stopping");
                    return;
                }
                res = socket.recv_from(&mut buf) => {
                    match res {
                        Ok(value) => value,
                        Err(err) => {
                            warn!(%err, "udp recv failed");
                            continue;
                        }
                    }
                }
            };

            let datagram = buf[..len].to_vec();
            let socket = Arc::clone(&socket);
            let store = Arc::clone(&store);
            let cache = Arc::clone(&cache);
            tokio::spawn(async move {
                handle_datagram(socket.as_ref(), &store, &cache, &datagram, peer).await;
            });
        }
    }
}

async fn handle_datagram(
    socket: &UdpSocket,
    store: &Arc<dyn Store>,
    cache: &OptionsCache,
    datagram: &[u8],
    peer: SocketAddr,
) {
    let request = match dhcproto::v4::Message::decode(&mut Decoder::new(datagram)) {
        Ok(msg) => msg,
        Err(err) => {
            warn!(%err, %peer, "failed to decode dhcpv4 datagram");
            return;
        }
    };

    if let Outcome::Reply(reply) = Dispatcher::handle(store.as_ref(), cache, &request).await {
        match reply.to_vec() {
            Ok(bytes) => {
                if let Err(err) = socket.send_to(&bytes, peer).await {
                    warn!(%err, %peer, "failed to send dhcpv4 reply");
                }
            }
            Err(err) => warn!(%err, "failed to encode dhcpv4 reply"),
        }
    }
}
