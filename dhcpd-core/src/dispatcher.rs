//! per-packet state machine: ACL → allocate → reply (§4.8)

use std::net::Ipv4Addr;
use std::time::Instant;

use dhcproto::v4;
use mac_address::MacAddress;
use tracing::{info, instrument, warn};

use crate::{
    acl::AclGate,
    allocator::Allocator,
    error::Error,
    lease_manager::LeaseManager,
    metrics,
    model::Options,
    options_cache::OptionsCache,
    reply::ReplyBuilder,
    store::Store,
};

/// outcome of [`Dispatcher::handle`]
#[derive(Debug, Clone)]
pub enum Outcome {
    /// a reply should be sent to the requesting peer
    Reply(Box<v4::Message>),
    /// no reply: ACL denial, an unhandled message type, or a dropped error (§4.8)
    Silent,
}

/// the DHCPv4 message dispatcher (§4.8)
///
/// a bare match over `dhcproto::v4::MessageType` — there is no plugin chain
/// to generalize, just the four handled types and a catch-all.
#[derive(Debug, Clone, Copy)]
pub struct Dispatcher;

fn client_mac(msg: &v4::Message) -> Result<MacAddress, Error> {
    let chaddr = msg.chaddr();
    if chaddr.len() < 6 {
        return Err(Error::InvalidInput(format!(
            "chaddr too short: {} bytes",
            chaddr.len()
        )));
    }
    let mut bytes = [0u8; 6];
    bytes.copy_from_slice(&chaddr[..6]);
    Ok(MacAddress::new(bytes))
}

impl Dispatcher {
    /// dispatch one decoded request, returning what (if anything) to send back
    ///
    /// ACL denial and allocation failure are both silent per §4.8: "no NAK is
    /// sent (this is a simplification vs. full RFC behavior)".
    #[instrument(skip(store, cache, request), fields(xid = request.xid()))]
    pub async fn handle(
        store: &dyn Store,
        cache: &OptionsCache,
        request: &v4::Message,
    ) -> Outcome {
        let started = Instant::now();
        let Some(msg_type) = request.opts().msg_type() else {
            info!("request carries no DHCP message type option, dropping");
            return Outcome::Silent;
        };
        metrics::RECV_COUNT_VEC
            .with_label_values(&[metrics::msg_type_label(msg_type)])
            .inc();

        let client = match client_mac(request) {
            Ok(mac) => mac,
            Err(err) => {
                warn!(%err, "malformed client hardware address, dropping");
                return Outcome::Silent;
            }
        };

        let outcome = match msg_type {
            v4::MessageType::Discover => {
                Self::handle_lease_request(store, cache, request, client, v4::MessageType::Offer).await
            }
            v4::MessageType::Request => {
                Self::handle_lease_request(store, cache, request, client, v4::MessageType::Ack).await
            }
            v4::MessageType::Release | v4::MessageType::Decline => {
                LeaseManager::release(store, client).await;
                Outcome::Silent
            }
            other => {
                info!(?other, "unhandled DHCP message type");
                Outcome::Silent
            }
        };

        if let Outcome::Reply(reply) = &outcome {
            if let Some(sent_type) = reply.opts().msg_type() {
                metrics::SENT_COUNT_VEC
                    .with_label_values(&[metrics::msg_type_label(sent_type)])
                    .inc();
            }
        }
        metrics::DISPATCH_DURATION
            .with_label_values(&[metrics::msg_type_label(msg_type)])
            .observe(started.elapsed().as_secs_f64());

        outcome
    }

    async fn handle_lease_request(
        store: &dyn Store,
        cache: &OptionsCache,
        request: &v4::Message,
        client: MacAddress,
        reply_type: v4::MessageType,
    ) -> Outcome {
        let options = match cache.query(store).await {
            Ok(options) => options,
            Err(err) => {
                warn!(%err, "options unavailable, dropping packet");
                return Outcome::Silent;
            }
        };

        if !AclGate::decide(store, client, &options).await {
            info!(%client, "denied by ACL");
            return Outcome::Silent;
        }

        let assigned = match Self::allocate(store, client, &options).await {
            Ok(addr) => addr,
            Err(err) => {
                warn!(%client, %err, "allocation failed, dropping packet");
                return Outcome::Silent;
            }
        };

        match ReplyBuilder::build(request, reply_type, assigned, &options) {
            Ok(reply) => Outcome::Reply(Box::new(reply)),
            Err(err) => {
                warn!(%client, %err, "failed to build reply, dropping packet");
                Outcome::Silent
            }
        }
    }

    async fn allocate(
        store: &dyn Store,
        client: MacAddress,
        options: &Options,
    ) -> Result<Ipv4Addr, Error> {
        let result = Allocator::allocate(store, client, options).await;
        let outcome_label = match &result {
            Ok(_) => "fresh",
            Err(Error::RangeExhausted) => "range_exhausted",
            Err(Error::BoundAddressStolen(_)) => "bound_address_stolen",
            Err(_) => "error",
        };
        metrics::ALLOC_COUNT_VEC.with_label_values(&[outcome_label]).inc();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AclRule;
    use crate::store::sqlite::SqliteStore;
    use sqlx::SqlitePool;

    async fn test_store() -> SqliteStore {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        SqliteStore::from_pool(pool).await.unwrap()
    }

    fn discover(chaddr: &[u8; 6]) -> v4::Message {
        let mut req = v4::Message::new_with_id(
            0xdead_beef,
            Ipv4Addr::UNSPECIFIED,
            Ipv4Addr::UNSPECIFIED,
            Ipv4Addr::UNSPECIFIED,
            Ipv4Addr::UNSPECIFIED,
            chaddr,
        );
        req.opts_mut()
            .insert(v4::DhcpOption::MessageType(v4::MessageType::Discover));
        req
    }

    fn release(chaddr: &[u8; 6]) -> v4::Message {
        let mut req = v4::Message::new_with_id(
            0xdead_beef,
            Ipv4Addr::UNSPECIFIED,
            Ipv4Addr::UNSPECIFIED,
            Ipv4Addr::UNSPECIFIED,
            Ipv4Addr::UNSPECIFIED,
            chaddr,
        );
        req.opts_mut()
            .insert(v4::DhcpOption::MessageType(v4::MessageType::Release));
        req
    }

    async fn bootstrap(store: &SqliteStore) {
        let mut opts = Options::bootstrap_default();
        opts.range_start_ip = "10.1.1.10".parse().unwrap();
        opts.range_end_ip = "10.1.1.20".parse().unwrap();
        store.options_create(&opts).await.unwrap();
    }

    #[tokio::test]
    async fn fresh_discover_replies_with_offer() {
        let store = test_store().await;
        bootstrap(&store).await;
        let cache = OptionsCache::new();

        let req = discover(&[0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0x01]);
        match Dispatcher::handle(&store, &cache, &req).await {
            Outcome::Reply(reply) => {
                assert_eq!(reply.opts().msg_type(), Some(v4::MessageType::Offer));
                assert_eq!(reply.xid(), req.xid());
            }
            Outcome::Silent => panic!("expected a reply"),
        }
        assert_eq!(store.lease_list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn release_is_silent_and_clears_the_lease() {
        let store = test_store().await;
        bootstrap(&store).await;
        let cache = OptionsCache::new();
        let chaddr = [0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0x02];

        Dispatcher::handle(&store, &cache, &discover(&chaddr)).await;
        assert_eq!(store.lease_list().await.unwrap().len(), 1);

        let outcome = Dispatcher::handle(&store, &cache, &release(&chaddr)).await;
        assert!(matches!(outcome, Outcome::Silent));
        assert_eq!(store.lease_list().await.unwrap().len(), 0);
    }

    #[tokio::test]
    async fn deny_listed_client_gets_no_reply() {
        let store = test_store().await;
        let mut opts = Options::bootstrap_default();
        opts.range_start_ip = "10.1.1.10".parse().unwrap();
        opts.range_end_ip = "10.1.1.20".parse().unwrap();
        opts.acl_enabled = true;
        opts.acl_action = "deny".to_string();
        store.options_create(&opts).await.unwrap();

        let chaddr = [0xcc, 0xcc, 0xcc, 0xcc, 0xcc, 0x99];
        store
            .acl_create(&AclRule {
                client_hw_addr: MacAddress::new(chaddr),
                action: crate::model::AclAction::Deny,
            })
            .await
            .unwrap();

        let cache = OptionsCache::new();
        let outcome = Dispatcher::handle(&store, &cache, &discover(&chaddr)).await;
        assert!(matches!(outcome, Outcome::Silent));
        assert_eq!(store.lease_list().await.unwrap().len(), 0);
    }
}
