//! chooses an IPv4 address for a client request (§4.5)

use std::net::Ipv4Addr;
use std::time::SystemTime;

use mac_address::MacAddress;
use rand::Rng;

use crate::{
    error::Error,
    lease_manager::{LeaseManager, TouchResult},
    model::{epoch_secs, Options},
    store::Store,
};

/// binding → existing-lease → dynamic-scan address chooser
#[derive(Debug, Clone, Copy)]
pub struct Allocator;

impl Allocator {
    /// choose an address to offer/ack for `client`, per the ordered steps in §4.5
    pub async fn allocate(
        store: &dyn Store,
        client: MacAddress,
        options: &Options,
    ) -> Result<Ipv4Addr, Error> {
        let lease_time = options.lease_duration()?;

        // 1. binding path
        if let Some(binding) = store.binding_find_by_mac(client).await? {
            return match LeaseManager::touch(store, binding.bind_addr, client, lease_time).await? {
                TouchResult::Fresh | TouchResult::Renewed => Ok(binding.bind_addr),
                TouchResult::TakenByOther => Err(Error::BoundAddressStolen(binding.bind_addr)),
            };
        }

        // 2. existing-lease path
        if let Some(lease) = store.lease_find_by_mac(client).await? {
            let expires = epoch_secs(SystemTime::now() + lease_time);
            store
                .lease_save(&crate::model::Lease { expires, ..lease })
                .await?;
            return Ok(lease.assigned_addr);
        }

        // 3. dynamic scan
        Self::dynamic_scan(store, client, options, lease_time).await
    }

    async fn dynamic_scan(
        store: &dyn Store,
        client: MacAddress,
        options: &Options,
        lease_time: std::time::Duration,
    ) -> Result<Ipv4Addr, Error> {
        let start = u32::from(options.range_start_ip);
        let end = u32::from(options.range_end_ip);
        if start > end {
            return Err(Error::InvalidInput(
                "range_start_ip must not exceed range_end_ip".into(),
            ));
        }

        let p = rand::thread_rng().gen_range(start..=end);

        // forward: p, p+1, ..., end
        let mut candidate = p;
        loop {
            if let Some(addr) = Self::try_candidate(store, client, candidate, lease_time).await? {
                return Ok(addr);
            }
            if candidate == end {
                break;
            }
            candidate += 1;
        }

        // backward: p-1, p-2, ..., start
        let mut candidate = p;
        while candidate > start {
            candidate -= 1;
            if let Some(addr) = Self::try_candidate(store, client, candidate, lease_time).await? {
                return Ok(addr);
            }
        }

        Err(Error::RangeExhausted)
    }

    /// returns `Some(addr)` if `candidate` is free and now leased to `client`
    async fn try_candidate(
        store: &dyn Store,
        client: MacAddress,
        candidate: u32,
        lease_time: std::time::Duration,
    ) -> Result<Option<Ipv4Addr>, Error> {
        let addr = Ipv4Addr::from(candidate);

        if store.binding_find_by_addr(addr).await?.is_some() {
            return Ok(None);
        }
        if store.reservation_find(addr).await?.is_some() {
            return Ok(None);
        }

        match LeaseManager::touch(store, addr, client, lease_time).await? {
            TouchResult::Fresh | TouchResult::Renewed => Ok(Some(addr)),
            TouchResult::TakenByOther => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Binding, Reservation};
    use crate::store::sqlite::SqliteStore;
    use sqlx::SqlitePool;

    async fn test_store() -> SqliteStore {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        SqliteStore::from_pool(pool).await.unwrap()
    }

    fn mac(last: u8) -> MacAddress {
        MacAddress::new([0xaa, 0xbb, 0xcc, 0xdd, 0xee, last])
    }

    fn narrow_range_options() -> Options {
        let mut opts = Options::bootstrap_default();
        opts.range_start_ip = "10.1.1.10".parse().unwrap();
        opts.range_end_ip = "10.1.1.20".parse().unwrap();
        opts
    }

    #[tokio::test]
    async fn fresh_discover_allocates_within_range() {
        let store = test_store().await;
        let options = narrow_range_options();
        let addr = Allocator::allocate(&store, mac(1), &options).await.unwrap();
        assert!(u32::from(addr) >= u32::from(options.range_start_ip));
        assert!(u32::from(addr) <= u32::from(options.range_end_ip));
        assert_eq!(store.lease_list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn request_after_discover_reuses_same_address() {
        let store = test_store().await;
        let options = narrow_range_options();
        let first = Allocator::allocate(&store, mac(1), &options).await.unwrap();
        let second = Allocator::allocate(&store, mac(1), &options).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(store.lease_list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn bound_client_gets_binding_address() {
        let store = test_store().await;
        let options = narrow_range_options();
        let client = mac(66);
        let bind_addr: Ipv4Addr = "10.1.1.50".parse().unwrap();
        store
            .binding_create(&Binding {
                client_hw_addr: client,
                bind_addr,
            })
            .await
            .unwrap();

        let addr = Allocator::allocate(&store, client, &options).await.unwrap();
        assert_eq!(addr, bind_addr);
    }

    #[tokio::test]
    async fn reserved_address_is_skipped_and_range_can_exhaust() {
        let store = test_store().await;
        let mut options = narrow_range_options();
        options.range_start_ip = "10.1.1.10".parse().unwrap();
        options.range_end_ip = "10.1.1.15".parse().unwrap();

        store
            .reservation_create(&Reservation {
                address: "10.1.1.15".parse().unwrap(),
            })
            .await
            .unwrap();

        for (i, last) in (10u8..=14).enumerate() {
            let addr: Ipv4Addr = format!("10.1.1.{last}").parse().unwrap();
            LeaseManager::touch(
                &store,
                addr,
                mac(i as u8),
                options.lease_duration().unwrap(),
            )
            .await
            .unwrap();
        }

        let result = Allocator::allocate(&store, mac(200), &options).await;
        assert!(matches!(result, Err(Error::RangeExhausted)));
    }
}
