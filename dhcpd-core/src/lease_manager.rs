//! lease creation, renewal, release and expiry (§4.6)

use std::net::Ipv4Addr;
use std::time::SystemTime;

use mac_address::MacAddress;
use tracing::warn;

use crate::{
    error::Error,
    model::{epoch_secs, Lease},
    store::Store,
};

/// outcome of [`LeaseManager::touch`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TouchResult {
    /// a new lease row was created for `(addr, client)`
    Fresh,
    /// an existing lease for `(addr, client)` had its expiry extended
    Renewed,
    /// `addr` is already leased to a different client
    TakenByOther,
}

/// owns lease lifecycle operations against a [`Store`]
#[derive(Debug, Clone, Copy)]
pub struct LeaseManager;

impl LeaseManager {
    /// create, renew, or reject a lease for `(addr, client)`
    ///
    /// this does not check expiry when deciding "taken by other" (§4.6 note,
    /// §9 item 2) — a not-yet-swept expired lease still blocks the address
    /// until the next [`LeaseManager::expire`] tick removes it.
    pub async fn touch(
        store: &dyn Store,
        addr: Ipv4Addr,
        client: MacAddress,
        lease_time: std::time::Duration,
    ) -> Result<TouchResult, Error> {
        let expires = epoch_secs(SystemTime::now() + lease_time);

        if let Some(existing) = store.lease_find_by_addr(addr).await? {
            if existing.client_hw_addr == client {
                store
                    .lease_save(&Lease {
                        expires,
                        ..existing
                    })
                    .await?;
                return Ok(TouchResult::Renewed);
            }
            return Ok(TouchResult::TakenByOther);
        }

        let lease = Lease {
            client_hw_addr: client,
            assigned_addr: addr,
            expires,
        };
        match store.lease_create(&lease).await {
            Ok(()) => Ok(TouchResult::Fresh),
            Err(Error::Conflict(_)) => Ok(TouchResult::TakenByOther),
            Err(err) => Err(err),
        }
    }

    /// hard-delete every lease belonging to `client`
    ///
    /// used by both RELEASE and DECLINE; errors are logged, not surfaced
    /// (§4.6: "Errors are logged, not surfaced").
    pub async fn release(store: &dyn Store, client: MacAddress) {
        if let Err(err) = store.lease_delete_by_mac(client).await {
            warn!(%client, %err, "failed to release lease");
        }
    }

    /// hard-delete every lease expiring strictly before `now`
    ///
    /// uses `now`, not `now + lease_time` — the source's threshold deletes
    /// non-expired leases too (§9 item 1).
    pub async fn expire(store: &dyn Store, now: SystemTime) -> Result<u64, Error> {
        store.lease_delete_expired(epoch_secs(now)).await
    }
}
