//! the transactional store contract (§4.1)
//!
//! the dispatcher, allocator, lease manager, ACL gate and admin surface are
//! all generic over [`Store`] rather than threading a process-global
//! connection through handlers (§9, "package-level store handle").

pub mod sqlite;

use std::net::Ipv4Addr;

use mac_address::MacAddress;

use crate::{
    error::Error,
    model::{AclAction, AclRule, Binding, Lease, Options, Reservation},
};

/// row operations backing every component in this crate
///
/// uniqueness constraints from §3 are enforced by the implementation; a
/// `create` that violates one must return [`Error::Conflict`].
#[async_trait::async_trait]
pub trait Store: Send + Sync + std::fmt::Debug {
    /// read the singleton Options row, if it exists
    async fn options_get(&self) -> Result<Option<Options>, Error>;
    /// insert the Options row; fails with `Conflict` if one already exists (§3 invariant 4)
    async fn options_create(&self, opts: &Options) -> Result<(), Error>;
    /// upsert the Options row in place
    async fn options_save(&self, opts: &Options) -> Result<(), Error>;

    /// look up a lease by client MAC
    async fn lease_find_by_mac(&self, mac: MacAddress) -> Result<Option<Lease>, Error>;
    /// look up a lease by assigned address
    async fn lease_find_by_addr(&self, addr: Ipv4Addr) -> Result<Option<Lease>, Error>;
    /// insert a new lease row; fails with `Conflict` on a duplicate MAC or address
    async fn lease_create(&self, lease: &Lease) -> Result<(), Error>;
    /// update an existing lease's expiry (keyed by MAC)
    async fn lease_save(&self, lease: &Lease) -> Result<(), Error>;
    /// hard-delete all leases for a MAC, returning the number of rows removed
    async fn lease_delete_by_mac(&self, mac: MacAddress) -> Result<u64, Error>;
    /// hard-delete all leases expiring strictly before `threshold` (unix seconds)
    async fn lease_delete_expired(&self, threshold: i64) -> Result<u64, Error>;
    /// list every lease row
    async fn lease_list(&self) -> Result<Vec<Lease>, Error>;

    /// look up a binding by client MAC
    async fn binding_find_by_mac(&self, mac: MacAddress) -> Result<Option<Binding>, Error>;
    /// look up a binding by bound address
    async fn binding_find_by_addr(&self, addr: Ipv4Addr) -> Result<Option<Binding>, Error>;
    /// insert a new binding row; fails with `Conflict` on a duplicate MAC or address
    async fn binding_create(&self, binding: &Binding) -> Result<(), Error>;
    /// upsert a binding row in place
    async fn binding_save(&self, binding: &Binding) -> Result<(), Error>;
    /// hard-delete bindings matching MAC and/or address (at least one must be `Some`)
    async fn binding_delete(
        &self,
        mac: Option<MacAddress>,
        addr: Option<Ipv4Addr>,
    ) -> Result<u64, Error>;
    /// list every binding row
    async fn binding_list(&self) -> Result<Vec<Binding>, Error>;

    /// look up a reservation by address
    async fn reservation_find(&self, addr: Ipv4Addr) -> Result<Option<Reservation>, Error>;
    /// insert a new reservation row; fails with `Conflict` on a duplicate address
    async fn reservation_create(&self, reservation: &Reservation) -> Result<(), Error>;
    /// hard-delete a reservation by address
    async fn reservation_delete(&self, addr: Ipv4Addr) -> Result<u64, Error>;
    /// list every reservation row
    async fn reservation_list(&self) -> Result<Vec<Reservation>, Error>;

    /// does at least one ACL rule exist for `(mac, action)`? (§4.4 match definition)
    async fn acl_has_match(&self, mac: MacAddress, action: AclAction) -> Result<bool, Error>;
    /// insert a new ACL rule row; fails with `Conflict` on a duplicate `(mac, action)`
    async fn acl_create(&self, rule: &AclRule) -> Result<(), Error>;
    /// upsert an ACL rule in place
    async fn acl_save(&self, rule: &AclRule) -> Result<(), Error>;
    /// hard-delete every ACL rule for a MAC
    async fn acl_delete(&self, mac: MacAddress) -> Result<u64, Error>;
    /// list every ACL rule row
    async fn acl_list(&self) -> Result<Vec<AclRule>, Error>;
}
