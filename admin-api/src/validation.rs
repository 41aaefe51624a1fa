//! MAC/IP/action parsing and the cross-entity uniqueness checks from §3
//!
//! grounded on `original_source/{api,restful}/verify.go`'s
//! `verifyOptions`/`verifyBind`/`verifyACL`/`verifyReserve` — unlike that
//! source, each validator here returns its error directly rather than
//! mutating a response object passed by value (§9 item 5: the Go helper's
//! `resMsg ResMsg` parameter is a copy, so its mutations are silently
//! dropped by the caller).

use std::net::Ipv4Addr;
use std::str::FromStr;

use mac_address::MacAddress;

use dhcpd_core::model::{AclAction, AclRule, Binding, Options, Reservation};
use dhcpd_core::store::Store;

use crate::models::{AclRequest, BindingRequest, OptionsRequest, ReserveRequest};

fn parse_mac(s: &str) -> Result<MacAddress, String> {
    MacAddress::from_str(s).map_err(|_| format!("{s:?} is not a valid MAC address"))
}

fn parse_ip(s: &str) -> Result<Ipv4Addr, String> {
    s.parse().map_err(|_| format!("{s:?} is not a valid IPv4 address"))
}

/// validate and convert an options request, per §3 invariant: `acl_enabled`
/// implies `acl_action` is `allow` or `deny`, and the range is non-inverted
pub fn validate_options(req: OptionsRequest) -> Result<Options, String> {
    let server_ip = parse_ip(&req.server_ip)?;
    let gateway_ip = parse_ip(&req.gateway_ip)?;
    let range_start_ip = parse_ip(&req.range_start_ip)?;
    let range_end_ip = parse_ip(&req.range_end_ip)?;
    dhcpd_core::codec::NetmaskCodec::parse(&req.netmask).map_err(|err| err.to_string())?;
    humantime::parse_duration(&req.lease_time)
        .map_err(|err| format!("lease_time: {err}"))?;

    if u32::from(range_start_ip) > u32::from(range_end_ip) {
        return Err("range_start_ip must not exceed range_end_ip".to_string());
    }

    if req.acl_enabled && !(req.acl_action == "allow" || req.acl_action == "deny") {
        return Err(
            "enabling acl without specifying acl_action (allow|deny)".to_string(),
        );
    }

    Ok(Options {
        lease_time: req.lease_time,
        server_ip,
        gateway_ip,
        range_start_ip,
        range_end_ip,
        netmask: req.netmask,
        boot_file_name: req.boot_file_name,
        router: req.router,
        dns: req.dns,
        acl_enabled: req.acl_enabled,
        acl_action: req.acl_action,
    })
}

/// validate and convert a binding request, rejecting addresses already
/// leased or reserved (§3 invariant 2)
pub async fn validate_binding(
    store: &dyn Store,
    req: BindingRequest,
) -> Result<Binding, String> {
    let client_hw_addr = parse_mac(&req.client_hw_addr)?;
    let bind_addr = parse_ip(&req.bind_addr)?;

    if store
        .lease_find_by_addr(bind_addr)
        .await
        .map_err(|err| err.to_string())?
        .is_some()
    {
        return Err("bind address is currently assigned to a lease".to_string());
    }
    if store
        .reservation_find(bind_addr)
        .await
        .map_err(|err| err.to_string())?
        .is_some()
    {
        return Err("the binding address is a reserved address".to_string());
    }

    Ok(Binding {
        client_hw_addr,
        bind_addr,
    })
}

/// validate and convert an ACL rule request
pub fn validate_acl(req: AclRequest) -> Result<AclRule, String> {
    let client_hw_addr = parse_mac(&req.client_hw_addr)?;
    let action: AclAction = req
        .action
        .parse()
        .map_err(|_| "action must be \"allow\" or \"deny\"".to_string())?;
    Ok(AclRule {
        client_hw_addr,
        action,
    })
}

/// validate and convert a reservation request, rejecting addresses already
/// leased or bound (§3 invariant 3)
pub async fn validate_reservation(
    store: &dyn Store,
    req: ReserveRequest,
) -> Result<Reservation, String> {
    let address = parse_ip(&req.address)?;

    if store
        .lease_find_by_addr(address)
        .await
        .map_err(|err| err.to_string())?
        .is_some()
    {
        return Err("address is currently assigned to a lease".to_string());
    }
    if store
        .binding_find_by_addr(address)
        .await
        .map_err(|err| err.to_string())?
        .is_some()
    {
        return Err("the reserved address has been bound to a client".to_string());
    }

    Ok(Reservation { address })
}

/// parse the optional `mac`/`ip` query params used by the binding delete route
pub fn parse_optional_mac(s: Option<&str>) -> Result<Option<MacAddress>, String> {
    s.map(parse_mac).transpose()
}

/// parse the optional `ip` query param used by delete routes
pub fn parse_optional_ip(s: Option<&str>) -> Result<Option<Ipv4Addr>, String> {
    s.map(parse_ip).transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_request() -> OptionsRequest {
        OptionsRequest {
            lease_time: "1h".to_string(),
            server_ip: "10.1.1.1".to_string(),
            gateway_ip: "10.1.1.1".to_string(),
            range_start_ip: "10.1.1.10".to_string(),
            range_end_ip: "10.1.1.100".to_string(),
            netmask: "255.0.0.0".to_string(),
            boot_file_name: "pxelinux.0".to_string(),
            router: "10.1.1.1".to_string(),
            dns: "223.5.5.5".to_string(),
            acl_enabled: false,
            acl_action: String::new(),
        }
    }

    #[test]
    fn valid_options_roundtrip() {
        assert!(validate_options(base_request()).is_ok());
    }

    #[test]
    fn acl_enabled_requires_action() {
        let mut req = base_request();
        req.acl_enabled = true;
        req.acl_action = String::new();
        assert!(validate_options(req).is_err());
    }

    #[test]
    fn inverted_range_is_rejected() {
        let mut req = base_request();
        req.range_start_ip = "10.1.1.100".to_string();
        req.range_end_ip = "10.1.1.10".to_string();
        assert!(validate_options(req).is_err());
    }

    #[test]
    fn malformed_mac_is_an_error() {
        let req = AclRequest {
            client_hw_addr: "not-a-mac".to_string(),
            action: "allow".to_string(),
        };
        assert!(validate_acl(req).is_err());
    }
}
