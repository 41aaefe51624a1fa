//! design types for the five persisted entities (§3)

use std::net::Ipv4Addr;
use std::time::{SystemTime, UNIX_EPOCH};

use mac_address::MacAddress;
use serde::{Deserialize, Serialize};

/// the singleton server-wide configuration row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Options {
    /// how long a lease is valid for, as a `humantime`-parseable duration string
    pub lease_time: String,
    /// this server's own IPv4 address, used as `siaddr` and the server-identifier option
    pub server_ip: Ipv4Addr,
    /// gateway handed out to clients as `giaddr`
    pub gateway_ip: Ipv4Addr,
    /// inclusive lower bound of the dynamic allocation range
    pub range_start_ip: Ipv4Addr,
    /// inclusive upper bound of the dynamic allocation range
    pub range_end_ip: Ipv4Addr,
    /// dotted-decimal subnet mask, validated by [`crate::codec::NetmaskCodec`]
    pub netmask: String,
    /// PXE boot filename handed to clients, or empty
    pub boot_file_name: String,
    /// comma-separated router addresses, parsed by [`crate::codec::IpListCodec`]
    pub router: String,
    /// comma-separated DNS server addresses, parsed by [`crate::codec::IpListCodec`]
    pub dns: String,
    /// whether [`crate::acl::AclGate`] is consulted at all
    pub acl_enabled: bool,
    /// `"allow"`, `"deny"`, or empty when ACL is disabled
    pub acl_action: String,
}

impl Options {
    /// the bootstrap defaults inserted when no Options row exists (§6)
    pub fn bootstrap_default() -> Self {
        Options {
            lease_time: "1h".to_string(),
            server_ip: Ipv4Addr::new(10, 1, 1, 1),
            gateway_ip: Ipv4Addr::new(10, 1, 1, 1),
            range_start_ip: Ipv4Addr::new(10, 1, 1, 10),
            range_end_ip: Ipv4Addr::new(10, 1, 1, 100),
            netmask: "255.0.0.0".to_string(),
            boot_file_name: "pxelinux.0".to_string(),
            router: "10.1.1.1".to_string(),
            dns: "223.5.5.5,223.6.6.6".to_string(),
            acl_enabled: false,
            acl_action: String::new(),
        }
    }

    /// parsed lease duration, per §4.7
    pub fn lease_duration(&self) -> Result<std::time::Duration, crate::Error> {
        humantime::parse_duration(&self.lease_time)
            .map_err(|err| crate::Error::InvalidInput(format!("lease_time: {err}")))
    }
}

/// a time-bounded MAC→IP binding created by the allocator or renewed on re-request
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Lease {
    /// client hardware address, primary key
    pub client_hw_addr: MacAddress,
    /// the assigned IPv4 address, unique across live leases
    pub assigned_addr: Ipv4Addr,
    /// unix-epoch seconds at which this lease expires
    pub expires: i64,
}

impl Lease {
    /// is this lease expired as of `now`?
    pub fn is_expired(&self, now: SystemTime) -> bool {
        self.expires < epoch_secs(now)
    }
}

/// unix-epoch seconds for a `SystemTime`
pub fn epoch_secs(t: SystemTime) -> i64 {
    t.duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// a permanent operator-declared MAC→IP association, overrides dynamic allocation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Binding {
    /// client hardware address, primary key
    pub client_hw_addr: MacAddress,
    /// the address permanently bound to this client
    pub bind_addr: Ipv4Addr,
}

/// an address withheld from dynamic allocation and from binding
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Reservation {
    /// the withheld address, primary key
    pub address: Ipv4Addr,
}

/// the action an [`AclRule`] takes for a matching client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AclAction {
    /// allow the matching client
    Allow,
    /// deny the matching client
    Deny,
}

impl std::str::FromStr for AclAction {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "allow" => Ok(AclAction::Allow),
            "deny" => Ok(AclAction::Deny),
            other => Err(crate::Error::InvalidInput(format!(
                "acl action must be \"allow\" or \"deny\", got {other:?}"
            ))),
        }
    }
}

impl std::fmt::Display for AclAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            AclAction::Allow => "allow",
            AclAction::Deny => "deny",
        })
    }
}

/// an allow/deny rule keyed on client hardware address
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AclRule {
    /// client hardware address this rule matches
    pub client_hw_addr: MacAddress,
    /// action taken for a match
    pub action: AclAction,
}
