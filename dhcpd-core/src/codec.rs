//! netmask validation and comma-separated IPv4 list parsing (§4.2, §4.3)

use std::net::Ipv4Addr;

use crate::Error;

/// validates dotted-decimal subnet masks
#[derive(Debug, Clone, Copy)]
pub struct NetmaskCodec;

impl NetmaskCodec {
    /// parse a dotted-decimal netmask, rejecting unspecified and non-contiguous masks
    pub fn parse(s: &str) -> Result<[u8; 4], Error> {
        let addr: Ipv4Addr = s
            .parse()
            .map_err(|_| Error::InvalidInput(format!("{s:?} is not a dotted-decimal IPv4 mask")))?;

        if addr.is_unspecified() {
            return Err(Error::InvalidInput("netmask must not be 0.0.0.0".into()));
        }

        let m = u32::from(addr);
        // contiguous-1-prefix test: valid masks are 2^32 - 2^k for some k
        if ((!m).wrapping_add(1)) & !m != 0 {
            return Err(Error::InvalidInput(format!(
                "{s:?} is not a contiguous netmask"
            )));
        }

        Ok(addr.octets())
    }
}

/// parses comma-separated IPv4 address lists
#[derive(Debug, Clone, Copy)]
pub struct IpListCodec;

impl IpListCodec {
    /// split on `,`, trim ASCII whitespace, parse each token as an IPv4 address
    ///
    /// unlike the source this was distilled from, malformed tokens are a hard
    /// error rather than a silently-inserted `0.0.0.0` sentinel (§9 item 4).
    pub fn parse(s: &str) -> Result<Vec<Ipv4Addr>, Error> {
        if s.trim().is_empty() {
            return Ok(Vec::new());
        }
        s.split(',')
            .map(|token| {
                token
                    .trim_matches(|c: char| c.is_ascii_whitespace())
                    .parse::<Ipv4Addr>()
                    .map_err(|_| Error::InvalidInput(format!("{token:?} is not an IPv4 address")))
            })
            .collect()
    }
}
