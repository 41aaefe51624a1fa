//! builds DHCPv4 OFFER/ACK replies from Options and a chosen address (§4.7)

use std::net::Ipv4Addr;

use dhcproto::v4;

use crate::{
    codec::{IpListCodec, NetmaskCodec},
    error::Error,
    model::Options,
};

/// populates a DHCPv4 reply derived from a request
#[derive(Debug, Clone, Copy)]
pub struct ReplyBuilder;

impl ReplyBuilder {
    /// build an OFFER or ACK reply to `request`, offering `assigned` under `options`
    ///
    /// the reply keeps `request`'s xid, chaddr and broadcast flag; everything
    /// else comes from `options`. DECLINE/RELEASE never reach this builder
    /// (§4.7: "the builder is not used; those handlers only touch
    /// LeaseManager.release and return silently").
    pub fn build(
        request: &v4::Message,
        msg_type: v4::MessageType,
        assigned: Ipv4Addr,
        options: &Options,
    ) -> Result<v4::Message, Error> {
        let lease_time = options.lease_duration()?;
        let netmask = NetmaskCodec::parse(&options.netmask)?;
        let router = IpListCodec::parse(&options.router)?;
        let dns = IpListCodec::parse(&options.dns)?;

        let mut reply = v4::Message::new_with_id(
            request.xid(),
            Ipv4Addr::UNSPECIFIED,
            assigned,
            options.server_ip,
            options.gateway_ip,
            request.chaddr(),
        );
        reply.set_flags(request.flags());
        reply.set_opcode(v4::Opcode::BootReply);

        reply
            .opts_mut()
            .insert(v4::DhcpOption::MessageType(msg_type));
        reply
            .opts_mut()
            .insert(v4::DhcpOption::ServerIdentifier(options.server_ip));
        reply
            .opts_mut()
            .insert(v4::DhcpOption::AddressLeaseTime(lease_time.as_secs() as u32));
        reply
            .opts_mut()
            .insert(v4::DhcpOption::SubnetMask(Ipv4Addr::from(netmask)));
        if !router.is_empty() {
            reply.opts_mut().insert(v4::DhcpOption::Router(router));
        }
        if !dns.is_empty() {
            reply
                .opts_mut()
                .insert(v4::DhcpOption::DomainNameServer(dns));
        }

        if !options.boot_file_name.is_empty() {
            reply.set_fname_str(&options.boot_file_name);
        }

        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> v4::Message {
        let mut req = v4::Message::new_with_id(
            0x1234_5678,
            Ipv4Addr::UNSPECIFIED,
            Ipv4Addr::UNSPECIFIED,
            Ipv4Addr::UNSPECIFIED,
            Ipv4Addr::UNSPECIFIED,
            &[0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0x01],
        );
        req.opts_mut()
            .insert(v4::DhcpOption::MessageType(v4::MessageType::Discover));
        req
    }

    #[test]
    fn builds_offer_with_expected_fields() {
        let options = Options::bootstrap_default();
        let assigned: Ipv4Addr = "10.1.1.20".parse().unwrap();
        let reply =
            ReplyBuilder::build(&request(), v4::MessageType::Offer, assigned, &options).unwrap();

        assert_eq!(reply.xid(), 0x1234_5678);
        assert_eq!(reply.yiaddr(), assigned);
        assert_eq!(reply.siaddr(), options.server_ip);
        assert_eq!(reply.giaddr(), options.gateway_ip);
        assert_eq!(reply.opts().msg_type(), Some(v4::MessageType::Offer));
        assert_eq!(reply.opcode(), v4::Opcode::BootReply);
    }

    #[test]
    fn rejects_invalid_lease_time() {
        let mut options = Options::bootstrap_default();
        options.lease_time = "not-a-duration".to_string();
        let assigned: Ipv4Addr = "10.1.1.20".parse().unwrap();
        assert!(ReplyBuilder::build(&request(), v4::MessageType::Offer, assigned, &options).is_err());
    }
}
