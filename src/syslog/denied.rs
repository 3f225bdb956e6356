//! `%ASA-4-106023`: packet denied by an access group.
//!
//! ```text
//! %ASA-4-106023: Deny tcp src inside:10.10.9.9/45306 dst outside:150.150.150.150/22 by access-group "inside_in" [0x6643b58b, 0x0]
//! %ASA-4-106023: Deny icmp src inside:10.10.9.9 dst outside:10.10.10.10 (type 8, code 0) by access-group "test" [0x0, 0x0]
//! ```

use super::{field, icmp_field, malformed, split_iface_ip, split_iface_ip_port};
use crate::error::Result;
use crate::protocols::protocols_by_name;
use crate::types::{Flow, Protocol};

const CODE: &str = "106023";

pub(super) fn decode(fields: &[&str]) -> Result<Flow> {
    let protocol = protocols_by_name(field(fields, 2, CODE)?)?
        .first()
        .copied()
        .ok_or_else(|| malformed(CODE, "no protocol"))?;

    if protocol == Protocol::ICMP {
        let (src_iface, src_ip) = split_iface_ip(field(fields, 4, CODE)?)?;
        let (dst_iface, dst_ip) = split_iface_ip(field(fields, 6, CODE)?)?;
        let icmp_type = icmp_field(field(fields, 8, CODE)?)?;
        let icmp_code = icmp_field(field(fields, 10, CODE)?)?;
        return Ok(Flow {
            src_iface,
            dst_iface,
            protocol,
            src_ip,
            dst_ip,
            src_port: 0,
            dst_port: 0,
            icmp_type,
            icmp_code,
        });
    }

    if protocol.is_tcp_udp() {
        let (src_iface, src_ip, src_port) = split_iface_ip_port(field(fields, 4, CODE)?)?;
        let (dst_iface, dst_ip, dst_port) = split_iface_ip_port(field(fields, 6, CODE)?)?;
        return Ok(Flow {
            src_iface,
            dst_iface,
            protocol,
            src_ip,
            dst_ip,
            src_port,
            dst_port,
            icmp_type: -1,
            icmp_code: -1,
        });
    }

    Err(malformed(CODE, &format!("unsupported protocol {}", protocol)))
}
