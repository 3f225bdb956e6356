//! Connection build records.
//!
//! ```text
//! %ASA-6-302013: Built inbound TCP connection 54 for outside:150.150.150.150/57346 (150.150.150.150/57346) to dmz:172.16.16.16/22 (123.123.123.10/22)
//! %ASA-6-302015: Built outbound UDP connection 54 for outside:150.150.150.150/22 (150.150.150.150/2) to dmz:172.16.16.16/57346 (123.123.123.10/7346)
//! %ASA-6-302020: Built inbound ICMP connection for faddr 150.150.150.150/4 gaddr 123.123.123.10/0 laddr 172.16.16.16/0 type 8 code 0
//! ```
//!
//! For inbound connections the `for`/`faddr` side initiated the
//! conversation; outbound connections swap the roles.

use std::net::Ipv4Addr;

use super::{field, icmp_field, malformed, split_iface_ip_port, split_ip_port};
use crate::error::Result;
use crate::protocols::protocols_by_name;
use crate::route::RoutingTable;
use crate::types::{Flow, Protocol};

const TRANSPORT_CODE: &str = "302013/302015";
const ICMP_CODE: &str = "302020";

// (source field, destination field) by direction keyword
fn endpoints(fields: &[&str], code: &str, inbound: (usize, usize)) -> Result<(usize, usize)> {
    match field(fields, 2, code)?.to_lowercase().as_str() {
        "inbound" => Ok(inbound),
        "outbound" => Ok((inbound.1, inbound.0)),
        other => Err(malformed(code, &format!("expected inbound/outbound, got '{}'", other))),
    }
}

fn protocol(fields: &[&str], code: &str) -> Result<Protocol> {
    protocols_by_name(field(fields, 3, code)?)?
        .first()
        .copied()
        .ok_or_else(|| malformed(code, "no protocol"))
}

/// `302013` (TCP) and `302015` (UDP)
pub(super) fn decode_transport(fields: &[&str]) -> Result<Flow> {
    let protocol = protocol(fields, TRANSPORT_CODE)?;
    let (src, dst) = endpoints(fields, TRANSPORT_CODE, (7, 10))?;

    let (src_iface, src_ip, src_port) = split_iface_ip_port(field(fields, src, TRANSPORT_CODE)?)?;
    let (dst_iface, dst_ip, dst_port) = split_iface_ip_port(field(fields, dst, TRANSPORT_CODE)?)?;
    Ok(Flow::transport(
        protocol,
        src_iface,
        Ipv4Addr::from(src_ip),
        src_port,
        dst_iface,
        Ipv4Addr::from(dst_ip),
        dst_port,
    ))
}

/// `302020`. The record names no interfaces, so both ends are routed.
pub(super) fn decode_icmp(fields: &[&str], routes: &RoutingTable) -> Result<Flow> {
    let protocol = protocol(fields, ICMP_CODE)?;
    if protocol != Protocol::ICMP {
        return Err(malformed(ICMP_CODE, &format!("unsupported protocol {}", protocol)));
    }
    let (src, dst) = endpoints(fields, ICMP_CODE, (7, 11))?;

    let (src_ip, _) = split_ip_port(field(fields, src, ICMP_CODE)?)?;
    let (dst_ip, _) = split_ip_port(field(fields, dst, ICMP_CODE)?)?;
    let icmp_type = icmp_field(field(fields, 13, ICMP_CODE)?)?;
    let icmp_code = icmp_field(field(fields, 15, ICMP_CODE)?)?;

    Ok(Flow::icmp(
        routes.get_iface(src_ip)?,
        Ipv4Addr::from(src_ip),
        routes.get_iface(dst_ip)?,
        Ipv4Addr::from(dst_ip),
        icmp_type,
        icmp_code,
    ))
}
