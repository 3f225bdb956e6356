//! Capacity analysis: how much traffic space an entry admits versus how much
//! of it the recorded flows actually used.

use std::collections::HashSet;
use std::hash::Hash;

use crate::compile::CompiledEntry;
use crate::error::{AuditError, Result};
use crate::types::{AddressRange, Flow, Protocol};

const PORT_SPACE: u128 = 65536;
const ICMP_FIELD_SPACE: u128 = 256;

/// Theoretical and observed capacity of one compiled entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capacity {
    pub theoretical: u128,
    pub observed: u128,
    pub flows: usize,
}

impl Capacity {
    /// Observed share of the theoretical capacity, in percent.
    ///
    /// An entry with no theoretical capacity reports 0.
    pub fn utilization(&self) -> f64 {
        if self.theoretical == 0 {
            0.0
        } else {
            self.observed as f64 / self.theoretical as f64 * 100.0
        }
    }
}

// A full-space address dimension counts as 1.
fn address_width(range: &AddressRange) -> u128 {
    if range.is_any() {
        1
    } else {
        u128::from(range.width())
    }
}

fn distinct<T: Eq + Hash>(flows: &[Flow], field: impl Fn(&Flow) -> T) -> u128 {
    flows.iter().map(field).collect::<HashSet<_>>().len() as u128
}

fn unknown_protocol(protocol: Protocol) -> AuditError {
    AuditError::Protocol(format!(
        "cannot compute capacity for protocol {} ({})",
        protocol,
        protocol.id()
    ))
}

/// Number of (address, port, ICMP) combinations the entry admits.
pub fn theoretical_capacity(entry: &CompiledEntry) -> Result<u128> {
    if entry.src_addr.is_empty() || entry.dst_addr.is_empty() {
        return Ok(0);
    }
    let ip_space = address_width(&entry.src_addr) * address_width(&entry.dst_addr);

    match entry.protocol {
        Protocol::IP => Ok(ip_space),
        Protocol::TCP | Protocol::UDP => {
            // unconstrained source ports are ephemeral and not counted
            let src_ports = if entry.src_port.is_wildcard() {
                1
            } else {
                u128::from(entry.src_port.width())
            };
            let dst_ports = if entry.dst_port.is_wildcard() {
                PORT_SPACE
            } else {
                u128::from(entry.dst_port.width())
            };
            Ok(ip_space * src_ports * dst_ports)
        }
        Protocol::ICMP => {
            let types = if entry.icmp.icmp_type == -1 {
                ICMP_FIELD_SPACE
            } else {
                1
            };
            let codes = if entry.icmp.code == -1 {
                ICMP_FIELD_SPACE
            } else {
                1
            };
            Ok(ip_space * types * codes)
        }
        other => Err(unknown_protocol(other)),
    }
}

/// Same product as [`theoretical_capacity`], measured over `flows`.
///
/// Constrained addresses, source ports, destination ports and ICMP
/// type/code are replaced by the number of distinct values seen. A full
/// address range and an unconstrained source port keep their width of 1.
pub fn observed_capacity(entry: &CompiledEntry, flows: &[Flow]) -> Result<u128> {
    if flows.is_empty() {
        // still reject protocols the analysis cannot size
        theoretical_capacity(entry)?;
        return Ok(0);
    }

    let src_ips = if entry.src_addr.is_any() {
        1
    } else {
        distinct(flows, |f| f.src_ip)
    };
    let dst_ips = if entry.dst_addr.is_any() {
        1
    } else {
        distinct(flows, |f| f.dst_ip)
    };
    let ip_space = src_ips * dst_ips;

    match entry.protocol {
        Protocol::IP => Ok(ip_space),
        Protocol::TCP | Protocol::UDP => {
            let src_ports = if entry.src_port.is_wildcard() {
                1
            } else {
                distinct(flows, |f| f.src_port)
            };
            // Unlike the source port, an unconstrained destination port is
            // measured, so `eq`-less rules show how few ports are in use.
            let dst_ports = distinct(flows, |f| f.dst_port);
            Ok(ip_space * src_ports * dst_ports)
        }
        Protocol::ICMP => {
            // measured even when the entry admits any type or code
            let types = distinct(flows, |f| f.icmp_type);
            let codes = distinct(flows, |f| f.icmp_code);
            Ok(ip_space * types * codes)
        }
        other => Err(unknown_protocol(other)),
    }
}

/// Theoretical and observed capacity from the entry's own match history.
pub fn analyze(entry: &CompiledEntry) -> Result<Capacity> {
    let flows = entry.matched_flows();
    Ok(Capacity {
        theoretical: theoretical_capacity(entry)?,
        observed: observed_capacity(entry, &flows)?,
        flows: flows.len(),
    })
}
