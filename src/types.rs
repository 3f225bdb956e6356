use std::fmt;
use std::net::Ipv4Addr;

use crate::protocols;

/// Inclusive IPv4 interval.
///
/// `start > finish` is a valid value meaning "empty set".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AddressRange {
    pub start: u32,
    pub finish: u32,
}

impl AddressRange {
    /// The whole IPv4 space (`any` / `any4`).
    pub const ANY: AddressRange = AddressRange {
        start: 0,
        finish: u32::MAX,
    };

    pub fn new(start: u32, finish: u32) -> Self {
        Self { start, finish }
    }

    /// Single-address range
    pub fn host(ip: u32) -> Self {
        Self {
            start: ip,
            finish: ip,
        }
    }

    /// Check if the address falls inside the range (both ends inclusive)
    pub fn contains(&self, ip: u32) -> bool {
        self.start <= ip && ip <= self.finish
    }

    /// Check if `other` lies entirely inside this range
    pub fn covers(&self, other: &AddressRange) -> bool {
        self.start <= other.start && other.finish <= self.finish
    }

    pub fn is_empty(&self) -> bool {
        self.start > self.finish
    }

    pub fn is_any(&self) -> bool {
        *self == Self::ANY
    }

    /// Number of addresses in the range, 0 for an inverted range.
    pub fn width(&self) -> u64 {
        if self.is_empty() {
            0
        } else {
            u64::from(self.finish - self.start) + 1
        }
    }
}

impl fmt::Display for AddressRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}",
            Ipv4Addr::from(self.start),
            Ipv4Addr::from(self.finish)
        )
    }
}

/// Inclusive port interval.
///
/// `finish == 0` means "unconstrained". This cannot be told apart from a
/// literal `[0, 0]` range; the sentinel is kept for compatibility with
/// existing reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PortRange {
    pub start: u16,
    pub finish: u16,
}

impl PortRange {
    pub const WILDCARD: PortRange = PortRange {
        start: 0,
        finish: 0,
    };

    pub fn new(start: u16, finish: u16) -> Self {
        Self { start, finish }
    }

    pub fn single(port: u16) -> Self {
        Self {
            start: port,
            finish: port,
        }
    }

    pub fn is_wildcard(&self) -> bool {
        self.finish == 0
    }

    pub fn contains(&self, port: u16) -> bool {
        self.start <= port && port <= self.finish
    }

    /// Number of ports in a constrained range
    pub fn width(&self) -> u64 {
        if self.start > self.finish {
            0
        } else {
            u64::from(self.finish - self.start) + 1
        }
    }
}

impl fmt::Display for PortRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.finish)
    }
}

/// ICMP type/code selector; `-1` in either field means "any".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IcmpSelector {
    pub icmp_type: i16,
    pub code: i16,
}

impl IcmpSelector {
    pub const ANY: IcmpSelector = IcmpSelector {
        icmp_type: -1,
        code: -1,
    };

    pub fn new(icmp_type: i16, code: i16) -> Self {
        Self { icmp_type, code }
    }

    pub fn is_any(&self) -> bool {
        self.icmp_type == -1 && self.code == -1
    }

    /// Check the selector against an observed type/code pair
    pub fn matches(&self, icmp_type: i16, code: i16) -> bool {
        if self.is_any() {
            return true;
        }
        if self.icmp_type != icmp_type {
            return false;
        }
        self.code == -1 || self.code == code
    }
}

impl Default for IcmpSelector {
    fn default() -> Self {
        Self::ANY
    }
}

/// IP protocol number
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Protocol(pub u8);

impl Protocol {
    pub const ICMP: Protocol = Protocol(1);
    pub const IP: Protocol = Protocol(4);
    pub const TCP: Protocol = Protocol(6);
    pub const UDP: Protocol = Protocol(17);

    pub fn id(&self) -> u8 {
        self.0
    }

    pub fn is_tcp_udp(&self) -> bool {
        *self == Self::TCP || *self == Self::UDP
    }

    /// Check if an entry declared with this protocol admits traffic of `other`.
    ///
    /// IP admits everything one-way; a flow reported as plain IP is admitted
    /// by any entry.
    pub fn admits(&self, other: Protocol) -> bool {
        *self == other || *self == Self::IP || other == Self::IP
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match protocols::protocol_name(self.0) {
            Some(name) => f.write_str(name),
            None => write!(f, "proto-{}", self.0),
        }
    }
}

/// Rule action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Permit,
    Deny,
}

impl Action {
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "permit" => Some(Action::Permit),
            "deny" => Some(Action::Deny),
            _ => None,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Permit => f.write_str("permit"),
            Action::Deny => f.write_str("deny"),
        }
    }
}

/// One observed conversation, decoded from a log record
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Flow {
    pub src_iface: String,
    pub dst_iface: String,
    pub protocol: Protocol,
    pub src_ip: u32,
    pub dst_ip: u32,
    pub src_port: u16,
    pub dst_port: u16,
    pub icmp_type: i16,
    pub icmp_code: i16,
}

impl Flow {
    /// TCP or UDP flow between two endpoints
    #[allow(clippy::too_many_arguments)]
    pub fn transport(
        protocol: Protocol,
        src_iface: impl Into<String>,
        src_ip: Ipv4Addr,
        src_port: u16,
        dst_iface: impl Into<String>,
        dst_ip: Ipv4Addr,
        dst_port: u16,
    ) -> Self {
        Self {
            src_iface: src_iface.into(),
            dst_iface: dst_iface.into(),
            protocol,
            src_ip: u32::from(src_ip),
            dst_ip: u32::from(dst_ip),
            src_port,
            dst_port,
            icmp_type: -1,
            icmp_code: -1,
        }
    }

    /// ICMP flow between two endpoints
    pub fn icmp(
        src_iface: impl Into<String>,
        src_ip: Ipv4Addr,
        dst_iface: impl Into<String>,
        dst_ip: Ipv4Addr,
        icmp_type: i16,
        icmp_code: i16,
    ) -> Self {
        Self {
            src_iface: src_iface.into(),
            dst_iface: dst_iface.into(),
            protocol: Protocol::ICMP,
            src_ip: u32::from(src_ip),
            dst_ip: u32::from(dst_ip),
            src_port: 0,
            dst_port: 0,
            icmp_type,
            icmp_code,
        }
    }
}

impl fmt::Display for Flow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let src = Ipv4Addr::from(self.src_ip);
        let dst = Ipv4Addr::from(self.dst_ip);
        if self.protocol == Protocol::ICMP {
            write!(
                f,
                "{}->{} {}://{} -> {} (type: {}, code: {})",
                self.src_iface, self.dst_iface, self.protocol, src, dst, self.icmp_type, self.icmp_code
            )
        } else if self.protocol.is_tcp_udp() {
            write!(
                f,
                "{}->{} {}://{}:{} -> {}:{}",
                self.src_iface, self.dst_iface, self.protocol, src, self.src_port, dst, self.dst_port
            )
        } else {
            write!(
                f,
                "{}->{} {}://{} -> {}",
                self.src_iface, self.dst_iface, self.protocol, src, dst
            )
        }
    }
}
