//! Token-level parsers shared by the object resolver, the ACE compiler and
//! the routing dump reader.

use std::net::{IpAddr, Ipv4Addr};

use ipnet::Ipv4Net;

use crate::error::{AuditError, Result};
use crate::protocols::{is_icmp_value, parse_icmp_value, parse_port};
use crate::types::{AddressRange, IcmpSelector, PortRange};

/// Parse a dotted-quad IPv4 address into its packed form.
pub fn parse_ip(token: &str) -> Result<u32> {
    match token.parse::<IpAddr>() {
        Ok(IpAddr::V4(v4)) => Ok(u32::from(v4)),
        Ok(IpAddr::V6(_)) => Err(AuditError::Parse(format!(
            "IPv6 address '{}' is not supported",
            token
        ))),
        Err(_) => Err(AuditError::Parse(format!("invalid IP address '{}'", token))),
    }
}

/// Parse a dotted-decimal netmask.
///
/// Only the 33 contiguous masks (`0.0.0.0` .. `255.255.255.255`) are accepted.
pub fn parse_mask(token: &str) -> Result<u32> {
    let mask: Ipv4Addr = token
        .parse()
        .map_err(|_| AuditError::Parse(format!("invalid netmask '{}'", token)))?;
    ipnet::ipv4_mask_to_prefix(mask)
        .map_err(|_| AuditError::Parse(format!("non-contiguous netmask '{}'", token)))?;
    Ok(u32::from(mask))
}

/// Parse an `IP MASK` pair into the address range it covers.
pub fn parse_subnet(ip: &str, mask: &str) -> Result<AddressRange> {
    let addr = Ipv4Addr::from(parse_ip(ip)?);
    let mask_addr: Ipv4Addr = Ipv4Addr::from(parse_mask(mask)?);
    let prefix = ipnet::ipv4_mask_to_prefix(mask_addr)
        .map_err(|_| AuditError::Parse(format!("non-contiguous netmask '{}'", mask)))?;
    let net = Ipv4Net::new(addr, prefix)
        .map_err(|_| AuditError::Parse(format!("invalid subnet '{} {}'", ip, mask)))?;
    Ok(AddressRange::new(
        u32::from(net.network()),
        u32::from(net.broadcast()),
    ))
}

/// Check if a token starts a port comparison
pub fn is_port_operator(token: &str) -> bool {
    matches!(token, "eq" | "lt" | "gt" | "range" | "neq")
}

fn operand<'a>(tokens: &[&'a str], idx: usize) -> Result<&'a str> {
    tokens.get(idx).copied().ok_or_else(|| {
        AuditError::Grammar(format!(
            "port operator '{}' is missing an operand in '{}'",
            tokens.first().copied().unwrap_or_default(),
            tokens.join(" ")
        ))
    })
}

/// Parse a port operator and its operands (`eq 80`, `range 1 10`, ...).
///
/// Returns the port ranges the operator selects and the number of tokens
/// consumed. `neq` yields the complement as up to two disjoint ranges.
pub fn parse_port_operator(tokens: &[&str]) -> Result<(Vec<PortRange>, usize)> {
    let op = tokens
        .first()
        .copied()
        .ok_or_else(|| AuditError::Grammar("expected a port operator".to_string()))?;

    match op {
        "eq" => {
            let port = parse_port(operand(tokens, 1)?)?;
            Ok((vec![PortRange::single(port)], 2))
        }
        "lt" => {
            let port = parse_port(operand(tokens, 1)?)?;
            if port == 0 {
                return Err(AuditError::Parse("'lt 0' selects no port".to_string()));
            }
            Ok((vec![PortRange::new(0, port - 1)], 2))
        }
        "gt" => {
            let port = parse_port(operand(tokens, 1)?)?;
            if port == u16::MAX {
                return Err(AuditError::Parse("'gt 65535' selects no port".to_string()));
            }
            Ok((vec![PortRange::new(port + 1, u16::MAX)], 2))
        }
        "range" => {
            let low = parse_port(operand(tokens, 1)?)?;
            let high = parse_port(operand(tokens, 2)?)?;
            if low > high {
                return Err(AuditError::Parse(format!(
                    "invalid port range {} > {}",
                    low, high
                )));
            }
            Ok((vec![PortRange::new(low, high)], 3))
        }
        "neq" => {
            let port = parse_port(operand(tokens, 1)?)?;
            let mut ranges = Vec::with_capacity(2);
            if port > 0 {
                ranges.push(PortRange::new(0, port - 1));
            }
            if port < u16::MAX {
                ranges.push(PortRange::new(port + 1, u16::MAX));
            }
            Ok((ranges, 2))
        }
        other => Err(AuditError::Grammar(format!(
            "expected eq, lt, gt, range or neq, got '{}'",
            other
        ))),
    }
}

/// Parse an optional ICMP type followed by an optional code.
///
/// Returns the selector and the number of tokens consumed. A token after the
/// type that is neither a code nor `log` is left for the caller.
pub fn parse_icmp_type_code(tokens: &[&str]) -> Result<(IcmpSelector, usize)> {
    let mut selector = IcmpSelector::ANY;
    let mut consumed = 0;

    if let Some(token) = tokens.first() {
        selector.icmp_type = parse_icmp_value(token)?;
        consumed += 1;
    }
    if let Some(token) = tokens
        .get(1)
        .filter(|token| is_icmp_value(token) || **token == "log")
    {
        selector.code = parse_icmp_value(token)?;
        consumed += 1;
    }

    Ok((selector, consumed))
}
