//! Flow decoders for firewall log records.
//!
//! Only the message codes that describe a single conversation are decoded:
//!
//! | Code | Meaning |
//! |------|---------|
//! | `106023` | packet denied by an access group |
//! | `302013` | built TCP connection |
//! | `302015` | built UDP connection |
//! | `302020` | built ICMP connection |
//!
//! Every other record (and every line without an `%ASA-<sev>-<code>:`
//! token) decodes to no flow.

mod connection;
mod denied;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::trace;

use crate::error::{AuditError, Result};
use crate::parser::parse_ip;
use crate::route::RoutingTable;
use crate::types::Flow;

/// Record tag: `%ASA-<severity>-<code>:`
static RECORD_TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^%ASA-(\d)-(\d{6}):$").expect("RECORD_TAG: hardcoded regex is invalid")
});

/// Message code of a record, if the line carries an `%ASA-` tag
pub fn message_code(line: &str) -> Option<&str> {
    line.split_whitespace()
        .find_map(|token| RECORD_TAG.captures(token))
        .and_then(|caps| caps.get(2))
        .map(|code| code.as_str())
}

/// Decode one log line into a flow.
///
/// The routing table gives interfaces to records that only carry addresses.
pub fn decode(line: &str, routes: &RoutingTable) -> Result<Option<Flow>> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let Some(start) = tokens.iter().position(|t| RECORD_TAG.is_match(t)) else {
        return Ok(None);
    };
    // Field positions below count from the tag itself.
    let fields = &tokens[start..];
    let code = message_code(fields[0]).unwrap_or_default();

    let flow = match code {
        "106023" => denied::decode(fields),
        "302013" | "302015" => connection::decode_transport(fields),
        "302020" => connection::decode_icmp(fields, routes),
        _ => {
            trace!(code, "ignoring log record");
            return Ok(None);
        }
    };
    flow.map(Some).map_err(|e| e.context(line))
}

fn malformed(code: &str, what: &str) -> AuditError {
    AuditError::Parse(format!("malformed {} record: {}", code, what))
}

fn field<'a>(fields: &[&'a str], idx: usize, code: &str) -> Result<&'a str> {
    fields
        .get(idx)
        .copied()
        .ok_or_else(|| malformed(code, &format!("missing field {}", idx)))
}

// `IP/PORT`
fn split_ip_port(token: &str) -> Result<(u32, u16)> {
    let (ip, port) = token
        .split_once('/')
        .ok_or_else(|| AuditError::Parse(format!("expected IP/PORT, got '{}'", token)))?;
    let port = port
        .parse::<u16>()
        .map_err(|_| AuditError::Parse(format!("invalid port in '{}'", token)))?;
    Ok((parse_ip(ip)?, port))
}

// `IFACE:IP`
fn split_iface_ip(token: &str) -> Result<(String, u32)> {
    let (iface, ip) = token
        .split_once(':')
        .ok_or_else(|| AuditError::Parse(format!("expected IFACE:IP, got '{}'", token)))?;
    Ok((iface.to_string(), parse_ip(ip)?))
}

// `IFACE:IP/PORT`
fn split_iface_ip_port(token: &str) -> Result<(String, u32, u16)> {
    let (iface, rest) = token
        .split_once(':')
        .ok_or_else(|| AuditError::Parse(format!("expected IFACE:IP/PORT, got '{}'", token)))?;
    let (ip, port) = split_ip_port(rest)?;
    Ok((iface.to_string(), ip, port))
}

// ICMP type/code as logged: a number, optionally followed by `,` or `)`
fn icmp_field(token: &str) -> Result<i16> {
    token
        .trim_end_matches([',', ')'])
        .parse::<u8>()
        .map(i16::from)
        .map_err(|_| AuditError::Parse(format!("invalid icmp value '{}'", token)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::route::RoutingEntry;
    use crate::types::{AddressRange, Protocol};

    fn routes() -> RoutingTable {
        RoutingTable::build(vec![RoutingEntry::connected(AddressRange::ANY, "outside")]).unwrap()
    }

    #[test]
    fn test_message_code() {
        assert_eq!(message_code("%ASA-6-302013: Built inbound TCP"), Some("302013"));
        assert_eq!(
            message_code("Oct 10 2023 10:00:00 fw01 : %ASA-4-106023: Deny tcp"),
            Some("106023")
        );
        assert_eq!(message_code("%ASA-6-30201: short code"), None);
        assert_eq!(message_code("no tag here"), None);
    }

    #[test]
    fn test_unknown_records_yield_nothing() {
        let table = routes();
        assert_eq!(decode("", &table).unwrap(), None);
        assert_eq!(decode("random text", &table).unwrap(), None);
        assert_eq!(
            decode("%ASA-6-302014: Teardown TCP connection 54 for outside:1.1.1.1/1 to dmz:2.2.2.2/2 duration 0:00:01 bytes 0", &table)
                .unwrap(),
            None
        );
    }

    #[test]
    fn test_syslog_prefix_is_skipped() {
        let line = "Oct 10 2023 10:00:00 fw01 : %ASA-4-106023: Deny tcp src inside:10.10.9.9/45306 dst outside:150.150.150.150/22 by access-group \"inside_in\" [0x6643b58b, 0x0]";
        let flow = decode(line, &routes()).unwrap().unwrap();
        assert_eq!(flow.protocol, Protocol::TCP);
        assert_eq!(flow.dst_port, 22);
    }

    #[test]
    fn test_malformed_record_is_parse_error() {
        let err = decode("%ASA-4-106023: Deny tcp src inside", &routes()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parse);
        assert!(err.to_string().contains("Deny tcp src inside"), "got: {}", err);
    }

    #[test]
    fn test_endpoint_helpers() {
        assert_eq!(split_ip_port("10.0.0.1/80").unwrap(), (0x0a000001, 80));
        assert_eq!(
            split_iface_ip_port("dmz:172.16.16.16/22").unwrap(),
            ("dmz".to_string(), 0xac101010, 22)
        );
        assert_eq!(
            split_iface_ip("inside:10.10.9.9").unwrap(),
            ("inside".to_string(), 0x0a0a0909)
        );
        assert!(split_ip_port("10.0.0.1").is_err());
        assert!(split_ip_port("10.0.0.1/70000").is_err());
        assert!(split_iface_ip("10.0.0.1").is_err());
        assert_eq!(icmp_field("8,").unwrap(), 8);
        assert_eq!(icmp_field("0)").unwrap(), 0);
        assert!(icmp_field("x)").is_err());
    }
}
