//! Static name tables: IP protocol numbers, named TCP/UDP ports and ICMP types.

use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::error::{AuditError, Result};
use crate::types::Protocol;

/// IANA protocol numbers. The first name listed for an id is its display name.
const PROTOCOLS: &[(u8, &str)] = &[
    (0, "hopopt"),
    (1, "icmp"),
    (2, "igmp"),
    (3, "ggp"),
    (4, "ip"),
    (4, "ipv4"),
    (5, "st"),
    (6, "tcp"),
    (7, "cbt"),
    (8, "egp"),
    (9, "igp"),
    (10, "bbn-rcc-mon"),
    (11, "nvp-ii"),
    (12, "pup"),
    (14, "emcon"),
    (15, "xnet"),
    (16, "chaos"),
    (17, "udp"),
    (18, "mux"),
    (19, "dcn-meas"),
    (20, "hmp"),
    (21, "prm"),
    (22, "xns-idp"),
    (23, "trunk-1"),
    (24, "trunk-2"),
    (25, "leaf-1"),
    (26, "leaf-2"),
    (27, "rdp"),
    (28, "irtp"),
    (29, "iso-tp4"),
    (30, "netblt"),
    (31, "mfe-nsp"),
    (32, "merit-inp"),
    (33, "dccp"),
    (34, "3pc"),
    (35, "idpr"),
    (36, "xtp"),
    (37, "ddp"),
    (38, "idpr-cmtp"),
    (39, "tp++"),
    (40, "il"),
    (41, "ipv6"),
    (42, "sdrp"),
    (43, "ipv6-route"),
    (44, "ipv6-frag"),
    (45, "idrp"),
    (46, "rsvp"),
    (47, "gre"),
    (48, "dsr"),
    (49, "bna"),
    (50, "esp"),
    (51, "ah"),
    (52, "i-nlsp"),
    (54, "narp"),
    (55, "mobile"),
    (56, "tlsp"),
    (57, "skip"),
    (58, "ipv6-icmp"),
    (58, "icmp6"),
    (59, "ipv6-nonxt"),
    (60, "ipv6-opts"),
    (62, "cftp"),
    (64, "sat-expak"),
    (65, "kryptolan"),
    (66, "rvd"),
    (67, "ippc"),
    (69, "sat-mon"),
    (70, "visa"),
    (71, "ipcv"),
    (72, "cpnx"),
    (73, "cphb"),
    (74, "wsn"),
    (75, "pvp"),
    (76, "br-sat-mon"),
    (77, "sun-nd"),
    (78, "wb-mon"),
    (79, "wb-expak"),
    (80, "iso-ip"),
    (81, "vmtp"),
    (82, "secure-vmtp"),
    (83, "vines"),
    (84, "iptm"),
    (85, "nsfnet-igp"),
    (86, "dgp"),
    (87, "tcf"),
    (88, "eigrp"),
    (89, "ospf"),
    (90, "sprite-rpc"),
    (91, "larp"),
    (92, "mtp"),
    (93, "ax.25"),
    (94, "ipip"),
    (94, "ipinip"),
    (95, "micp"),
    (96, "scc-sp"),
    (97, "etherip"),
    (98, "encap"),
    (100, "gmtp"),
    (101, "ifmp"),
    (102, "pnni"),
    (103, "pim"),
    (104, "aris"),
    (105, "scps"),
    (106, "qnx"),
    (107, "a/n"),
    (108, "ipcomp"),
    (108, "pcp"),
    (109, "snp"),
    (110, "compaq-peer"),
    (111, "ipx-in-ip"),
    (112, "vrrp"),
    (113, "pgm"),
    (115, "l2tp"),
    (116, "ddx"),
    (117, "iatp"),
    (118, "stp"),
    (119, "srp"),
    (120, "uti"),
    (121, "smp"),
    (122, "sm"),
    (123, "ptp"),
    (125, "fire"),
    (126, "crtp"),
    (127, "crudp"),
    (128, "sscopmce"),
    (129, "iplt"),
    (130, "sps"),
    (131, "pipe"),
    (132, "sctp"),
    (133, "fc"),
    (134, "rsvp-e2e-ignore"),
    (136, "udplite"),
    (137, "mpls-in-ip"),
    (138, "manet"),
    (139, "hip"),
    (140, "shim6"),
    (141, "wesp"),
    (142, "rohc"),
    (143, "ethernet"),
    (144, "aggfrag"),
    (255, "reserved"),
];

/// Port names accepted by the firewall in place of numbers.
const NAMED_PORTS: &[(u16, &str)] = &[
    (5190, "aol"),
    (179, "bgp"),
    (68, "bootpc"),
    (67, "bootps"),
    (19, "chargen"),
    (1494, "citrix-ica"),
    (514, "cmd"),
    (2748, "ctiqbe"),
    (13, "daytime"),
    (9, "discard"),
    (53, "domain"),
    (7, "echo"),
    (512, "exec"),
    (79, "finger"),
    (21, "ftp"),
    (20, "ftp-data"),
    (70, "gopher"),
    (1720, "h323"),
    (101, "hostname"),
    (80, "http"),
    (443, "https"),
    (113, "ident"),
    (143, "imap4"),
    (194, "irc"),
    (500, "isakmp"),
    (750, "kerberos"),
    (543, "klogin"),
    (544, "kshell"),
    (389, "ldap"),
    (636, "ldaps"),
    (513, "login"),
    (1352, "lotusnotes"),
    (515, "lpd"),
    (138, "netbios-dgm"),
    (137, "netbios-ns"),
    (139, "netbios-ssn"),
    (2049, "nfs"),
    (119, "nntp"),
    (123, "ntp"),
    (5631, "pcanywhere-data"),
    (5632, "pcanywhere-status"),
    (496, "pim-auto-rp"),
    (109, "pop2"),
    (110, "pop3"),
    (1723, "pptp"),
    (514, "rsh"),
    (554, "rtsp"),
    (5060, "sip"),
    (25, "smtp"),
    (161, "snmp"),
    (162, "snmptrap"),
    (1521, "sqlnet"),
    (22, "ssh"),
    (111, "sunrpc"),
    (514, "syslog"),
    (49, "tacacs"),
    (517, "talk"),
    (23, "telnet"),
    (69, "tftp"),
    (540, "uucp"),
    (513, "whois"),
    (80, "www"),
];

const ICMP_TYPES: &[(i16, &str)] = &[
    (0, "echo-reply"),
    (3, "unreachable"),
    (4, "source-quench"),
    (5, "redirect"),
    (6, "alternate-address"),
    (8, "echo"),
    (9, "router-advertisement"),
    (10, "router-solicitation"),
    (11, "time-exceeded"),
    (12, "parameter-problem"),
    (13, "timestamp-request"),
    (14, "timestamp-reply"),
    (15, "information-request"),
    (16, "information-reply"),
    (17, "mask-request"),
    (18, "mask-reply"),
    (31, "conversion-error"),
    (32, "mobile-redirect"),
];

static PROTOCOLS_BY_NAME: Lazy<HashMap<&'static str, u8>> =
    Lazy::new(|| PROTOCOLS.iter().map(|&(id, name)| (name, id)).collect());

static PROTOCOL_NAMES: Lazy<HashMap<u8, &'static str>> = Lazy::new(|| {
    let mut names = HashMap::with_capacity(PROTOCOLS.len());
    for &(id, name) in PROTOCOLS {
        names.entry(id).or_insert(name);
    }
    names
});

static PORTS_BY_NAME: Lazy<HashMap<&'static str, u16>> =
    Lazy::new(|| NAMED_PORTS.iter().map(|&(port, name)| (name, port)).collect());

static ICMP_BY_NAME: Lazy<HashMap<&'static str, i16>> =
    Lazy::new(|| ICMP_TYPES.iter().map(|&(id, name)| (name, id)).collect());

/// Display name of a protocol number
pub fn protocol_name(id: u8) -> Option<&'static str> {
    PROTOCOL_NAMES.get(&id).copied()
}

/// Look up a protocol keyword. `tcp-udp` expands to both transports.
///
/// Numeric protocol ids are accepted as well.
pub fn protocols_by_name(name: &str) -> Result<Vec<Protocol>> {
    let name = name.to_lowercase();
    if name == "tcp-udp" {
        return Ok(vec![Protocol::TCP, Protocol::UDP]);
    }
    if let Some(&id) = PROTOCOLS_BY_NAME.get(name.as_str()) {
        return Ok(vec![Protocol(id)]);
    }
    name.parse::<u8>()
        .map(|id| vec![Protocol(id)])
        .map_err(|_| AuditError::Parse(format!("unknown protocol '{}'", name)))
}

/// Parse a port given as a number or a well-known name
pub fn parse_port(token: &str) -> Result<u16> {
    if let Ok(port) = token.parse::<u16>() {
        return Ok(port);
    }
    PORTS_BY_NAME
        .get(token)
        .copied()
        .ok_or_else(|| AuditError::Parse(format!("unknown port '{}'", token)))
}

/// Parse an ICMP type or code given as a number or a name.
///
/// The `log` keyword in this position means "any".
pub fn parse_icmp_value(token: &str) -> Result<i16> {
    if is_numeric(token) {
        return token
            .parse::<u8>()
            .map(i16::from)
            .map_err(|_| AuditError::Parse(format!("icmp value '{}' out of range 0-255", token)));
    }
    if token == "log" {
        return Ok(-1);
    }
    ICMP_BY_NAME
        .get(token)
        .copied()
        .ok_or_else(|| AuditError::Parse(format!("unknown icmp type '{}'", token)))
}

/// Check whether a token reads as an ICMP type (number or known name).
/// Any run of digits counts, so an out-of-range number is rejected by
/// [`parse_icmp_value`] instead of being skipped.
pub fn is_icmp_value(token: &str) -> bool {
    is_numeric(token) || ICMP_BY_NAME.contains_key(token)
}

fn is_numeric(token: &str) -> bool {
    !token.is_empty() && token.bytes().all(|b| b.is_ascii_digit())
}
