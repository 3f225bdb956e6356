//! Routing containment tree.
//!
//! Routes from a `show route` dump are arranged into a forest where every
//! child prefix lies inside its parent. Looking up an address walks down the
//! forest to the most specific covering route. Recursive routes (`via
//! NEXTHOP` without an interface) take the interface of whatever route
//! covers their next hop.

use std::collections::HashSet;
use std::fmt;
use std::net::Ipv4Addr;
use std::path::Path;

use tracing::{debug, info};

use crate::error::{AuditError, Result};
use crate::parser::{parse_ip, parse_subnet};
use crate::text::TextIndex;
use crate::types::AddressRange;

/// One route of the dump
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingEntry {
    pub prefix: AddressRange,
    pub iface: Option<String>,
    pub next_hop: Option<u32>,
    parent: Option<usize>,
    children: Vec<usize>,
}

impl RoutingEntry {
    /// Route ending at a named local interface
    pub fn connected(prefix: AddressRange, iface: impl Into<String>) -> Self {
        Self {
            prefix,
            iface: Some(iface.into()),
            next_hop: None,
            parent: None,
            children: Vec::new(),
        }
    }

    /// Route whose interface is found through its next hop
    pub fn recursive(prefix: AddressRange, next_hop: u32) -> Self {
        Self {
            prefix,
            iface: None,
            next_hop: Some(next_hop),
            parent: None,
            children: Vec::new(),
        }
    }

    /// Index of the enclosing route in [`RoutingTable::entries`]
    pub fn parent(&self) -> Option<usize> {
        self.parent
    }

    pub fn children(&self) -> &[usize] {
        &self.children
    }
}

impl fmt::Display for RoutingEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.prefix)?;
        if let Some(next_hop) = self.next_hop {
            write!(f, " via {}", Ipv4Addr::from(next_hop))?;
        }
        if let Some(iface) = &self.iface {
            write!(f, " {}", iface)?;
        }
        Ok(())
    }
}

/// Forest of routes, most general first
#[derive(Debug, Clone, Default)]
pub struct RoutingTable {
    entries: Vec<RoutingEntry>,
}

impl RoutingTable {
    /// Arrange routes into the containment forest and fill in the interfaces
    /// of recursive routes.
    pub fn build(mut entries: Vec<RoutingEntry>) -> Result<Self> {
        entries.sort_by_key(|e| std::cmp::Reverse(e.prefix.width()));
        for entry in &mut entries {
            entry.parent = None;
            entry.children.clear();
        }

        // The closest already placed route that covers a prefix is its parent.
        for i in 0..entries.len() {
            let parent = (0..i).rev().find(|&j| entries[j].prefix.covers(&entries[i].prefix));
            if let Some(j) = parent {
                entries[i].parent = Some(j);
                entries[j].children.push(i);
            }
        }

        let mut table = Self { entries };
        table.resolve_next_hops()?;
        Ok(table)
    }

    /// Parse the routes of a dump. Only routes whose last token is one of
    /// `interfaces`, or that carry a `via` next hop, are kept.
    pub fn parse(dump: &str, interfaces: &HashSet<String>) -> Result<Self> {
        let mut entries = Vec::new();
        for (idx, line) in routes_section(dump) {
            match parse_route_line(line, interfaces).map_err(|e| e.at_line(idx + 1))? {
                Some(entry) => entries.push(entry),
                None => debug!(line = idx + 1, text = line.trim(), "skipping routing dump line"),
            }
        }

        let table = Self::build(entries)?;
        info!(routes = table.len(), roots = table.roots().count(), "routing table built");
        Ok(table)
    }

    /// Read and parse a routing dump from disk.
    pub fn from_file(path: impl AsRef<Path>, interfaces: &HashSet<String>) -> Result<Self> {
        let dump = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&dump, interfaces)
    }

    pub fn entries(&self) -> &[RoutingEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Indices of the top-level routes
    pub fn roots(&self) -> impl Iterator<Item = usize> + '_ {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.parent.is_none())
            .map(|(idx, _)| idx)
    }

    /// Index of the most specific route covering `ip`.
    pub fn lookup(&self, ip: u32) -> Option<usize> {
        let mut best: Option<(usize, usize)> = None;

        for root in self.roots() {
            if !self.entries[root].prefix.contains(ip) {
                continue;
            }
            let mut node = root;
            let mut depth = 0;
            while let Some(&child) = self.entries[node]
                .children
                .iter()
                .find(|&&c| self.entries[c].prefix.contains(ip))
            {
                node = child;
                depth += 1;
            }
            if best.map_or(true, |(_, d)| depth > d) {
                best = Some((node, depth));
            }
        }

        best.map(|(node, _)| node)
    }

    /// Interface traffic to `ip` leaves through.
    pub fn get_iface(&self, ip: u32) -> Result<&str> {
        let idx = self.lookup(ip).ok_or_else(|| {
            AuditError::Routing(format!("no route covers {}", Ipv4Addr::from(ip)))
        })?;
        self.entries[idx].iface.as_deref().ok_or_else(|| {
            AuditError::Routing(format!(
                "route {} for {} has no interface",
                self.entries[idx],
                Ipv4Addr::from(ip)
            ))
        })
    }

    fn resolve_next_hops(&mut self) -> Result<()> {
        for idx in 0..self.entries.len() {
            if self.entries[idx].iface.is_none() {
                let mut visiting = Vec::new();
                self.resolve_iface(idx, &mut visiting)?;
            }
        }
        Ok(())
    }

    fn resolve_iface(&mut self, idx: usize, visiting: &mut Vec<usize>) -> Result<String> {
        if let Some(iface) = &self.entries[idx].iface {
            return Ok(iface.clone());
        }
        if visiting.contains(&idx) {
            return Err(AuditError::Routing(format!(
                "recursive route {} resolves to itself",
                self.entries[idx]
            )));
        }

        let next_hop = self.entries[idx].next_hop.ok_or_else(|| {
            AuditError::Routing(format!(
                "route {} has neither interface nor next hop",
                self.entries[idx]
            ))
        })?;
        let target = self.lookup(next_hop).ok_or_else(|| {
            AuditError::Routing(format!(
                "next hop {} of route {} is not covered by any route",
                Ipv4Addr::from(next_hop),
                self.entries[idx]
            ))
        })?;

        visiting.push(idx);
        let iface = self.resolve_iface(target, visiting)?;
        visiting.pop();

        debug!(route = %self.entries[idx], iface = %iface, "resolved recursive route");
        self.entries[idx].iface = Some(iface.clone());
        Ok(iface)
    }
}

// Lines after the "Gateway of last resort" banner, numbered from the dump start.
fn routes_section(dump: &str) -> Vec<(usize, &str)> {
    let lines: Vec<(usize, &str)> = dump.lines().enumerate().collect();
    match lines
        .iter()
        .position(|(_, line)| line.starts_with("Gateway of last resort"))
    {
        Some(pos) => lines[pos + 1..].to_vec(),
        None => lines,
    }
}

/// Parse one route line.
///
/// Returns `None` for lines that are not routes (blank lines, banners,
/// continuation lines without a prefix).
pub fn parse_route_line(line: &str, interfaces: &HashSet<String>) -> Result<Option<RoutingEntry>> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() <= 2 {
        return Ok(None);
    }

    // Route codes may span several tokens ("O E2", "S*"), so the prefix is
    // the first address/mask pair on the line.
    let Some(pos) = fields
        .windows(2)
        .position(|pair| parse_ip(pair[0]).is_ok() && parse_ip(pair[1]).is_ok())
    else {
        return Ok(None);
    };
    let prefix = parse_subnet(fields[pos], fields[pos + 1])?;

    let last = fields[fields.len() - 1].trim_end_matches(',');
    if interfaces.contains(last) {
        return Ok(Some(RoutingEntry::connected(prefix, last)));
    }

    if let Some(via) = fields.iter().position(|&f| f == "via") {
        let hop = fields
            .get(via + 1)
            .and_then(|token| token.split(',').next())
            .ok_or_else(|| AuditError::Parse(format!("missing next hop after 'via' in '{}'", line.trim())))?;
        return Ok(Some(RoutingEntry::recursive(prefix, parse_ip(hop)?)));
    }

    Ok(None)
}

/// Names given to interfaces with `nameif`.
pub fn interface_names(index: &TextIndex) -> Result<HashSet<String>> {
    let mut names = HashSet::new();
    for line in index.include("nameif") {
        match line.split_whitespace().collect::<Vec<_>>().as_slice() {
            ["nameif", name, ..] => {
                names.insert(name.to_string());
            }
            ["nameif"] => {
                return Err(AuditError::Parse(format!(
                    "cannot read interface name from '{}'",
                    line.trim()
                )));
            }
            // descriptions, `no nameif` and the like
            _ => {}
        }
    }

    if names.is_empty() {
        return Err(AuditError::Routing(
            "no interface names (nameif) found in the configuration".to_string(),
        ));
    }
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn ifaces(names: &[&str]) -> HashSet<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    fn ip(a: u8, b: u8, c: u8, d: u8) -> u32 {
        u32::from(Ipv4Addr::new(a, b, c, d))
    }

    fn subnet(addr: &str, mask: &str) -> AddressRange {
        parse_subnet(addr, mask).unwrap()
    }

    #[test]
    fn test_parse_connected_and_default_routes() {
        let interfaces = ifaces(&["inside", "outside"]);

        let entry = parse_route_line(
            "C        10.11.12.0 255.255.255.0 is directly connected, inside",
            &interfaces,
        )
        .unwrap()
        .unwrap();
        assert_eq!(entry.prefix, AddressRange::new(0x0a0b0c00, 0x0a0b0cff));
        assert_eq!(entry.iface.as_deref(), Some("inside"));

        let entry = parse_route_line(
            "S*       0.0.0.0 0.0.0.0 [1/0] via 123.123.123.2, outside",
            &interfaces,
        )
        .unwrap()
        .unwrap();
        assert_eq!(entry.prefix, AddressRange::ANY);
        assert_eq!(entry.iface.as_deref(), Some("outside"));
    }

    #[test]
    fn test_parse_recursive_route() {
        let interfaces = ifaces(&["inside"]);
        let entry = parse_route_line(
            "O E2     172.16.0.0 255.255.0.0 [110/20] via 10.11.12.1, 1d02h",
            &interfaces,
        )
        .unwrap()
        .unwrap();
        assert_eq!(entry.iface, None);
        assert_eq!(entry.next_hop, Some(ip(10, 11, 12, 1)));
    }

    #[test]
    fn test_non_route_lines_are_skipped() {
        let interfaces = ifaces(&["inside"]);
        assert_eq!(parse_route_line("", &interfaces).unwrap(), None);
        assert_eq!(
            parse_route_line("       [110/20] via 10.0.0.1, 0:00:05", &interfaces).unwrap(),
            None
        );
        assert_eq!(
            parse_route_line("C 10.0.0.0 255.255.255.0 is directly connected, unknown", &interfaces)
                .unwrap(),
            None
        );
        assert!(parse_route_line("C 10.0.0.0 255.0.255.0 is directly connected, inside", &interfaces)
            .is_err());
    }

    #[test]
    fn test_longest_prefix_lookup() {
        let table = RoutingTable::build(vec![
            RoutingEntry::connected(subnet("10.10.10.0", "255.255.255.0"), "inside"),
            RoutingEntry::connected(AddressRange::ANY, "outside"),
            RoutingEntry::connected(subnet("10.10.0.0", "255.255.0.0"), "outside"),
            RoutingEntry::connected(subnet("10.0.0.0", "255.0.0.0"), "inside"),
        ])
        .unwrap();

        assert_eq!(table.get_iface(ip(10, 10, 10, 10)).unwrap(), "inside");
        assert_eq!(table.get_iface(ip(10, 10, 3, 4)).unwrap(), "outside");
        assert_eq!(table.get_iface(ip(10, 2, 3, 4)).unwrap(), "inside");
        assert_eq!(table.get_iface(ip(1, 2, 3, 4)).unwrap(), "outside");
    }

    #[test]
    fn test_children_lie_inside_parents() {
        let table = RoutingTable::build(vec![
            RoutingEntry::connected(subnet("10.10.10.0", "255.255.255.0"), "inside"),
            RoutingEntry::connected(subnet("192.168.0.0", "255.255.0.0"), "dmz"),
            RoutingEntry::connected(subnet("10.0.0.0", "255.0.0.0"), "inside"),
            RoutingEntry::connected(subnet("10.10.0.0", "255.255.0.0"), "outside"),
        ])
        .unwrap();

        assert_eq!(table.roots().count(), 2);
        for (idx, entry) in table.entries().iter().enumerate() {
            if let Some(parent) = entry.parent() {
                assert!(table.entries()[parent].prefix.covers(&entry.prefix));
                assert!(table.entries()[parent].children().contains(&idx));
            }
        }
    }

    #[test]
    fn test_deepest_match_across_forest() {
        let table = RoutingTable::build(vec![
            RoutingEntry::connected(subnet("10.0.0.0", "255.0.0.0"), "inside"),
            RoutingEntry::connected(subnet("192.168.1.0", "255.255.255.0"), "dmz"),
        ])
        .unwrap();

        assert_eq!(table.get_iface(ip(192, 168, 1, 7)).unwrap(), "dmz");
        let err = table.get_iface(ip(8, 8, 8, 8)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Routing);
    }

    #[test]
    fn test_recursive_routes_take_next_hop_interface() {
        let table = RoutingTable::build(vec![
            RoutingEntry::connected(subnet("10.11.12.0", "255.255.255.0"), "inside"),
            RoutingEntry::recursive(subnet("172.16.0.0", "255.255.0.0"), ip(10, 11, 12, 1)),
            // chained: the next hop is only reachable through another recursive route
            RoutingEntry::recursive(subnet("172.17.0.0", "255.255.0.0"), ip(172, 16, 0, 1)),
        ])
        .unwrap();

        assert_eq!(table.get_iface(ip(172, 16, 5, 5)).unwrap(), "inside");
        assert_eq!(table.get_iface(ip(172, 17, 5, 5)).unwrap(), "inside");
    }

    #[test]
    fn test_unresolvable_next_hop() {
        let err = RoutingTable::build(vec![
            RoutingEntry::connected(subnet("10.11.12.0", "255.255.255.0"), "inside"),
            RoutingEntry::recursive(subnet("172.16.0.0", "255.255.0.0"), ip(192, 0, 2, 1)),
        ])
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Routing);

        let err = RoutingTable::build(vec![RoutingEntry::recursive(
            AddressRange::ANY,
            ip(192, 0, 2, 1),
        )])
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Routing);
    }

    #[test]
    fn test_parse_dump() {
        let dump = "\
Codes: L - local, C - connected, S - static
       * - candidate default, U - per-user static route

Gateway of last resort is 123.123.123.2 to network 0.0.0.0

S*       0.0.0.0 0.0.0.0 [1/0] via 123.123.123.2, outside
C        10.11.12.0 255.255.255.0 is directly connected, inside
L        10.11.12.1 255.255.255.255 is directly connected, inside
S        10.20.0.0 255.255.0.0 [1/0] via 10.11.12.254
C        123.123.123.0 255.255.255.0 is directly connected, outside
";
        let table = RoutingTable::parse(dump, &ifaces(&["inside", "outside"])).unwrap();
        assert_eq!(table.len(), 5);
        assert_eq!(table.get_iface(ip(10, 20, 1, 1)).unwrap(), "inside");
        assert_eq!(table.get_iface(ip(123, 123, 123, 9)).unwrap(), "outside");
        assert_eq!(table.get_iface(ip(8, 8, 8, 8)).unwrap(), "outside");
    }

    #[test]
    fn test_interface_names() {
        let index = TextIndex::new(
            "\
interface GigabitEthernet0/0
 nameif outside
interface GigabitEthernet0/1
 nameif inside
interface Management0/0
 no nameif
",
        );
        assert_eq!(interface_names(&index).unwrap(), ifaces(&["inside", "outside"]));

        let err = interface_names(&TextIndex::new("hostname asa\n")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Routing);
    }

    #[test]
    fn test_interface_names_skip_other_mentions() {
        let index = TextIndex::new(
            "\
interface GigabitEthernet0/0
 description uplink, nameif set below
 nameif outside
",
        );
        assert_eq!(interface_names(&index).unwrap(), ifaces(&["outside"]));

        let err = interface_names(&TextIndex::new("interface Gi0/0\n nameif\n")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parse);
    }
}
