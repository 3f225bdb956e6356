//! `access-group` bindings between access lists and interfaces.

use std::fmt;

use tracing::debug;

use crate::text::TextIndex;
use crate::types::Flow;

/// Traffic direction an access list is applied to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    In,
    Out,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::In => f.write_str("in"),
            Direction::Out => f.write_str("out"),
        }
    }
}

/// One `access-group ACL in|out interface IFACE` statement
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AccessGroup {
    pub acl_name: String,
    pub direction: Direction,
    pub interface: String,
}

impl AccessGroup {
    pub fn new(acl_name: impl Into<String>, direction: Direction, interface: impl Into<String>) -> Self {
        Self {
            acl_name: acl_name.into(),
            direction,
            interface: interface.into(),
        }
    }

    /// Parse an interface-bound access-group line.
    ///
    /// Returns `None` for other lines, including `global` access groups.
    pub fn parse_line(line: &str) -> Option<Self> {
        let fields: Vec<&str> = line.split_whitespace().collect();
        match fields.as_slice() {
            ["access-group", acl, direction, "interface", iface] => {
                let direction = match *direction {
                    "in" => Direction::In,
                    "out" => Direction::Out,
                    _ => return None,
                };
                Some(Self::new(*acl, direction, *iface))
            }
            _ => None,
        }
    }

    /// Check if this binding filters the flow: inbound lists see traffic
    /// entering through their interface, outbound lists traffic leaving it.
    pub fn applies_to(&self, flow: &Flow) -> bool {
        match self.direction {
            Direction::In => self.interface == flow.src_iface,
            Direction::Out => self.interface == flow.dst_iface,
        }
    }
}

impl fmt::Display for AccessGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "access-group {} {} interface {}",
            self.acl_name, self.direction, self.interface
        )
    }
}

/// Collect every interface-bound access group of a configuration.
pub fn parse_access_groups(index: &TextIndex) -> Vec<AccessGroup> {
    let mut groups = Vec::new();
    for line in index.prefix("access-group ") {
        match AccessGroup::parse_line(line) {
            Some(group) => groups.push(group),
            None => debug!(line, "skipping access-group statement"),
        }
    }
    groups
}
