//! Flow matching against compiled access lists, first match wins.

use tracing::trace;

use crate::compile::{AccessEntry, AccessList, CompiledEntry};
use crate::types::{Flow, Protocol};

impl CompiledEntry {
    /// Check if this entry admits the flow.
    pub fn matches(&self, flow: &Flow) -> bool {
        // Check protocol
        if !self.protocol.admits(flow.protocol) {
            return false;
        }

        // Check addresses
        if !self.src_addr.contains(flow.src_ip) || !self.dst_addr.contains(flow.dst_ip) {
            return false;
        }

        // Ports and ICMP fields only count when both sides name the same protocol
        if self.protocol != flow.protocol {
            return true;
        }

        if self.protocol.is_tcp_udp() {
            let src_ok = self.src_port.is_wildcard() || self.src_port.contains(flow.src_port);
            let dst_ok = self.dst_port.is_wildcard() || self.dst_port.contains(flow.dst_port);
            return src_ok && dst_ok;
        }

        if self.protocol == Protocol::ICMP {
            return self.icmp.matches(flow.icmp_type, flow.icmp_code);
        }

        true
    }
}

impl AccessEntry {
    /// Record the flow against the first compiled variant that admits it.
    ///
    /// Returns the index of that variant.
    pub fn record_flow(&self, flow: &Flow) -> Option<usize> {
        let idx = self.compiled().iter().position(|c| c.matches(flow))?;
        self.compiled()[idx].record(flow.clone());
        Some(idx)
    }
}

/// Position of a recorded flow inside an access list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchPosition {
    pub entry: usize,
    pub compiled: usize,
}

impl AccessList {
    /// Find the first compiled entry admitting the flow, without recording it.
    pub fn find_match(&self, flow: &Flow) -> Option<(MatchPosition, &CompiledEntry)> {
        self.entries().iter().enumerate().find_map(|(entry, ace)| {
            ace.compiled()
                .iter()
                .position(|c| c.matches(flow))
                .map(|compiled| {
                    (
                        MatchPosition { entry, compiled },
                        &ace.compiled()[compiled],
                    )
                })
        })
    }

    /// Record the flow against the first matching compiled entry of the list.
    ///
    /// A flow is recorded at most once per list.
    pub fn record_flow(&self, flow: &Flow) -> Option<MatchPosition> {
        for (entry, ace) in self.entries().iter().enumerate() {
            if let Some(compiled) = ace.record_flow(flow) {
                trace!(acl = self.name(), entry, compiled, %flow, "flow matched");
                return Some(MatchPosition { entry, compiled });
            }
        }
        trace!(acl = self.name(), %flow, "flow matched no entry");
        None
    }
}
