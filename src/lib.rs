//! Excessive ACL - finds firewall access-list entries that admit far more
//! traffic than the traffic actually logged against them.
//!
//! The audit runs in four stages:
//! - compile every access list bound by an `access-group` from a
//!   `show running-config` dump, resolving network, service and protocol
//!   objects and groups into flat address/port/ICMP variants
//! - build a routing containment tree from a `show route` dump
//! - replay firewall syslog records as flows and record each one against the
//!   first entry of every access list it passes through
//! - compare, per compiled entry, the size of the traffic space the entry
//!   admits with the space covered by the recorded flows
//!
//! # Example
//!
//! ```rust
//! use std::net::Ipv4Addr;
//! use excessive_acl::{
//!     compile_access_lists, parse_access_groups, AuditOptions, AuditReport, Auditor, Flow,
//!     NilResolver, Protocol, RoutingTable, TextIndex,
//! };
//!
//! let config = TextIndex::new("
//! access-list inside_in extended permit tcp any any
//! access-group inside_in in interface inside
//! ");
//!
//! let options = AuditOptions::default();
//! let groups = parse_access_groups(&config);
//! let lists = compile_access_lists(&config, &groups, &NilResolver, &options).unwrap();
//! let auditor = Auditor::new(lists, groups, RoutingTable::default(), options);
//!
//! let flow = Flow::transport(
//!     Protocol::TCP,
//!     "inside",
//!     Ipv4Addr::new(10, 0, 0, 1),
//!     40000,
//!     "outside",
//!     Ipv4Addr::new(8, 8, 8, 8),
//!     443,
//! );
//! assert!(auditor.record_flow(&flow));
//!
//! let report = AuditReport::build(auditor.access_lists()).unwrap();
//! let entry = report.entries().next().unwrap();
//! assert_eq!(entry.capacity.theoretical, 65536);
//! assert_eq!(entry.capacity.observed, 1);
//! ```
//!
//! # Supported configuration
//!
//! | Statement | Example |
//! |-----------|---------|
//! | Extended ACE | `access-list X extended permit tcp any object-group WEB eq https` |
//! | Network object | `object network WEB` / `host`, `subnet`, `range`, `fqdn` |
//! | Network group | `object-group network G` / `network-object`, `group-object` |
//! | Service object | `object service S` / `service tcp destination eq 80` |
//! | Service group | `object-group service S` / `service-object`, `group-object` |
//! | Port group | `object-group service P tcp` / `port-object eq 80` |
//! | Protocol group | `object-group protocol P` / `protocol-object udp` |
//! | Binding | `access-group X in interface inside` |
//!
//! # Log records
//!
//! `106023`, `302013`, `302015` and `302020`; everything else is ignored.

pub mod access_group;
pub mod capacity;
pub mod cli;
pub mod compile;
pub mod error;
pub mod matcher;
pub mod objects;
pub mod parser;
pub mod pipeline;
pub mod protocols;
pub mod report;
pub mod resolver;
pub mod route;
pub mod syslog;
pub mod text;
pub mod types;

// Re-export commonly used items
pub use access_group::{parse_access_groups, AccessGroup, Direction};
pub use capacity::{analyze, observed_capacity, theoretical_capacity, Capacity};
pub use compile::{
    compile_access_entry, compile_access_list, compile_access_lists, AccessEntry, AccessList,
    CompiledEntry,
};
pub use error::{AuditError, ErrorKind, Result};
pub use matcher::MatchPosition;
pub use objects::{ObjectResolver, DEFAULT_CACHE_SIZE};
pub use pipeline::{AuditOptions, Auditor, ReplayStats};
pub use report::AuditReport;
pub use resolver::{NameResolver, NilResolver, StaticResolver, SystemResolver};
pub use route::{interface_names, RoutingEntry, RoutingTable};
pub use text::TextIndex;
pub use types::{Action, AddressRange, Flow, IcmpSelector, PortRange, Protocol};
