use std::collections::HashSet;
use std::fmt;

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::access_group::AccessGroup;
use crate::error::{AuditError, Result};
use crate::objects::{ObjectResolver, ServiceSelector};
use crate::parser::{is_port_operator, parse_icmp_type_code, parse_port_operator};
use crate::pipeline::AuditOptions;
use crate::protocols::is_icmp_value;
use crate::resolver::NameResolver;
use crate::text::TextIndex;
use crate::types::{Action, AddressRange, Flow, IcmpSelector, PortRange, Protocol};

/// One fully specified variant of a rule line
pub struct CompiledEntry {
    pub action: Action,
    pub protocol: Protocol,
    pub src_addr: AddressRange,
    pub dst_addr: AddressRange,
    pub src_port: PortRange,
    pub dst_port: PortRange,
    pub icmp: IcmpSelector,
    /// Flows recorded against this entry, guarded per entry
    matched_flows: Mutex<Vec<Flow>>,
}

impl CompiledEntry {
    /// Entry with wildcard ports and ICMP selector
    pub fn new(
        action: Action,
        protocol: Protocol,
        src_addr: AddressRange,
        dst_addr: AddressRange,
    ) -> Self {
        Self {
            action,
            protocol,
            src_addr,
            dst_addr,
            src_port: PortRange::WILDCARD,
            dst_port: PortRange::WILDCARD,
            icmp: IcmpSelector::ANY,
            matched_flows: Mutex::new(Vec::new()),
        }
    }

    pub fn with_ports(mut self, src_port: PortRange, dst_port: PortRange) -> Self {
        self.src_port = src_port;
        self.dst_port = dst_port;
        self
    }

    pub fn with_icmp(mut self, icmp: IcmpSelector) -> Self {
        self.icmp = icmp;
        self
    }

    /// Append a flow to the match history
    pub fn record(&self, flow: Flow) {
        self.matched_flows.lock().push(flow);
    }

    /// Snapshot of the flows matched so far
    pub fn matched_flows(&self) -> Vec<Flow> {
        self.matched_flows.lock().clone()
    }

    pub fn matched_count(&self) -> usize {
        self.matched_flows.lock().len()
    }
}

impl fmt::Debug for CompiledEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledEntry")
            .field("action", &self.action)
            .field("protocol", &self.protocol)
            .field("src_addr", &self.src_addr)
            .field("dst_addr", &self.dst_addr)
            .field("src_port", &self.src_port)
            .field("dst_port", &self.dst_port)
            .field("icmp", &self.icmp)
            .field("matched", &self.matched_count())
            .finish()
    }
}

impl fmt::Display for CompiledEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.action, self.protocol, self.src_addr)?;
        if !self.icmp.is_any() {
            return write!(
                f,
                " {} {} {}",
                self.dst_addr, self.icmp.icmp_type, self.icmp.code
            );
        }
        match (self.src_port.is_wildcard(), self.dst_port.is_wildcard()) {
            (false, false) => write!(f, ":{} {}:{}", self.src_port, self.dst_addr, self.dst_port),
            (false, true) => write!(f, ":{} {}", self.src_port, self.dst_addr),
            (true, false) => write!(f, " {}:{}", self.dst_addr, self.dst_port),
            (true, true) => write!(f, " {}", self.dst_addr),
        }
    }
}

/// One rule line and its compiled variants, in evaluation order
#[derive(Debug)]
pub struct AccessEntry {
    line: String,
    compiled: Vec<CompiledEntry>,
}

impl AccessEntry {
    pub fn new(line: impl Into<String>, compiled: Vec<CompiledEntry>) -> Self {
        Self {
            line: line.into(),
            compiled,
        }
    }

    /// The configuration line this entry was compiled from
    pub fn line(&self) -> &str {
        &self.line
    }

    pub fn compiled(&self) -> &[CompiledEntry] {
        &self.compiled
    }
}

/// Named, ordered list of access entries
#[derive(Debug)]
pub struct AccessList {
    name: String,
    entries: Vec<AccessEntry>,
}

impl AccessList {
    pub fn new(name: impl Into<String>, entries: Vec<AccessEntry>) -> Self {
        Self {
            name: name.into(),
            entries,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn entries(&self) -> &[AccessEntry] {
        &self.entries
    }

    /// Total number of compiled variants across all entries
    pub fn compiled_count(&self) -> usize {
        self.entries.iter().map(|e| e.compiled.len()).sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Source,
    Destination,
}

/// Compile one `access-list` line.
///
/// `remark` lines compile to an entry without variants.
pub fn compile_access_entry(line: &str, objects: &ObjectResolver<'_>) -> Result<AccessEntry> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    match fields.as_slice() {
        ["access-list", _, "remark", ..] => Ok(AccessEntry::new(line, Vec::new())),
        ["access-list", _, "extended", ..] => {
            let compiled = compile_extended(&fields, objects).map_err(|e| e.context(line))?;
            Ok(AccessEntry::new(line, compiled))
        }
        ["access-list", _, kind, ..] => Err(AuditError::Parse(format!(
            "unsupported access-list type '{}' in '{}'",
            kind,
            line.trim()
        ))),
        _ => Err(AuditError::Parse(format!(
            "not an access-list line: '{}'",
            line.trim()
        ))),
    }
}

fn rest<'f, 'a>(fields: &'f [&'a str], pos: usize) -> &'f [&'a str] {
    fields.get(pos..).unwrap_or(&[])
}

fn compile_extended(fields: &[&str], objects: &ObjectResolver<'_>) -> Result<Vec<CompiledEntry>> {
    let action = fields
        .get(3)
        .and_then(|token| Action::parse(token))
        .ok_or_else(|| AuditError::Parse("expected permit or deny".to_string()))?;

    let mut pos = 4;
    let (mut services, consumed) = objects.resolve_service(rest(fields, pos))?;
    pos += consumed;

    let (src_addrs, consumed) = objects.resolve_address(rest(fields, pos))?;
    pos += consumed;
    pos += inline_service(Side::Source, rest(fields, pos), &mut services, objects)?;

    let (dst_addrs, consumed) = objects.resolve_address(rest(fields, pos))?;
    pos += consumed;
    pos += inline_service(Side::Destination, rest(fields, pos), &mut services, objects)?;

    if pos < fields.len() {
        debug!(ignored = %fields[pos..].join(" "), "trailing tokens in access-list line");
    }

    Ok(expand(action, &services, &src_addrs, &dst_addrs))
}

// Port or ICMP operands written after an address. Returns the tokens consumed.
fn inline_service(
    side: Side,
    tokens: &[&str],
    services: &mut [ServiceSelector],
    objects: &ObjectResolver<'_>,
) -> Result<usize> {
    let Some(&token) = tokens.first() else {
        return Ok(0);
    };

    let port_group = if token == "object-group" {
        let name = tokens.get(1).ok_or_else(|| {
            AuditError::Grammar("object-group without a name".to_string())
        })?;
        objects.is_port_group(name)?
    } else {
        false
    };
    let icmp = side == Side::Destination && is_icmp_value(token);
    if !is_port_operator(token) && !port_group && !icmp {
        return Ok(0);
    }

    let pending = services.len();
    let service = match services {
        [service] => service,
        _ => {
            return Err(AuditError::Grammar(format!(
                "service operand '{}' needs exactly one protocol or service, found {}",
                token, pending
            )));
        }
    };

    match service.primary_protocol() {
        Some(Protocol::TCP) | Some(Protocol::UDP) => {
            let (ranges, consumed) = if port_group {
                (objects.port_group(tokens[1])?, 2)
            } else if is_port_operator(token) {
                parse_port_operator(tokens)?
            } else {
                return Err(AuditError::Grammar(format!(
                    "'{}' is not a port operand",
                    token
                )));
            };
            match side {
                Side::Source => service.src_ports.extend(ranges),
                Side::Destination => service.dst_ports.extend(ranges),
            }
            Ok(consumed)
        }
        Some(Protocol::ICMP) => {
            if side == Side::Source || !icmp {
                return Err(AuditError::Grammar(format!(
                    "'{}' is not valid for icmp; only a destination type and code are",
                    token
                )));
            }
            let (selector, consumed) = parse_icmp_type_code(tokens)?;
            service.icmp.push(selector);
            Ok(consumed)
        }
        other => Err(AuditError::Grammar(format!(
            "service operand '{}' requires tcp, udp or icmp, not {}",
            token,
            other.map(|p| p.to_string()).unwrap_or_default()
        ))),
    }
}

fn expand(
    action: Action,
    services: &[ServiceSelector],
    src_addrs: &[AddressRange],
    dst_addrs: &[AddressRange],
) -> Vec<CompiledEntry> {
    let mut compiled = Vec::new();

    for service in services {
        for &protocol in &service.protocols {
            for &src in src_addrs {
                for &dst in dst_addrs {
                    let base = || CompiledEntry::new(action, protocol, src, dst);

                    if !service.icmp.is_empty() {
                        for &icmp in &service.icmp {
                            compiled.push(base().with_icmp(icmp));
                        }
                    } else if !service.src_ports.is_empty() && !service.dst_ports.is_empty() {
                        for &src_port in &service.src_ports {
                            for &dst_port in &service.dst_ports {
                                compiled.push(base().with_ports(src_port, dst_port));
                            }
                        }
                    } else if !service.src_ports.is_empty() {
                        for &src_port in &service.src_ports {
                            compiled.push(base().with_ports(src_port, PortRange::WILDCARD));
                        }
                    } else if !service.dst_ports.is_empty() {
                        for &dst_port in &service.dst_ports {
                            compiled.push(base().with_ports(PortRange::WILDCARD, dst_port));
                        }
                    } else {
                        compiled.push(base());
                    }
                }
            }
        }
    }

    compiled
}

/// Compile a single access list from the `access-list NAME ...` lines.
pub fn compile_access_list(name: &str, objects: &ObjectResolver<'_>) -> Result<AccessList> {
    let lines = objects.index().prefix(&format!("access-list {} ", name));
    if lines.is_empty() {
        return Err(AuditError::Resolution(format!(
            "access-list {} is not defined",
            name
        )));
    }

    let mut entries = Vec::with_capacity(lines.len());
    for line in lines {
        entries.push(compile_access_entry(line, objects)?);
    }

    let acl = AccessList::new(name, entries);
    debug!(
        acl = name,
        entries = acl.entries.len(),
        compiled = acl.compiled_count(),
        "compiled access list"
    );
    Ok(acl)
}

/// Compile every access list bound by an access group, each name once,
/// in access-group order.
pub fn compile_access_lists(
    index: &TextIndex,
    groups: &[AccessGroup],
    names: &dyn NameResolver,
    options: &AuditOptions,
) -> Result<Vec<AccessList>> {
    let objects = ObjectResolver::new(index, names, options.cache_size);
    let mut seen = HashSet::new();
    let mut acls = Vec::new();

    for group in groups {
        if !seen.insert(group.acl_name.as_str()) {
            continue;
        }
        acls.push(compile_access_list(&group.acl_name, &objects)?);
    }

    info!(
        acls = acls.len(),
        compiled = acls.iter().map(AccessList::compiled_count).sum::<usize>(),
        "access lists compiled"
    );
    Ok(acls)
}
