use tracing::debug;

use super::{missing_operand, Namespace, ObjectResolver};
use crate::error::{AuditError, Result};
use crate::parser::{is_port_operator, parse_icmp_type_code, parse_port_operator};
use crate::protocols::protocols_by_name;
use crate::types::{IcmpSelector, PortRange, Protocol};

/// Resolved service: protocols plus the ports or ICMP selectors they carry.
///
/// Every set is a union. Empty port or ICMP sets mean "unconstrained".
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ServiceSelector {
    pub protocols: Vec<Protocol>,
    pub src_ports: Vec<PortRange>,
    pub dst_ports: Vec<PortRange>,
    pub icmp: Vec<IcmpSelector>,
}

impl ServiceSelector {
    pub fn from_protocols(protocols: Vec<Protocol>) -> Self {
        Self {
            protocols,
            ..Default::default()
        }
    }

    /// Protocol that decides which inline operands the selector accepts
    pub fn primary_protocol(&self) -> Option<Protocol> {
        self.protocols.first().copied()
    }
}

/// Parse a service definition body: `PROTO [source OP ..] [destination OP ..]`
/// for TCP/UDP, `icmp [TYPE [CODE]]`, or a bare protocol.
///
/// A port operator directly after the protocol applies to the destination.
pub fn parse_service_content(fields: &[&str]) -> Result<ServiceSelector> {
    let proto = fields
        .first()
        .ok_or_else(|| AuditError::Parse("empty service definition".to_string()))?;
    let mut selector = ServiceSelector::from_protocols(protocols_by_name(proto)?);
    let primary = selector.primary_protocol().unwrap_or(Protocol::IP);

    let mut pos = 1;
    if primary.is_tcp_udp() {
        if fields.get(pos) == Some(&"source") {
            let (ranges, consumed) = parse_port_operator(&fields[pos + 1..])?;
            selector.src_ports.extend(ranges);
            pos += 1 + consumed;
        }
        match fields.get(pos) {
            Some(&"destination") => {
                let (ranges, consumed) = parse_port_operator(&fields[pos + 1..])?;
                selector.dst_ports.extend(ranges);
                pos += 1 + consumed;
            }
            Some(op) if is_port_operator(op) => {
                let (ranges, consumed) = parse_port_operator(&fields[pos..])?;
                selector.dst_ports.extend(ranges);
                pos += consumed;
            }
            _ => {}
        }
    } else if primary == Protocol::ICMP && fields.len() > 1 {
        let (icmp, consumed) = parse_icmp_type_code(&fields[1..])?;
        selector.icmp.push(icmp);
        pos += consumed;
    }

    if pos < fields.len() {
        debug!(
            ignored = %fields[pos..].join(" "),
            "trailing tokens in service definition"
        );
    }
    Ok(selector)
}

impl<'a> ObjectResolver<'a> {
    /// Resolve the protocol operand of a rule line: a protocol keyword,
    /// `object NAME` or `object-group NAME` (service or protocol group).
    ///
    /// Returns the selectors and the number of tokens consumed.
    pub fn resolve_service(&self, tokens: &[&str]) -> Result<(Vec<ServiceSelector>, usize)> {
        let keyword = tokens
            .first()
            .copied()
            .ok_or_else(|| AuditError::Parse("expected a protocol".to_string()))?;

        match keyword {
            "object" => {
                let name = tokens.get(1).ok_or_else(|| missing_operand(tokens, "object name"))?;
                Ok((vec![self.service_object(name)?], 2))
            }
            "object-group" => {
                let name = tokens
                    .get(1)
                    .ok_or_else(|| missing_operand(tokens, "object-group name"))?;
                let services = self.index.exact(&format!("object-group service {}", name)).len();
                let protocols = self.index.exact(&format!("object-group protocol {}", name)).len();
                match (services, protocols) {
                    (1, 0) => Ok((self.service_group(name)?, 2)),
                    (0, 1) => {
                        let protocols = self.protocol_group(name)?;
                        Ok((vec![ServiceSelector::from_protocols(protocols)], 2))
                    }
                    _ => Err(AuditError::Resolution(format!(
                        "object-group {} must be defined once as a service or protocol group, \
                         found {} service and {} protocol definitions",
                        name, services, protocols
                    ))),
                }
            }
            proto => Ok((
                vec![ServiceSelector::from_protocols(protocols_by_name(proto)?)],
                1,
            )),
        }
    }

    /// Resolve `object service NAME`, which holds one `service ...` line.
    pub fn service_object(&self, name: &str) -> Result<ServiceSelector> {
        let mut selectors = self.cached(Namespace::ServiceObject, name, || {
            let header = format!("object service {}", name);
            let body = self.definition_body(&header);
            if body.len() != 1 {
                return Err(AuditError::Resolution(format!(
                    "{} must hold exactly one definition line, found {}",
                    header,
                    body.len()
                )));
            }
            let fields: Vec<&str> = body[0].split_whitespace().collect();
            match fields.split_first() {
                Some((&"service", content)) => Ok(vec![parse_service_content(content)?]),
                _ => Err(AuditError::Parse(format!(
                    "{} must start with 'service': '{}'",
                    header,
                    body[0].trim()
                ))),
            }
        })?;
        selectors
            .pop()
            .ok_or_else(|| AuditError::Resolution(format!("object service {} is empty", name)))
    }

    /// Resolve `object-group service NAME` (a group of service objects).
    pub fn service_group(&self, name: &str) -> Result<Vec<ServiceSelector>> {
        self.cached(Namespace::ServiceGroup, name, || {
            let header = format!("object-group service {}", name);
            let body = self.definition_body(&header);
            if body.is_empty() {
                return Err(AuditError::Resolution(format!(
                    "{} is missing or empty",
                    header
                )));
            }

            let mut selectors = Vec::new();
            for line in body {
                let fields: Vec<&str> = line.split_whitespace().collect();
                match fields.as_slice() {
                    ["service-object", "object", object] => {
                        selectors.push(self.service_object(object)?);
                    }
                    ["service-object", content @ ..] if !content.is_empty() => {
                        selectors.push(parse_service_content(content)?);
                    }
                    ["group-object", group] => {
                        selectors.extend(self.service_group(group)?);
                    }
                    _ => {
                        return Err(AuditError::Parse(format!(
                            "unexpected line in {}: '{}'",
                            header,
                            line.trim()
                        )));
                    }
                }
            }
            Ok(selectors)
        })
    }

    /// Resolve `object-group protocol NAME` into its protocol list.
    pub fn protocol_group(&self, name: &str) -> Result<Vec<Protocol>> {
        self.cached(Namespace::ProtocolGroup, name, || {
            let header = format!("object-group protocol {}", name);
            let body = self.definition_body(&header);
            if body.is_empty() {
                return Err(AuditError::Resolution(format!(
                    "{} is missing or empty",
                    header
                )));
            }

            let mut protocols = Vec::new();
            for line in body {
                let fields: Vec<&str> = line.split_whitespace().collect();
                match fields.as_slice() {
                    ["protocol-object", proto] => protocols.extend(protocols_by_name(proto)?),
                    ["group-object", group] => protocols.extend(self.protocol_group(group)?),
                    _ => {
                        return Err(AuditError::Parse(format!(
                            "unexpected line in {}: '{}'",
                            header,
                            line.trim()
                        )));
                    }
                }
            }
            Ok(protocols)
        })
    }

    /// Check whether `name` is a port group (`object-group service NAME tcp|udp|tcp-udp`).
    ///
    /// A single header naming any other protocol, or several headers, is an error.
    pub fn is_port_group(&self, name: &str) -> Result<bool> {
        let headers = self.index.include(&format!("object-group service {} ", name));
        match headers.len() {
            0 => Ok(false),
            1 => {
                let fields: Vec<&str> = headers[0].split_whitespace().collect();
                match fields.get(3) {
                    Some(&("tcp" | "udp" | "tcp-udp")) => Ok(true),
                    other => Err(AuditError::Resolution(format!(
                        "object-group service {} declares unexpected protocol {:?}",
                        name, other
                    ))),
                }
            }
            n => Err(AuditError::Resolution(format!(
                "found {} definitions of object-group service {}",
                n, name
            ))),
        }
    }

    /// Resolve a port group into its port ranges.
    pub fn port_group(&self, name: &str) -> Result<Vec<PortRange>> {
        self.cached(Namespace::PortGroup, name, || {
            let header = format!("object-group service {} ", name);
            let body = self
                .index
                .section(&header)
                .exclude(header.trim_end())
                .exclude("description ");
            if body.is_empty() {
                return Err(AuditError::Resolution(format!(
                    "port group {} is missing or empty",
                    name
                )));
            }

            let mut ranges = Vec::new();
            for line in body {
                let fields: Vec<&str> = line.split_whitespace().collect();
                match fields.as_slice() {
                    ["port-object", operator @ ..] if !operator.is_empty() => {
                        ranges.extend(parse_port_operator(operator)?.0);
                    }
                    ["group-object", group] => ranges.extend(self.port_group(group)?),
                    _ => {
                        return Err(AuditError::Parse(format!(
                            "unexpected line in port group {}: '{}'",
                            name,
                            line.trim()
                        )));
                    }
                }
            }
            Ok(ranges)
        })
    }
}
