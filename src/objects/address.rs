use std::net::IpAddr;

use tracing::{debug, warn};

use super::{missing_operand, Namespace, ObjectResolver};
use crate::error::{AuditError, Result};
use crate::parser::{parse_ip, parse_subnet};
use crate::types::AddressRange;

impl<'a> ObjectResolver<'a> {
    /// Resolve the address operand that starts at `tokens[0]` of a rule line.
    ///
    /// Returns the address ranges and the number of tokens consumed.
    pub fn resolve_address(&self, tokens: &[&str]) -> Result<(Vec<AddressRange>, usize)> {
        let keyword = tokens
            .first()
            .copied()
            .ok_or_else(|| AuditError::Parse("expected an address".to_string()))?;

        match keyword {
            "any" | "any4" => Ok((vec![AddressRange::ANY], 1)),
            "any6" | "any6-any" | "interface" => Err(AuditError::Parse(format!(
                "'{}' is not supported as an address",
                keyword
            ))),
            "host" => {
                let ip = tokens.get(1).ok_or_else(|| missing_operand(tokens, "host address"))?;
                Ok((vec![AddressRange::host(parse_ip(ip)?)], 2))
            }
            "object" => {
                let name = tokens.get(1).ok_or_else(|| missing_operand(tokens, "object name"))?;
                Ok((self.network_object(name)?, 2))
            }
            "object-group" => {
                let name = tokens
                    .get(1)
                    .ok_or_else(|| missing_operand(tokens, "object-group name"))?;
                Ok((self.network_group(name)?, 2))
            }
            ip => {
                let mask = tokens.get(1).ok_or_else(|| missing_operand(tokens, "netmask"))?;
                Ok((vec![parse_subnet(ip, mask)?], 2))
            }
        }
    }

    /// Resolve `object network NAME`.
    ///
    /// The object must hold exactly one definition line besides its
    /// description and NAT statements.
    pub fn network_object(&self, name: &str) -> Result<Vec<AddressRange>> {
        self.cached(Namespace::NetworkObject, name, || {
            let header = format!("object network {}", name);
            let body = self.definition_body(&header).exclude(" nat ");
            if body.len() != 1 {
                return Err(AuditError::Resolution(format!(
                    "{} must hold exactly one definition line, found {}",
                    header,
                    body.len()
                )));
            }
            let fields: Vec<&str> = body[0].split_whitespace().collect();
            self.address_content(&fields)
        })
    }

    /// Resolve `object-group network NAME`, following nested `group-object`s.
    pub fn network_group(&self, name: &str) -> Result<Vec<AddressRange>> {
        self.cached(Namespace::NetworkGroup, name, || {
            let header = format!("object-group network {}", name);
            let body = self.definition_body(&header);
            if body.is_empty() {
                return Err(AuditError::Resolution(format!(
                    "{} is missing or empty",
                    header
                )));
            }

            let mut ranges = Vec::new();
            for line in body {
                let fields: Vec<&str> = line.split_whitespace().collect();
                match fields.as_slice() {
                    ["network-object", "object", object] => {
                        ranges.extend(self.network_object(object)?);
                    }
                    ["network-object", "host", ip] => {
                        ranges.push(AddressRange::host(parse_ip(ip)?));
                    }
                    ["network-object", ip, mask] => {
                        ranges.push(parse_subnet(ip, mask)?);
                    }
                    ["group-object", group] => {
                        ranges.extend(self.network_group(group)?);
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
            Ok(ranges)
        })
    }

    // host / subnet / range / fqdn, as written inside an `object network`
    fn address_content(&self, fields: &[&str]) -> Result<Vec<AddressRange>> {
        match fields {
            ["host", ip, ..] => Ok(vec![AddressRange::host(parse_ip(ip)?)]),
            ["subnet", ip, mask, ..] => Ok(vec![parse_subnet(ip, mask)?]),
            ["range", start, finish, ..] => {
                Ok(vec![AddressRange::new(parse_ip(start)?, parse_ip(finish)?)])
            }
            ["fqdn", "v4" | "v6", host, ..] | ["fqdn", host, ..] => self.resolve_fqdn(host),
            _ => Err(AuditError::Parse(format!(
                "unsupported network object definition '{}'",
                fields.join(" ")
            ))),
        }
    }

    fn resolve_fqdn(&self, host: &str) -> Result<Vec<AddressRange>> {
        let mut ranges = Vec::new();
        for ip in self.names.resolve(host)? {
            match ip {
                IpAddr::V4(v4) => ranges.push(AddressRange::host(u32::from(v4))),
                IpAddr::V6(v6) => {
                    warn!(fqdn = host, address = %v6, "skipping IPv6 address");
                }
            }
        }
        if ranges.is_empty() {
            warn!(fqdn = host, "name resolved to no IPv4 address");
        } else {
            debug!(fqdn = host, count = ranges.len(), "resolved fqdn object");
        }
        Ok(ranges)
    }
}
