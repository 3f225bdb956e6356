//! DNS resolver module.
//!
//! `fqdn` network objects are expanded through a [`NameResolver`], so tests
//! can supply fixed answers instead of querying the network.

use std::collections::HashMap;
use std::net::{IpAddr, ToSocketAddrs};

use crate::error::{AuditError, Result};

/// Hostname resolution capability.
pub trait NameResolver: Send + Sync {
    /// Resolve the hostname to every address it has.
    ///
    /// Returns an error if the resolution fails completely.
    fn resolve(&self, host: &str) -> Result<Vec<IpAddr>>;
}

/// System DNS resolver using the OS resolver.
pub struct SystemResolver;

impl SystemResolver {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SystemResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl NameResolver for SystemResolver {
    fn resolve(&self, host: &str) -> Result<Vec<IpAddr>> {
        if let Ok(ip) = host.parse::<IpAddr>() {
            return Ok(vec![ip]);
        }

        let addrs = (host, 0u16)
            .to_socket_addrs()
            .map_err(|e| AuditError::Resolution(format!("failed to resolve {}: {}", host, e)))?;

        let mut ips: Vec<IpAddr> = Vec::new();
        for addr in addrs {
            if !ips.contains(&addr.ip()) {
                ips.push(addr.ip());
            }
        }
        Ok(ips)
    }
}

/// Nil resolver that always returns no addresses.
pub struct NilResolver;

impl NilResolver {
    pub fn new() -> Self {
        Self
    }
}

impl Default for NilResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl NameResolver for NilResolver {
    fn resolve(&self, _host: &str) -> Result<Vec<IpAddr>> {
        Ok(Vec::new())
    }
}

/// Static resolver with predefined mappings.
pub struct StaticResolver {
    mappings: HashMap<String, Vec<IpAddr>>,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self {
            mappings: HashMap::new(),
        }
    }

    /// Add an address for a hostname. Repeated calls accumulate.
    pub fn add(&mut self, host: impl Into<String>, ip: IpAddr) {
        self.mappings.entry(host.into()).or_default().push(ip);
    }

    /// Add a mapping and return self for chaining.
    pub fn with_mapping(mut self, host: impl Into<String>, ip: IpAddr) -> Self {
        self.add(host, ip);
        self
    }
}

impl Default for StaticResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl NameResolver for StaticResolver {
    fn resolve(&self, host: &str) -> Result<Vec<IpAddr>> {
        if let Ok(ip) = host.parse::<IpAddr>() {
            return Ok(vec![ip]);
        }

        self.mappings
            .get(host)
            .cloned()
            .ok_or_else(|| AuditError::Resolution(format!("host not found: {}", host)))
    }
}
