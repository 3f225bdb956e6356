//! Named object and object-group resolution.
//!
//! [`ObjectResolver`] turns references such as `object-group network SERVERS`
//! or `object service NTP` into concrete values by reading their definitions
//! from a [`TextIndex`]. Groups may nest to any depth through `group-object`;
//! re-entering a group that is still being resolved is reported as a
//! reference cycle. Resolved definitions are memoized in an LRU cache.

mod address;
mod service;

use std::fmt;
use std::num::NonZeroUsize;

use lru::LruCache;
use parking_lot::Mutex;
use tracing::trace;

use crate::error::{AuditError, Result};
use crate::resolver::NameResolver;
use crate::text::{Text, TextIndex};
use crate::types::{AddressRange, PortRange, Protocol};

pub use service::{parse_service_content, ServiceSelector};

/// Default number of resolved definitions kept in memory
pub const DEFAULT_CACHE_SIZE: usize = 1024;

/// Definition namespaces. The same name may exist in several of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Namespace {
    NetworkObject,
    NetworkGroup,
    ServiceObject,
    ServiceGroup,
    PortGroup,
    ProtocolGroup,
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let header = match self {
            Namespace::NetworkObject => "object network",
            Namespace::NetworkGroup => "object-group network",
            Namespace::ServiceObject => "object service",
            Namespace::ServiceGroup => "object-group service",
            Namespace::PortGroup => "object-group service",
            Namespace::ProtocolGroup => "object-group protocol",
        };
        f.write_str(header)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ObjectKey {
    namespace: Namespace,
    name: String,
}

impl ObjectKey {
    fn new(namespace: Namespace, name: &str) -> Self {
        Self {
            namespace,
            name: name.to_string(),
        }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.namespace, self.name)
    }
}

#[derive(Debug, Clone)]
enum Cached {
    Addresses(Vec<AddressRange>),
    Services(Vec<ServiceSelector>),
    Ports(Vec<PortRange>),
    Protocols(Vec<Protocol>),
}

trait CacheValue: Sized + Clone {
    fn into_cached(self) -> Cached;
    fn from_cached(cached: &Cached) -> Option<Self>;
}

macro_rules! cache_value {
    ($ty:ty, $variant:ident) => {
        impl CacheValue for $ty {
            fn into_cached(self) -> Cached {
                Cached::$variant(self)
            }

            fn from_cached(cached: &Cached) -> Option<Self> {
                match cached {
                    Cached::$variant(value) => Some(value.clone()),
                    _ => None,
                }
            }
        }
    };
}

cache_value!(Vec<AddressRange>, Addresses);
cache_value!(Vec<ServiceSelector>, Services);
cache_value!(Vec<PortRange>, Ports);
cache_value!(Vec<Protocol>, Protocols);

/// Resolves object and object-group references against one configuration.
pub struct ObjectResolver<'a> {
    index: &'a TextIndex,
    names: &'a dyn NameResolver,
    cache: Mutex<LruCache<ObjectKey, Cached>>,
    // Definitions currently being resolved, outermost first
    path: Mutex<Vec<ObjectKey>>,
}

impl<'a> ObjectResolver<'a> {
    pub fn new(index: &'a TextIndex, names: &'a dyn NameResolver, cache_size: usize) -> Self {
        let cache_size = NonZeroUsize::new(cache_size).unwrap_or(NonZeroUsize::MIN);
        Self {
            index,
            names,
            cache: Mutex::new(LruCache::new(cache_size)),
            path: Mutex::new(Vec::new()),
        }
    }

    /// Configuration this resolver reads definitions from
    pub fn index(&self) -> &'a TextIndex {
        self.index
    }

    /// Number of memoized definitions
    pub fn cached_count(&self) -> usize {
        self.cache.lock().len()
    }

    /// Body lines of the definition `header`, without the header itself and
    /// without `description` lines.
    fn definition_body(&self, header: &str) -> Text<'a> {
        self.index
            .section_exact(header)
            .exclude(header)
            .exclude("description ")
    }

    fn cached<T: CacheValue>(
        &self,
        namespace: Namespace,
        name: &str,
        load: impl FnOnce() -> Result<T>,
    ) -> Result<T> {
        let key = ObjectKey::new(namespace, name);

        let hit = self.cache.lock().get(&key).and_then(T::from_cached);
        if let Some(value) = hit {
            trace!(object = %key, "definition served from cache");
            return Ok(value);
        }

        let _guard = self.enter(key.clone())?;
        let value = load()?;
        self.cache.lock().put(key, value.clone().into_cached());
        Ok(value)
    }

    fn enter(&self, key: ObjectKey) -> Result<PathGuard<'_>> {
        let mut path = self.path.lock();
        if let Some(pos) = path.iter().position(|k| *k == key) {
            let cycle: Vec<String> = path[pos..]
                .iter()
                .map(|k| k.name.clone())
                .chain(std::iter::once(key.name.clone()))
                .collect();
            return Err(AuditError::Resolution(format!(
                "reference cycle in {}: {}",
                key.namespace,
                cycle.join(" -> ")
            )));
        }
        path.push(key);
        Ok(PathGuard { path: &self.path })
    }
}

// Pops the innermost in-progress definition, on success and on error alike.
struct PathGuard<'r> {
    path: &'r Mutex<Vec<ObjectKey>>,
}

impl Drop for PathGuard<'_> {
    fn drop(&mut self) {
        self.path.lock().pop();
    }
}

fn missing_operand(fields: &[&str], what: &str) -> AuditError {
    AuditError::Parse(format!("missing {} in '{}'", what, fields.join(" ")))
}
