//! Domain controllers of child domains.
//!
//! Entries in a child domain must be read from (and bound against) a
//! controller of that domain. [`DomainControllerCache`] remembers which
//! controller serves each domain. It is shared by reference between
//! connectors, so lookups go through a mutex.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use ic_directory::{DirectoryError, DirectoryResult};
use parking_lot::Mutex;
use tracing::{debug, info};

/// Finds a controller for a domain, for example through DNS SRV records.
pub trait DomainControllerResolver: Send + Sync {
    /// Returns a controller host for `domain`, or `None` if there is none.
    fn resolve(&self, domain: &str) -> DirectoryResult<Option<String>>;
}

impl<F> DomainControllerResolver for F
where
    F: Fn(&str) -> DirectoryResult<Option<String>> + Send + Sync,
{
    fn resolve(&self, domain: &str) -> DirectoryResult<Option<String>> {
        self(domain)
    }
}

/// Cache of domain name to controller host.
///
/// Lookup order:
/// 1. a previously found controller
/// 2. a configured child controller whose host name lies in the domain
/// 3. the resolver, if any
#[derive(Default)]
pub struct DomainControllerCache {
    configured: Vec<String>,
    resolver: Option<Arc<dyn DomainControllerResolver>>,
    controllers: Mutex<HashMap<String, String>>,
}

impl DomainControllerCache {
    /// Creates a cache over the configured child domain controllers.
    #[must_use]
    pub fn new(configured: Vec<String>) -> Self {
        Self {
            configured,
            ..Self::default()
        }
    }

    /// Sets the resolver used when no configured controller matches.
    #[must_use]
    pub fn with_resolver(mut self, resolver: impl DomainControllerResolver + 'static) -> Self {
        self.resolver = Some(Arc::new(resolver));
        self
    }

    /// Returns the controller host for `domain`.
    ///
    /// ## Errors
    ///
    /// Fails if no controller is known or the resolver fails.
    pub fn controller_for(&self, domain: &str) -> DirectoryResult<String> {
        let domain = domain.trim().trim_end_matches('.').to_ascii_lowercase();
        if let Some(host) = self.controllers.lock().get(&domain) {
            return Ok(host.clone());
        }

        let host = match self.configured_controller(&domain) {
            Some(host) => host,
            None => self.resolve(&domain)?.ok_or_else(|| {
                DirectoryError::connection(format!("no domain controller known for {domain}"))
            })?,
        };

        info!(domain = %domain, controller = %host, "Found domain controller");
        Ok(self.controllers.lock().entry(domain).or_insert(host).clone())
    }

    fn configured_controller(&self, domain: &str) -> Option<String> {
        let suffix = format!(".{domain}");
        self.configured
            .iter()
            .map(|h| h.trim())
            .find(|host| {
                let name = ic_directory::config::parse_host(host)
                    .map(|(name, _)| name.to_ascii_lowercase())
                    .unwrap_or_default();
                name == domain || name.ends_with(&suffix)
            })
            .map(str::to_string)
    }

    fn resolve(&self, domain: &str) -> DirectoryResult<Option<String>> {
        let Some(resolver) = &self.resolver else {
            return Ok(None);
        };
        debug!(domain = %domain, "Resolving domain controller");
        Ok(resolver
            .resolve(domain)?
            .map(|host| host.trim_end_matches('.').to_string()))
    }

    /// Number of cached domains.
    pub fn len(&self) -> usize {
        self.controllers.lock().len()
    }

    /// Whether nothing has been cached yet.
    pub fn is_empty(&self) -> bool {
        self.controllers.lock().is_empty()
    }

    /// Forgets all cached controllers.
    pub fn clear(&self) {
        self.controllers.lock().clear();
    }
}

impl fmt::Debug for DomainControllerCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DomainControllerCache")
            .field("configured", &self.configured)
            .field("resolver", &self.resolver.is_some())
            .field("controllers", &*self.controllers.lock())
            .finish()
    }
}
