//! Dialect registry.
//!
//! Maps backend kinds to shared dialect instances and resolves connection
//! descriptors. A registry is assembled once and then only read, so it can be
//! shared across tasks behind an `Arc` without locking.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::dialect::{Dialect, DialectKind, builtin};
use crate::error::{DialectError, Result};

/// Resolver consulted before the built-in descriptor parsing.
pub type DialectResolver = Arc<dyn Fn(&str) -> Option<Arc<dyn Dialect>> + Send + Sync>;

/// Registry of dialects keyed by backend kind.
#[derive(Clone)]
pub struct DialectRegistry {
    dialects: HashMap<DialectKind, Arc<dyn Dialect>>,
    resolver: Option<DialectResolver>,
}

impl DialectRegistry {
    /// Creates a registry holding every built-in dialect.
    #[must_use]
    pub fn new() -> Self {
        let dialects = DialectKind::ALL
            .into_iter()
            .map(|kind| (kind, builtin(kind)))
            .collect();
        Self {
            dialects,
            resolver: None,
        }
    }

    /// Creates a registry without any dialect.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            dialects: HashMap::new(),
            resolver: None,
        }
    }

    /// Registers `dialect` for `kind`, replacing any previous one.
    #[must_use]
    pub fn register(mut self, kind: DialectKind, dialect: Arc<dyn Dialect>) -> Self {
        self.dialects.insert(kind, dialect);
        self
    }

    /// Installs a resolver that gets the first say on every descriptor.
    #[must_use]
    pub fn with_resolver(mut self, resolver: DialectResolver) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Returns the dialect registered for `kind`.
    #[must_use]
    pub fn get(&self, kind: DialectKind) -> Option<Arc<dyn Dialect>> {
        self.dialects.get(&kind).cloned()
    }

    /// Resolves the dialect for a connection descriptor such as
    /// `jdbc:mysql://host/db` or `sqlite::memory:`.
    ///
    /// # Errors
    ///
    /// Returns [`DialectError::UnknownBackend`] when neither the resolver nor
    /// the registered dialects recognise the descriptor.
    pub fn resolve(&self, descriptor: &str) -> Result<Arc<dyn Dialect>> {
        if let Some(resolver) = &self.resolver {
            if let Some(dialect) = resolver(descriptor) {
                debug!(dialect = dialect.name(), "Dialect chosen by resolver");
                return Ok(dialect);
            }
        }
        DialectKind::from_descriptor(descriptor)
            .and_then(|kind| self.get(kind))
            .ok_or_else(|| DialectError::UnknownBackend(descriptor.to_string()))
    }

    /// Resolves a backend identifier (`mysql`, `postgresql`, ...) rather
    /// than a full descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`DialectError::UnknownBackend`] for unknown identifiers.
    pub fn by_identifier(&self, id: &str) -> Result<Arc<dyn Dialect>> {
        DialectKind::from_identifier(id)
            .and_then(|kind| self.get(kind))
            .ok_or_else(|| DialectError::UnknownBackend(id.to_string()))
    }
}

impl Default for DialectRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DialectRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kinds: Vec<_> = self.dialects.keys().map(DialectKind::as_str).collect();
        kinds.sort_unstable();
        f.debug_struct("DialectRegistry")
            .field("dialects", &kinds)
            .field("resolver", &self.resolver.is_some())
            .finish()
    }
}
