//! Service configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Defaults applied when a query definition does not override them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct QueryConfig {
    /// Maximum number of rows a `select` may return.
    pub max_select_size: usize,
    /// Truncate oversized selects instead of failing.
    pub tolerate_overflow: bool,
    /// Page size and forward limit used when the parameter has none.
    pub default_limit: usize,
    /// Maximum nesting of fetch queries.
    pub max_fetch_depth: usize,
    /// Backend deadline for every statement, in milliseconds.
    pub timeout_ms: Option<u64>,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            max_select_size: 128,
            tolerate_overflow: false,
            default_limit: 16,
            max_fetch_depth: 8,
            timeout_ms: None,
        }
    }
}

impl QueryConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn with_max_select_size(mut self, max: usize) -> Self {
        self.max_select_size = max;
        self
    }

    #[must_use]
    pub const fn with_tolerate_overflow(mut self, tolerate: bool) -> Self {
        self.tolerate_overflow = tolerate;
        self
    }

    #[must_use]
    pub const fn with_default_limit(mut self, limit: usize) -> Self {
        self.default_limit = limit;
        self
    }

    #[must_use]
    pub const fn with_max_fetch_depth(mut self, depth: usize) -> Self {
        self.max_fetch_depth = depth;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = Some(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX));
        self
    }

    /// Returns the statement deadline.
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}
