//! Per-invocation query parameters.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Context key running the fetches of a record list concurrently.
pub const CONTEXT_PARALLEL_FETCH: &str = "parallel-fetch";

/// Context key skipping fetch queries: `true` skips all of them, an array
/// of names skips the listed ones.
pub const CONTEXT_EXCLUDE_FETCH_QUERIES: &str = "exclude-fetch-queries";

/// Criteria, window and caller context of one query invocation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryParameter {
    /// Opaque criteria consumed by the template.
    pub criteria: Value,
    pub offset: usize,
    pub limit: Option<usize>,
    /// Caller metadata, copied into every fetch.
    pub context: HashMap<String, Value>,
}

impl QueryParameter {
    #[must_use]
    pub fn new(criteria: Value) -> Self {
        Self {
            criteria,
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    #[must_use]
    pub const fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    #[must_use]
    pub fn with_context(mut self, key: &str, value: Value) -> Self {
        self.context.insert(key.to_string(), value);
        self
    }

    /// Returns whether list fetches may run concurrently.
    #[must_use]
    pub fn parallel_fetch(&self) -> bool {
        matches!(self.context.get(CONTEXT_PARALLEL_FETCH), Some(Value::Bool(true)))
    }

    /// Returns whether the fetch query `name` is switched off.
    #[must_use]
    pub fn excludes_fetch(&self, name: &str) -> bool {
        match self.context.get(CONTEXT_EXCLUDE_FETCH_QUERIES) {
            Some(Value::Bool(all)) => *all,
            Some(Value::Array(names)) => names.iter().any(|n| n.as_str() == Some(name)),
            Some(Value::String(n)) => n == name,
            _ => false,
        }
    }
}
