//! Per-invocation query bindings.
//!
//! A [`Querier`] pairs a definition and a revised parameter with the
//! rendered backend text and its bind values. The text lives on a
//! [`PreparedQuery`], which keeps its count rewrite once computed; row
//! windows depend on the caller's offset and are rewritten per call.
//! Definitions marked `cacheable` share one prepared query per name through
//! the [`QuerierCache`].

use std::sync::{Arc, OnceLock};

use dashmap::DashMap;
use oxide_dialect::Dialect;
use tracing::{debug, warn};

use crate::collab::{RenderedQuery, ResultHintHandler};
use crate::definition::QueryDefinition;
use crate::error::{QueryError, Result};
use crate::executor::ExecuteRequest;
use crate::parameter::QueryParameter;
use crate::value::{Record, SqlValue};

/// Rendered text of a definition plus its memoized count rewrite.
#[derive(Debug)]
pub struct PreparedQuery {
    definition: Arc<QueryDefinition>,
    text: String,
    dialect: Arc<dyn Dialect>,
    count: OnceLock<String>,
}

impl PreparedQuery {
    #[must_use]
    pub fn new(definition: Arc<QueryDefinition>, text: String, dialect: Arc<dyn Dialect>) -> Self {
        Self {
            definition,
            text,
            dialect,
            count: OnceLock::new(),
        }
    }

    #[must_use]
    pub fn definition(&self) -> &Arc<QueryDefinition> {
        &self.definition
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn dialect(&self) -> &Arc<dyn Dialect> {
        &self.dialect
    }

    /// Returns the text limited to `limit` rows from `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::Dialect`] when the backend cannot limit rows.
    pub fn limit_text(&self, offset: usize, limit: usize) -> Result<String> {
        self.dialect
            .limit_text(&self.text, offset, limit, &self.definition.dialect_hints)
            .map_err(|source| QueryError::Dialect {
                query: self.definition.name.clone(),
                source,
            })
    }

    /// Returns the text counting every row of the statement.
    #[must_use]
    pub fn count_text(&self) -> &str {
        self.count.get_or_init(|| {
            self.dialect
                .count_text(&self.text, &self.definition.dialect_hints)
        })
    }
}

/// A definition bound to one invocation's parameter.
#[derive(Debug, Clone)]
pub struct Querier {
    prepared: Arc<PreparedQuery>,
    params: Vec<SqlValue>,
    parameter: QueryParameter,
}

impl Querier {
    #[must_use]
    pub const fn new(
        prepared: Arc<PreparedQuery>,
        params: Vec<SqlValue>,
        parameter: QueryParameter,
    ) -> Self {
        Self {
            prepared,
            params,
            parameter,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.prepared.definition.name
    }

    #[must_use]
    pub fn definition(&self) -> &QueryDefinition {
        &self.prepared.definition
    }

    #[must_use]
    pub const fn parameter(&self) -> &QueryParameter {
        &self.parameter
    }

    #[must_use]
    pub fn params(&self) -> &[SqlValue] {
        &self.params
    }

    #[must_use]
    pub fn text(&self) -> &str {
        self.prepared.text()
    }

    #[must_use]
    pub fn supports_limit(&self) -> bool {
        self.prepared.dialect.supports_limit()
    }

    /// See [`PreparedQuery::limit_text`].
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::Dialect`] when the backend cannot limit rows.
    pub fn limit_text(&self, offset: usize, limit: usize) -> Result<String> {
        self.prepared.limit_text(offset, limit)
    }

    #[must_use]
    pub fn count_text(&self) -> &str {
        self.prepared.count_text()
    }

    /// Builds the executor request for `text`.
    #[must_use]
    pub fn request<'a>(
        &'a self,
        text: &'a str,
        timeout: Option<std::time::Duration>,
    ) -> ExecuteRequest<'a> {
        ExecuteRequest {
            query: self.name(),
            text,
            params: &self.params,
            properties: &self.prepared.definition.properties,
            timeout,
        }
    }

    /// Applies the definition's hints to `records` in declaration order.
    ///
    /// # Errors
    ///
    /// Propagates handler failures.
    pub fn handle_results(
        &self,
        handler: Option<&dyn ResultHintHandler>,
        records: &mut Vec<Record>,
    ) -> Result<()> {
        let definition = self.definition();
        if definition.hints.is_empty() {
            return Ok(());
        }
        let Some(handler) = handler else {
            warn!(query = %definition.name, hints = definition.hints.len(), "No hint handler, hints ignored");
            return Ok(());
        };
        for hint in &definition.hints {
            handler.apply(hint, definition, records)?;
        }
        Ok(())
    }
}

/// Prepared queries of `cacheable` definitions, keyed by definition name.
///
/// Owned by one service; dropping the service drops the cache.
#[derive(Debug, Default)]
pub struct QuerierCache {
    entries: DashMap<String, Arc<PreparedQuery>>,
}

impl QuerierCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached prepared query for the definition, preparing it
    /// from `rendered` on a miss.
    ///
    /// A cached entry whose text differs from `rendered` means the
    /// definition is not really parameter independent; the fresh rendering
    /// is used uncached in that case.
    pub fn prepare(
        &self,
        definition: &Arc<QueryDefinition>,
        rendered: &RenderedQuery,
        dialect: &Arc<dyn Dialect>,
    ) -> Arc<PreparedQuery> {
        let entry = self
            .entries
            .entry(definition.name.clone())
            .or_insert_with(|| {
                debug!(query = %definition.name, "Caching prepared query");
                Arc::new(PreparedQuery::new(
                    Arc::clone(definition),
                    rendered.text.clone(),
                    Arc::clone(dialect),
                ))
            })
            .clone();
        if entry.text == rendered.text {
            entry
        } else {
            warn!(query = %definition.name, "Cacheable query rendered different text, bypassing cache");
            Arc::new(PreparedQuery::new(
                Arc::clone(definition),
                rendered.text.clone(),
                Arc::clone(dialect),
            ))
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }
}
