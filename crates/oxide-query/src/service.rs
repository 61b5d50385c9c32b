//! The query service.
//!
//! Every operation follows the same path: resolve the definition, revise
//! the parameter, render the statement, let the dialect limit or count it,
//! execute under the configured deadline, apply result hints, run the fetch
//! queries and convert the records into the caller's type.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use oxide_dialect::Dialect;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::collab::{
    ParameterReviser, QueryDefinitionRepository, QueryTemplate, ResultHintHandler, ScriptEngine,
};
use crate::config::QueryConfig;
use crate::definition::QueryDefinition;
use crate::error::{QueryError, Result};
use crate::executor::{BoxFuture, ExecuteRequest, QueryExecutor};
use crate::fetch;
use crate::parameter::QueryParameter;
use crate::querier::{PreparedQuery, Querier, QuerierCache};
use crate::result::{Forwarding, Paging};
use crate::stream::{QueryStream, StreamQueryParameter};
use crate::value::Record;

/// Entry point for running named queries.
///
/// Cloning is cheap; clones share configuration, collaborators and the
/// querier cache.
#[derive(Clone)]
pub struct QueryService {
    inner: Arc<ServiceInner>,
}

struct ServiceInner {
    config: QueryConfig,
    dialect: Arc<dyn Dialect>,
    definitions: Arc<dyn QueryDefinitionRepository>,
    template: Arc<dyn QueryTemplate>,
    executor: Arc<dyn QueryExecutor>,
    reviser: Option<Arc<dyn ParameterReviser>>,
    hint_handler: Option<Arc<dyn ResultHintHandler>>,
    script_engine: Option<Arc<dyn ScriptEngine>>,
    cache: QuerierCache,
}

/// Builder for [`QueryService`].
pub struct QueryServiceBuilder {
    config: QueryConfig,
    dialect: Arc<dyn Dialect>,
    definitions: Arc<dyn QueryDefinitionRepository>,
    template: Arc<dyn QueryTemplate>,
    executor: Arc<dyn QueryExecutor>,
    reviser: Option<Arc<dyn ParameterReviser>>,
    hint_handler: Option<Arc<dyn ResultHintHandler>>,
    script_engine: Option<Arc<dyn ScriptEngine>>,
}

impl QueryServiceBuilder {
    #[must_use]
    pub fn config(mut self, config: QueryConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn reviser(mut self, reviser: Arc<dyn ParameterReviser>) -> Self {
        self.reviser = Some(reviser);
        self
    }

    #[must_use]
    pub fn hint_handler(mut self, handler: Arc<dyn ResultHintHandler>) -> Self {
        self.hint_handler = Some(handler);
        self
    }

    #[must_use]
    pub fn script_engine(mut self, engine: Arc<dyn ScriptEngine>) -> Self {
        self.script_engine = Some(engine);
        self
    }

    #[must_use]
    pub fn build(self) -> QueryService {
        debug!(dialect = self.dialect.name(), "Building query service");
        QueryService {
            inner: Arc::new(ServiceInner {
                config: self.config,
                dialect: self.dialect,
                definitions: self.definitions,
                template: self.template,
                executor: self.executor,
                reviser: self.reviser,
                hint_handler: self.hint_handler,
                script_engine: self.script_engine,
                cache: QuerierCache::new(),
            }),
        }
    }
}

impl QueryService {
    /// Starts building a service from its required collaborators.
    #[must_use]
    pub fn builder(
        dialect: Arc<dyn Dialect>,
        definitions: Arc<dyn QueryDefinitionRepository>,
        template: Arc<dyn QueryTemplate>,
        executor: Arc<dyn QueryExecutor>,
    ) -> QueryServiceBuilder {
        QueryServiceBuilder {
            config: QueryConfig::default(),
            dialect,
            definitions,
            template,
            executor,
            reviser: None,
            hint_handler: None,
            script_engine: None,
        }
    }

    #[must_use]
    pub fn config(&self) -> &QueryConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn dialect(&self) -> &Arc<dyn Dialect> {
        &self.inner.dialect
    }

    #[must_use]
    pub fn cache(&self) -> &QuerierCache {
        &self.inner.cache
    }

    pub(crate) fn script_engine(&self) -> Option<&dyn ScriptEngine> {
        self.inner.script_engine.as_deref()
    }

    /// Binds the definition `name` to `parameter`.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::DefinitionNotFound`], or any reviser or
    /// template failure.
    pub fn querier(&self, name: &str, parameter: QueryParameter) -> Result<Querier> {
        let definition = self.definition(name)?;
        let mut parameter = parameter;
        if let Some(reviser) = &self.inner.reviser {
            reviser.revise(&definition, &mut parameter)?;
        }
        let rendered = self.inner.template.render(&definition, &parameter)?;
        let prepared = if definition.is_cacheable() {
            self.inner
                .cache
                .prepare(&definition, &rendered, &self.inner.dialect)
        } else {
            Arc::new(PreparedQuery::new(
                definition,
                rendered.text,
                Arc::clone(&self.inner.dialect),
            ))
        };
        Ok(Querier::new(prepared, rendered.params, parameter))
    }

    /// Returns the first row, or `None` when the query matches nothing.
    ///
    /// # Errors
    ///
    /// Returns definition, execution, fetch or conversion failures.
    pub async fn get<T: DeserializeOwned>(
        &self,
        name: &str,
        parameter: QueryParameter,
    ) -> Result<Option<T>> {
        let querier = self.querier(name, parameter)?;
        let mut records = if querier.supports_limit() {
            let text = querier.limit_text(0, 1)?;
            debug!(query = %name, sql = %text, "get");
            self.execute_select(&querier, &text).await?
        } else {
            debug!(query = %name, sql = %querier.text(), "get without row limiting");
            let request = querier.request(querier.text(), self.timeout(querier.definition()));
            with_deadline(request, self.inner.executor.get(request))
                .await?
                .into_iter()
                .collect()
        };
        records.truncate(1);
        self.post_process(&querier, &mut records, 0).await?;
        Ok(convert(name, records)?.into_iter().next())
    }

    /// Returns every row, failing when there are more than the configured
    /// maximum.
    ///
    /// The maximum comes from the `max-select-size` property or the
    /// configuration. With `tolerate-overflow` the list is truncated to the
    /// maximum instead, and a warning is logged.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::SelectSizeExceeded`] on overflow, plus the
    /// failures of [`QueryService::get`].
    pub async fn select<T: DeserializeOwned>(
        &self,
        name: &str,
        parameter: QueryParameter,
    ) -> Result<Vec<T>> {
        let records = self.select_records(name, parameter, None, 0).await?;
        convert(name, records)
    }

    /// Returns one page plus the total row count.
    ///
    /// The page size is the parameter's limit or the configured default.
    /// A short page proves it is the last one, so its total is computed as
    /// `offset + len` without running the count statement.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::Dialect`] for backends that cannot limit rows,
    /// plus the failures of [`QueryService::get`].
    pub async fn page<T: DeserializeOwned>(
        &self,
        name: &str,
        parameter: QueryParameter,
    ) -> Result<Paging<T>> {
        let querier = self.querier(name, parameter)?;
        let page_size = self.window_size(&querier);
        let offset = querier.parameter().offset;

        let text = querier.limit_text(offset, page_size)?;
        debug!(query = %name, sql = %text, "page");
        let mut records = self.execute_select(&querier, &text).await?;

        let total = if records.len() < page_size {
            (offset + records.len()) as u64
        } else {
            self.execute_count(&querier).await?
        };
        self.post_process(&querier, &mut records, 0).await?;
        Ok(Paging {
            total,
            page_size,
            offset,
            results: convert(name, records)?,
        })
    }

    /// Returns up to `limit` rows and whether more rows follow.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::Dialect`] for backends that cannot limit rows,
    /// plus the failures of [`QueryService::get`].
    pub async fn forward<T: DeserializeOwned>(
        &self,
        name: &str,
        parameter: QueryParameter,
    ) -> Result<Forwarding<T>> {
        let forwarding = self.forward_records(name, parameter).await?;
        Ok(Forwarding {
            results: convert(name, forwarding.results)?,
            has_next: forwarding.has_next,
        })
    }

    /// Streams the query in batches of the parameter's limit.
    ///
    /// Nothing runs until the first item is pulled.
    #[must_use]
    pub fn stream<T: DeserializeOwned>(
        &self,
        name: &str,
        parameter: StreamQueryParameter,
    ) -> QueryStream<T> {
        QueryStream::new(self.clone(), name, parameter)
    }

    /// Returns the number of rows the query matches, ignoring the window.
    ///
    /// # Errors
    ///
    /// Returns definition or execution failures.
    pub async fn count(&self, name: &str, parameter: QueryParameter) -> Result<u64> {
        let querier = self.querier(name, parameter)?;
        self.execute_count(&querier).await
    }

    /// Runs the fetch queries of definition `name` over `records`, as if
    /// they had been returned by that query.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::DefinitionNotFound`] or any fetch failure; on
    /// failure `records` is left untouched by the failing fetch query.
    pub async fn fetch_into(
        &self,
        name: &str,
        parameter: &QueryParameter,
        records: &mut [Record],
    ) -> Result<()> {
        let definition = self.definition(name)?;
        fetch::run(self, &definition, parameter, records, 0).await
    }

    pub(crate) async fn forward_records(
        &self,
        name: &str,
        parameter: QueryParameter,
    ) -> Result<Forwarding<Record>> {
        let querier = self.querier(name, parameter)?;
        let limit = self.window_size(&querier);
        let offset = querier.parameter().offset;

        let text = querier.limit_text(offset, limit + 1)?;
        debug!(query = %name, sql = %text, "forward");
        let mut records = self.execute_select(&querier, &text).await?;

        let has_next = records.len() > limit;
        records.truncate(limit);
        self.post_process(&querier, &mut records, 0).await?;
        Ok(Forwarding {
            results: records,
            has_next,
        })
    }

    /// Bounded select at fetch depth `depth`.
    ///
    /// Boxed because fetch queries recurse back into it.
    pub(crate) fn select_records<'a>(
        &'a self,
        name: &'a str,
        parameter: QueryParameter,
        max_override: Option<usize>,
        depth: usize,
    ) -> BoxFuture<'a, Result<Vec<Record>>> {
        Box::pin(async move {
            let querier = self.querier(name, parameter)?;
            let definition = querier.definition();
            let max = max_override
                .or_else(|| definition.max_select_size())
                .unwrap_or(self.inner.config.max_select_size);
            let tolerate = definition
                .tolerate_overflow()
                .unwrap_or(self.inner.config.tolerate_overflow);
            let offset = querier.parameter().offset;

            // An explicit limit within the maximum cannot overflow.
            let (window, bounded) = match querier.parameter().limit {
                Some(limit) if limit <= max => (limit, true),
                _ => (max + 1, false),
            };

            let mut records = if querier.supports_limit() || offset > 0 {
                let text = querier.limit_text(offset, window)?;
                debug!(query = %name, sql = %text, depth, "select");
                self.execute_select(&querier, &text).await?
            } else {
                debug!(query = %name, sql = %querier.text(), depth, "select without row limiting");
                self.execute_select(&querier, querier.text()).await?
            };

            if bounded {
                records.truncate(window);
            } else if records.len() > max {
                if !tolerate {
                    return Err(QueryError::SelectSizeExceeded {
                        query: name.to_string(),
                        max,
                    });
                }
                warn!(query = %name, max, "Select exceeded its maximum size, truncating");
                records.truncate(max);
            }

            self.post_process(&querier, &mut records, depth).await?;
            Ok(records)
        })
    }

    fn definition(&self, name: &str) -> Result<Arc<QueryDefinition>> {
        self.inner
            .definitions
            .definition(name)
            .ok_or_else(|| QueryError::DefinitionNotFound(name.to_string()))
    }

    fn window_size(&self, querier: &Querier) -> usize {
        querier
            .parameter()
            .limit
            .unwrap_or(self.inner.config.default_limit)
            .max(1)
    }

    fn timeout(&self, definition: &QueryDefinition) -> Option<Duration> {
        definition.timeout().or_else(|| self.inner.config.timeout())
    }

    async fn execute_select(&self, querier: &Querier, text: &str) -> Result<Vec<Record>> {
        let request = querier.request(text, self.timeout(querier.definition()));
        with_deadline(request, self.inner.executor.select(request)).await
    }

    async fn execute_count(&self, querier: &Querier) -> Result<u64> {
        let text = querier.count_text();
        debug!(query = %querier.name(), sql = %text, "count");
        let request = querier.request(text, self.timeout(querier.definition()));
        with_deadline(request, self.inner.executor.count(request)).await
    }

    async fn post_process(
        &self,
        querier: &Querier,
        records: &mut Vec<Record>,
        depth: usize,
    ) -> Result<()> {
        querier.handle_results(self.inner.hint_handler.as_deref(), records)?;
        fetch::run(
            self,
            querier.definition(),
            querier.parameter(),
            records,
            depth,
        )
        .await
    }
}

impl fmt::Debug for QueryService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryService")
            .field("config", &self.inner.config)
            .field("dialect", &self.inner.dialect.name())
            .field("cached", &self.inner.cache.len())
            .finish_non_exhaustive()
    }
}

async fn with_deadline<T>(
    request: ExecuteRequest<'_>,
    call: BoxFuture<'_, Result<T>>,
) -> Result<T> {
    match request.timeout {
        Some(timeout) => tokio::time::timeout(timeout, call)
            .await
            .map_err(|_| QueryError::Timeout {
                query: request.query.to_string(),
                text: request.text.to_string(),
                timeout,
            })?,
        None => call.await,
    }
}

fn convert<T: DeserializeOwned>(name: &str, records: Vec<Record>) -> Result<Vec<T>> {
    records
        .into_iter()
        .map(|record| {
            serde_json::from_value(Value::Object(record)).map_err(|source| {
                QueryError::Conversion {
                    query: name.to_string(),
                    source,
                }
            })
        })
        .collect()
}
