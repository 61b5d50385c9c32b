//! # oxide-query
//!
//! Declarative query execution on top of [`oxide_dialect`].
//!
//! Queries are named [`QueryDefinition`]s held by a repository. A
//! [`QueryService`] renders a definition for a [`QueryParameter`], lets the
//! backend's dialect limit or count the statement, runs it through a
//! [`QueryExecutor`] and merges the rows of the definition's fetch queries
//! into every result record.
//!
//! Five retrieval modes are offered:
//!
//! - `get`: the first row, or nothing
//! - `select`: every row, bounded by a maximum size
//! - `page`: a window plus the total count
//! - `forward`: a window plus whether more rows follow
//! - `stream`: batches pulled on demand, retried on failure
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//!
//! use oxide_dialect::DialectRegistry;
//! use oxide_query::{
//!     InMemoryDefinitions, NamedParameterTemplate, QueryParameter, QueryService, SqliteExecutor,
//! };
//! use serde_json::json;
//! use sqlx::SqlitePool;
//!
//! async fn example(pool: SqlitePool) -> oxide_query::Result<()> {
//!     let definitions = InMemoryDefinitions::from_json(
//!         r#"[{"name": "orders", "script": "SELECT * FROM orders WHERE user_id = :user ORDER BY id"}]"#,
//!     )?;
//!     let dialect = DialectRegistry::new()
//!         .resolve("sqlite::memory:")
//!         .expect("sqlite is a built-in dialect");
//!     let service = QueryService::builder(
//!         dialect,
//!         Arc::new(definitions),
//!         Arc::new(NamedParameterTemplate::new()),
//!         Arc::new(SqliteExecutor::new(pool)),
//!     )
//!     .build();
//!
//!     let page = service
//!         .page::<serde_json::Value>("orders", QueryParameter::new(json!({"user": 1})).with_limit(20))
//!         .await?;
//!     println!("{} of {} orders", page.results.len(), page.total);
//!     Ok(())
//! }
//! ```

pub mod collab;
pub mod config;
pub mod definition;
pub mod error;
pub mod executor;
mod fetch;
pub mod parameter;
pub mod querier;
pub mod result;
pub mod service;
pub mod stream;
pub mod value;

pub use collab::{
    InMemoryDefinitions, NamedParameterTemplate, ParameterReviser, PathPredicateEngine,
    QueryDefinitionRepository, QueryTemplate, RenderedQuery, ResultHintHandler, ScriptEngine,
};
pub use config::QueryConfig;
pub use definition::{
    FetchParameter, FetchQueryDefinition, Injection, ParameterSource, QueryDefinition, QueryHint,
};
pub use error::{QueryError, Result};
pub use executor::{BoxFuture, ExecuteRequest, QueryExecutor, SqliteExecutor};
pub use parameter::QueryParameter;
pub use querier::{PreparedQuery, Querier, QuerierCache};
pub use result::{Forwarding, Paging};
pub use service::{QueryService, QueryServiceBuilder};
pub use stream::{BackoffStrategy, QueryStream, StreamQueryParameter};
pub use value::{Record, SqlValue};
