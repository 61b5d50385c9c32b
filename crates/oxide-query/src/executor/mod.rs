//! Backend execution.

mod sqlite;

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

pub use sqlite::SqliteExecutor;

use crate::error::Result;
use crate::value::{Record, SqlValue};

/// A boxed future that is Send.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Everything an executor needs to run one statement.
#[derive(Debug, Clone, Copy)]
pub struct ExecuteRequest<'a> {
    /// Name of the query, for diagnostics.
    pub query: &'a str,
    /// Backend text, already limited or counted by the dialect.
    pub text: &'a str,
    pub params: &'a [SqlValue],
    /// Definition properties such as `lock-mode` or `native`.
    pub properties: &'a HashMap<String, String>,
    /// Deadline the service enforces around the call.
    pub timeout: Option<Duration>,
}

/// Runs statements against a backend.
///
/// Errors are reported as [`crate::QueryError::Execution`] carrying the
/// query name and text.
pub trait QueryExecutor: Send + Sync {
    /// Returns every row of the statement.
    fn select<'a>(&'a self, request: ExecuteRequest<'a>) -> BoxFuture<'a, Result<Vec<Record>>>;

    /// Returns the first row of the statement, if any.
    fn get<'a>(&'a self, request: ExecuteRequest<'a>) -> BoxFuture<'a, Result<Option<Record>>>;

    /// Returns the number in the first column of the first row.
    fn count<'a>(&'a self, request: ExecuteRequest<'a>) -> BoxFuture<'a, Result<u64>>;
}
