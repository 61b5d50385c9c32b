//! Error types for query execution.

use std::time::Duration;

use oxide_dialect::DialectError;
use thiserror::Error;

/// Boxed error returned by executors.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Query-level errors.
#[derive(Debug, Error)]
pub enum QueryError {
    /// No definition is registered under the name.
    #[error("query definition not found: {0}")]
    DefinitionNotFound(String),

    /// A definition or its fetch graph is malformed.
    #[error("invalid query definition '{query}': {reason}")]
    InvalidDefinition { query: String, reason: String },

    /// A definition file could not be parsed.
    #[error("failed to parse query definitions: {0}")]
    DefinitionFormat(#[from] serde_json::Error),

    /// The dialect cannot express what the operation needs.
    #[error("query '{query}': {source}")]
    Dialect {
        query: String,
        #[source]
        source: DialectError,
    },

    /// A bounded select returned more rows than allowed.
    #[error("query '{query}' returned more than {max} rows")]
    SelectSizeExceeded { query: String, max: usize },

    /// The backend failed to run a statement.
    #[error("query '{query}' failed executing `{text}`: {source}")]
    Execution {
        query: String,
        text: String,
        transient: bool,
        #[source]
        source: BoxError,
    },

    /// The backend did not answer within the deadline.
    #[error("query '{query}' timed out after {timeout:?} executing `{text}`")]
    Timeout {
        query: String,
        text: String,
        timeout: Duration,
    },

    /// Connection-level database error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A stream batch kept failing after every retry.
    #[error("query '{query}' failed after {attempts} attempts: {last}")]
    RetriesExhausted {
        query: String,
        attempts: usize,
        #[source]
        last: Box<QueryError>,
    },

    /// A fetch query failed while loading data for its parent.
    #[error("fetch '{fetch}' of query '{query}' failed: {source}")]
    Fetch {
        query: String,
        fetch: String,
        #[source]
        source: Box<QueryError>,
    },

    /// Fetched rows could not be merged into the parent records.
    #[error("fetch '{fetch}' of query '{query}' cannot be injected: {reason}")]
    Injection {
        query: String,
        fetch: String,
        reason: String,
    },

    /// Nested fetches went deeper than configured.
    #[error("query '{query}' exceeds the maximum fetch depth of {max}")]
    FetchDepthExceeded { query: String, max: usize },

    /// A record could not be converted into the requested type.
    #[error("query '{query}' returned a record that cannot be converted: {source}")]
    Conversion {
        query: String,
        #[source]
        source: serde_json::Error,
    },

    /// The template could not render the statement.
    #[error("query '{query}' cannot be rendered: {reason}")]
    Template { query: String, reason: String },

    /// A predicate script failed.
    #[error("predicate of fetch '{fetch}' failed: {reason}")]
    Script { fetch: String, reason: String },
}

impl QueryError {
    /// Returns true for backend failures that may succeed when retried.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::Execution { transient, .. } => *transient,
            Self::Timeout { .. } => true,
            Self::Database(e) => is_transient_database_error(e),
            _ => false,
        }
    }

    /// Returns the name of the query the error belongs to, if any.
    #[must_use]
    pub fn query(&self) -> Option<&str> {
        match self {
            Self::DefinitionNotFound(query)
            | Self::InvalidDefinition { query, .. }
            | Self::Dialect { query, .. }
            | Self::SelectSizeExceeded { query, .. }
            | Self::Execution { query, .. }
            | Self::Timeout { query, .. }
            | Self::RetriesExhausted { query, .. }
            | Self::Fetch { query, .. }
            | Self::Injection { query, .. }
            | Self::FetchDepthExceeded { query, .. }
            | Self::Conversion { query, .. }
            | Self::Template { query, .. } => Some(query),
            Self::DefinitionFormat(_) | Self::Database(_) | Self::Script { .. } => None,
        }
    }
}

/// Classifies a sqlx error: connection and pool failures are transient,
/// statement, decoding and constraint failures are not.
#[must_use]
pub const fn is_transient_database_error(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Io(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed
    )
}

/// Result type alias for query operations.
pub type Result<T> = std::result::Result<T, QueryError>;
