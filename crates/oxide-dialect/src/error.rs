//! Error types for dialect resolution and rewriting.

use thiserror::Error;

/// Dialect-level errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DialectError {
    /// The backend cannot express row limiting.
    #[error("dialect {dialect} does not support row limiting")]
    LimitNotSupported {
        /// Name of the dialect.
        dialect: &'static str,
    },

    /// No dialect is known for a connection descriptor.
    #[error("no dialect registered for backend descriptor '{0}'")]
    UnknownBackend(String),

    /// The statement shape resolver refused a statement.
    #[error("statement shape not supported: {0}")]
    Shape(String),
}

/// Result type alias for dialect operations.
pub type Result<T> = std::result::Result<T, DialectError>;
