//! # oxide-dialect
//!
//! Backend dialects for row limiting and row counting over plain SQL text.
//!
//! Statements are never parsed into a tree. A small lexer produces tokens
//! annotated with their parenthesis depth, and each dialect rewrites the
//! original text around top-level anchors (`SELECT`, `ORDER BY`, a leading
//! `WITH` clause, a trailing locking clause), so anything the lexer does not
//! understand passes through untouched.
//!
//! ```rust
//! use oxide_dialect::{DialectHints, DialectRegistry};
//!
//! let registry = DialectRegistry::new();
//! let dialect = registry.resolve("jdbc:mysql://localhost/shop").unwrap();
//! let hints = DialectHints::new();
//!
//! let page = dialect
//!     .limit_text("SELECT * FROM orders ORDER BY id", 20, 10, &hints)
//!     .unwrap();
//! assert_eq!(page, "SELECT * FROM orders ORDER BY id LIMIT 20, 10");
//!
//! let count = dialect.count_text("SELECT * FROM orders ORDER BY id", &hints);
//! assert_eq!(count, "SELECT COUNT(1) AS total_ FROM orders");
//! ```

pub mod dialect;
pub mod error;
pub mod lexer;
pub mod registry;
pub mod rownum;
pub mod scan;
pub mod shape;

pub use dialect::{
    COUNT_FIELD, Db2Dialect, DerbyDialect, Dialect, DialectHints, DialectKind, HINT_COUNT_WRAP,
    HINT_ROW_NUMBER_ORDER, InformixDialect, LimitOffsetDialect, MySqlDialect, OracleDialect,
    SqlServerDialect, UnsupportedDialect, builtin,
};
pub use error::{DialectError, Result};
pub use lexer::{Keyword, Lexer, Token, TokenKind};
pub use registry::{DialectRegistry, DialectResolver};
