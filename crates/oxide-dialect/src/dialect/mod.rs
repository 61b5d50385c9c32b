//! Pagination dialects.
//!
//! Every backend family gets one stateless [`Dialect`] implementation that
//! knows how to limit a statement to a window of rows and how to count the
//! rows a statement returns. Shared algorithms (CTE splitting, row-number
//! wrapping, projection counting) live in [`crate::scan`],
//! [`crate::rownum`] and [`crate::shape`] and are called from each dialect
//! rather than inherited.

mod db2;
mod derby;
mod informix;
mod limit_offset;
mod mysql;
mod oracle;
mod sqlserver;
mod unsupported;

use std::collections::HashMap;
use std::fmt;

use tracing::debug;

pub use db2::Db2Dialect;
pub use derby::DerbyDialect;
pub use informix::InformixDialect;
pub use limit_offset::LimitOffsetDialect;
pub use mysql::MySqlDialect;
pub use oracle::OracleDialect;
pub use sqlserver::SqlServerDialect;
pub use unsupported::UnsupportedDialect;

use crate::error::Result;
use crate::lexer::Keyword;
use crate::scan::{Scanner, statement_text};
use crate::shape;

/// Free-form hints handed to the dialect by a query definition.
pub type DialectHints = HashMap<String, String>;

/// Hint forcing the wrapping count strategy when set to `true`.
pub const HINT_COUNT_WRAP: &str = "count-wrap";

/// Hint supplying the ordering expression for synthetic row numbers.
pub const HINT_ROW_NUMBER_ORDER: &str = "row-number-order";

/// Column alias of the generated count.
pub const COUNT_FIELD: &str = "total_";

/// Derived table alias of the wrapping count strategy.
pub const COUNT_TABLE_ALIAS: &str = "tmp_count_";

/// Returns true when `key` is present in `hints` with a truthy value.
#[must_use]
pub fn hint_flag(hints: &DialectHints, key: &str) -> bool {
    hints
        .get(key)
        .is_some_and(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes"))
}

/// Backend families with a built-in dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DialectKind {
    MySql,
    MariaDb,
    Postgres,
    Sqlite,
    H2,
    Hsql,
    Derby,
    Informix,
    Oracle,
    Db2,
    SqlServer,
    Sybase,
    Access,
}

impl DialectKind {
    /// All built-in kinds.
    pub const ALL: [Self; 13] = [
        Self::MySql,
        Self::MariaDb,
        Self::Postgres,
        Self::Sqlite,
        Self::H2,
        Self::Hsql,
        Self::Derby,
        Self::Informix,
        Self::Oracle,
        Self::Db2,
        Self::SqlServer,
        Self::Sybase,
        Self::Access,
    ];

    /// Returns the canonical name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::MySql => "mysql",
            Self::MariaDb => "mariadb",
            Self::Postgres => "postgresql",
            Self::Sqlite => "sqlite",
            Self::H2 => "h2",
            Self::Hsql => "hsqldb",
            Self::Derby => "derby",
            Self::Informix => "informix",
            Self::Oracle => "oracle",
            Self::Db2 => "db2",
            Self::SqlServer => "sqlserver",
            Self::Sybase => "sybase",
            Self::Access => "access",
        }
    }

    /// Parses a backend identifier (case-insensitive), accepting common
    /// aliases.
    #[must_use]
    pub fn from_identifier(id: &str) -> Option<Self> {
        match id.trim().to_ascii_lowercase().as_str() {
            "mysql" => Some(Self::MySql),
            "mariadb" => Some(Self::MariaDb),
            "postgres" | "postgresql" | "pgsql" => Some(Self::Postgres),
            "sqlite" | "sqlite3" => Some(Self::Sqlite),
            "h2" => Some(Self::H2),
            "hsqldb" | "hsql" => Some(Self::Hsql),
            "derby" => Some(Self::Derby),
            "informix" | "informix-sqli" => Some(Self::Informix),
            "oracle" => Some(Self::Oracle),
            "db2" | "as400" => Some(Self::Db2),
            "sqlserver" | "mssql" | "jtds" => Some(Self::SqlServer),
            "sybase" => Some(Self::Sybase),
            "access" | "ucanaccess" => Some(Self::Access),
            _ => None,
        }
    }

    /// Extracts the backend identifier from a connection descriptor.
    ///
    /// Accepts `jdbc:<id>:...`, `<id>://...` and `<id>:...`; a `jtds`
    /// descriptor names its real backend in the next segment.
    #[must_use]
    pub fn from_descriptor(descriptor: &str) -> Option<Self> {
        let trimmed = descriptor.trim();
        let rest = trimmed
            .strip_prefix("jdbc:")
            .or_else(|| trimmed.strip_prefix("JDBC:"))
            .unwrap_or(trimmed);
        let mut segments = rest.split(':');
        let id = segments.next()?;
        if id.eq_ignore_ascii_case("jtds") {
            return segments.next().and_then(Self::from_identifier);
        }
        Self::from_identifier(id)
    }
}

impl fmt::Display for DialectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trait for backend-specific pagination and counting.
///
/// Implementations are stateless and shared behind `Arc<dyn Dialect>`.
pub trait Dialect: Send + Sync + fmt::Debug {
    /// Returns the backend family.
    fn kind(&self) -> DialectKind;

    /// Returns the name of the dialect.
    fn name(&self) -> &'static str {
        self.kind().as_str()
    }

    /// Returns whether the backend can express row limiting.
    fn supports_limit(&self) -> bool {
        true
    }

    /// Limits `text` to `limit` rows starting at row `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::DialectError::LimitNotSupported`] for backends
    /// without row limiting.
    fn limit_text(
        &self,
        text: &str,
        offset: usize,
        limit: usize,
        hints: &DialectHints,
    ) -> Result<String>;

    /// Keywords that limit rows ahead of a top-level `ORDER BY`.
    ///
    /// Their presence keeps [`Dialect::non_order_by_part`] from dropping the
    /// ordering they depend on.
    fn limiting_keywords(&self) -> &'static [Keyword] {
        &[]
    }

    /// Returns `text` without its top-level trailing `ORDER BY`.
    ///
    /// The text is returned unchanged when a row-limiting clause depends on
    /// the ordering, either ahead of it (dialect specific) or trailing it,
    /// or when the ordering holds a bind placeholder.
    fn non_order_by_part(&self, text: &str) -> String {
        let text = statement_text(text);
        let scanner = Scanner::new(text);
        let Some(order_by) = scanner.top_level_order_by() else {
            return text.to_string();
        };
        let end = scanner.tokens().len();
        let trailing = &[Keyword::Limit, Keyword::Offset, Keyword::Fetch];
        if scanner.any_top_level_in(self.limiting_keywords(), 0..order_by)
            || scanner.any_top_level_in(trailing, order_by..end)
            || scanner.any_placeholder_in(order_by..end)
        {
            return text.to_string();
        }
        text[..scanner.start_of(order_by)].trim_end().to_string()
    }

    /// Wraps a statement into a count query.
    fn count_wrapper(&self, inner: &str) -> String {
        format!("SELECT COUNT(1) AS {COUNT_FIELD} FROM ( {inner} ) AS {COUNT_TABLE_ALIAS}")
    }

    /// Returns a query counting the rows `text` returns, ignoring ordering.
    fn count_text(&self, text: &str, hints: &DialectHints) -> String {
        shape_or_wrap(self, text, hints)
    }
}

/// Counts through the shape resolver, falling back to the dialect's count
/// wrapper around the unordered statement.
pub(crate) fn shape_or_wrap<D: Dialect + ?Sized>(
    dialect: &D,
    text: &str,
    hints: &DialectHints,
) -> String {
    let text = statement_text(text);
    if !hint_flag(hints, HINT_COUNT_WRAP) {
        match shape::count_projection(text, COUNT_FIELD) {
            Ok(counted) => return counted,
            Err(e) => debug!(dialect = dialect.name(), reason = %e, "Falling back to wrapped count"),
        }
    }
    dialect.count_wrapper(&dialect.non_order_by_part(text))
}

/// Creates the built-in dialect for `kind`.
#[must_use]
pub fn builtin(kind: DialectKind) -> std::sync::Arc<dyn Dialect> {
    use std::sync::Arc;
    match kind {
        DialectKind::MySql | DialectKind::MariaDb => Arc::new(MySqlDialect::new(kind)),
        DialectKind::Postgres | DialectKind::Sqlite | DialectKind::H2 | DialectKind::Hsql => {
            Arc::new(LimitOffsetDialect::new(kind))
        }
        DialectKind::Derby => Arc::new(DerbyDialect::new()),
        DialectKind::Informix => Arc::new(InformixDialect::new()),
        DialectKind::Oracle => Arc::new(OracleDialect::new()),
        DialectKind::Db2 => Arc::new(Db2Dialect::new()),
        DialectKind::SqlServer => Arc::new(SqlServerDialect::new()),
        DialectKind::Sybase | DialectKind::Access => Arc::new(UnsupportedDialect::new(kind)),
    }
}

/// Inserts `clause` ahead of a trailing locking clause, or appends it.
pub(crate) fn append_before_locking(text: &str, clause: &str) -> String {
    let scanner = Scanner::new(text);
    match scanner.locking_clause() {
        Some(index) => {
            let at = scanner.start_of(index);
            format!("{} {clause} {}", text[..at].trim_end(), &text[at..])
        }
        None => format!("{text} {clause}"),
    }
}
