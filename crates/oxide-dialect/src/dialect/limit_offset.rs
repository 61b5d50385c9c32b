//! `LIMIT n OFFSET m` dialects (PostgreSQL, SQLite, H2, HSQLDB).

use super::{Dialect, DialectHints, DialectKind, append_before_locking};
use crate::error::Result;
use crate::scan::statement_text;

/// A dialect appending `LIMIT <limit> [OFFSET <offset>]`.
#[derive(Debug, Clone, Copy)]
pub struct LimitOffsetDialect {
    kind: DialectKind,
}

impl LimitOffsetDialect {
    /// Creates a dialect for one of the `LIMIT/OFFSET` families.
    #[must_use]
    pub const fn new(kind: DialectKind) -> Self {
        Self { kind }
    }

    /// PostgreSQL.
    #[must_use]
    pub const fn postgres() -> Self {
        Self::new(DialectKind::Postgres)
    }

    /// SQLite.
    #[must_use]
    pub const fn sqlite() -> Self {
        Self::new(DialectKind::Sqlite)
    }
}

impl Dialect for LimitOffsetDialect {
    fn kind(&self) -> DialectKind {
        self.kind
    }

    fn limit_text(
        &self,
        text: &str,
        offset: usize,
        limit: usize,
        _hints: &DialectHints,
    ) -> Result<String> {
        let clause = if offset > 0 {
            format!("LIMIT {limit} OFFSET {offset}")
        } else {
            format!("LIMIT {limit}")
        };
        Ok(append_before_locking(statement_text(text), &clause))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limit(sql: &str, offset: usize, limit: usize) -> String {
        LimitOffsetDialect::postgres()
            .limit_text(sql, offset, limit, &DialectHints::new())
            .unwrap()
    }

    #[test]
    fn test_limit_without_offset() {
        assert_eq!(limit("SELECT * FROM t;", 0, 10), "SELECT * FROM t LIMIT 10");
    }

    #[test]
    fn test_limit_with_offset() {
        assert_eq!(
            limit("SELECT * FROM t ORDER BY id", 20, 10),
            "SELECT * FROM t ORDER BY id LIMIT 10 OFFSET 20"
        );
    }

    #[test]
    fn test_limit_goes_before_for_update() {
        assert_eq!(
            limit("SELECT * FROM t ORDER BY id FOR UPDATE", 5, 5),
            "SELECT * FROM t ORDER BY id LIMIT 5 OFFSET 5 FOR UPDATE"
        );
    }

    #[test]
    fn test_count_uses_projection_swap() {
        let dialect = LimitOffsetDialect::sqlite();
        assert_eq!(
            dialect.count_text("SELECT id, name FROM t WHERE a = ? ORDER BY id", &DialectHints::new()),
            "SELECT COUNT(1) AS total_ FROM t WHERE a = ?"
        );
    }

    #[test]
    fn test_count_wraps_grouped_statement() {
        let dialect = LimitOffsetDialect::sqlite();
        assert_eq!(
            dialect.count_text("SELECT a, COUNT(*) FROM t GROUP BY a ORDER BY a", &DialectHints::new()),
            "SELECT COUNT(1) AS total_ FROM ( SELECT a, COUNT(*) FROM t GROUP BY a ) AS tmp_count_"
        );
    }

    #[test]
    fn test_non_order_by_part_keeps_limited_ordering() {
        let dialect = LimitOffsetDialect::postgres();
        assert_eq!(
            dialect.non_order_by_part("SELECT a FROM t ORDER BY a LIMIT 3"),
            "SELECT a FROM t ORDER BY a LIMIT 3"
        );
        assert_eq!(
            dialect.non_order_by_part("SELECT a FROM t WHERE b = 'ORDER BY' ORDER BY a"),
            "SELECT a FROM t WHERE b = 'ORDER BY'"
        );
    }
}
