//! MySQL and MariaDB.

use super::{Dialect, DialectHints, DialectKind, append_before_locking};
use crate::error::Result;
use crate::scan::statement_text;

/// A dialect appending `LIMIT [<offset>,] <limit>`.
#[derive(Debug, Clone, Copy)]
pub struct MySqlDialect {
    kind: DialectKind,
}

impl MySqlDialect {
    /// Creates a MySQL-family dialect.
    #[must_use]
    pub const fn new(kind: DialectKind) -> Self {
        Self { kind }
    }
}

impl Default for MySqlDialect {
    fn default() -> Self {
        Self::new(DialectKind::MySql)
    }
}

impl Dialect for MySqlDialect {
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
            format!("LIMIT {offset}, {limit}")
        } else {
            format!("LIMIT {limit}")
        };
        Ok(append_before_locking(statement_text(text), &clause))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limit_text() {
        let dialect = MySqlDialect::default();
        let hints = DialectHints::new();
        assert_eq!(
            dialect.limit_text("SELECT * FROM t", 0, 5, &hints).unwrap(),
            "SELECT * FROM t LIMIT 5"
        );
        assert_eq!(
            dialect.limit_text("SELECT * FROM t", 10, 5, &hints).unwrap(),
            "SELECT * FROM t LIMIT 10, 5"
        );
    }

    #[test]
    fn test_limit_goes_before_share_lock() {
        let dialect = MySqlDialect::new(DialectKind::MariaDb);
        assert_eq!(
            dialect
                .limit_text("SELECT * FROM t LOCK IN SHARE MODE", 2, 3, &DialectHints::new())
                .unwrap(),
            "SELECT * FROM t LIMIT 2, 3 LOCK IN SHARE MODE"
        );
        assert_eq!(dialect.name(), "mariadb");
    }
}
