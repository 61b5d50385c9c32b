//! Apache Derby (SQL:2008 `OFFSET ... FETCH`).

use super::{Dialect, DialectHints, DialectKind, append_before_locking};
use crate::error::Result;
use crate::scan::statement_text;

/// Derby dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct DerbyDialect;

impl DerbyDialect {
    /// Creates a new Derby dialect.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Dialect for DerbyDialect {
    fn kind(&self) -> DialectKind {
        DialectKind::Derby
    }

    fn limit_text(
        &self,
        text: &str,
        offset: usize,
        limit: usize,
        _hints: &DialectHints,
    ) -> Result<String> {
        let clause = if offset > 0 {
            format!("OFFSET {offset} ROWS FETCH NEXT {limit} ROWS ONLY")
        } else {
            format!("FETCH FIRST {limit} ROWS ONLY")
        };
        Ok(append_before_locking(statement_text(text), &clause))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limit_text() {
        let hints = DialectHints::new();
        assert_eq!(
            DerbyDialect.limit_text("SELECT * FROM t", 0, 5, &hints).unwrap(),
            "SELECT * FROM t FETCH FIRST 5 ROWS ONLY"
        );
        assert_eq!(
            DerbyDialect.limit_text("SELECT * FROM t ORDER BY a", 3, 5, &hints).unwrap(),
            "SELECT * FROM t ORDER BY a OFFSET 3 ROWS FETCH NEXT 5 ROWS ONLY"
        );
    }
}
