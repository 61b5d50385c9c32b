//! Oracle (`ROWNUM` wrapping).

use super::{COUNT_FIELD, COUNT_TABLE_ALIAS, Dialect, DialectHints, DialectKind};
use crate::error::Result;
use crate::scan::{Scanner, statement_text};

/// Oracle dialect.
///
/// Oracle rejects `AS` in table aliases and a locking clause inside a
/// derived table, so both the limit and the count wrappers differ from the
/// defaults.
#[derive(Debug, Clone, Copy, Default)]
pub struct OracleDialect;

impl OracleDialect {
    /// Creates a new Oracle dialect.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Dialect for OracleDialect {
    fn kind(&self) -> DialectKind {
        DialectKind::Oracle
    }

    fn limit_text(
        &self,
        text: &str,
        offset: usize,
        limit: usize,
        _hints: &DialectHints,
    ) -> Result<String> {
        let text = statement_text(text);
        let scanner = Scanner::new(text);
        let (query, locking) = match scanner.locking_clause() {
            Some(index) => {
                let at = scanner.start_of(index);
                (text[..at].trim_end(), Some(&text[at..]))
            }
            None => (text, None),
        };

        // offset 0 filters ROWNUM directly; offset > 0 numbers the window
        // inside and filters the lower bound outside.
        let mut limited = if offset > 0 {
            format!(
                "SELECT * FROM ( SELECT row_.*, ROWNUM rownum_ FROM ( {query} ) row_ \
                 WHERE ROWNUM <= {} ) WHERE rownum_ > {offset}",
                offset + limit
            )
        } else {
            format!("SELECT * FROM ( {query} ) WHERE ROWNUM <= {limit}")
        };
        if let Some(locking) = locking {
            limited.push(' ');
            limited.push_str(locking);
        }
        Ok(limited)
    }

    fn count_wrapper(&self, inner: &str) -> String {
        format!("SELECT COUNT(1) {COUNT_FIELD} FROM ( {inner} ) {COUNT_TABLE_ALIAS}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_window() {
        assert_eq!(
            OracleDialect
                .limit_text("SELECT * FROM t ORDER BY id", 0, 10, &DialectHints::new())
                .unwrap(),
            "SELECT * FROM ( SELECT * FROM t ORDER BY id ) WHERE ROWNUM <= 10"
        );
    }

    #[test]
    fn test_offset_window() {
        assert_eq!(
            OracleDialect
                .limit_text("SELECT * FROM t ORDER BY id", 20, 10, &DialectHints::new())
                .unwrap(),
            "SELECT * FROM ( SELECT row_.*, ROWNUM rownum_ FROM ( SELECT * FROM t ORDER BY id ) row_ \
             WHERE ROWNUM <= 30 ) WHERE rownum_ > 20"
        );
    }

    #[test]
    fn test_locking_clause_moves_outside() {
        assert_eq!(
            OracleDialect
                .limit_text("SELECT * FROM t FOR UPDATE", 0, 1, &DialectHints::new())
                .unwrap(),
            "SELECT * FROM ( SELECT * FROM t ) WHERE ROWNUM <= 1 FOR UPDATE"
        );
    }

    #[test]
    fn test_count_wrapper_has_no_as() {
        assert_eq!(
            OracleDialect.count_text("SELECT a FROM t MINUS SELECT a FROM u", &DialectHints::new()),
            "SELECT COUNT(1) total_ FROM ( SELECT a FROM t MINUS SELECT a FROM u ) tmp_count_"
        );
    }
}
