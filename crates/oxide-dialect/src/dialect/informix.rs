//! Informix (`SELECT SKIP n FIRST m`).

use super::{Dialect, DialectHints, DialectKind};
use crate::error::Result;
use crate::lexer::Keyword;
use crate::scan::{Scanner, statement_text};

const SET_OPERATORS: &[Keyword] = &[
    Keyword::Union,
    Keyword::Intersect,
    Keyword::Except,
    Keyword::Minus,
];

/// Informix dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct InformixDialect;

impl InformixDialect {
    /// Creates a new Informix dialect.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Dialect for InformixDialect {
    fn kind(&self) -> DialectKind {
        DialectKind::Informix
    }

    fn limiting_keywords(&self) -> &'static [Keyword] {
        &[Keyword::Skip, Keyword::First]
    }

    fn limit_text(
        &self,
        text: &str,
        offset: usize,
        limit: usize,
        _hints: &DialectHints,
    ) -> Result<String> {
        let text = statement_text(text);
        let clause = if offset > 0 {
            format!("SKIP {offset} FIRST {limit}")
        } else {
            format!("FIRST {limit}")
        };
        let scanner = Scanner::new(text);
        let select = scanner.find_top_level(Keyword::Select, 0);
        match select {
            Some(index) if !scanner.any_top_level_in(SET_OPERATORS, 0..scanner.tokens().len()) => {
                let at = scanner.end_of(index);
                Ok(format!("{} {clause}{}", &text[..at], &text[at..]))
            }
            _ => Ok(format!("SELECT {clause} * FROM ( {text} )")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skip_first_follows_select() {
        let hints = DialectHints::new();
        assert_eq!(
            InformixDialect.limit_text("SELECT DISTINCT a FROM t", 0, 5, &hints).unwrap(),
            "SELECT FIRST 5 DISTINCT a FROM t"
        );
        assert_eq!(
            InformixDialect.limit_text("select a from t", 10, 5, &hints).unwrap(),
            "select SKIP 10 FIRST 5 a from t"
        );
    }

    #[test]
    fn test_set_operations_are_wrapped() {
        assert_eq!(
            InformixDialect
                .limit_text("SELECT a FROM t UNION SELECT a FROM u", 1, 2, &DialectHints::new())
                .unwrap(),
            "SELECT SKIP 1 FIRST 2 * FROM ( SELECT a FROM t UNION SELECT a FROM u )"
        );
    }

    #[test]
    fn test_first_keeps_its_ordering_for_counts() {
        assert_eq!(
            InformixDialect.non_order_by_part("SELECT FIRST 3 a FROM t ORDER BY a"),
            "SELECT FIRST 3 a FROM t ORDER BY a"
        );
    }
}
