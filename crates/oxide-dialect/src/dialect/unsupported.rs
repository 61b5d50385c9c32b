//! Backends that cannot express an offset window (Sybase ASE, MS Access).

use super::{Dialect, DialectHints, DialectKind};
use crate::error::{DialectError, Result};
use crate::lexer::Keyword;

/// A dialect that refuses row limiting instead of silently truncating.
///
/// Counting still works, so these backends support `get`, `select` and
/// counts but not `page`, `forward` or `stream`.
#[derive(Debug, Clone, Copy)]
pub struct UnsupportedDialect {
    kind: DialectKind,
}

impl UnsupportedDialect {
    /// Creates a dialect without row limiting.
    #[must_use]
    pub const fn new(kind: DialectKind) -> Self {
        Self { kind }
    }
}

impl Dialect for UnsupportedDialect {
    fn kind(&self) -> DialectKind {
        self.kind
    }

    fn supports_limit(&self) -> bool {
        false
    }

    fn limiting_keywords(&self) -> &'static [Keyword] {
        &[Keyword::Top]
    }

    fn limit_text(
        &self,
        _text: &str,
        _offset: usize,
        _limit: usize,
        _hints: &DialectHints,
    ) -> Result<String> {
        Err(DialectError::LimitNotSupported {
            dialect: self.name(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limit_is_refused() {
        let dialect = UnsupportedDialect::new(DialectKind::Sybase);
        assert!(!dialect.supports_limit());
        assert_eq!(
            dialect.limit_text("SELECT * FROM t", 0, 1, &DialectHints::new()),
            Err(DialectError::LimitNotSupported { dialect: "sybase" })
        );
    }

    #[test]
    fn test_count_still_works() {
        let dialect = UnsupportedDialect::new(DialectKind::Access);
        assert_eq!(
            dialect.count_text("SELECT TOP 5 a FROM t ORDER BY a", &DialectHints::new()),
            "SELECT COUNT(1) AS total_ FROM ( SELECT TOP 5 a FROM t ORDER BY a ) AS tmp_count_"
        );
    }
}
