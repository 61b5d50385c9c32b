//! IBM DB2 (`FETCH FIRST` and `ROW_NUMBER()` wrapping).

use super::{Dialect, DialectHints, DialectKind, append_before_locking};
use crate::error::Result;
use crate::rownum::{self, INNER_ALIAS, ROW_NUMBER_COLUMN, RowRange};
use crate::scan::statement_text;

/// DB2 dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct Db2Dialect;

impl Db2Dialect {
    /// Creates a new DB2 dialect.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Dialect for Db2Dialect {
    fn kind(&self) -> DialectKind {
        DialectKind::Db2
    }

    fn limit_text(
        &self,
        text: &str,
        offset: usize,
        limit: usize,
        _hints: &DialectHints,
    ) -> Result<String> {
        let text = statement_text(text);
        if offset == 0 {
            return Ok(append_before_locking(
                text,
                &format!("FETCH FIRST {limit} ROWS ONLY"),
            ));
        }
        let end = offset + limit;
        let bounded = format!("{text} FETCH FIRST {end} ROWS ONLY");
        let wrapped = rownum::wrap(
            &bounded,
            &format!("ORDER BY ORDER OF {INNER_ALIAS}"),
            RowRange::Between(offset + 1, end),
        );
        Ok(format!("{wrapped} ORDER BY {ROW_NUMBER_COLUMN}"))
    }
}
