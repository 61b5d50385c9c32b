//! Microsoft SQL Server.
//!
//! Ordered statements use the native `OFFSET ... FETCH NEXT` clause.
//! Unordered statements, and statements with their own `TOP`, get a `TOP(offset + limit)` right after their
//! `SELECT [DISTINCT]` and, for windows past the first row, an outer query
//! numbering rows with `ROW_NUMBER()`.
//!
//! A leading `WITH` clause is split off first: row limiting applies to the
//! main body after the last common table expression, and the prefix is put
//! back in front of whatever wrapper the body ends up in, since SQL Server
//! does not accept a `WITH` inside a derived table.

use super::{Dialect, DialectHints, DialectKind, HINT_ROW_NUMBER_ORDER, shape_or_wrap};
use crate::error::Result;
use crate::lexer::Keyword;
use crate::rownum::{self, RowRange};
use crate::scan::{Scanner, split_cte, statement_text};

const DEFAULT_ROW_NUMBER_ORDER: &str = "CURRENT_TIMESTAMP";

const TOP_BLOCKERS: &[Keyword] = &[
    Keyword::Union,
    Keyword::Intersect,
    Keyword::Except,
    Keyword::Top,
];

/// SQL Server dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlServerDialect;

impl SqlServerDialect {
    /// Creates a new SQL Server dialect.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn limit_body(body: &str, offset: usize, limit: usize, hints: &DialectHints) -> String {
        let scanner = Scanner::new(body);
        let has_top = scanner.any_top_level_in(&[Keyword::Top], 0..scanner.tokens().len());
        // OFFSET/FETCH cannot be combined with TOP.
        if scanner.top_level_order_by().is_some() && !has_top {
            return format!("{body} OFFSET {offset} ROWS FETCH NEXT {limit} ROWS ONLY");
        }

        let topped = Self::inject_top(body, offset + limit);
        if offset == 0 {
            return topped;
        }
        let order = hints
            .get(HINT_ROW_NUMBER_ORDER)
            .map_or(DEFAULT_ROW_NUMBER_ORDER, String::as_str);
        rownum::wrap(&topped, &format!("ORDER BY {order}"), RowRange::After(offset))
    }

    fn inject_top(body: &str, top: usize) -> String {
        let scanner = Scanner::new(body);
        let blocked = scanner.any_top_level_in(TOP_BLOCKERS, 0..scanner.tokens().len());
        match scanner.select_insertion_point() {
            Some(at) if !blocked => format!("{} TOP({top}){}", &body[..at], &body[at..]),
            _ => format!("SELECT TOP({top}) * FROM ( {body} ) AS query_"),
        }
    }
}

impl Dialect for SqlServerDialect {
    fn kind(&self) -> DialectKind {
        DialectKind::SqlServer
    }

    fn limiting_keywords(&self) -> &'static [Keyword] {
        &[Keyword::Top]
    }

    fn limit_text(
        &self,
        text: &str,
        offset: usize,
        limit: usize,
        hints: &DialectHints,
    ) -> Result<String> {
        let text = statement_text(text);
        Ok(match split_cte(text) {
            Some(split) => format!(
                "{} {}",
                split.prefix,
                Self::limit_body(split.body, offset, limit, hints)
            ),
            None => Self::limit_body(text, offset, limit, hints),
        })
    }

    fn count_text(&self, text: &str, hints: &DialectHints) -> String {
        let text = statement_text(text);
        match split_cte(text) {
            Some(split) => format!("{} {}", split.prefix, self.count_text(split.body, hints)),
            None => shape_or_wrap(self, text, hints),
        }
    }
}
