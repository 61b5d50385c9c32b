//! Statement shape resolution for count queries.
//!
//! A plain `SELECT <projection> FROM ...` can be counted by swapping its
//! projection for an aggregate and dropping the trailing `ORDER BY`, which
//! keeps joins and filters untouched and avoids a derived table. Any shape
//! where that swap would change the number of rows is refused, and callers
//! fall back to wrapping the statement.

use crate::error::{DialectError, Result};
use crate::lexer::{Keyword, TokenKind};
use crate::scan::Scanner;

/// Keywords that make a top-level projection swap unsafe.
const UNSAFE_CLAUSES: &[Keyword] = &[
    Keyword::Distinct,
    Keyword::Group,
    Keyword::Having,
    Keyword::Union,
    Keyword::Intersect,
    Keyword::Except,
    Keyword::Minus,
    Keyword::Limit,
    Keyword::Offset,
    Keyword::Fetch,
    Keyword::Top,
    Keyword::Skip,
    Keyword::Into,
    Keyword::For,
    Keyword::Lock,
];

/// Rewrites `text` into `SELECT COUNT(1) AS <alias> FROM ...`.
///
/// # Errors
///
/// Returns [`DialectError::Shape`] when the statement is not a single,
/// ungrouped, unlimited `SELECT` whose projection is free of aggregates and
/// window functions.
pub fn count_projection(text: &str, alias: &str) -> Result<String> {
    let scanner = Scanner::new(text);
    let tokens = scanner.tokens();

    let first = tokens.first().ok_or_else(|| shape("empty statement"))?;
    if first.depth != 0 || !first.token.is_keyword(Keyword::Select) {
        return Err(shape("statement does not start with SELECT"));
    }
    if tokens
        .iter()
        .any(|t| matches!(t.token.kind, TokenKind::Error(_)))
    {
        return Err(shape("statement contains unterminated tokens"));
    }

    let from = scanner
        .find_top_level(Keyword::From, 1)
        .ok_or_else(|| shape("no top-level FROM"))?;
    let order_by = scanner.top_level_order_by();
    let body_end = order_by.unwrap_or(tokens.len());

    if scanner.any_top_level_in(UNSAFE_CLAUSES, 1..tokens.len())
        || tokens.get(1).is_some_and(|t| t.token.is_keyword(Keyword::First))
    {
        return Err(shape("grouping, set operation or row limiting present"));
    }

    let projection = &tokens[1..from];
    let aggregated = projection.windows(2).any(|pair| {
        pair[0].depth == 0
            && pair[0].token.keyword().is_some_and(|kw| kw.is_aggregate())
            && pair[1].token.kind == TokenKind::LeftParen
    });
    if aggregated {
        return Err(shape("aggregate in projection"));
    }
    if projection
        .iter()
        .any(|t| t.depth == 0 && t.token.is_keyword(Keyword::Over))
    {
        return Err(shape("window function in projection"));
    }

    // Dropped placeholders would shift the binding of the remaining ones.
    if scanner.any_placeholder_in(1..from)
        || scanner.any_placeholder_in(body_end..tokens.len())
    {
        return Err(shape("placeholder in projection or ORDER BY"));
    }

    let rest = text[scanner.start_of(from)..scanner.start_of(body_end)].trim_end();
    Ok(format!("SELECT COUNT(1) AS {alias} {rest}"))
}

fn shape(reason: &str) -> DialectError {
    DialectError::Shape(reason.to_string())
}
