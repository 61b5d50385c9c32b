//! Shallow statement scanning.
//!
//! A [`Scanner`] tokenizes a statement once and annotates every token with
//! its parenthesis depth. Depth-0 tokens belong to the outermost query;
//! anything nested in a subquery, a function call or a window specification
//! is invisible to the top-level searches.

use crate::lexer::{Keyword, Lexer, Token, TokenKind};

/// A token annotated with its parenthesis depth.
///
/// A parenthesis carries the depth of the text surrounding it, so an opening
/// and its matching closing parenthesis share the same depth.
#[derive(Debug, Clone, PartialEq)]
pub struct ScannedToken {
    /// The token.
    pub token: Token,
    /// Parenthesis nesting depth.
    pub depth: usize,
}

/// Depth-annotated token view over one statement.
#[derive(Debug, Clone)]
pub struct Scanner<'a> {
    text: &'a str,
    tokens: Vec<ScannedToken>,
}

impl<'a> Scanner<'a> {
    /// Tokenizes `text`. The trailing EOF token is dropped.
    #[must_use]
    pub fn new(text: &'a str) -> Self {
        let mut depth = 0usize;
        let tokens = Lexer::new(text)
            .tokenize()
            .into_iter()
            .filter(|t| !t.is_eof())
            .map(|token| {
                let token_depth = match token.kind {
                    TokenKind::LeftParen => {
                        depth += 1;
                        depth - 1
                    }
                    TokenKind::RightParen => {
                        depth = depth.saturating_sub(1);
                        depth
                    }
                    _ => depth,
                };
                ScannedToken {
                    token,
                    depth: token_depth,
                }
            })
            .collect();
        Self { text, tokens }
    }

    /// The scanned text.
    #[must_use]
    pub const fn text(&self) -> &'a str {
        self.text
    }

    /// All scanned tokens.
    #[must_use]
    pub fn tokens(&self) -> &[ScannedToken] {
        &self.tokens
    }

    /// Byte offset where the token at `index` starts, or the text length
    /// when `index` is past the end.
    #[must_use]
    pub fn start_of(&self, index: usize) -> usize {
        self.tokens
            .get(index)
            .map_or(self.text.len(), |t| t.token.span.start)
    }

    /// Byte offset where the token at `index` ends.
    #[must_use]
    pub fn end_of(&self, index: usize) -> usize {
        self.tokens
            .get(index)
            .map_or(self.text.len(), |t| t.token.span.end)
    }

    fn is_top_level_keyword(&self, index: usize, keyword: Keyword) -> bool {
        self.tokens
            .get(index)
            .is_some_and(|t| t.depth == 0 && t.token.is_keyword(keyword))
    }

    /// Index of the first depth-0 `keyword` at or after `from`.
    #[must_use]
    pub fn find_top_level(&self, keyword: Keyword, from: usize) -> Option<usize> {
        (from..self.tokens.len()).find(|&i| self.is_top_level_keyword(i, keyword))
    }

    /// Returns true if any of `keywords` appears at depth 0 in `range`.
    #[must_use]
    pub fn any_top_level_in(&self, keywords: &[Keyword], range: std::ops::Range<usize>) -> bool {
        let end = range.end.min(self.tokens.len());
        self.tokens[range.start.min(end)..end].iter().any(|t| {
            t.depth == 0 && t.token.keyword().is_some_and(|kw| keywords.contains(&kw))
        })
    }

    /// Returns true if a bind placeholder appears at any depth in `range`.
    #[must_use]
    pub fn any_placeholder_in(&self, range: std::ops::Range<usize>) -> bool {
        let end = range.end.min(self.tokens.len());
        self.tokens[range.start.min(end)..end]
            .iter()
            .any(|t| matches!(t.token.kind, TokenKind::Placeholder(_)))
    }

    /// Index of the `ORDER` token of the first top-level `ORDER BY`.
    #[must_use]
    pub fn top_level_order_by(&self) -> Option<usize> {
        let mut from = 0;
        while let Some(index) = self.find_top_level(Keyword::Order, from) {
            if self.is_top_level_keyword(index + 1, Keyword::By) {
                return Some(index);
            }
            from = index + 1;
        }
        None
    }

    /// Index of the parenthesis closing the one opened at `open`.
    #[must_use]
    pub fn matching_paren(&self, open: usize) -> Option<usize> {
        let opener = self.tokens.get(open)?;
        if opener.token.kind != TokenKind::LeftParen {
            return None;
        }
        (open + 1..self.tokens.len()).find(|&i| {
            let t = &self.tokens[i];
            t.depth == opener.depth && t.token.kind == TokenKind::RightParen
        })
    }

    /// Index of a trailing top-level locking clause (`FOR UPDATE`,
    /// `FOR SHARE`, `LOCK IN SHARE MODE`).
    #[must_use]
    pub fn locking_clause(&self) -> Option<usize> {
        (0..self.tokens.len()).find(|&i| {
            (self.is_top_level_keyword(i, Keyword::For)
                && (self.is_top_level_keyword(i + 1, Keyword::Update)
                    || self.is_top_level_keyword(i + 1, Keyword::Share)))
                || (self.is_top_level_keyword(i, Keyword::Lock)
                    && self.is_top_level_keyword(i + 1, Keyword::In))
        })
    }

    /// Byte offset right after the first top-level `SELECT`, or after
    /// `SELECT DISTINCT` / `SELECT ALL` when the qualifier follows it.
    #[must_use]
    pub fn select_insertion_point(&self) -> Option<usize> {
        let select = self.find_top_level(Keyword::Select, 0)?;
        let qualified = self.is_top_level_keyword(select + 1, Keyword::Distinct)
            || self.is_top_level_keyword(select + 1, Keyword::All);
        Some(self.end_of(if qualified { select + 1 } else { select }))
    }
}

/// Returns the statement without trailing semicolons, whitespace or
/// comments.
#[must_use]
pub fn statement_text(text: &str) -> &str {
    let scanner = Scanner::new(text);
    let last = scanner
        .tokens()
        .iter()
        .rev()
        .find(|t| t.token.kind != TokenKind::Semicolon);
    match last {
        Some(t) => &text[..t.token.span.end],
        None => "",
    }
}

/// A statement split into its leading `WITH` clause and the main body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CteSplit<'a> {
    /// `WITH a AS (...), b AS (...)`, ending with the last body's `)`.
    pub prefix: &'a str,
    /// The main query following the last common table expression.
    pub body: &'a str,
}

/// Splits a statement that starts with a compound-query introducer.
///
/// Walks `name [(columns)] AS [modifiers] ( body )` entries separated by
/// commas, matching parentheses on the depth-annotated tokens, and returns
/// `None` when the statement has no `WITH` prefix or the prefix is malformed.
#[must_use]
pub fn split_cte(text: &str) -> Option<CteSplit<'_>> {
    let scanner = Scanner::new(text);
    let tokens = scanner.tokens();
    if !tokens.first()?.token.is_keyword(Keyword::With) {
        return None;
    }
    let mut i = 1;
    if tokens.get(i)?.token.is_keyword(Keyword::Recursive) {
        i += 1;
    }
    loop {
        // name
        match tokens.get(i)?.token.kind {
            TokenKind::Identifier(_) | TokenKind::QuotedIdentifier(_) | TokenKind::Keyword(_) => {
                i += 1;
            }
            _ => return None,
        }
        // optional column list
        if tokens.get(i)?.token.kind == TokenKind::LeftParen {
            i = scanner.matching_paren(i)? + 1;
        }
        if !tokens.get(i)?.token.is_keyword(Keyword::As) {
            return None;
        }
        i += 1;
        // MATERIALIZED / NOT MATERIALIZED and similar modifiers
        while matches!(tokens.get(i)?.token.kind, TokenKind::Identifier(_)) {
            i += 1;
        }
        if tokens.get(i)?.token.kind != TokenKind::LeftParen {
            return None;
        }
        let close = scanner.matching_paren(i)?;
        if tokens.get(close + 1)?.token.kind == TokenKind::Comma {
            i = close + 2;
            continue;
        }
        let end = scanner.end_of(close);
        return Some(CteSplit {
            prefix: &text[..end],
            body: text[end..].trim_start(),
        });
    }
}
