//! Shallow SQL tokenizer.
//!
//! The lexer only needs to be precise about the things that can hide
//! keywords from a naive text search: string literals, quoted identifiers,
//! comments and bind placeholders. Everything else is tokenized loosely.

use super::{Keyword, Span, Token, TokenKind};

/// A lexer that tokenizes SQL text.
pub struct Lexer<'a> {
    /// The input text.
    input: &'a str,
    /// The current byte position.
    pos: usize,
    /// The byte position of the start of the current token.
    start: usize,
}

impl<'a> Lexer<'a> {
    /// Creates a new lexer for the given input.
    #[must_use]
    pub const fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            start: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn peek_next(&self) -> Option<char> {
        let mut chars = self.input[self.pos..].chars();
        chars.next();
        chars.next()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            while self.peek().is_some_and(char::is_whitespace) {
                self.advance();
            }

            if self.peek() == Some('-') && self.peek_next() == Some('-') {
                while self.peek().is_some_and(|c| c != '\n') {
                    self.advance();
                }
                continue;
            }

            if self.peek() == Some('/') && self.peek_next() == Some('*') {
                self.advance();
                self.advance();
                loop {
                    match self.advance() {
                        Some('*') if self.peek() == Some('/') => {
                            self.advance();
                            break;
                        }
                        None => break,
                        _ => {}
                    }
                }
                continue;
            }

            break;
        }
    }

    fn make_token(&self, kind: TokenKind) -> Token {
        Token::new(kind, Span::new(self.start, self.pos))
    }

    fn scan_word(&mut self) -> Token {
        while self
            .peek()
            .is_some_and(|c| c.is_alphanumeric() || c == '_' || c == '$' || c == '#')
        {
            self.advance();
        }
        let text = &self.input[self.start..self.pos];
        match Keyword::from_str(text) {
            Some(keyword) => self.make_token(TokenKind::Keyword(keyword)),
            None => self.make_token(TokenKind::Identifier(text.to_string())),
        }
    }

    /// Scans a delimited run where a doubled closing delimiter escapes itself.
    ///
    /// Returns `None` when the input ends before the closing delimiter.
    fn scan_delimited(&mut self, close: char) -> Option<String> {
        self.advance();
        let mut value = String::new();
        loop {
            match self.advance() {
                Some(c) if c == close => {
                    if self.peek() == Some(close) {
                        value.push(close);
                        self.advance();
                    } else {
                        return Some(value);
                    }
                }
                Some(c) => value.push(c),
                None => return None,
            }
        }
    }

    fn scan_string(&mut self) -> Token {
        match self.scan_delimited('\'') {
            Some(value) => self.make_token(TokenKind::String(value)),
            None => self.make_token(TokenKind::Error("Unterminated string literal".into())),
        }
    }

    fn scan_quoted_identifier(&mut self, close: char) -> Token {
        match self.scan_delimited(close) {
            Some(value) => self.make_token(TokenKind::QuotedIdentifier(value)),
            None => self.make_token(TokenKind::Error("Unterminated quoted identifier".into())),
        }
    }

    fn scan_number(&mut self) -> Token {
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == '.')
        {
            let c = self.advance();
            if matches!(c, Some('e' | 'E')) && self.peek().is_some_and(|n| n == '+' || n == '-') {
                self.advance();
            }
        }
        let text = &self.input[self.start..self.pos];
        self.make_token(TokenKind::Number(text.to_string()))
    }

    /// Scans a template placeholder of the form `#{...}` or `${...}`.
    fn scan_brace_placeholder(&mut self) -> Token {
        self.advance(); // # or $
        self.advance(); // {
        let mut depth = 1usize;
        while let Some(c) = self.advance() {
            match c {
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        let text = &self.input[self.start..self.pos];
                        return self.make_token(TokenKind::Placeholder(text.to_string()));
                    }
                }
                _ => {}
            }
        }
        self.make_token(TokenKind::Error("Unterminated placeholder".into()))
    }

    /// Scans a placeholder introduced by a sigil (`?`, `:`, `$`, `@`).
    fn scan_sigil_placeholder(&mut self) -> Token {
        self.advance();
        while self
            .peek()
            .is_some_and(|c| c.is_alphanumeric() || c == '_' || c == '.')
        {
            self.advance();
        }
        let text = &self.input[self.start..self.pos];
        self.make_token(TokenKind::Placeholder(text.to_string()))
    }

    fn scan_operator(&mut self) -> Token {
        while self
            .peek()
            .is_some_and(|c| matches!(c, '=' | '<' | '>' | '!' | '|' | '&' | '+' | '-' | '/' | '%' | '^' | '~' | ':'))
        {
            // a comment opener ends the operator run
            if (self.peek() == Some('-') && self.peek_next() == Some('-'))
                || (self.peek() == Some('/') && self.peek_next() == Some('*'))
            {
                break;
            }
            self.advance();
        }
        if self.pos == self.start {
            self.advance();
        }
        let text = &self.input[self.start..self.pos];
        self.make_token(TokenKind::Operator(text.to_string()))
    }

    /// Scans the next token.
    #[must_use]
    pub fn next_token(&mut self) -> Token {
        self.skip_whitespace_and_comments();
        self.start = self.pos;

        let Some(c) = self.peek() else {
            return self.make_token(TokenKind::Eof);
        };
        let next = self.peek_next();

        match c {
            '(' => {
                self.advance();
                self.make_token(TokenKind::LeftParen)
            }
            ')' => {
                self.advance();
                self.make_token(TokenKind::RightParen)
            }
            ',' => {
                self.advance();
                self.make_token(TokenKind::Comma)
            }
            ';' => {
                self.advance();
                self.make_token(TokenKind::Semicolon)
            }
            '.' if !next.is_some_and(|n| n.is_ascii_digit()) => {
                self.advance();
                self.make_token(TokenKind::Dot)
            }
            '*' => {
                self.advance();
                self.make_token(TokenKind::Star)
            }
            '\'' => self.scan_string(),
            '"' => self.scan_quoted_identifier('"'),
            '`' => self.scan_quoted_identifier('`'),
            '[' => self.scan_quoted_identifier(']'),
            '#' | '$' if next == Some('{') => self.scan_brace_placeholder(),
            '?' => self.scan_sigil_placeholder(),
            '$' if next.is_some_and(|n| n.is_ascii_digit()) => self.scan_sigil_placeholder(),
            ':' | '@' if next.is_some_and(|n| n.is_alphabetic() || n == '_') => {
                self.scan_sigil_placeholder()
            }
            c if c.is_ascii_digit() || c == '.' => self.scan_number(),
            c if c.is_alphabetic() || c == '_' => self.scan_word(),
            _ => self.scan_operator(),
        }
    }

    /// Tokenizes the entire input, including the trailing EOF token.
    #[must_use]
    pub fn tokenize(&mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token();
            let is_eof = token.is_eof();
            tokens.push(token);
            if is_eof {
                break;
            }
        }
        tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token_kinds(input: &str) -> Vec<TokenKind> {
        Lexer::new(input)
            .tokenize()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(token_kinds("  \n\t "), vec![TokenKind::Eof]);
    }

    #[test]
    fn test_comments_are_skipped() {
        assert_eq!(
            token_kinds("SELECT -- order by\n/* ORDER BY */ FROM"),
            vec![
                TokenKind::Keyword(Keyword::Select),
                TokenKind::Keyword(Keyword::From),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_keywords_inside_strings_stay_strings() {
        assert_eq!(
            token_kinds("'it''s ORDER BY x'"),
            vec![
                TokenKind::String("it's ORDER BY x".into()),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_quoted_identifiers() {
        assert_eq!(
            token_kinds("\"order\" `by` [top]"),
            vec![
                TokenKind::QuotedIdentifier("order".into()),
                TokenKind::QuotedIdentifier("by".into()),
                TokenKind::QuotedIdentifier("top".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_placeholders() {
        assert_eq!(
            token_kinds("? ?1 $2 :name @p #{order.by} ${limit}"),
            vec![
                TokenKind::Placeholder("?".into()),
                TokenKind::Placeholder("?1".into()),
                TokenKind::Placeholder("$2".into()),
                TokenKind::Placeholder(":name".into()),
                TokenKind::Placeholder("@p".into()),
                TokenKind::Placeholder("#{order.by}".into()),
                TokenKind::Placeholder("${limit}".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_cast_is_an_operator_not_a_placeholder() {
        assert_eq!(
            token_kinds("a::int"),
            vec![
                TokenKind::Identifier("a".into()),
                TokenKind::Operator("::".into()),
                TokenKind::Identifier("int".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_numbers_and_operators() {
        assert_eq!(
            token_kinds("x >= 1.5e-3"),
            vec![
                TokenKind::Identifier("x".into()),
                TokenKind::Operator(">=".into()),
                TokenKind::Number("1.5e-3".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_unterminated_string_is_an_error_token() {
        let tokens = Lexer::new("SELECT 'abc").tokenize();
        assert!(matches!(tokens[1].kind, TokenKind::Error(_)));
        assert!(tokens[2].is_eof());
    }

    #[test]
    fn test_span_tracking() {
        let tokens = Lexer::new("SELECT id").tokenize();
        assert_eq!(tokens[0].span, Span::new(0, 6));
        assert_eq!(tokens[1].span, Span::new(7, 9));
    }
}
