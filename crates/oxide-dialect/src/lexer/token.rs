//! Token types for the shallow SQL lexer.

/// Represents a span in the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    /// Start byte offset (inclusive).
    pub start: usize,
    /// End byte offset (exclusive).
    pub end: usize,
}

impl Span {
    /// Creates a new span.
    #[must_use]
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Returns the length of the span in bytes.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.end - self.start
    }

    /// Returns true if the span is empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Keywords the pagination rewriters care about.
///
/// Anything else lexes as an identifier, which keeps the lexer tolerant of
/// vendor syntax it does not understand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Keyword {
    Select,
    Distinct,
    All,
    From,
    Where,
    Group,
    Having,
    Order,
    By,
    Limit,
    Offset,
    Fetch,
    First,
    Next,
    Rows,
    Row,
    Only,
    Top,
    Skip,
    With,
    Recursive,
    As,
    Union,
    Intersect,
    Except,
    Minus,
    Into,
    For,
    Update,
    Share,
    Lock,
    In,
    Mode,
    Over,
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl Keyword {
    /// Attempts to parse a keyword from a string (case-insensitive).
    #[must_use]
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "SELECT" => Some(Self::Select),
            "DISTINCT" => Some(Self::Distinct),
            "ALL" => Some(Self::All),
            "FROM" => Some(Self::From),
            "WHERE" => Some(Self::Where),
            "GROUP" => Some(Self::Group),
            "HAVING" => Some(Self::Having),
            "ORDER" => Some(Self::Order),
            "BY" => Some(Self::By),
            "LIMIT" => Some(Self::Limit),
            "OFFSET" => Some(Self::Offset),
            "FETCH" => Some(Self::Fetch),
            "FIRST" => Some(Self::First),
            "NEXT" => Some(Self::Next),
            "ROWS" => Some(Self::Rows),
            "ROW" => Some(Self::Row),
            "ONLY" => Some(Self::Only),
            "TOP" => Some(Self::Top),
            "SKIP" => Some(Self::Skip),
            "WITH" => Some(Self::With),
            "RECURSIVE" => Some(Self::Recursive),
            "AS" => Some(Self::As),
            "UNION" => Some(Self::Union),
            "INTERSECT" => Some(Self::Intersect),
            "EXCEPT" => Some(Self::Except),
            "MINUS" => Some(Self::Minus),
            "INTO" => Some(Self::Into),
            "FOR" => Some(Self::For),
            "UPDATE" => Some(Self::Update),
            "SHARE" => Some(Self::Share),
            "LOCK" => Some(Self::Lock),
            "IN" => Some(Self::In),
            "MODE" => Some(Self::Mode),
            "OVER" => Some(Self::Over),
            "COUNT" => Some(Self::Count),
            "SUM" => Some(Self::Sum),
            "AVG" => Some(Self::Avg),
            "MIN" => Some(Self::Min),
            "MAX" => Some(Self::Max),
            _ => None,
        }
    }

    /// Returns true for the aggregate function names.
    #[must_use]
    pub const fn is_aggregate(&self) -> bool {
        matches!(
            self,
            Self::Count | Self::Sum | Self::Avg | Self::Min | Self::Max
        )
    }

    /// Returns true for keywords that combine two query bodies.
    #[must_use]
    pub const fn is_set_operator(&self) -> bool {
        matches!(
            self,
            Self::Union | Self::Intersect | Self::Except | Self::Minus
        )
    }
}

/// The kind of token.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// A keyword from [`Keyword`].
    Keyword(Keyword),
    /// Bare identifier (e.g., `column_name`).
    Identifier(String),
    /// Quoted identifier (`"a b"`, `` `a b` `` or `[a b]`), unescaped.
    QuotedIdentifier(String),
    /// String literal, unescaped.
    String(String),
    /// Numeric literal, kept as written.
    Number(String),
    /// Bind placeholder (`?`, `?1`, `$1`, `:name`, `@name`, `#{..}`, `${..}`).
    Placeholder(String),
    /// `(`
    LeftParen,
    /// `)`
    RightParen,
    /// `,`
    Comma,
    /// `;`
    Semicolon,
    /// `.`
    Dot,
    /// `*`
    Star,
    /// Any other operator character run (`=`, `<>`, `::`, `||`...).
    Operator(String),
    /// Lexing error (unterminated literal and similar).
    Error(String),
    /// End of input.
    Eof,
}

/// A token with its source location.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    /// The kind of token.
    pub kind: TokenKind,
    /// The location in the source.
    pub span: Span,
}

impl Token {
    /// Creates a new token.
    #[must_use]
    pub const fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }

    /// Returns true if this is an EOF token.
    #[must_use]
    pub const fn is_eof(&self) -> bool {
        matches!(self.kind, TokenKind::Eof)
    }

    /// Returns the keyword if this token is one.
    #[must_use]
    pub const fn keyword(&self) -> Option<Keyword> {
        match self.kind {
            TokenKind::Keyword(kw) => Some(kw),
            _ => None,
        }
    }

    /// Returns true if this token is the given keyword.
    #[must_use]
    pub fn is_keyword(&self, keyword: Keyword) -> bool {
        self.keyword() == Some(keyword)
    }
}
