//! Shallow SQL lexer.
//!
//! Produces a flat token stream with byte spans so the rewriters can cut and
//! splice the original text without ever rendering an AST.

mod token;
mod tokenizer;

pub use token::{Keyword, Span, Token, TokenKind};
pub use tokenizer::Lexer;
