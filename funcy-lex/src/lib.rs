//! funcy-lex - turns Funcy source text into a stream of [`Token`]s.
//!
//! The lexer is hand-rolled, character-at-a-time, with no backtracking:
//! every production either commits to a token kind or falls through to an
//! `Error` token carrying a diagnostic message. Illegal input never stops
//! the lexer — it always produces a token and the caller decides whether to
//! keep going.

mod lexer;
mod token;

pub use lexer::Lexer;
pub use token::{Token, TokenKind};
