use crate::frontend::token::TokenKind;

/// A recoverable parse error.
///
/// The parser records one of these per failed statement and keeps going, so a
/// single parse can surface several of them.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParserError {
    #[error("expected next token to be {expected}, got {got} instead")]
    UnexpectedToken { expected: TokenKind, got: TokenKind },

    #[error("no prefix parse function for {kind} found ({literal:?})")]
    NoPrefixParseFn { kind: TokenKind, literal: String },

    #[error("could not parse {0:?} as integer")]
    InvalidInteger(String),

    #[error("expression nested deeper than {0} levels")]
    NestingTooDeep(usize),
}
