use std::io::{self, Write};

use crate::frontend::token::{Token, TokenKind};

/// Prints a token stream, one token per line, for `--tokens`.
pub struct TokenDumper {
    pub color: bool,
}

impl Default for TokenDumper {
    fn default() -> Self {
        Self { color: true }
    }
}

impl TokenDumper {
    // ANSI colors
    const RESET: &'static str = "\x1b[0m";
    const DIM: &'static str = "\x1b[2m";
    const GRN: &'static str = "\x1b[32m";
    const YEL: &'static str = "\x1b[33m";
    const CYN: &'static str = "\x1b[36m";
    const MAG: &'static str = "\x1b[35m";
    const RED: &'static str = "\x1b[31m";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn no_color(mut self) -> Self {
        self.color = false;
        self
    }

    pub fn dump(&self, out: &mut impl Write, tokens: &[Token]) -> io::Result<()> {
        for (i, token) in tokens.iter().enumerate() {
            self.print_one(out, i, token)?;
        }
        Ok(())
    }

    fn print_one(&self, out: &mut impl Write, index: usize, token: &Token) -> io::Result<()> {
        let (colr, reset) = if self.color {
            (self.color(token.kind), Self::RESET)
        } else {
            ("", "")
        };

        writeln!(
            out,
            "[{:03}] {}{:<8} {:<8} {:?}{}",
            index,
            colr,
            self.group(token.kind),
            token.kind.to_string(),
            token.literal,
            reset
        )
    }

    fn group(&self, kind: TokenKind) -> &'static str {
        use TokenKind::*;
        match kind {
            Eof => "EOF",
            Illegal => "ILLEGAL",
            Int | String | True | False => "LITERAL",
            Ident => "IDENT",
            Comma | Semicolon | LParen | RParen | LBrace | RBrace | LBracket | RBracket => "DELIM",
            Assign | Plus | Minus | Bang | Asterisk | Slash => "OP",
            Lt | Gt | Eq | NotEq => "CMP",
            Function | Let | If | Else | Return => "KEYWORD",
        }
    }

    fn color(&self, kind: TokenKind) -> &'static str {
        use TokenKind::*;
        match kind {
            Eof => Self::DIM,
            Illegal => Self::RED,
            String => Self::GRN,
            Int | True | False => Self::CYN,
            Ident => Self::YEL,
            Assign | Plus | Minus | Bang | Asterisk | Slash | Lt | Gt | Eq | NotEq => Self::MAG,
            _ => Self::RESET,
        }
    }
}
