use crate::frontend::token::{Token, TokenKind, lookup_ident};

/// Character scanner producing the token stream consumed by the parser.
///
/// The lexer never fails: characters it does not understand, and string
/// literals missing their closing quote, come out as `Illegal` tokens and
/// are reported by the parser.
pub struct Lexer {
    source: Vec<char>,
    pos: usize,
    done: bool,
}

impl Lexer {
    pub fn new(source: &str) -> Self {
        Lexer {
            source: source.chars().collect(),
            pos: 0,
            done: false,
        }
    }

    fn current(&self) -> Option<char> {
        self.source.get(self.pos).copied()
    }

    fn peek(&self) -> Option<char> {
        self.source.get(self.pos + 1).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.current();
        self.pos += 1;
        ch
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.current() {
            if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    /// Returns the next token. Once the input is exhausted every call returns `Eof`.
    pub fn next_token(&mut self) -> Token {
        self.skip_whitespace();

        let Some(ch) = self.current() else {
            return Token::eof();
        };

        let single = |kind: TokenKind| Token::new(kind, ch.to_string());

        let token = match ch {
            '=' if self.peek() == Some('=') => {
                self.advance();
                Token::new(TokenKind::Eq, "==")
            }
            '!' if self.peek() == Some('=') => {
                self.advance();
                Token::new(TokenKind::NotEq, "!=")
            }
            '=' => single(TokenKind::Assign),
            '!' => single(TokenKind::Bang),
            '+' => single(TokenKind::Plus),
            '-' => single(TokenKind::Minus),
            '*' => single(TokenKind::Asterisk),
            '/' => single(TokenKind::Slash),
            '<' => single(TokenKind::Lt),
            '>' => single(TokenKind::Gt),
            ',' => single(TokenKind::Comma),
            ';' => single(TokenKind::Semicolon),
            '(' => single(TokenKind::LParen),
            ')' => single(TokenKind::RParen),
            '{' => single(TokenKind::LBrace),
            '}' => single(TokenKind::RBrace),
            '[' => single(TokenKind::LBracket),
            ']' => single(TokenKind::RBracket),
            '"' => return self.read_string(),
            c if is_letter(c) => return self.read_identifier(),
            c if c.is_ascii_digit() => return self.read_number(),
            _ => single(TokenKind::Illegal),
        };

        self.advance();
        token
    }

    fn read_string(&mut self) -> Token {
        self.advance(); // opening quote

        let mut string = String::new();
        loop {
            match self.advance() {
                Some('"') => return Token::new(TokenKind::String, string),
                Some(ch) => string.push(ch),
                None => {
                    let mut literal = String::from("\"");
                    literal.push_str(&string);
                    return Token::new(TokenKind::Illegal, literal);
                }
            }
        }
    }

    fn read_number(&mut self) -> Token {
        let mut digits = String::new();
        while let Some(ch) = self.current() {
            if ch.is_ascii_digit() {
                digits.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        Token::new(TokenKind::Int, digits)
    }

    fn read_identifier(&mut self) -> Token {
        let mut ident = String::new();
        while let Some(ch) = self.current() {
            if is_letter(ch) || ch.is_ascii_digit() {
                ident.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        Token::new(lookup_ident(&ident), ident)
    }

    /// Scans the whole input. The result always ends with a single `Eof`.
    pub fn tokenize(&mut self) -> Vec<Token> {
        self.by_ref().collect()
    }
}

/// Yields every token including the terminating `Eof`, then stops.
impl Iterator for Lexer {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        if self.done {
            return None;
        }
        let token = self.next_token();
        if token.kind == TokenKind::Eof {
            self.done = true;
        }
        Some(token)
    }
}

fn is_letter(ch: char) -> bool {
    ch.is_alphabetic() || ch == '_'
}

#[cfg(test)]
mod tests {
    use super::*;
    use TokenKind::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        Lexer::new(source)
            .tokenize()
            .into_iter()
            .map(|t| t.kind)
            .filter(|k| *k != Eof)
            .collect()
    }

    #[test]
    fn test_delimiters() {
        assert_eq!(
            kinds("=+(){},;"),
            vec![Assign, Plus, LParen, RParen, LBrace, RBrace, Comma, Semicolon]
        );
    }

    #[test]
    fn test_let_statement() {
        let tokens = Lexer::new("let five = 5;").tokenize();
        assert_eq!(
            tokens,
            vec![
                Token::new(Let, "let"),
                Token::new(Ident, "five"),
                Token::new(Assign, "="),
                Token::new(Int, "5"),
                Token::new(Semicolon, ";"),
                Token::eof(),
            ]
        );
    }

    #[test]
    fn test_two_char_operators() {
        assert_eq!(
            kinds("10 == 10; 10 != 9;"),
            vec![Int, Eq, Int, Semicolon, Int, NotEq, Int, Semicolon]
        );
    }

    #[test]
    fn test_operators() {
        assert_eq!(
            kinds("!-/*5; 5 < 10 > 5;"),
            vec![Bang, Minus, Slash, Asterisk, Int, Semicolon, Int, Lt, Int, Gt, Int, Semicolon]
        );
    }

    #[test]
    fn test_keywords() {
        assert_eq!(
            kinds("fn let true false if else return"),
            vec![Function, Let, True, False, If, Else, Return]
        );
    }

    #[test]
    fn test_identifiers_with_digits_and_underscores() {
        let tokens = Lexer::new("foo_bar2 _x").tokenize();
        assert_eq!(tokens[0], Token::new(Ident, "foo_bar2"));
        assert_eq!(tokens[1], Token::new(Ident, "_x"));
    }

    #[test]
    fn test_strings() {
        let tokens = Lexer::new(r#""foobar" "foo bar""#).tokenize();
        assert_eq!(tokens[0], Token::new(String, "foobar"));
        assert_eq!(tokens[1], Token::new(String, "foo bar"));
    }

    #[test]
    fn test_unterminated_string_is_illegal() {
        let tokens = Lexer::new(r#""abc"#).tokenize();
        assert_eq!(tokens[0].kind, Illegal);
        assert_eq!(tokens[1].kind, Eof);
    }

    #[test]
    fn test_arrays() {
        assert_eq!(
            kinds("[1, 2][0]"),
            vec![LBracket, Int, Comma, Int, RBracket, LBracket, Int, RBracket]
        );
    }

    #[test]
    fn test_unknown_character() {
        let tokens = Lexer::new("@").tokenize();
        assert_eq!(tokens[0], Token::new(Illegal, "@"));
    }

    #[test]
    fn test_eof_is_sticky() {
        let mut lexer = Lexer::new("");
        assert_eq!(lexer.next_token().kind, Eof);
        assert_eq!(lexer.next_token().kind, Eof);
        assert_eq!(lexer.next().map(|t| t.kind), Some(Eof));
        assert_eq!(lexer.next(), None);
    }
}
