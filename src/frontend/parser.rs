use std::mem;

use crate::frontend::lexer::Lexer;
use crate::frontend::parser_error::ParserError;
use crate::frontend::token::{Token, TokenKind};
use crate::lang::ast::{
    BlockStatement, Expression, Identifier, InfixOperator, PrefixOperator, Program, Statement,
};

/// Deepest expression nesting accepted before the parser gives up on a
/// statement instead of recursing further.
pub const MAX_NESTING_DEPTH: usize = 256;

/// Binding power of an operator, lowest to highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
    Lowest,
    Equals,      // ==
    LessGreater, // > or <
    Sum,         // +
    Product,     // *
    Prefix,      // -x or !x
    Call,        // f(x) or a[i]
}

impl Precedence {
    fn of(kind: TokenKind) -> Self {
        match kind {
            TokenKind::Eq | TokenKind::NotEq => Precedence::Equals,
            TokenKind::Lt | TokenKind::Gt => Precedence::LessGreater,
            TokenKind::Plus | TokenKind::Minus => Precedence::Sum,
            TokenKind::Asterisk | TokenKind::Slash => Precedence::Product,
            TokenKind::LParen | TokenKind::LBracket => Precedence::Call,
            _ => Precedence::Lowest,
        }
    }
}

type PrefixParseFn<I> = fn(&mut Parser<I>) -> Result<Expression, ParserError>;
type InfixParseFn<I> = fn(&mut Parser<I>, Expression) -> Result<Expression, ParserError>;

/// Pratt (operator-precedence) parser.
///
/// Each token kind maps to at most one prefix routine and at most one infix
/// routine; `Precedence` decides how far an infix chain folds. The parser
/// never aborts: a statement that fails to parse is recorded in `errors`
/// and the parser resumes at the next statement boundary.
///
/// Invariant between routines: `cur` is the last token belonging to the
/// construct just parsed, `peek` is the one after it.
pub struct Parser<I: Iterator<Item = Token>> {
    tokens: I,
    cur: Token,
    peek: Token,
    errors: Vec<ParserError>,
    depth: usize,
}

/// Parses a token stream into a program plus every error encountered.
pub fn parse<T>(tokens: T) -> (Program, Vec<ParserError>)
where
    T: IntoIterator<Item = Token>,
{
    let mut parser = Parser::new(tokens);
    let program = parser.parse_program();
    (program, parser.into_errors())
}

/// Lexes and parses source text.
pub fn parse_source(source: &str) -> (Program, Vec<ParserError>) {
    parse(Lexer::new(source))
}

impl<I: Iterator<Item = Token>> Parser<I> {
    pub fn new<T>(tokens: T) -> Self
    where
        T: IntoIterator<Item = Token, IntoIter = I>,
    {
        let mut tokens = tokens.into_iter();
        let cur = tokens.next().unwrap_or_else(Token::eof);
        let peek = tokens.next().unwrap_or_else(Token::eof);
        Parser {
            tokens,
            cur,
            peek,
            errors: Vec::new(),
            depth: 0,
        }
    }

    pub fn errors(&self) -> &[ParserError] {
        &self.errors
    }

    pub fn into_errors(self) -> Vec<ParserError> {
        self.errors
    }

    /// Shifts the lookahead window by one token. A stream that ends without
    /// an explicit `Eof` behaves as if it had one.
    fn next_token(&mut self) {
        let next = self.tokens.next().unwrap_or_else(Token::eof);
        self.cur = mem::replace(&mut self.peek, next);
    }

    fn cur_is(&self, kind: TokenKind) -> bool {
        self.cur.kind == kind
    }

    fn peek_is(&self, kind: TokenKind) -> bool {
        self.peek.kind == kind
    }

    /// Advances only if the next token is `kind`.
    fn expect_peek(&mut self, kind: TokenKind) -> Result<(), ParserError> {
        if self.peek_is(kind) {
            self.next_token();
            Ok(())
        } else {
            Err(ParserError::UnexpectedToken {
                expected: kind,
                got: self.peek.kind,
            })
        }
    }

    fn peek_precedence(&self) -> Precedence {
        Precedence::of(self.peek.kind)
    }

    fn cur_precedence(&self) -> Precedence {
        Precedence::of(self.cur.kind)
    }

    /// Skips the rest of a broken statement. Stops on `;` or `Eof`, and also
    /// on `}` when `in_block` so the enclosing block can close normally.
    fn synchronize(&mut self, in_block: bool) {
        while !self.cur_is(TokenKind::Semicolon) && !self.cur_is(TokenKind::Eof) {
            if in_block && self.cur_is(TokenKind::RBrace) {
                return;
            }
            self.next_token();
        }
    }

    /// Parses statements until `Eof`.
    pub fn parse_program(&mut self) -> Program {
        let mut statements = Vec::new();

        while !self.cur_is(TokenKind::Eof) {
            match self.parse_statement() {
                Ok(stmt) => statements.push(stmt),
                Err(e) => {
                    self.errors.push(e);
                    self.synchronize(false);
                }
            }
            self.next_token();
        }

        log::debug!(
            "parsed {} statements with {} errors",
            statements.len(),
            self.errors.len()
        );

        Program { statements }
    }

    fn parse_statement(&mut self) -> Result<Statement, ParserError> {
        match self.cur.kind {
            TokenKind::Let => self.parse_let_statement(),
            TokenKind::Return => self.parse_return_statement(),
            _ => self.parse_expression_statement(),
        }
    }

    /// ```text
    /// let <ident> = <expr> [;]
    /// ```
    fn parse_let_statement(&mut self) -> Result<Statement, ParserError> {
        self.expect_peek(TokenKind::Ident)?;
        let name = Identifier::new(self.cur.literal.clone());

        self.expect_peek(TokenKind::Assign)?;
        self.next_token();

        let value = self.parse_expression(Precedence::Lowest)?;
        if self.peek_is(TokenKind::Semicolon) {
            self.next_token();
        }

        Ok(Statement::Let { name, value })
    }

    fn parse_return_statement(&mut self) -> Result<Statement, ParserError> {
        self.next_token();

        let value = self.parse_expression(Precedence::Lowest)?;
        if self.peek_is(TokenKind::Semicolon) {
            self.next_token();
        }

        Ok(Statement::Return(value))
    }

    fn parse_expression_statement(&mut self) -> Result<Statement, ParserError> {
        let expr = self.parse_expression(Precedence::Lowest)?;
        if self.peek_is(TokenKind::Semicolon) {
            self.next_token();
        }
        Ok(Statement::Expression(expr))
    }

    /// Parses `{ ... }`, with `cur` on the opening brace. Broken statements
    /// inside the block are recorded and skipped without abandoning the block.
    fn parse_block_statement(&mut self) -> Result<BlockStatement, ParserError> {
        let mut statements = Vec::new();
        self.next_token();

        while !self.cur_is(TokenKind::RBrace) {
            if self.cur_is(TokenKind::Eof) {
                return Err(ParserError::UnexpectedToken {
                    expected: TokenKind::RBrace,
                    got: TokenKind::Eof,
                });
            }

            match self.parse_statement() {
                Ok(stmt) => statements.push(stmt),
                Err(e) => {
                    self.errors.push(e);
                    self.synchronize(true);
                    if self.cur_is(TokenKind::RBrace) {
                        break;
                    }
                }
            }
            self.next_token();
        }

        Ok(BlockStatement { statements })
    }

    // ───────────────────────────── Expressions ─────────────────────────────

    pub fn parse_expression(&mut self, precedence: Precedence) -> Result<Expression, ParserError> {
        if self.depth >= MAX_NESTING_DEPTH {
            return Err(ParserError::NestingTooDeep(MAX_NESTING_DEPTH));
        }

        self.depth += 1;
        let result = self.parse_expression_inner(precedence);
        self.depth -= 1;
        result
    }

    fn parse_expression_inner(&mut self, precedence: Precedence) -> Result<Expression, ParserError> {
        let prefix = Self::prefix_parse_fn(self.cur.kind).ok_or_else(|| {
            ParserError::NoPrefixParseFn {
                kind: self.cur.kind,
                literal: self.cur.literal.clone(),
            }
        })?;

        let mut left = prefix(self)?;

        while !self.peek_is(TokenKind::Semicolon) && precedence < self.peek_precedence() {
            let Some(infix) = Self::infix_parse_fn(self.peek.kind) else {
                return Ok(left);
            };
            self.next_token();
            left = infix(self, left)?;
        }

        Ok(left)
    }

    fn prefix_parse_fn(kind: TokenKind) -> Option<PrefixParseFn<I>> {
        let f: PrefixParseFn<I> = match kind {
            TokenKind::Ident => Self::parse_identifier,
            TokenKind::Int => Self::parse_integer_literal,
            TokenKind::String => Self::parse_string_literal,
            TokenKind::True | TokenKind::False => Self::parse_boolean,
            TokenKind::Bang | TokenKind::Minus => Self::parse_prefix_expression,
            TokenKind::LParen => Self::parse_grouped_expression,
            TokenKind::If => Self::parse_if_expression,
            TokenKind::Function => Self::parse_function_literal,
            TokenKind::LBracket => Self::parse_array_literal,
            _ => return None,
        };
        Some(f)
    }

    fn infix_parse_fn(kind: TokenKind) -> Option<InfixParseFn<I>> {
        let f: InfixParseFn<I> = match kind {
            TokenKind::Plus
            | TokenKind::Minus
            | TokenKind::Asterisk
            | TokenKind::Slash
            | TokenKind::Eq
            | TokenKind::NotEq
            | TokenKind::Lt
            | TokenKind::Gt => Self::parse_infix_expression,
            TokenKind::LParen => Self::parse_call_expression,
            TokenKind::LBracket => Self::parse_index_expression,
            _ => return None,
        };
        Some(f)
    }

    fn parse_identifier(&mut self) -> Result<Expression, ParserError> {
        Ok(Expression::Identifier(Identifier::new(
            self.cur.literal.clone(),
        )))
    }

    fn parse_integer_literal(&mut self) -> Result<Expression, ParserError> {
        self.cur
            .literal
            .parse::<i64>()
            .map(Expression::IntegerLiteral)
            .map_err(|_| ParserError::InvalidInteger(self.cur.literal.clone()))
    }

    fn parse_string_literal(&mut self) -> Result<Expression, ParserError> {
        Ok(Expression::StringLiteral(self.cur.literal.clone()))
    }

    fn parse_boolean(&mut self) -> Result<Expression, ParserError> {
        Ok(Expression::Boolean(self.cur_is(TokenKind::True)))
    }

    fn parse_prefix_expression(&mut self) -> Result<Expression, ParserError> {
        let operator = match self.cur.kind {
            TokenKind::Bang => PrefixOperator::Bang,
            _ => PrefixOperator::Minus,
        };
        self.next_token();

        let right = self.parse_expression(Precedence::Prefix)?;
        Ok(Expression::Prefix {
            operator,
            right: Box::new(right),
        })
    }

    fn parse_grouped_expression(&mut self) -> Result<Expression, ParserError> {
        self.next_token();
        let expr = self.parse_expression(Precedence::Lowest)?;
        self.expect_peek(TokenKind::RParen)?;
        Ok(expr)
    }

    /// ```text
    /// if (<cond>) { <consequence> } [else { <alternative> }]
    /// ```
    fn parse_if_expression(&mut self) -> Result<Expression, ParserError> {
        self.expect_peek(TokenKind::LParen)?;
        self.next_token();
        let condition = self.parse_expression(Precedence::Lowest)?;
        self.expect_peek(TokenKind::RParen)?;

        self.expect_peek(TokenKind::LBrace)?;
        let consequence = self.parse_block_statement()?;

        let alternative = if self.peek_is(TokenKind::Else) {
            self.next_token();
            self.expect_peek(TokenKind::LBrace)?;
            Some(self.parse_block_statement()?)
        } else {
            None
        };

        Ok(Expression::If {
            condition: Box::new(condition),
            consequence,
            alternative,
        })
    }

    /// ```text
    /// fn (<ident>, ...) { <body> }
    /// ```
    fn parse_function_literal(&mut self) -> Result<Expression, ParserError> {
        self.expect_peek(TokenKind::LParen)?;
        let parameters = self.parse_function_parameters()?;
        self.expect_peek(TokenKind::LBrace)?;
        let body = self.parse_block_statement()?;
        Ok(Expression::FunctionLiteral { parameters, body })
    }

    fn parse_function_parameters(&mut self) -> Result<Vec<Identifier>, ParserError> {
        let mut params = Vec::new();

        if self.peek_is(TokenKind::RParen) {
            self.next_token();
            return Ok(params);
        }

        self.expect_peek(TokenKind::Ident)?;
        params.push(Identifier::new(self.cur.literal.clone()));

        while self.peek_is(TokenKind::Comma) {
            self.next_token();
            self.expect_peek(TokenKind::Ident)?;
            params.push(Identifier::new(self.cur.literal.clone()));
        }

        self.expect_peek(TokenKind::RParen)?;
        Ok(params)
    }

    fn parse_array_literal(&mut self) -> Result<Expression, ParserError> {
        let elements = self.parse_expression_list(TokenKind::RBracket)?;
        Ok(Expression::ArrayLiteral(elements))
    }

    /// Comma-separated expressions up to `end`, with `cur` on the opener.
    fn parse_expression_list(&mut self, end: TokenKind) -> Result<Vec<Expression>, ParserError> {
        let mut list = Vec::new();

        if self.peek_is(end) {
            self.next_token();
            return Ok(list);
        }

        self.next_token();
        list.push(self.parse_expression(Precedence::Lowest)?);

        while self.peek_is(TokenKind::Comma) {
            self.next_token();
            self.next_token();
            list.push(self.parse_expression(Precedence::Lowest)?);
        }

        self.expect_peek(end)?;
        Ok(list)
    }

    fn parse_infix_expression(&mut self, left: Expression) -> Result<Expression, ParserError> {
        let operator = match self.cur.kind {
            TokenKind::Plus => InfixOperator::Plus,
            TokenKind::Minus => InfixOperator::Minus,
            TokenKind::Asterisk => InfixOperator::Asterisk,
            TokenKind::Slash => InfixOperator::Slash,
            TokenKind::Lt => InfixOperator::Lt,
            TokenKind::Gt => InfixOperator::Gt,
            TokenKind::Eq => InfixOperator::Eq,
            _ => InfixOperator::NotEq,
        };
        let precedence = self.cur_precedence();
        self.next_token();

        let right = self.parse_expression(precedence)?;
        Ok(Expression::Infix {
            left: Box::new(left),
            operator,
            right: Box::new(right),
        })
    }

    fn parse_call_expression(&mut self, function: Expression) -> Result<Expression, ParserError> {
        let arguments = self.parse_expression_list(TokenKind::RParen)?;
        Ok(Expression::Call {
            function: Box::new(function),
            arguments,
        })
    }

    fn parse_index_expression(&mut self, left: Expression) -> Result<Expression, ParserError> {
        self.next_token();
        let index = self.parse_expression(Precedence::Lowest)?;
        self.expect_peek(TokenKind::RBracket)?;
        Ok(Expression::Index {
            left: Box::new(left),
            index: Box::new(index),
        })
    }
}
