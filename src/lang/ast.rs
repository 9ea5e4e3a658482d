//! Abstract syntax tree.
//!
//! The tree is built once by the parser and only read afterwards. Every node
//! owns its children outright; there is no sharing between subtrees.
//!
//! `Display` renders the canonical textual form, with every prefix and infix
//! expression fully parenthesised, e.g. `-a * b` prints as `((-a) * b)`.

use std::fmt;

/// Root of a parsed program: the ordered top-level statements.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    pub statements: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// `let <name> = <value>;`
    Let { name: Identifier, value: Expression },

    /// `return <value>;`
    Return(Expression),

    /// A bare expression used as a statement.
    Expression(Expression),
}

/// A `{ ... }` delimited statement list.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BlockStatement {
    pub statements: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identifier {
    pub value: String,
}

impl Identifier {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefixOperator {
    /// `!x`
    Bang,
    /// `-x`
    Minus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfixOperator {
    Plus,
    Minus,
    Asterisk,
    Slash,
    Lt,
    Gt,
    Eq,
    NotEq,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Identifier(Identifier),
    IntegerLiteral(i64),
    StringLiteral(String),
    Boolean(bool),

    Prefix {
        operator: PrefixOperator,
        right: Box<Expression>,
    },

    Infix {
        left: Box<Expression>,
        operator: InfixOperator,
        right: Box<Expression>,
    },

    /// `if (<condition>) { <consequence> } else { <alternative> }`
    If {
        condition: Box<Expression>,
        consequence: BlockStatement,
        alternative: Option<BlockStatement>,
    },

    /// `fn(<parameters>) { <body> }`
    FunctionLiteral {
        parameters: Vec<Identifier>,
        body: BlockStatement,
    },

    /// `<function>(<arguments>)`
    Call {
        function: Box<Expression>,
        arguments: Vec<Expression>,
    },

    ArrayLiteral(Vec<Expression>),

    /// `<left>[<index>]`
    Index {
        left: Box<Expression>,
        index: Box<Expression>,
    },
}

impl Expression {
    /// Short node kind name, used in diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Expression::Identifier(_) => "Identifier",
            Expression::IntegerLiteral(_) => "IntegerLiteral",
            Expression::StringLiteral(_) => "StringLiteral",
            Expression::Boolean(_) => "Boolean",
            Expression::Prefix { .. } => "PrefixExpression",
            Expression::Infix { .. } => "InfixExpression",
            Expression::If { .. } => "IfExpression",
            Expression::FunctionLiteral { .. } => "FunctionLiteral",
            Expression::Call { .. } => "CallExpression",
            Expression::ArrayLiteral(_) => "ArrayLiteral",
            Expression::Index { .. } => "IndexExpression",
        }
    }
}

impl Statement {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Statement::Let { .. } => "LetStatement",
            Statement::Return(_) => "ReturnStatement",
            Statement::Expression(_) => "ExpressionStatement",
        }
    }
}

// ───────────────────────────── Display ─────────────────────────────

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for stmt in &self.statements {
            write!(f, "{}", stmt)?;
        }
        Ok(())
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Statement::Let { name, value } => write!(f, "let {} = {};", name, value),
            Statement::Return(value) => write!(f, "return {};", value),
            Statement::Expression(expr) => write!(f, "{}", expr),
        }
    }
}

impl fmt::Display for BlockStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{ ")?;
        for stmt in &self.statements {
            write!(f, "{}", stmt)?;
        }
        write!(f, " }}")
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

impl fmt::Display for PrefixOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrefixOperator::Bang => write!(f, "!"),
            PrefixOperator::Minus => write!(f, "-"),
        }
    }
}

impl fmt::Display for InfixOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            InfixOperator::Plus => "+",
            InfixOperator::Minus => "-",
            InfixOperator::Asterisk => "*",
            InfixOperator::Slash => "/",
            InfixOperator::Lt => "<",
            InfixOperator::Gt => ">",
            InfixOperator::Eq => "==",
            InfixOperator::NotEq => "!=",
        };
        write!(f, "{}", s)
    }
}

fn write_joined<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Identifier(ident) => write!(f, "{}", ident),
            Expression::IntegerLiteral(n) => write!(f, "{}", n),
            Expression::StringLiteral(s) => write!(f, "{:?}", s),
            Expression::Boolean(b) => write!(f, "{}", b),
            Expression::Prefix { operator, right } => write!(f, "({}{})", operator, right),
            Expression::Infix {
                left,
                operator,
                right,
            } => write!(f, "({} {} {})", left, operator, right),
            Expression::If {
                condition,
                consequence,
                alternative,
            } => {
                write!(f, "if {} {}", condition, consequence)?;
                if let Some(alt) = alternative {
                    write!(f, " else {}", alt)?;
                }
                Ok(())
            }
            Expression::FunctionLiteral { parameters, body } => {
                write!(f, "fn(")?;
                write_joined(f, parameters)?;
                write!(f, ") {}", body)
            }
            Expression::Call {
                function,
                arguments,
            } => {
                write!(f, "{}(", function)?;
                write_joined(f, arguments)?;
                write!(f, ")")
            }
            Expression::ArrayLiteral(elements) => {
                write!(f, "[")?;
                write_joined(f, elements)?;
                write!(f, "]")
            }
            Expression::Index { left, index } => write!(f, "({}[{}])", left, index),
        }
    }
}
