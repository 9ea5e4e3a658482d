//! # Language core
//!
//! The syntax tree produced by the parser and the runtime values the virtual
//! machine operates on.
//!
//! - `ast`: program structure, with a canonical fully-parenthesised `Display`.
//! - `object`: runtime values, truthiness and the `TRUE`/`FALSE`/`NULL` singletons.
//! - `builtins`: native functions registered by name.

pub mod ast;
pub mod builtins;
pub mod object;
