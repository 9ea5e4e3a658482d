pub mod bytecode;
pub mod frontend;
pub mod lang;
pub mod repl;
pub mod runtime;
