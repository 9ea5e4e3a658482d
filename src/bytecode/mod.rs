pub mod compile;
pub mod compile_error;
pub mod disasm;
pub mod ir;
pub mod op;
pub mod symbol_table;

pub use ir::{Bytecode, Instructions};
pub use op::Opcode;
