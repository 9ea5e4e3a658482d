use std::io::{self, BufRead, Write};

use crate::bytecode::compile::{Compiler, CompilerState};
use crate::bytecode::compile_error::CompileError;
use crate::frontend::parser::parse_source;
use crate::frontend::parser_error::ParserError;
use crate::lang::object::Object;
use crate::runtime::runtime_error::RuntimeError;
use crate::runtime::vm_bc::{GLOBALS_SIZE, Vm};

pub const PROMPT: &str = ">> ";

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SessionError {
    #[error("parser errors:{}", format_parse_errors(.0))]
    Parse(Vec<ParserError>),

    #[error("compile error: {0}")]
    Compile(#[from] CompileError),

    #[error("runtime error: {0}")]
    Runtime(#[from] RuntimeError),
}

fn format_parse_errors(errors: &[ParserError]) -> String {
    errors.iter().map(|e| format!("\n\t{}", e)).collect()
}

/// State carried between inputs: the symbol table and constant pool the
/// compiler builds up, and the globals store the VM writes into.
pub struct Session {
    compiler_state: CompilerState,
    globals: Vec<Object>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            compiler_state: CompilerState::default(),
            globals: Vm::new_globals_store(GLOBALS_SIZE),
        }
    }

    /// Parses, compiles and runs one input, returning the last popped value.
    ///
    /// A parse or compile failure leaves the session untouched. A runtime
    /// failure keeps the new bindings and whatever globals were written
    /// before it.
    pub fn eval(&mut self, source: &str) -> Result<Object, SessionError> {
        let (program, errors) = parse_source(source);
        if !errors.is_empty() {
            return Err(SessionError::Parse(errors));
        }

        let mut compiler = Compiler::with_state(self.compiler_state.clone());
        compiler.compile(&program)?;
        let bytecode = compiler.bytecode();
        self.compiler_state = compiler.into_state();

        let mut vm = Vm::with_globals(bytecode, std::mem::take(&mut self.globals));
        let result = vm.run();
        let value = vm.last_popped_stack_elem().clone();
        self.globals = vm.into_globals();

        result?;
        Ok(value)
    }
}

/// Reads lines from `input` until EOF, evaluating each in one shared session.
pub fn start(input: impl BufRead, mut output: impl Write) -> io::Result<()> {
    let mut session = Session::new();
    let mut lines = input.lines();

    loop {
        write!(output, "{}", PROMPT)?;
        output.flush()?;

        let Some(line) = lines.next().transpose()? else {
            writeln!(output)?;
            return Ok(());
        };
        if line.trim().is_empty() {
            continue;
        }

        match session.eval(&line) {
            Ok(value) => writeln!(output, "{}", value)?,
            Err(e) => writeln!(output, "{}", e)?,
        }
    }
}
