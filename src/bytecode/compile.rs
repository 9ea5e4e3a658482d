use crate::{
    bytecode::{
        Bytecode, Instructions,
        compile_error::CompileError,
        op::{Opcode, make},
        symbol_table::SymbolTable,
    },
    lang::{
        ast::{BlockStatement, Expression, InfixOperator, PrefixOperator, Program, Statement},
        object::Object,
    },
};

/// Operand written into forward jumps until their target is known.
const PLACEHOLDER: usize = 9999;

#[derive(Debug, Clone, Copy)]
struct EmittedInstruction {
    opcode: Opcode,
    position: usize,
}

/// Symbol table and constant pool carried from one compile to the next, so
/// globals defined in an earlier turn stay resolvable in later ones.
#[derive(Debug, Clone, Default)]
pub struct CompilerState {
    pub symbol_table: SymbolTable,
    pub constants: Vec<Object>,
}

/// Lowers a syntax tree to bytecode.
///
/// Forward jumps are emitted with a placeholder operand and back-patched in
/// place once the target offset is known.
pub struct Compiler {
    /// Output instruction stream
    instructions: Instructions,

    /// Append-only constant pool; indices never change once handed out
    constants: Vec<Object>,

    symbol_table: SymbolTable,

    last_instruction: Option<EmittedInstruction>,
    previous_instruction: Option<EmittedInstruction>,
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}

impl Compiler {
    pub fn new() -> Self {
        Self::with_state(CompilerState::default())
    }

    /// Continues from an earlier session's symbol table and constant pool.
    pub fn with_state(state: CompilerState) -> Self {
        Self {
            instructions: Instructions::new(),
            constants: state.constants,
            symbol_table: state.symbol_table,
            last_instruction: None,
            previous_instruction: None,
        }
    }

    /// Compiles a whole program.
    ///
    /// On failure the instruction stream is discarded, so no partial
    /// bytecode is ever observable. Symbols and constants added before the
    /// failure are kept; callers that need the previous state compile from a
    /// copy of it.
    pub fn compile(&mut self, program: &Program) -> Result<(), CompileError> {
        let result = self.compile_statements(&program.statements);

        match &result {
            Ok(()) => log::debug!(
                "compiled {} statements into {} bytes, {} constants",
                program.statements.len(),
                self.instructions.len(),
                self.constants.len()
            ),
            Err(e) => {
                log::debug!("compilation failed: {}", e);
                self.instructions.clear();
                self.last_instruction = None;
                self.previous_instruction = None;
            }
        }

        result
    }

    pub fn bytecode(&self) -> Bytecode {
        Bytecode {
            instructions: self.instructions.clone(),
            constants: self.constants.clone(),
        }
    }

    pub fn symbol_table(&self) -> &SymbolTable {
        &self.symbol_table
    }

    pub fn into_state(self) -> CompilerState {
        CompilerState {
            symbol_table: self.symbol_table,
            constants: self.constants,
        }
    }

    fn compile_statements(&mut self, statements: &[Statement]) -> Result<(), CompileError> {
        for stmt in statements {
            self.compile_statement(stmt)?;
        }
        Ok(())
    }

    fn compile_statement(&mut self, stmt: &Statement) -> Result<(), CompileError> {
        match stmt {
            Statement::Expression(expr) => {
                self.compile_expression(expr)?;
                self.emit(Opcode::Pop, &[])?;
            }

            Statement::Let { name, value } => {
                self.compile_expression(value)?;

                let index = self.symbol_table.define(&name.value).index;
                if index > u16::MAX as usize {
                    return Err(CompileError::TooManyGlobals(index));
                }
                self.emit(Opcode::SetGlobal, &[index])?;
            }

            Statement::Return(_) => return Err(CompileError::unsupported(stmt.kind_name())),
        }
        Ok(())
    }

    fn compile_expression(&mut self, expr: &Expression) -> Result<(), CompileError> {
        match expr {
            Expression::IntegerLiteral(n) => {
                let index = self.add_constant(Object::Integer(*n))?;
                self.emit(Opcode::Constant, &[index])?;
            }

            Expression::StringLiteral(s) => {
                let index = self.add_constant(Object::String(s.clone()))?;
                self.emit(Opcode::Constant, &[index])?;
            }

            Expression::Boolean(true) => {
                self.emit(Opcode::True, &[])?;
            }
            Expression::Boolean(false) => {
                self.emit(Opcode::False, &[])?;
            }

            Expression::Prefix { operator, right } => {
                self.compile_expression(right)?;
                let op = match operator {
                    PrefixOperator::Minus => Opcode::Minus,
                    PrefixOperator::Bang => Opcode::Bang,
                };
                self.emit(op, &[])?;
            }

            Expression::Infix {
                left,
                operator,
                right,
            } => self.compile_infix(left, *operator, right)?,

            Expression::If {
                condition,
                consequence,
                alternative,
            } => self.compile_if(condition, consequence, alternative.as_ref())?,

            Expression::Identifier(ident) => {
                let symbol = self
                    .symbol_table
                    .resolve(&ident.value)
                    .ok_or_else(|| CompileError::UndefinedVariable(ident.value.clone()))?;
                let index = symbol.index;
                self.emit(Opcode::GetGlobal, &[index])?;
            }

            Expression::FunctionLiteral { .. }
            | Expression::Call { .. }
            | Expression::ArrayLiteral(_)
            | Expression::Index { .. } => return Err(CompileError::unsupported(expr.kind_name())),
        }
        Ok(())
    }

    fn compile_infix(
        &mut self,
        left: &Expression,
        operator: InfixOperator,
        right: &Expression,
    ) -> Result<(), CompileError> {
        // `a < b` is emitted as `b > a`; there is no less-than opcode.
        if operator == InfixOperator::Lt {
            self.compile_expression(right)?;
            self.compile_expression(left)?;
            self.emit(Opcode::GreaterThan, &[])?;
            return Ok(());
        }

        self.compile_expression(left)?;
        self.compile_expression(right)?;

        let op = match operator {
            InfixOperator::Plus => Opcode::Add,
            InfixOperator::Minus => Opcode::Sub,
            InfixOperator::Asterisk => Opcode::Mul,
            InfixOperator::Slash => Opcode::Div,
            InfixOperator::Gt | InfixOperator::Lt => Opcode::GreaterThan,
            InfixOperator::Eq => Opcode::Equal,
            InfixOperator::NotEq => Opcode::NotEqual,
        };
        self.emit(op, &[])?;
        Ok(())
    }

    /// ```text
    ///        <condition>
    ///        OpJumpNotTruthy else
    ///        <consequence>
    ///        OpJump end
    /// else:  <alternative> | OpNull
    /// end:
    /// ```
    fn compile_if(
        &mut self,
        condition: &Expression,
        consequence: &BlockStatement,
        alternative: Option<&BlockStatement>,
    ) -> Result<(), CompileError> {
        self.compile_expression(condition)?;
        let jump_not_truthy_pos = self.emit(Opcode::JumpNotTruthy, &[PLACEHOLDER])?;

        self.compile_branch(consequence)?;
        let jump_pos = self.emit(Opcode::Jump, &[PLACEHOLDER])?;

        let after_consequence = self.instructions.len();
        self.change_operand(jump_not_truthy_pos, Opcode::JumpNotTruthy, after_consequence)?;

        match alternative {
            Some(alternative) => self.compile_branch(alternative)?,
            None => {
                self.emit(Opcode::Null, &[])?;
            }
        }

        let after_alternative = self.instructions.len();
        self.change_operand(jump_pos, Opcode::Jump, after_alternative)?;
        Ok(())
    }

    /// Compiles an `if` branch so that it leaves exactly one value on the
    /// stack: a trailing `OpPop` is dropped, and a branch that produced no
    /// value at all (empty, or ending in `let`) yields `null`.
    fn compile_branch(&mut self, block: &BlockStatement) -> Result<(), CompileError> {
        self.compile_statements(&block.statements)?;

        if self.last_instruction_is(Opcode::Pop) {
            self.remove_last_pop();
        } else {
            self.emit(Opcode::Null, &[])?;
        }
        Ok(())
    }

    // =========================================================================
    // Emission helpers
    // =========================================================================

    fn add_constant(&mut self, constant: Object) -> Result<usize, CompileError> {
        if self.constants.len() > u16::MAX as usize {
            return Err(CompileError::TooManyConstants(self.constants.len()));
        }
        self.constants.push(constant);
        Ok(self.constants.len() - 1)
    }

    /// Appends an instruction and returns its offset.
    fn emit(&mut self, op: Opcode, operands: &[usize]) -> Result<usize, CompileError> {
        let instruction = make(op, operands)?;
        let position = self.instructions.push(&instruction);
        self.set_last_instruction(op, position);
        Ok(position)
    }

    fn set_last_instruction(&mut self, opcode: Opcode, position: usize) {
        self.previous_instruction = self.last_instruction;
        self.last_instruction = Some(EmittedInstruction { opcode, position });
    }

    fn last_instruction_is(&self, op: Opcode) -> bool {
        self.last_instruction.is_some_and(|last| last.opcode == op)
    }

    fn remove_last_pop(&mut self) {
        if let Some(last) = self.last_instruction {
            self.instructions.truncate(last.position);
            self.last_instruction = self.previous_instruction;
        }
    }

    /// Back-patches the operand of the `op` instruction at `position`.
    fn change_operand(
        &mut self,
        position: usize,
        op: Opcode,
        operand: usize,
    ) -> Result<(), CompileError> {
        let instruction = make(op, &[operand])?;
        self.instructions.replace(position, &instruction);
        Ok(())
    }
}
