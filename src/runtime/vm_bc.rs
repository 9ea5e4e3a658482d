use crate::bytecode::op::{self, Opcode};
use crate::bytecode::{Bytecode, Instructions};
use crate::lang::object::{FALSE, NULL, Object, TRUE};
use crate::runtime::runtime_error::RuntimeError;

pub const STACK_SIZE: usize = 2048;
pub const GLOBALS_SIZE: usize = 65536;

static EMPTY_SLOT: Object = Object::Null;

#[derive(Debug, Clone)]
pub struct VmConfig {
    pub stack_size: usize,
    pub globals_size: usize,
}

impl Default for VmConfig {
    fn default() -> Self {
        VmConfig {
            stack_size: STACK_SIZE,
            globals_size: GLOBALS_SIZE,
        }
    }
}

/// Stack machine executing one compiled program.
///
/// `sp` always points at the next free slot, so the top of the stack is
/// `stack[sp - 1]`. Popping only moves `sp`; the popped value stays in its
/// slot until overwritten, which is how `last_popped_stack_elem` works.
pub struct Vm {
    constants: Vec<Object>,
    instructions: Instructions,
    stack: Vec<Object>,
    sp: usize,
    globals: Vec<Object>,
}

impl Vm {
    pub fn new(bytecode: Bytecode) -> Self {
        Self::with_config(bytecode, VmConfig::default())
    }

    pub fn with_config(bytecode: Bytecode, config: VmConfig) -> Self {
        let globals = Self::new_globals_store(config.globals_size);
        Self::build(bytecode, config.stack_size, globals)
    }

    /// Runs against a caller-owned globals store, so bindings survive across
    /// programs. Get it back with `into_globals`.
    pub fn with_globals(bytecode: Bytecode, globals: Vec<Object>) -> Self {
        Self::build(bytecode, STACK_SIZE, globals)
    }

    pub fn new_globals_store(size: usize) -> Vec<Object> {
        vec![NULL; size]
    }

    fn build(bytecode: Bytecode, stack_size: usize, globals: Vec<Object>) -> Self {
        Self {
            constants: bytecode.constants,
            instructions: bytecode.instructions,
            stack: vec![NULL; stack_size],
            sp: 0,
            globals,
        }
    }

    /// Value on top of the stack, if any.
    pub fn stack_top(&self) -> Option<&Object> {
        self.sp.checked_sub(1).map(|top| &self.stack[top])
    }

    /// The slot just above the top: whatever the last `OpPop` removed.
    pub fn last_popped_stack_elem(&self) -> &Object {
        self.stack.get(self.sp).unwrap_or(&EMPTY_SLOT)
    }

    pub fn sp(&self) -> usize {
        self.sp
    }

    pub fn into_globals(self) -> Vec<Object> {
        self.globals
    }

    // Execution

    pub fn run(&mut self) -> Result<(), RuntimeError> {
        let mut ip = 0;
        let mut steps = 0usize;

        while ip < self.instructions.len() {
            let opcode = Opcode::try_from(self.instructions[ip])
                .map_err(|source| RuntimeError::Decode { ip, source })?;
            let def = opcode.definition();
            let (operands, read) = op::read_operands(def, &self.instructions[ip + 1..])
                .map_err(|source| RuntimeError::Decode { ip, source })?;

            log::trace!("{:04} {} {:?} sp={}", ip, def.name, operands, self.sp);

            ip += 1 + read;
            steps += 1;

            match opcode {
                Opcode::Constant => {
                    let index = operands[0];
                    let constant = self
                        .constants
                        .get(index)
                        .cloned()
                        .ok_or(RuntimeError::ConstantOutOfRange(index))?;
                    self.push(constant)?;
                }

                Opcode::Add | Opcode::Sub | Opcode::Mul | Opcode::Div => {
                    self.execute_arithmetic(opcode)?;
                }

                Opcode::Equal | Opcode::NotEqual | Opcode::GreaterThan => {
                    self.execute_comparison(opcode)?;
                }

                Opcode::True => self.push(TRUE)?,
                Opcode::False => self.push(FALSE)?,
                Opcode::Null => self.push(NULL)?,

                Opcode::Bang => {
                    let operand = self.pop()?;
                    self.push(Object::from_bool(!operand.is_truthy()))?;
                }
                Opcode::Minus => {
                    let result = match self.pop()? {
                        Object::Integer(n) => Object::Integer(n.wrapping_neg()),
                        other => return Err(RuntimeError::UnsupportedNegation(other.type_name())),
                    };
                    self.push(result)?;
                }

                Opcode::Jump => {
                    ip = operands[0];
                }
                Opcode::JumpNotTruthy => {
                    let condition = self.pop()?;
                    if !condition.is_truthy() {
                        ip = operands[0];
                    }
                }

                Opcode::SetGlobal => {
                    let value = self.pop()?;
                    let slot = self.global_slot(operands[0])?;
                    *slot = value;
                }
                Opcode::GetGlobal => {
                    let value = self.global_slot(operands[0])?.clone();
                    self.push(value)?;
                }

                Opcode::Pop => {
                    self.pop()?;
                }
            }
        }

        log::debug!(
            "vm finished after {} instructions, sp={}, last popped {}",
            steps,
            self.sp,
            self.last_popped_stack_elem()
        );
        Ok(())
    }

    fn execute_arithmetic(&mut self, opcode: Opcode) -> Result<(), RuntimeError> {
        let right = self.pop()?;
        let left = self.pop()?;

        let (a, b) = match (&left, &right) {
            (Object::Integer(a), Object::Integer(b)) => (*a, *b),
            _ => {
                return Err(RuntimeError::UnsupportedBinaryOperands {
                    op: operator_symbol(opcode),
                    left: left.type_name(),
                    right: right.type_name(),
                });
            }
        };

        let result = match opcode {
            Opcode::Add => a.wrapping_add(b),
            Opcode::Sub => a.wrapping_sub(b),
            Opcode::Mul => a.wrapping_mul(b),
            _ => {
                if b == 0 {
                    return Err(RuntimeError::DivisionByZero);
                }
                a.wrapping_div(b)
            }
        };

        self.push(Object::Integer(result))
    }

    fn execute_comparison(&mut self, opcode: Opcode) -> Result<(), RuntimeError> {
        let right = self.pop()?;
        let left = self.pop()?;

        let result = match (opcode, &left, &right) {
            (Opcode::Equal, Object::Integer(a), Object::Integer(b)) => a == b,
            (Opcode::NotEqual, Object::Integer(a), Object::Integer(b)) => a != b,
            (Opcode::GreaterThan, Object::Integer(a), Object::Integer(b)) => a > b,
            (Opcode::Equal, Object::Boolean(a), Object::Boolean(b)) => a == b,
            (Opcode::NotEqual, Object::Boolean(a), Object::Boolean(b)) => a != b,
            _ => {
                return Err(RuntimeError::UnsupportedBinaryOperands {
                    op: operator_symbol(opcode),
                    left: left.type_name(),
                    right: right.type_name(),
                });
            }
        };

        self.push(Object::from_bool(result))
    }

    fn global_slot(&mut self, slot: usize) -> Result<&mut Object, RuntimeError> {
        let size = self.globals.len();
        self.globals
            .get_mut(slot)
            .ok_or(RuntimeError::GlobalOutOfRange { slot, size })
    }

    // Stack

    fn push(&mut self, value: Object) -> Result<(), RuntimeError> {
        let slot = self
            .stack
            .get_mut(self.sp)
            .ok_or(RuntimeError::StackOverflow)?;
        *slot = value;
        self.sp += 1;
        Ok(())
    }

    fn pop(&mut self) -> Result<Object, RuntimeError> {
        self.sp = self.sp.checked_sub(1).ok_or(RuntimeError::StackUnderflow)?;
        Ok(self.stack[self.sp].clone())
    }
}

fn operator_symbol(opcode: Opcode) -> &'static str {
    match opcode {
        Opcode::Add => "+",
        Opcode::Sub => "-",
        Opcode::Mul => "*",
        Opcode::Div => "/",
        Opcode::Equal => "==",
        Opcode::NotEqual => "!=",
        Opcode::GreaterThan => ">",
        other => other.definition().name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::compile::{Compiler, CompilerState};
    use crate::bytecode::op::{DecodeError, make};
    use crate::frontend::parser::parse_source;

    // ============================================================
    // Test Helpers
    // ============================================================

    fn compile(source: &str) -> Bytecode {
        let (program, errors) = parse_source(source);
        assert!(errors.is_empty(), "parse errors for {:?}: {:?}", source, errors);
        let mut compiler = Compiler::new();
        compiler.compile(&program).unwrap();
        compiler.bytecode()
    }

    /// Compile and run `source`, returning the last popped value
    fn run_source(source: &str) -> Result<Object, RuntimeError> {
        let mut vm = Vm::new(compile(source));
        vm.run()?;
        Ok(vm.last_popped_stack_elem().clone())
    }

    fn assert_result(source: &str, expected: Object) {
        match run_source(source) {
            Ok(result) => assert_eq!(result, expected, "source: {}", source),
            Err(e) => panic!("{:?} failed: {}", source, e),
        }
    }

    fn assert_error(source: &str, expected: &str) {
        match run_source(source) {
            Ok(result) => panic!("expected error for {:?}, got {}", source, result),
            Err(e) => assert!(
                e.to_string().contains(expected),
                "error '{}' does not contain '{}'",
                e,
                expected
            ),
        }
    }

    fn bytecode_from_ops(ops: &[(Opcode, &[usize])], constants: Vec<Object>) -> Bytecode {
        Bytecode {
            instructions: ops
                .iter()
                .map(|(op, operands)| make(*op, operands).unwrap())
                .collect(),
            constants,
        }
    }

    // ============================================================
    // Arithmetic
    // ============================================================

    #[test]
    fn test_integer_arithmetic() {
        let cases = [
            ("1", 1),
            ("2", 2),
            ("1 + 2", 3),
            ("1 - 2", -1),
            ("1 * 2", 2),
            ("4 / 2", 2),
            ("50 / 2 * 2 + 10 - 5", 55),
            ("5 * (2 + 10)", 60),
            ("5 + 5 + 5 + 5 - 10", 10),
            ("2 * 2 * 2 * 2 * 2", 32),
            ("-5", -5),
            ("-10", -10),
            ("-50 + 100 + -50", 0),
            ("(5 + 10 * 2 + 15 / 3) * 2 + -10", 50),
            ("7 / 2", 3),
            ("-7 / 2", -3),
        ];
        for (source, expected) in cases {
            assert_result(source, Object::Integer(expected));
        }
    }

    #[test]
    fn test_integer_overflow_wraps() {
        assert_result("9223372036854775807 + 1", Object::Integer(i64::MIN));
    }

    // ============================================================
    // Booleans and comparison
    // ============================================================

    #[test]
    fn test_boolean_expressions() {
        let cases = [
            ("true", true),
            ("false", false),
            ("1 < 2", true),
            ("1 > 2", false),
            ("1 < 1", false),
            ("1 > 1", false),
            ("1 == 1", true),
            ("1 != 1", false),
            ("1 == 2", false),
            ("1 != 2", true),
            ("true == true", true),
            ("false == false", true),
            ("true == false", false),
            ("true != false", true),
            ("(1 < 2) == true", true),
            ("(1 < 2) == false", false),
            ("(1 > 2) == true", false),
            ("!true", false),
            ("!false", true),
            ("!5", false),
            ("!!true", true),
            ("!!5", true),
            ("!(if (false) { 5; })", true),
        ];
        for (source, expected) in cases {
            assert_result(source, Object::from_bool(expected));
        }
    }

    // ============================================================
    // Conditionals
    // ============================================================

    #[test]
    fn test_conditionals() {
        let cases = [
            ("if (true) { 10 }", Object::Integer(10)),
            ("if (true) { 10 } else { 20 }", Object::Integer(10)),
            ("if (false) { 10 } else { 20 }", Object::Integer(20)),
            ("if (1) { 10 }", Object::Integer(10)),
            ("if (1 < 2) { 10 }", Object::Integer(10)),
            ("if (1 < 2) { 10 } else { 20 }", Object::Integer(10)),
            ("if (1 > 2) { 10 } else { 20 }", Object::Integer(20)),
            ("if (1 > 2) { 10 }", NULL),
            ("if (false) { 10 }", NULL),
            ("if ((if (false) { 10 })) { 10 } else { 20 }", Object::Integer(20)),
            ("if (true) { }", NULL),
            ("if (true) { let a = 1; }", NULL),
        ];
        for (source, expected) in cases {
            assert_result(source, expected);
        }
    }

    // ============================================================
    // Globals
    // ============================================================

    #[test]
    fn test_global_let_statements() {
        let cases = [
            ("let one = 1; one", 1),
            ("let one = 1; let two = 2; one + two", 3),
            ("let one = 1; let two = one + one; one + two", 3),
            ("let a = 1; let a = a + 10; a", 11),
        ];
        for (source, expected) in cases {
            assert_result(source, Object::Integer(expected));
        }
    }

    #[test]
    fn test_globals_persist_across_runs() {
        let (first, _) = parse_source("let one = 1; let two = 2;");
        let mut compiler = Compiler::with_state(CompilerState::default());
        compiler.compile(&first).unwrap();
        let mut vm = Vm::with_globals(compiler.bytecode(), Vm::new_globals_store(GLOBALS_SIZE));
        vm.run().unwrap();
        let globals = vm.into_globals();
        let state = compiler.into_state();

        let (second, _) = parse_source("one + two");
        let mut compiler = Compiler::with_state(state);
        compiler.compile(&second).unwrap();
        let mut vm = Vm::with_globals(compiler.bytecode(), globals);
        vm.run().unwrap();

        assert_eq!(vm.last_popped_stack_elem(), &Object::Integer(3));
    }

    // ============================================================
    // Strings
    // ============================================================

    #[test]
    fn test_string_constants() {
        assert_result(r#""monkey""#, Object::String("monkey".to_string()));
        assert_result(
            r#"let s = "mon"; if (true) { s }"#,
            Object::String("mon".to_string()),
        );
    }

    // ============================================================
    // Stack discipline
    // ============================================================

    #[test]
    fn test_stack_empty_after_run() {
        let mut vm = Vm::new(compile("1; 2; let x = 3; if (x > 1) { 4 }; x + 5"));
        vm.run().unwrap();
        assert_eq!(vm.sp(), 0);
        assert_eq!(vm.stack_top(), None);
        assert_eq!(vm.last_popped_stack_elem(), &Object::Integer(8));
    }

    #[test]
    fn test_stack_top_without_pop() {
        let bc = bytecode_from_ops(
            &[(Opcode::Constant, &[0]), (Opcode::Constant, &[1])],
            vec![Object::Integer(1), Object::Integer(2)],
        );
        let mut vm = Vm::new(bc);
        vm.run().unwrap();
        assert_eq!(vm.sp(), 2);
        assert_eq!(vm.stack_top(), Some(&Object::Integer(2)));
    }

    #[test]
    fn test_fresh_vm_reproduces_result() {
        let bc = compile("let a = 5; let b = a * 2; if (b > a) { b - a } else { 0 }");
        let decoded = Bytecode::from_bytes(&bc.to_bytes().unwrap()).unwrap();
        assert_eq!(decoded, bc);

        let mut first = Vm::new(bc);
        first.run().unwrap();
        let mut second = Vm::new(decoded);
        second.run().unwrap();

        assert_eq!(first.last_popped_stack_elem(), &Object::Integer(5));
        assert_eq!(
            first.last_popped_stack_elem(),
            second.last_popped_stack_elem()
        );
    }

    // ============================================================
    // Errors
    // ============================================================

    #[test]
    fn test_stack_overflow() {
        let bc = bytecode_from_ops(
            &[(Opcode::True, &[]), (Opcode::True, &[]), (Opcode::True, &[])],
            vec![],
        );
        let config = VmConfig {
            stack_size: 2,
            ..VmConfig::default()
        };
        let mut vm = Vm::with_config(bc, config);
        assert_eq!(vm.run(), Err(RuntimeError::StackOverflow));
    }

    #[test]
    fn test_stack_underflow() {
        let bc = bytecode_from_ops(&[(Opcode::Pop, &[])], vec![]);
        assert_eq!(Vm::new(bc).run(), Err(RuntimeError::StackUnderflow));
    }

    #[test]
    fn test_type_mismatch() {
        assert_error("1 + true", "unsupported types for binary operation: INTEGER + BOOLEAN");
        assert_error("true + false", "BOOLEAN + BOOLEAN");
        assert_error("1 == true", "INTEGER == BOOLEAN");
        assert_error("true > false", "BOOLEAN > BOOLEAN");
        assert_error(r#""a" + "b""#, "STRING + STRING");
        assert_error("-true", "unsupported type for negation: BOOLEAN");
    }

    #[test]
    fn test_division_by_zero() {
        assert_error("1 / 0", "division by zero");
        assert_error("let z = 0; 10 / z", "division by zero");
    }

    #[test]
    fn test_unknown_opcode() {
        let bc = Bytecode {
            instructions: Instructions::from(vec![Opcode::True as u8, 200]),
            constants: vec![],
        };
        assert_eq!(
            Vm::new(bc).run(),
            Err(RuntimeError::Decode {
                ip: 1,
                source: DecodeError::UnknownOpcode(200)
            })
        );
    }

    #[test]
    fn test_truncated_operand() {
        let bc = Bytecode {
            instructions: Instructions::from(vec![Opcode::Constant as u8, 0]),
            constants: vec![Object::Integer(1)],
        };
        assert!(matches!(
            Vm::new(bc).run(),
            Err(RuntimeError::Decode {
                ip: 0,
                source: DecodeError::Truncated { .. }
            })
        ));
    }

    #[test]
    fn test_missing_constant() {
        let bc = bytecode_from_ops(&[(Opcode::Constant, &[3])], vec![]);
        assert_eq!(Vm::new(bc).run(), Err(RuntimeError::ConstantOutOfRange(3)));
    }

    #[test]
    fn test_global_outside_store() {
        let bc = bytecode_from_ops(&[(Opcode::GetGlobal, &[4])], vec![]);
        let mut vm = Vm::with_globals(bc, Vm::new_globals_store(2));
        assert_eq!(
            vm.run(),
            Err(RuntimeError::GlobalOutOfRange { slot: 4, size: 2 })
        );
    }
}
