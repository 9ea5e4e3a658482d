use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Deref;

use crate::bytecode::op::{self, Opcode};
use crate::lang::object::Object;

/// A flat, randomly overwritable instruction buffer.
///
/// Only jump operands are ever rewritten after emission, and only with an
/// instruction of the same opcode, so the encoded width never changes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instructions(Vec<u8>);

impl Instructions {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Appends an encoded instruction and returns its starting offset.
    pub fn push(&mut self, instruction: &[u8]) -> usize {
        let pos = self.0.len();
        self.0.extend_from_slice(instruction);
        pos
    }

    /// Overwrites the bytes at `pos` with `instruction`.
    ///
    /// Panics if the replacement runs past the end of the buffer; callers
    /// only replace instructions they emitted themselves.
    pub fn replace(&mut self, pos: usize, instruction: &[u8]) {
        self.0[pos..pos + instruction.len()].copy_from_slice(instruction);
    }

    pub fn truncate(&mut self, len: usize) {
        self.0.truncate(len);
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl Deref for Instructions {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}

impl From<Vec<u8>> for Instructions {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl FromIterator<Vec<u8>> for Instructions {
    fn from_iter<T: IntoIterator<Item = Vec<u8>>>(iter: T) -> Self {
        Self(iter.into_iter().flatten().collect())
    }
}

/// One line per instruction: `0000 OpConstant 1`.
///
/// Undecodable bytes are reported inline and end the listing.
impl fmt::Display for Instructions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut i = 0;
        while i < self.0.len() {
            let def = match op::lookup(self.0[i]) {
                Ok(def) => def,
                Err(e) => return writeln!(f, "{:04} ERROR: {}", i, e),
            };
            let (operands, read) = match op::read_operands(def, &self.0[i + 1..]) {
                Ok(decoded) => decoded,
                Err(e) => return writeln!(f, "{:04} ERROR: {}", i, e),
            };

            write!(f, "{:04} {}", i, def.name)?;
            for operand in operands {
                write!(f, " {}", operand)?;
            }
            writeln!(f)?;

            i += 1 + read;
        }
        Ok(())
    }
}

/// Compiler output handed to the virtual machine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Bytecode {
    pub instructions: Instructions,
    /// Literal values referenced by `OpConstant` operands.
    pub constants: Vec<Object>,
}

impl Bytecode {
    /// Serializes with postcard. Fails only if a constant is a builtin.
    pub fn to_bytes(&self) -> Result<Vec<u8>, postcard::Error> {
        postcard::to_allocvec(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, postcard::Error> {
        postcard::from_bytes(bytes)
    }

    /// Counts `wanted` instructions, walking instruction boundaries so operand
    /// bytes that happen to equal the opcode are not counted.
    pub fn count_ops(&self, wanted: Opcode) -> usize {
        let mut count = 0;
        let mut i = 0;
        while let Some(&byte) = self.instructions.get(i) {
            let Ok(def) = op::lookup(byte) else {
                break;
            };
            if byte == wanted as u8 {
                count += 1;
            }
            i += def.instruction_len();
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::op::make;

    fn ins(op: Opcode, operands: &[usize]) -> Vec<u8> {
        make(op, operands).unwrap()
    }

    #[test]
    fn test_instructions_display() {
        let instructions: Instructions = vec![
            ins(Opcode::Add, &[]),
            ins(Opcode::Constant, &[2]),
            ins(Opcode::Constant, &[65535]),
            ins(Opcode::JumpNotTruthy, &[7]),
        ]
        .into_iter()
        .collect();

        let expected = "0000 OpAdd\n\
                        0001 OpConstant 2\n\
                        0004 OpConstant 65535\n\
                        0007 OpJumpNotTruthy 7\n";
        assert_eq!(instructions.to_string(), expected);
    }

    #[test]
    fn test_display_reports_bad_bytes() {
        let instructions = Instructions::from(vec![Opcode::Pop as u8, 250]);
        assert_eq!(instructions.to_string(), "0000 OpPop\n0001 ERROR: opcode 250 undefined\n");
    }

    #[test]
    fn test_replace_keeps_length() {
        let mut instructions = Instructions::new();
        let pos = instructions.push(&ins(Opcode::Jump, &[9999]));
        instructions.push(&ins(Opcode::Null, &[]));
        instructions.replace(pos, &ins(Opcode::Jump, &[4]));
        assert_eq!(instructions.to_string(), "0000 OpJump 4\n0003 OpNull\n");
    }

    #[test]
    fn test_postcard_round_trip() {
        let bytecode = Bytecode {
            instructions: vec![ins(Opcode::Constant, &[0]), ins(Opcode::Pop, &[])]
                .into_iter()
                .collect(),
            constants: vec![Object::Integer(42), Object::String("hi".to_string())],
        };
        let bytes = bytecode.to_bytes().unwrap();
        assert_eq!(Bytecode::from_bytes(&bytes).unwrap(), bytecode);
    }

    #[test]
    fn test_builtin_constant_cannot_be_serialized() {
        let bytecode = Bytecode {
            instructions: Instructions::new(),
            constants: vec![crate::lang::builtins::lookup("len").unwrap()],
        };
        assert!(bytecode.to_bytes().is_err());
    }

    #[test]
    fn test_count_ops_skips_operands() {
        // Constant index 5 encodes as [0, 5]; byte 5 is also OpPop.
        let bytecode = Bytecode {
            instructions: vec![ins(Opcode::Constant, &[5]), ins(Opcode::Pop, &[])]
                .into_iter()
                .collect(),
            constants: vec![],
        };
        assert_eq!(bytecode.count_ops(Opcode::Pop), 1);
    }
}
