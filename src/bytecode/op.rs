// =============================================================================
// OPCODES - one byte each, followed by fixed-width big-endian operands
// =============================================================================

/// Instruction tag. The discriminant is the encoded byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    /// `OpConstant idx` push `constants[idx]`
    Constant = 0,

    // arithmetic ( a b -- a∘b )
    Add,
    Sub,
    Mul,
    Div,

    /// Pop and discard; ends every expression statement.
    Pop,

    True,
    False,
    Null,

    // comparison ( a b -- bool )
    Equal,
    NotEqual,
    GreaterThan,

    // prefix ( a -- a' )
    Minus,
    Bang,

    /// `OpJumpNotTruthy target` pop, jump if not truthy
    JumpNotTruthy,
    /// `OpJump target` absolute jump
    Jump,

    /// `OpGetGlobal slot`
    GetGlobal,
    /// `OpSetGlobal slot`
    SetGlobal,
}

/// Static description of an opcode: its name and the byte width of each operand.
#[derive(Debug, PartialEq, Eq)]
pub struct Definition {
    pub name: &'static str,
    pub operand_widths: &'static [usize],
}

impl Definition {
    /// Encoded size of the whole instruction, opcode byte included.
    pub fn instruction_len(&self) -> usize {
        1 + self.operand_widths.iter().sum::<usize>()
    }
}

macro_rules! def {
    ($name:literal) => {
        Definition {
            name: $name,
            operand_widths: &[],
        }
    };
    ($name:literal, $($w:literal),+) => {
        Definition {
            name: $name,
            operand_widths: &[$($w),+],
        }
    };
}

impl Opcode {
    pub const ALL: [Opcode; 18] = [
        Opcode::Constant,
        Opcode::Add,
        Opcode::Sub,
        Opcode::Mul,
        Opcode::Div,
        Opcode::Pop,
        Opcode::True,
        Opcode::False,
        Opcode::Null,
        Opcode::Equal,
        Opcode::NotEqual,
        Opcode::GreaterThan,
        Opcode::Minus,
        Opcode::Bang,
        Opcode::JumpNotTruthy,
        Opcode::Jump,
        Opcode::GetGlobal,
        Opcode::SetGlobal,
    ];

    pub fn definition(self) -> &'static Definition {
        static CONSTANT: Definition = def!("OpConstant", 2);
        static ADD: Definition = def!("OpAdd");
        static SUB: Definition = def!("OpSub");
        static MUL: Definition = def!("OpMul");
        static DIV: Definition = def!("OpDiv");
        static POP: Definition = def!("OpPop");
        static TRUE: Definition = def!("OpTrue");
        static FALSE: Definition = def!("OpFalse");
        static NULL: Definition = def!("OpNull");
        static EQUAL: Definition = def!("OpEqual");
        static NOT_EQUAL: Definition = def!("OpNotEqual");
        static GREATER_THAN: Definition = def!("OpGreaterThan");
        static MINUS: Definition = def!("OpMinus");
        static BANG: Definition = def!("OpBang");
        static JUMP_NOT_TRUTHY: Definition = def!("OpJumpNotTruthy", 2);
        static JUMP: Definition = def!("OpJump", 2);
        static GET_GLOBAL: Definition = def!("OpGetGlobal", 2);
        static SET_GLOBAL: Definition = def!("OpSetGlobal", 2);

        match self {
            Opcode::Constant => &CONSTANT,
            Opcode::Add => &ADD,
            Opcode::Sub => &SUB,
            Opcode::Mul => &MUL,
            Opcode::Div => &DIV,
            Opcode::Pop => &POP,
            Opcode::True => &TRUE,
            Opcode::False => &FALSE,
            Opcode::Null => &NULL,
            Opcode::Equal => &EQUAL,
            Opcode::NotEqual => &NOT_EQUAL,
            Opcode::GreaterThan => &GREATER_THAN,
            Opcode::Minus => &MINUS,
            Opcode::Bang => &BANG,
            Opcode::JumpNotTruthy => &JUMP_NOT_TRUTHY,
            Opcode::Jump => &JUMP,
            Opcode::GetGlobal => &GET_GLOBAL,
            Opcode::SetGlobal => &SET_GLOBAL,
        }
    }
}

impl TryFrom<u8> for Opcode {
    type Error = DecodeError;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        Opcode::ALL
            .get(byte as usize)
            .copied()
            .ok_or(DecodeError::UnknownOpcode(byte))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("opcode {0} undefined")]
    UnknownOpcode(u8),

    #[error("instruction at {offset} is truncated")]
    Truncated { offset: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EncodeError {
    #[error("{op} takes {expected} operands, got {got}")]
    OperandCount {
        op: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("operand {operand} of {op} does not fit in {width} bytes")]
    OperandOutOfRange {
        op: &'static str,
        operand: usize,
        width: usize,
    },
}

/// Finds the definition for a raw opcode byte.
pub fn lookup(byte: u8) -> Result<&'static Definition, DecodeError> {
    Opcode::try_from(byte).map(Opcode::definition)
}

/// Encodes one instruction: the opcode byte, then each operand big-endian in
/// its declared width.
///
/// ```text
/// make(Opcode::Constant, &[65534]) == [0, 0xFF, 0xFE]
/// ```
pub fn make(op: Opcode, operands: &[usize]) -> Result<Vec<u8>, EncodeError> {
    let def = op.definition();

    if operands.len() != def.operand_widths.len() {
        return Err(EncodeError::OperandCount {
            op: def.name,
            expected: def.operand_widths.len(),
            got: operands.len(),
        });
    }

    let mut instruction = Vec::with_capacity(def.instruction_len());
    instruction.push(op as u8);

    for (&operand, &width) in operands.iter().zip(def.operand_widths) {
        let out_of_range = || EncodeError::OperandOutOfRange {
            op: def.name,
            operand,
            width,
        };
        match width {
            2 => {
                let value = u16::try_from(operand).map_err(|_| out_of_range())?;
                instruction.extend_from_slice(&value.to_be_bytes());
            }
            1 => {
                let value = u8::try_from(operand).map_err(|_| out_of_range())?;
                instruction.push(value);
            }
            _ => return Err(out_of_range()),
        }
    }

    Ok(instruction)
}

/// Decodes the operands following an opcode. `ins` starts just after the
/// opcode byte. Returns the operands and the number of bytes they occupied.
pub fn read_operands(def: &Definition, ins: &[u8]) -> Result<(Vec<usize>, usize), DecodeError> {
    let mut operands = Vec::with_capacity(def.operand_widths.len());
    let mut offset = 0;

    for &width in def.operand_widths {
        let bytes = ins
            .get(offset..offset + width)
            .ok_or(DecodeError::Truncated { offset })?;
        let operand = match width {
            2 => u16::from_be_bytes([bytes[0], bytes[1]]) as usize,
            _ => bytes[0] as usize,
        };
        operands.push(operand);
        offset += width;
    }

    Ok((operands, offset))
}

/// Reads a big-endian `u16` at the start of `ins`.
pub fn read_u16(ins: &[u8]) -> Option<u16> {
    match ins {
        [hi, lo, ..] => Some(u16::from_be_bytes([*hi, *lo])),
        _ => None,
    }
}
