use crate::bytecode::op::DecodeError;

/// Fatal error from `Vm::run`. Execution never resumes after one.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RuntimeError {
    #[error("stack overflow")]
    StackOverflow,

    #[error("stack underflow")]
    StackUnderflow,

    #[error("unsupported types for binary operation: {left} {op} {right}")]
    UnsupportedBinaryOperands {
        op: &'static str,
        left: &'static str,
        right: &'static str,
    },

    #[error("unsupported type for negation: {0}")]
    UnsupportedNegation(&'static str),

    #[error("division by zero")]
    DivisionByZero,

    #[error("bad instruction at {ip}: {source}")]
    Decode {
        ip: usize,
        #[source]
        source: DecodeError,
    },

    #[error("constant {0} does not exist")]
    ConstantOutOfRange(usize),

    #[error("global slot {slot} outside store of {size}")]
    GlobalOutOfRange { slot: usize, size: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(
            RuntimeError::UnsupportedBinaryOperands {
                op: "+",
                left: "INTEGER",
                right: "BOOLEAN"
            }
            .to_string(),
            "unsupported types for binary operation: INTEGER + BOOLEAN"
        );
        assert_eq!(
            RuntimeError::Decode {
                ip: 3,
                source: DecodeError::UnknownOpcode(99)
            }
            .to_string(),
            "bad instruction at 3: opcode 99 undefined"
        );
    }
}
