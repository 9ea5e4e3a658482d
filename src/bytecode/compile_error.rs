use crate::bytecode::op::EncodeError;

/// Reasons a compile call fails. Compilation stops at the first one.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CompileError {
    #[error("undefined variable {0}")]
    UndefinedVariable(String),

    /// A node the bytecode backend does not lower yet.
    #[error("cannot compile '{node_type}' node{}", hint_suffix(.hint))]
    UnsupportedNode {
        node_type: &'static str,
        hint: Option<&'static str>,
    },

    #[error("constant pool is full ({0} entries)")]
    TooManyConstants(usize),

    #[error("out of global slots ({0} in use)")]
    TooManyGlobals(usize),

    #[error(transparent)]
    Encode(#[from] EncodeError),
}

fn hint_suffix(hint: &Option<&'static str>) -> String {
    match hint {
        Some(h) => format!("\n  hint: {}", h),
        None => String::new(),
    }
}

impl CompileError {
    pub fn unsupported(node_type: &'static str) -> Self {
        CompileError::UnsupportedNode {
            node_type,
            hint: Some("this language feature is not supported by the bytecode compiler"),
        }
    }
}
