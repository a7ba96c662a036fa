use thiserror::Error;

/// The instruction stream itself cannot be decoded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InstructionError {
    #[error("operand at offset {offset} does not terminate within 5 bytes")]
    OperandTooLong { offset: usize },
    #[error("operand at offset {offset} runs past the end of the code")]
    TruncatedOperand { offset: usize },
    #[error("unknown opcode 0x{opcode:02x} at offset {offset}")]
    UnknownOpcode { offset: usize, opcode: u8 },
    #[error("operand {value} does not fit the 5-byte encoding")]
    OperandTooLarge { value: u64 },
}

/// Static stack verification failed. This always means the code generator
/// emitted an inconsistent block; it is never caused by user input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StackError {
    #[error("stack underflow after {opcode} at offset {offset} (depth {depth})")]
    Underflow {
        offset: usize,
        opcode: &'static str,
        depth: i64,
    },
    #[error("CHECKSTACK at offset {offset} expected depth {expected}, found {actual}")]
    CheckpointMismatch { offset: usize, expected: u64, actual: i64 },
    #[error("block ends with {depth} values left on the stack")]
    Unbalanced { depth: i64 },
}

/// Constructing a [`crate::vm::ByteCode`] failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    #[error("malformed instruction: {0}")]
    Instruction(#[from] InstructionError),
    #[error("internal error: {0}")]
    Stack(#[from] StackError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SerializeError {
    #[error("serializing {kind} constants is not implemented")]
    UnsupportedConstant { kind: &'static str },
}

/// The buffer handed to [`crate::vm::deserialize`] is not a valid block tree.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UnserializeError {
    #[error("unexpected end of buffer reading {what} at offset {offset}")]
    UnexpectedEof { what: &'static str, offset: usize },
    #[error("negative {what} {value} at offset {offset}")]
    Negative {
        what: &'static str,
        value: isize,
        offset: usize,
    },
    #[error("unknown constant type tag {tag:?}")]
    UnknownConstant { tag: char },
    #[error("unknown declaration tag {tag:?}")]
    UnknownDeclaration { tag: char },
    #[error("unknown parameter type tag {tag:?}")]
    UnknownParamTag { tag: char },
    #[error("function has {names} parameter names but {tags} type tags")]
    ParamCountMismatch { names: usize, tags: usize },
    #[error("{what} is not valid UTF-8")]
    InvalidUtf8 { what: &'static str },
    #[error("declarations nested too deeply at offset {offset}")]
    TooDeep { offset: usize },
    #[error("{0} trailing bytes after the top-level block")]
    TrailingBytes(usize),
    #[error("invalid block: {0}")]
    Build(#[from] BuildError),
}
