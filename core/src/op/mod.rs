//! Instruction set of the block VM.
//!
//! Every instruction is one opcode byte. Opcodes whose numeric value is at or
//! above [`HAS_ARG`] are followed by one variable-width operand (see
//! [`crate::vm::decode_arg`]). The table below is the single source of truth
//! for mnemonics and stack effects; the analyzer, the disassembler and the
//! CLI assembler all read it.

use std::fmt;

use StackEffect::{Fixed, MinusArg, MinusArgPlusOne, MinusTwiceArgPlusOne};

/// First opcode value that carries an operand.
pub const HAS_ARG: u8 = 0x40;

/// Net change in operand-stack height caused by one instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackEffect {
    /// A fixed delta, independent of the operand.
    Fixed(i8),
    /// `-arg`
    MinusArg,
    /// `-arg + 1`
    MinusArgPlusOne,
    /// `-2 * arg + 1`
    MinusTwiceArgPlusOne,
}

impl StackEffect {
    /// Resolve the effect for a concrete operand. Opcodes without an operand
    /// pass `0`; only the fixed descriptor is valid for them.
    #[inline]
    pub fn apply(self, arg: u64) -> i64 {
        let arg = arg as i64;
        match self {
            StackEffect::Fixed(delta) => delta as i64,
            StackEffect::MinusArg => -arg,
            StackEffect::MinusArgPlusOne => -arg + 1,
            StackEffect::MinusTwiceArgPlusOne => -2 * arg + 1,
        }
    }
}

macro_rules! opcodes {
    ($($(#[$doc:meta])* $variant:ident = $byte:literal, $mnemonic:literal, $effect:expr;)*) => {
        #[derive(Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u8)]
        pub enum Opcode {
            $($(#[$doc])* $variant = $byte,)*
        }

        impl Opcode {
            pub const ALL: &'static [Opcode] = &[$(Opcode::$variant,)*];

            #[inline]
            pub const fn from_byte(byte: u8) -> Option<Opcode> {
                match byte {
                    $($byte => Some(Opcode::$variant),)*
                    _ => None,
                }
            }

            pub const fn mnemonic(self) -> &'static str {
                match self {
                    $(Opcode::$variant => $mnemonic,)*
                }
            }

            #[inline]
            pub const fn stack_effect(self) -> StackEffect {
                match self {
                    $(Opcode::$variant => $effect,)*
                }
            }
        }
    };
}

opcodes! {
    Nop = 0x00, "NOP", Fixed(0);
    DiscardTop = 0x01, "DISCARD_TOP", Fixed(-1);
    DupTop = 0x02, "DUP_TOP", Fixed(1);
    RotTwo = 0x03, "ROT_TWO", Fixed(0);
    Return = 0x04, "RETURN", Fixed(-1);
    LoadNull = 0x05, "LOAD_NULL", Fixed(1);
    LoadTrue = 0x06, "LOAD_TRUE", Fixed(1);
    LoadFalse = 0x07, "LOAD_FALSE", Fixed(1);
    LoadThis = 0x08, "LOAD_THIS", Fixed(1);
    Echo = 0x09, "ECHO", Fixed(-1);
    Print = 0x0a, "PRINT", Fixed(0);
    UnaryMinus = 0x10, "UNARY_MINUS", Fixed(0);
    UnaryPlus = 0x11, "UNARY_PLUS", Fixed(0);
    UnaryNot = 0x12, "UNARY_NOT", Fixed(0);
    BitwiseNot = 0x13, "BITWISE_NOT", Fixed(0);
    CastInt = 0x14, "CAST_INT", Fixed(0);
    CastString = 0x15, "CAST_STRING", Fixed(0);
    CastArray = 0x16, "CAST_ARRAY", Fixed(0);
    BinaryAdd = 0x20, "BINARY_ADD", Fixed(-1);
    BinarySub = 0x21, "BINARY_SUB", Fixed(-1);
    BinaryMul = 0x22, "BINARY_MUL", Fixed(-1);
    BinaryDiv = 0x23, "BINARY_DIV", Fixed(-1);
    BinaryMod = 0x24, "BINARY_MOD", Fixed(-1);
    BinaryConcat = 0x25, "BINARY_CONCAT", Fixed(-1);
    BinaryEq = 0x26, "BINARY_EQ", Fixed(-1);
    BinaryNe = 0x27, "BINARY_NE", Fixed(-1);
    BinaryIs = 0x28, "BINARY_IS", Fixed(-1);
    BinaryLt = 0x29, "BINARY_LT", Fixed(-1);
    BinaryLe = 0x2a, "BINARY_LE", Fixed(-1);
    BinaryGt = 0x2b, "BINARY_GT", Fixed(-1);
    BinaryGe = 0x2c, "BINARY_GE", Fixed(-1);
    BinaryAnd = 0x2d, "BINARY_AND", Fixed(-1);
    BinaryOr = 0x2e, "BINARY_OR", Fixed(-1);
    BinaryXor = 0x2f, "BINARY_XOR", Fixed(-1);
    BinaryShl = 0x30, "BINARY_LSHIFT", Fixed(-1);
    BinaryShr = 0x31, "BINARY_RSHIFT", Fixed(-1);
    /// `( container key -- value )`
    GetItem = 0x38, "GETITEM", Fixed(-1);
    /// `( container key value -- value )`
    SetItem = 0x39, "SETITEM", Fixed(-2);
    /// Index into `consts`.
    LoadConst = 0x40, "LOAD_CONST", Fixed(1);
    /// Index into `names`.
    LoadName = 0x41, "LOAD_NAME", Fixed(1);
    /// Index into `names`; leaves the stored value on the stack.
    StoreName = 0x42, "STORE_NAME", Fixed(0);
    /// Index into `varnames`.
    LoadFast = 0x43, "LOAD_FAST", Fixed(1);
    /// Index into `varnames`; leaves the stored value on the stack.
    StoreFast = 0x44, "STORE_FAST", Fixed(0);
    /// `( obj -- value )`, operand indexes `names`.
    GetAttr = 0x45, "GETATTR", Fixed(0);
    /// `( obj value -- value )`, operand indexes `names`.
    SetAttr = 0x46, "SETATTR", Fixed(-1);
    JumpForward = 0x48, "JUMP_FORWARD", Fixed(0);
    JumpBackward = 0x49, "JUMP_BACKWARD", Fixed(0);
    JumpIfFalse = 0x4a, "JUMP_IF_FALSE", Fixed(-1);
    JumpIfTrue = 0x4b, "JUMP_IF_TRUE", Fixed(-1);
    JumpIfFalseNoPop = 0x4c, "JUMP_IF_FALSE_NO_POP", Fixed(0);
    JumpIfTrueNoPop = 0x4d, "JUMP_IF_TRUE_NO_POP", Fixed(0);
    /// `( func arg1 .. argN -- result )`
    Call = 0x50, "CALL", MinusArg;
    /// `( obj arg1 .. argN -- result )`, method name pushed as a const.
    CallMethod = 0x51, "CALL_METHOD", MinusArg;
    /// `( item1 .. itemN -- array )`
    MakeArray = 0x52, "MAKE_ARRAY", MinusArgPlusOne;
    /// `( key1 value1 .. keyN valueN -- array )`
    MakeHash = 0x53, "MAKE_HASH", MinusTwiceArgPlusOne;
    /// `( part1 .. partN -- string )`
    Interpolate = 0x54, "INTERPOLATE", MinusArgPlusOne;
    /// Drop the top `arg` values.
    DiscardN = 0x55, "DISCARD_N", MinusArg;
    /// Index into `user_functions`.
    DeclareFunc = 0x58, "DECLARE_FUNC", Fixed(0);
    /// Index into `user_functions`.
    DeclareClass = 0x59, "DECLARE_CLASS", Fixed(0);
    BindSuperglobal = 0x5a, "BIND_SUPERGLOBAL", Fixed(0);
    /// Compiler-inserted assertion that the stack height equals the operand.
    Checkstack = 0x7f, "CHECKSTACK", Fixed(0);
}

impl Opcode {
    #[inline]
    pub const fn has_arg(self) -> bool {
        self as u8 >= HAS_ARG
    }

    pub fn from_mnemonic(name: &str) -> Option<Opcode> {
        Opcode::ALL.iter().copied().find(|op| op.mnemonic().eq_ignore_ascii_case(name))
    }
}

impl fmt::Debug for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

#[cfg(test)]
mod op_test;
